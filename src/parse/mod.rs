pub mod assets;
pub mod map;
pub mod picture;
pub mod texturex;
pub mod wad;

mod util;
