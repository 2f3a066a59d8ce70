#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate log;
#[macro_use]
extern crate nom;

extern crate bit_vec;
extern crate byteorder;
extern crate euclid;
extern crate memmap;

pub mod archive;
pub mod errors;
pub mod geom;
pub mod graphics;
pub mod input_buffer;
pub mod map;
pub mod parse;

pub use archive::wad::{Archive, Header, LumpInfo};
pub use graphics::{
    ColorMap, Demo, Dmxgus, Endoom, Flat, MusicScore, Palette, Picture, Rgb, Sound, Sprite,
    SpriteFrame, SpriteFrameDir, Texture, FLAT_HEIGHT, FLAT_WIDTH, SKY_FLAT_NAME,
    TRANSPARENT_INDEX,
};
pub use map::{BspChild, Handle, Level, Sector};
