pub mod wad;
