use std::rc::Rc;

/// The reserved palette index meaning "no pixel here".
pub const TRANSPARENT_INDEX: u8 = 255;

/// The flat name the renderer treats as open sky.
pub const SKY_FLAT_NAME: &'static str = "F_SKY1";

pub const FLAT_WIDTH: usize = 64;
pub const FLAT_HEIGHT: usize = 64;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

/// One of the 14 PLAYPAL palettes: 256 RGB triplets.
#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
    pub colors: Vec<Rgb>,
}

/// One of the 34 COLORMAP shading tables, mapping palette index to palette
/// index.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorMap {
    pub table: Vec<u8>,
}

/// The ENDOOM exit screen: an 80x25 text block of (character, attribute)
/// byte pairs, exactly as stored in VGA text memory.
#[derive(Clone, Debug, PartialEq)]
pub struct Endoom {
    pub screen: Vec<u8>,
}

/// Demo lump.  Recognized but not interpreted.
#[derive(Clone, Copy, Debug, Default)]
pub struct Demo;

/// DMXGUS instrument mapping.  Recognized but not interpreted.
#[derive(Clone, Copy, Debug, Default)]
pub struct Dmxgus;

/// A column of palette indices, one byte per row.
pub type Column = Vec<u8>;

/// The Doom picture format, expanded from its post stream into a full
/// `width` x `height` rectangle.  Cells no post covered hold
/// `TRANSPARENT_INDEX`.
///
/// Sometimes called a patch, but this crate considers a patch to be part of
/// a texture that points at a picture.
#[derive(Clone, Debug, PartialEq)]
pub struct Picture {
    pub name: String,
    pub width: usize,
    pub height: usize,
    /// Offsets let sprites like soulspheres, weapons and keys float.
    pub left_offset: i32,
    pub top_offset: i32,
    pub columns: Vec<Column>,
}

impl Picture {
    /// Creates a resized copy by nearest-neighbour sampling, preserving the
    /// offsets.
    pub fn new_size(&self, width: usize, height: usize) -> Picture {
        let mut columns = Vec::with_capacity(width);
        for x in 0..width {
            let mut column = vec![TRANSPARENT_INDEX; height];
            if self.width > 0 && self.height > 0 {
                let source = &self.columns[x * self.width / width];
                for y in 0..height {
                    column[y] = source[y * self.height / height];
                }
            }
            columns.push(column);
        }
        Picture {
            name: self.name.clone(),
            width,
            height,
            left_offset: self.left_offset,
            top_offset: self.top_offset,
            columns,
        }
    }
}

/// One building block of a composite texture: a picture placed at an offset
/// relative to the texture's upper-left corner.  The picture is absent when
/// PNAMES listed a patch the archive doesn't carry.
#[derive(Clone, Debug)]
pub struct Patch {
    pub x_offset: i32,
    pub y_offset: i32,
    pub picture: Option<Rc<Picture>>,
}

/// A named wall texture composited from one or more patches.
#[derive(Clone, Debug)]
pub struct Texture {
    pub name: String,
    /// Position in the archive's ordered texture list.
    pub index: usize,
    pub is_masked: bool,
    pub width: usize,
    pub height: usize,
    pub patches: Vec<Patch>,
    /// The patches expanded into a single picture for convenience.
    pub picture: Rc<Picture>,
}

/// Expands a patch list into the texture's composite picture.  Later patches
/// overwrite earlier ones; a negative y offset skips that many source rows;
/// columns falling outside the texture are dropped.
pub fn composite_picture(name: &str, width: usize, height: usize, patches: &[Patch]) -> Picture {
    let mut columns = vec![vec![TRANSPARENT_INDEX; height]; width];

    for patch in patches {
        let picture = match patch.picture {
            Some(ref picture) => picture,
            None => continue,
        };
        let source_top = if patch.y_offset < 0 {
            -patch.y_offset as usize
        } else {
            0
        };
        let dest_top = if patch.y_offset > 0 {
            patch.y_offset as usize
        } else {
            0
        };
        for (x, source) in picture.columns.iter().enumerate() {
            let dest_x = patch.x_offset + x as i32;
            if dest_x < 0 || dest_x >= width as i32 {
                continue;
            }
            if source_top >= source.len() || dest_top >= height {
                continue;
            }
            let run = (source.len() - source_top).min(height - dest_top);
            let dest = &mut columns[dest_x as usize];
            dest[dest_top..dest_top + run].copy_from_slice(&source[source_top..source_top + run]);
        }
    }

    Picture {
        name: name.to_owned(),
        width,
        height,
        left_offset: 0,
        top_offset: 0,
        columns,
    }
}

/// A floor or ceiling image: a raw 64x64 grid of palette indices, row-major,
/// with no offsets or dimension header.
#[derive(Clone, Debug, PartialEq)]
pub struct Flat {
    pub name: String,
    /// Position in the archive's ordered flat list.
    pub index: usize,
    pub data: Vec<u8>,
}

/// One rotation slot of a sprite frame.  Flipping mirrors the picture
/// horizontally; the format reuses one picture for two rotations that way.
#[derive(Clone, Debug, Default)]
pub struct SpriteFrameDir {
    pub picture: Option<Rc<Picture>>,
    pub is_flipped: bool,
}

/// One animation frame: eight view rotations.  An omnidirectional lump
/// (rotation digit 0) fills all eight slots with the same picture.
#[derive(Clone, Debug, Default)]
pub struct SpriteFrame {
    pub rotations: [SpriteFrameDir; 8],
}

/// A named sprite: animation frames assembled from picture lumps whose names
/// encode the frame letter and rotation digit.
#[derive(Clone, Debug)]
pub struct Sprite {
    pub name: String,
    pub frames: Vec<SpriteFrame>,
}

/// A DMX-format sound effect: unsigned 8-bit mono PCM.
#[derive(Clone, Debug, PartialEq)]
pub struct Sound {
    pub sample_rate: u32,
    pub samples: Vec<u8>,
}

/// A MUS-format music score.  The header is validated on load but the event
/// stream is left undecoded.
// TODO: decode the MUS event stream into note on/off events.
#[derive(Clone, Copy, Debug, Default)]
pub struct MusicScore;
