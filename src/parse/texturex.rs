use nom::{le_i16, le_i32, le_u32};

use super::util::name8;
use ::errors::{ErrorKind, Result, nom_to_result};

/// Patch record inside a texture definition: placement plus an index into
/// the PNAMES table.  The step-direction and colormap words are dead weight
/// the game never reads.
#[derive(Debug)]
pub struct BarePatch {
    pub x_offset: i16,
    pub y_offset: i16,
    pub patch_name_idx: i16,
}

#[derive(Debug)]
pub struct BareTexture {
    pub name: String,
    pub masked: i32,
    pub width: i16,
    pub height: i16,
    pub patches: Vec<BarePatch>,
}

named!(pnames_lump<Vec<String>>, do_parse!(
    count: le_u32 >>
    names: count!(name8, count as usize) >>
    (names)
));

/// Parses the PNAMES lump: a count followed by that many patch lump names.
pub fn parse_pnames(buf: &[u8]) -> Result<Vec<String>> {
    nom_to_result("PNAMES", pnames_lump(buf))
}

named!(texture_offsets<Vec<i32>>, do_parse!(
    num_textures: le_u32 >>
    offsets: count!(le_i32, num_textures as usize) >>
    (offsets)
));

named!(bare_patch<BarePatch>, do_parse!(
    x_offset: le_i16 >>
    y_offset: le_i16 >>
    patch_name_idx: le_i16 >>
    le_i16 >>  // step direction, unused
    le_i16 >>  // colormap, unused
    (BarePatch { x_offset, y_offset, patch_name_idx })
));

named!(bare_texture<BareTexture>, do_parse!(
    name: name8 >>
    masked: le_i32 >>
    width: le_i16 >>
    height: le_i16 >>
    le_i32 >>  // column directory, unused
    num_patches: le_i16 >>
    patches: count!(bare_patch, num_patches as usize) >>
    (BareTexture { name, masked, width, height, patches })
));

/// Parses a TEXTUREx lump: a count, that many offsets from the lump start,
/// and a texture definition at each offset.
pub fn parse_texturex(buf: &[u8]) -> Result<Vec<BareTexture>> {
    let offsets = nom_to_result("TEXTUREx header", texture_offsets(buf))?;
    let mut textures = Vec::with_capacity(offsets.len());
    for (i, &offset) in offsets.iter().enumerate() {
        if offset < 0 || offset as usize >= buf.len() {
            bail!(ErrorKind::BadLump(
                "TEXTUREx",
                format!("texture {} at offset {} outside the lump", i, offset)
            ));
        }
        textures.push(nom_to_result(
            "TEXTUREx entry",
            bare_texture(&buf[offset as usize..]),
        )?);
    }
    Ok(textures)
}

#[cfg(test)]
mod tests {
    use byteorder::{LittleEndian, WriteBytesExt};

    use super::{parse_pnames, parse_texturex};

    fn name_bytes(name: &str) -> [u8; 8] {
        let mut bytes = [0; 8];
        bytes[..name.len()].copy_from_slice(name.as_bytes());
        bytes
    }

    #[test]
    fn parses_pnames() {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(2).unwrap();
        buf.extend_from_slice(&name_bytes("DOOR2_1"));
        buf.extend_from_slice(&name_bytes("w94_1"));

        let names = parse_pnames(&buf).unwrap();
        assert_eq!(names, vec!["DOOR2_1".to_owned(), "W94_1".to_owned()]);
    }

    #[test]
    fn parses_a_texture_with_its_patches() {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(1).unwrap();
        buf.write_i32::<LittleEndian>(8).unwrap();
        // Texture definition at offset 8.
        buf.extend_from_slice(&name_bytes("BIGDOOR1"));
        buf.write_i32::<LittleEndian>(0).unwrap(); // masked
        buf.write_i16::<LittleEndian>(128).unwrap();
        buf.write_i16::<LittleEndian>(96).unwrap();
        buf.write_i32::<LittleEndian>(0).unwrap(); // column directory
        buf.write_i16::<LittleEndian>(2).unwrap();
        for &(x, y, idx) in &[(0i16, 0i16, 0i16), (64, -4, 1)] {
            buf.write_i16::<LittleEndian>(x).unwrap();
            buf.write_i16::<LittleEndian>(y).unwrap();
            buf.write_i16::<LittleEndian>(idx).unwrap();
            buf.write_i16::<LittleEndian>(0).unwrap();
            buf.write_i16::<LittleEndian>(0).unwrap();
        }

        let textures = parse_texturex(&buf).unwrap();
        assert_eq!(textures.len(), 1);
        let texture = &textures[0];
        assert_eq!(texture.name, "BIGDOOR1");
        assert_eq!(texture.width, 128);
        assert_eq!(texture.height, 96);
        assert_eq!(texture.patches.len(), 2);
        assert_eq!(texture.patches[1].x_offset, 64);
        assert_eq!(texture.patches[1].y_offset, -4);
        assert_eq!(texture.patches[1].patch_name_idx, 1);
    }

    #[test]
    fn rejects_an_offset_outside_the_lump() {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(1).unwrap();
        buf.write_i32::<LittleEndian>(-20).unwrap();
        assert!(parse_texturex(&buf).is_err());

        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(1).unwrap();
        buf.write_i32::<LittleEndian>(4096).unwrap();
        assert!(parse_texturex(&buf).is_err());
    }
}
