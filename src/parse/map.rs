use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use nom::{le_i16, le_u16};

use super::util::name8;
use ::errors::{Error, ErrorKind, Result};

/// Raw level records, straight off the disk and untranslated.  Each table
/// parser eats as many whole records as the lump holds and ignores a
/// trailing partial record.

#[derive(Debug)]
pub struct BareThing {
    pub x: i16,
    pub y: i16,
    pub angle: i16,
    pub kind: i16,
    pub options: u16,
}

named!(pub things_lump<Vec<BareThing>>, many0!(complete!(do_parse!(
    x: le_i16 >>
    y: le_i16 >>
    angle: le_i16 >>
    kind: le_i16 >>
    options: le_u16 >>
    (BareThing { x, y, angle, kind, options })
))));

#[derive(Debug)]
pub struct BareLine {
    pub v1: i16,
    pub v2: i16,
    pub flags: u16,
    pub special: i16,
    pub sector_tag: i16,
    // -1 means no side
    pub side_r: i16,
    pub side_l: i16,
}

named!(pub linedefs_lump<Vec<BareLine>>, many0!(complete!(do_parse!(
    v1: le_i16 >>
    v2: le_i16 >>
    flags: le_u16 >>
    special: le_i16 >>
    sector_tag: le_i16 >>
    side_r: le_i16 >>
    side_l: le_i16 >>
    (BareLine { v1, v2, flags, special, sector_tag, side_r, side_l })
))));

#[derive(Debug)]
pub struct BareSide {
    pub x_offset: i16,
    pub y_offset: i16,
    pub upper_texture: String,
    pub lower_texture: String,
    pub middle_texture: String,
    pub sector: i16,
}

named!(pub sidedefs_lump<Vec<BareSide>>, many0!(complete!(do_parse!(
    x_offset: le_i16 >>
    y_offset: le_i16 >>
    upper_texture: name8 >>
    lower_texture: name8 >>
    middle_texture: name8 >>
    sector: le_i16 >>
    (BareSide {
        x_offset,
        y_offset,
        upper_texture,
        lower_texture,
        middle_texture,
        sector
    })
))));

#[derive(Debug)]
pub struct BareVertex {
    pub x: i16,
    pub y: i16,
}

named!(pub vertexes_lump<Vec<BareVertex>>, many0!(complete!(do_parse!(
    x: le_i16 >>
    y: le_i16 >>
    (BareVertex { x, y })
))));

#[derive(Debug)]
pub struct BareSegment {
    pub v1: i16,
    pub v2: i16,
    /// Binary angle: the full circle is -32768..32767.
    pub angle: i16,
    pub line: i16,
    /// 0 - same direction as the linedef, 1 - opposite.
    pub direction: i16,
    /// Distance along the linedef to the start of the segment.
    pub offset: i16,
}

named!(pub segs_lump<Vec<BareSegment>>, many0!(complete!(do_parse!(
    v1: le_i16 >>
    v2: le_i16 >>
    angle: le_i16 >>
    line: le_i16 >>
    direction: le_i16 >>
    offset: le_i16 >>
    (BareSegment { v1, v2, angle, line, direction, offset })
))));

#[derive(Debug)]
pub struct BareSubsector {
    pub num_segments: i16,
    pub start_segment: i16,
}

named!(pub ssectors_lump<Vec<BareSubsector>>, many0!(complete!(do_parse!(
    num_segments: le_i16 >>
    start_segment: le_i16 >>
    (BareSubsector { num_segments, start_segment })
))));

#[derive(Debug)]
pub struct BareBBox {
    pub top: i16,
    pub bottom: i16,
    pub left: i16,
    pub right: i16,
}

named!(bare_bbox<BareBBox>, do_parse!(
    top: le_i16 >>
    bottom: le_i16 >>
    left: le_i16 >>
    right: le_i16 >>
    (BareBBox { top, bottom, left, right })
));

#[derive(Debug)]
pub struct BareNode {
    pub x: i16,
    pub y: i16,
    pub dx: i16,
    pub dy: i16,
    pub bbox_r: BareBBox,
    pub bbox_l: BareBBox,
    /// Sign bit set: subsector index (masked by 0x7FFF); clear: node index.
    pub child_r: i16,
    pub child_l: i16,
}

named!(pub nodes_lump<Vec<BareNode>>, many0!(complete!(do_parse!(
    x: le_i16 >>
    y: le_i16 >>
    dx: le_i16 >>
    dy: le_i16 >>
    bbox_r: bare_bbox >>
    bbox_l: bare_bbox >>
    child_r: le_i16 >>
    child_l: le_i16 >>
    (BareNode { x, y, dx, dy, bbox_r, bbox_l, child_r, child_l })
))));

#[derive(Debug)]
pub struct BareSector {
    pub floor_height: i16,
    pub ceiling_height: i16,
    pub floor_flat: String,
    pub ceiling_flat: String,
    pub light_level: i16,
    pub kind: i16,
    pub tag: i16,
}

named!(pub sectors_lump<Vec<BareSector>>, many0!(complete!(do_parse!(
    floor_height: le_i16 >>
    ceiling_height: le_i16 >>
    floor_flat: name8 >>
    ceiling_flat: name8 >>
    light_level: le_i16 >>
    kind: le_i16 >>
    tag: le_i16 >>
    (BareSector {
        floor_height,
        ceiling_height,
        floor_flat,
        ceiling_flat,
        light_level,
        kind,
        tag,
    })
))));

/// Blockmap lump, decoded but with its line lists still as raw indices.
#[derive(Debug)]
pub struct BareBlockMap {
    pub origin_x: i16,
    pub origin_y: i16,
    pub columns: i16,
    pub rows: i16,
    pub block_line_nums: Vec<Vec<usize>>,
}

const BLOCKMAP_HEADER_WORDS: usize = 4;

/// Decodes the blockmap: the 8-byte header, one offset per block (in u16
/// units from the lump start), and at each offset a line list opened by a
/// 0x0000 sentinel and closed by 0xFFFF.
pub fn parse_blockmap(buf: &[u8]) -> Result<BareBlockMap> {
    let mut cursor = Cursor::new(buf);
    if buf.len() < 2 * BLOCKMAP_HEADER_WORDS {
        bail!(ErrorKind::BadLump(
            "BLOCKMAP",
            "lump shorter than the header".to_owned()
        ));
    }
    let origin_x = cursor.read_i16::<LittleEndian>()?;
    let origin_y = cursor.read_i16::<LittleEndian>()?;
    let columns = cursor.read_i16::<LittleEndian>()?;
    let rows = cursor.read_i16::<LittleEndian>()?;
    if columns < 0 || rows < 0 {
        bail!(ErrorKind::BadLump(
            "BLOCKMAP",
            format!("negative grid {}x{}", columns, rows)
        ));
    }

    let num_blocks = columns as usize * rows as usize;
    if buf.len() - 2 * BLOCKMAP_HEADER_WORDS < 2 * num_blocks {
        bail!(ErrorKind::BadLump(
            "BLOCKMAP",
            format!("offset table needs {} blocks", num_blocks)
        ));
    }
    let mut offsets = Vec::with_capacity(num_blocks);
    for _ in 0..num_blocks {
        offsets.push(cursor.read_i16::<LittleEndian>()?);
    }

    let mut block_line_nums = Vec::with_capacity(num_blocks);
    for (i, &offset) in offsets.iter().enumerate() {
        if offset < BLOCKMAP_HEADER_WORDS as i16 || 2 * (offset as usize) >= buf.len() {
            bail!(ErrorKind::BadLump(
                "BLOCKMAP",
                format!("block {} offset {} outside the lump", i, offset)
            ));
        }
        block_line_nums.push(read_block_list(buf, 2 * offset as usize)?);
    }

    Ok(BareBlockMap {
        origin_x,
        origin_y,
        columns,
        rows,
        block_line_nums,
    })
}

fn read_block_list(buf: &[u8], pos: usize) -> Result<Vec<usize>> {
    let mut cursor = Cursor::new(buf);
    cursor.set_position(pos as u64);
    let overrun =
        || Error::from(ErrorKind::BadLump("BLOCKMAP", "block list runs past the lump".to_owned()));

    let mut line_nums = Vec::new();
    let mut leading = true;
    loop {
        let word = cursor.read_u16::<LittleEndian>().map_err(|_| overrun())?;
        if word == 0xFFFF {
            return Ok(line_nums);
        }
        // The first word is an always-zero sentinel; line 0 is legal
        // anywhere after it.
        if leading && word == 0 {
            leading = false;
            continue;
        }
        leading = false;
        line_nums.push(word as usize);
    }
}

#[cfg(test)]
mod tests {
    use byteorder::{LittleEndian, WriteBytesExt};

    use super::*;

    #[test]
    fn parses_whole_thing_records_and_drops_a_partial_tail() {
        let mut buf = Vec::new();
        for &(x, y, angle, kind, options) in &[(32i16, -64i16, 90i16, 1i16, 7u16)] {
            buf.write_i16::<LittleEndian>(x).unwrap();
            buf.write_i16::<LittleEndian>(y).unwrap();
            buf.write_i16::<LittleEndian>(angle).unwrap();
            buf.write_i16::<LittleEndian>(kind).unwrap();
            buf.write_u16::<LittleEndian>(options).unwrap();
        }
        buf.extend_from_slice(&[1, 2, 3]);

        let (_, things) = things_lump(&buf).unwrap();
        assert_eq!(things.len(), 1);
        assert_eq!(things[0].x, 32);
        assert_eq!(things[0].y, -64);
        assert_eq!(things[0].options, 7);
    }

    #[test]
    fn parses_linedefs() {
        let mut buf = Vec::new();
        for &word in &[0i16, 1, 4, 0, 9, 0, -1] {
            buf.write_i16::<LittleEndian>(word).unwrap();
        }

        let (_, lines) = linedefs_lump(&buf).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].v1, 0);
        assert_eq!(lines[0].v2, 1);
        assert_eq!(lines[0].flags, 4);
        assert_eq!(lines[0].sector_tag, 9);
        assert_eq!(lines[0].side_r, 0);
        assert_eq!(lines[0].side_l, -1);
    }

    #[test]
    fn parses_sidedefs_with_upper_lower_middle_order() {
        let mut buf = Vec::new();
        buf.write_i16::<LittleEndian>(16).unwrap();
        buf.write_i16::<LittleEndian>(-8).unwrap();
        buf.extend_from_slice(b"UPPER\0\0\0");
        buf.extend_from_slice(b"LOWER\0\0\0");
        buf.extend_from_slice(b"-\0\0\0\0\0\0\0");
        buf.write_i16::<LittleEndian>(3).unwrap();

        let (_, sides) = sidedefs_lump(&buf).unwrap();
        assert_eq!(sides[0].x_offset, 16);
        assert_eq!(sides[0].y_offset, -8);
        assert_eq!(sides[0].upper_texture, "UPPER");
        assert_eq!(sides[0].lower_texture, "LOWER");
        assert_eq!(sides[0].middle_texture, "-");
        assert_eq!(sides[0].sector, 3);
    }

    #[test]
    fn parses_nodes_with_both_bounding_boxes() {
        let mut buf = Vec::new();
        for &word in &[
            64i16, 0, 0, 128, // split line
            128, 0, 0, 64, // right bbox: top, bottom, left, right
            128, 0, 64, 128, // left bbox
            -32768, 0, // children: subsector 0, node 0
        ] {
            buf.write_i16::<LittleEndian>(word).unwrap();
        }

        let (_, nodes) = nodes_lump(&buf).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].dy, 128);
        assert_eq!(nodes[0].bbox_r.top, 128);
        assert_eq!(nodes[0].bbox_l.left, 64);
        assert_eq!(nodes[0].child_r, -32768);
        assert_eq!(nodes[0].child_l, 0);
    }

    #[test]
    fn decodes_a_blockmap() {
        // 2x1 grid; block 0 holds lines 3 and 0, block 1 is empty.
        let mut buf = Vec::new();
        for &word in &[-16i16, -32, 2, 1] {
            buf.write_i16::<LittleEndian>(word).unwrap();
        }
        buf.write_i16::<LittleEndian>(6).unwrap(); // block 0 at word 6
        buf.write_i16::<LittleEndian>(10).unwrap(); // block 1 at word 10
        for &word in &[0u16, 3, 0, 0xFFFF, 0, 0xFFFF] {
            buf.write_u16::<LittleEndian>(word).unwrap();
        }

        let blockmap = parse_blockmap(&buf).unwrap();
        assert_eq!(blockmap.origin_x, -16);
        assert_eq!(blockmap.origin_y, -32);
        assert_eq!(blockmap.columns, 2);
        assert_eq!(blockmap.rows, 1);
        assert_eq!(blockmap.block_line_nums, vec![vec![3, 0], vec![]]);
    }

    #[test]
    fn rejects_a_blockmap_offset_inside_the_header() {
        let mut buf = Vec::new();
        for &word in &[0i16, 0, 1, 1] {
            buf.write_i16::<LittleEndian>(word).unwrap();
        }
        buf.write_i16::<LittleEndian>(2).unwrap();
        assert!(parse_blockmap(&buf).is_err());
    }

    #[test]
    fn rejects_an_unterminated_block_list() {
        let mut buf = Vec::new();
        for &word in &[0i16, 0, 1, 1] {
            buf.write_i16::<LittleEndian>(word).unwrap();
        }
        buf.write_i16::<LittleEndian>(5).unwrap();
        buf.write_u16::<LittleEndian>(0).unwrap();
        assert!(parse_blockmap(&buf).is_err());
    }
}
