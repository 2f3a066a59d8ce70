use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use ::errors::{Error, ErrorKind, Result};
use ::graphics::{Picture, TRANSPARENT_INDEX};

const HEADER_SIZE: usize = 8;

/// Decodes a picture lump: the i16 header, one u32 offset per column, and a
/// post stream per offset, expanded into transparent-initialised columns.
pub fn parse_picture(name: &str, buf: &[u8]) -> Result<Picture> {
    if buf.len() < HEADER_SIZE {
        bail!(ErrorKind::BadLump(
            "picture",
            format!("{} shorter than the picture header", name)
        ));
    }
    let mut cursor = Cursor::new(buf);
    let width = cursor.read_i16::<LittleEndian>()?;
    let height = cursor.read_i16::<LittleEndian>()?;
    let left_offset = cursor.read_i16::<LittleEndian>()?;
    let top_offset = cursor.read_i16::<LittleEndian>()?;
    if width < 0 || height < 0 {
        bail!(ErrorKind::BadLump(
            "picture",
            format!("{} has negative dimensions {}x{}", name, width, height)
        ));
    }
    let width = width as usize;
    let height = height as usize;

    if buf.len() - HEADER_SIZE < width * 4 {
        bail!(ErrorKind::BadLump(
            "picture",
            format!("{} too short for {} column offsets", name, width)
        ));
    }
    let mut offsets = Vec::with_capacity(width);
    for _ in 0..width {
        offsets.push(cursor.read_u32::<LittleEndian>()? as usize);
    }

    let mut columns = vec![vec![TRANSPARENT_INDEX; height]; width];
    for (column, &offset) in columns.iter_mut().zip(offsets.iter()) {
        expand_posts(name, buf, offset, column)?;
    }

    Ok(Picture {
        name: name.to_owned(),
        width,
        height,
        left_offset: left_offset as i32,
        top_offset: top_offset as i32,
        columns,
    })
}

/// Expands one column's post stream.  Each post is a vertical run of opaque
/// pixels: top row delta, pixel count, a pad byte, the pixels, and another
/// pad byte; 0xFF in the delta slot ends the column.  Rows beyond the
/// column height are clipped.
fn expand_posts(name: &str, buf: &[u8], mut pos: usize, column: &mut [u8]) -> Result<()> {
    loop {
        let top_delta = *buf.get(pos).ok_or_else(|| overrun(name))? as usize;
        pos += 1;
        if top_delta == 0xFF {
            return Ok(());
        }
        let pixel_count = *buf.get(pos).ok_or_else(|| overrun(name))? as usize;
        pos += 2;
        let pixels = buf.get(pos..pos + pixel_count).ok_or_else(|| overrun(name))?;
        pos += pixel_count + 1;
        for (i, &pixel) in pixels.iter().enumerate() {
            let row = top_delta + i;
            if row < column.len() {
                column[row] = pixel;
            }
        }
    }
}

fn overrun(name: &str) -> Error {
    ErrorKind::BadLump("picture", format!("post stream overruns the lump in {}", name)).into()
}

#[cfg(test)]
mod tests {
    use byteorder::{LittleEndian, WriteBytesExt};

    use super::parse_picture;
    use ::graphics::TRANSPARENT_INDEX;

    /// Builds a picture lump from (top_delta, pixels) posts per column.
    fn picture_bytes(
        width: i16,
        height: i16,
        offsets_of: &[Vec<(u8, Vec<u8>)>],
    ) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_i16::<LittleEndian>(width).unwrap();
        buf.write_i16::<LittleEndian>(height).unwrap();
        buf.write_i16::<LittleEndian>(-3).unwrap();
        buf.write_i16::<LittleEndian>(7).unwrap();

        let mut bodies = Vec::new();
        let mut body_pos = 8 + 4 * width as usize;
        for posts in offsets_of {
            let mut body = Vec::new();
            for &(top_delta, ref pixels) in posts {
                body.push(top_delta);
                body.push(pixels.len() as u8);
                body.push(0);
                body.extend_from_slice(pixels);
                body.push(0);
            }
            body.push(0xFF);
            buf.write_u32::<LittleEndian>(body_pos as u32).unwrap();
            body_pos += body.len();
            bodies.push(body);
        }
        for body in bodies {
            buf.extend_from_slice(&body);
        }
        buf
    }

    #[test]
    fn expands_posts_into_columns() {
        let buf = picture_bytes(
            2,
            4,
            &[
                vec![(0, vec![1, 2]), (3, vec![9])],
                vec![(1, vec![5])],
            ],
        );

        let picture = parse_picture("TEST", &buf).unwrap();
        assert_eq!(picture.width, 2);
        assert_eq!(picture.height, 4);
        assert_eq!(picture.left_offset, -3);
        assert_eq!(picture.top_offset, 7);
        assert_eq!(picture.columns.len(), 2);
        assert_eq!(picture.columns[0], vec![1, 2, TRANSPARENT_INDEX, 9]);
        assert_eq!(
            picture.columns[1],
            vec![TRANSPARENT_INDEX, 5, TRANSPARENT_INDEX, TRANSPARENT_INDEX]
        );
    }

    #[test]
    fn clips_a_post_that_runs_past_the_column() {
        let buf = picture_bytes(1, 2, &[vec![(1, vec![8, 8, 8])]]);
        let picture = parse_picture("TALL", &buf).unwrap();
        assert_eq!(picture.columns[0], vec![TRANSPARENT_INDEX, 8]);
    }

    #[test]
    fn every_column_has_exactly_height_rows() {
        let buf = picture_bytes(3, 5, &[vec![], vec![(0, vec![1])], vec![]]);
        let picture = parse_picture("EMPTYISH", &buf).unwrap();
        assert!(picture.columns.iter().all(|column| column.len() == 5));
    }

    #[test]
    fn fails_on_a_column_offset_outside_the_lump() {
        let mut buf = picture_bytes(1, 2, &[vec![]]);
        // Point the single column offset past the end of the lump.
        let bogus = (buf.len() + 100) as u32;
        buf[8..12].copy_from_slice(&[
            bogus as u8,
            (bogus >> 8) as u8,
            (bogus >> 16) as u8,
            (bogus >> 24) as u8,
        ]);
        assert!(parse_picture("BROKEN", &buf).is_err());
    }

    #[test]
    fn fails_on_negative_dimensions() {
        let mut buf = Vec::new();
        buf.write_i16::<LittleEndian>(-1).unwrap();
        buf.write_i16::<LittleEndian>(4).unwrap();
        buf.write_i16::<LittleEndian>(0).unwrap();
        buf.write_i16::<LittleEndian>(0).unwrap();
        assert!(parse_picture("NEGATIVE", &buf).is_err());
    }
}
