use nom::{le_i32, le_u32};

use super::util::name8;
use ::errors::{ErrorKind, Result, nom_to_result};

pub const IWAD_MAGIC: [u8; 4] = *b"IWAD";
pub const DIRECTORY_ENTRY_SIZE: usize = 16;

#[derive(Debug)]
pub struct BareHeader {
    pub magic: [u8; 4],
    pub num_lumps: i32,
    pub info_table_ofs: i32,
}

#[derive(Clone, Debug)]
pub struct BareLumpInfo {
    pub filepos: u32,
    pub size: u32,
    pub name: String,
}

named!(wad_header<BareHeader>, do_parse!(
    magic: take!(4) >>
    num_lumps: le_i32 >>
    info_table_ofs: le_i32 >>
    (BareHeader {
        magic: [magic[0], magic[1], magic[2], magic[3]],
        num_lumps,
        info_table_ofs,
    })
));

named!(wad_entry<BareLumpInfo>, do_parse!(
    filepos: le_u32 >>
    size: le_u32 >>
    name: name8 >>
    (BareLumpInfo { filepos, size, name })
));

/// Parses and validates the 12-byte archive header.  Only IWADs are
/// accepted; patch wads fail the magic check.
pub fn parse_header(buf: &[u8]) -> Result<BareHeader> {
    let header = nom_to_result("wad header", wad_header(buf))?;
    if header.magic != IWAD_MAGIC {
        bail!(ErrorKind::BadMagic(
            String::from_utf8_lossy(&header.magic).into_owned()
        ));
    }
    if header.num_lumps < 0 || header.info_table_ofs < 0 {
        bail!(ErrorKind::BadLump(
            "wad header",
            format!(
                "negative lump count {} or directory offset {}",
                header.num_lumps, header.info_table_ofs
            )
        ));
    }
    Ok(header)
}

/// Parses the lump directory the header points at.
pub fn parse_directory(buf: &[u8], header: &BareHeader) -> Result<Vec<BareLumpInfo>> {
    let lump_count = header.num_lumps as usize;
    let offset = header.info_table_ofs as usize;
    if offset > buf.len() {
        bail!(ErrorKind::SeekFailed(offset));
    }
    if buf.len() - offset < lump_count * DIRECTORY_ENTRY_SIZE {
        bail!(ErrorKind::TruncatedLump("wad directory".to_owned()));
    }

    let mut entries = Vec::with_capacity(lump_count);
    let mut parse_from = &buf[offset..];
    for i in 0..lump_count {
        match wad_entry(parse_from) {
            Ok((leftovers, entry)) => {
                entries.push(entry);
                parse_from = leftovers;
            }
            Err(_) => bail!(ErrorKind::BadLump(
                "wad directory",
                format!("unparseable entry {}", i)
            )),
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use byteorder::{LittleEndian, WriteBytesExt};

    use super::{parse_directory, parse_header};
    use ::errors::ErrorKind;

    fn header_bytes(magic: &[u8; 4], num_lumps: i32, ofs: i32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(magic);
        buf.write_i32::<LittleEndian>(num_lumps).unwrap();
        buf.write_i32::<LittleEndian>(ofs).unwrap();
        buf
    }

    #[test]
    fn parses_an_iwad_header() {
        let buf = header_bytes(b"IWAD", 3, 12);
        let header = parse_header(&buf).unwrap();
        assert_eq!(header.num_lumps, 3);
        assert_eq!(header.info_table_ofs, 12);
    }

    #[test]
    fn rejects_a_pwad() {
        let buf = header_bytes(b"PWAD", 0, 12);
        match parse_header(&buf) {
            Err(ref e) => match *e.kind() {
                ErrorKind::BadMagic(ref magic) => assert_eq!(magic, "PWAD"),
                ref other => panic!("unexpected error: {}", other),
            },
            Ok(_) => panic!("PWAD accepted"),
        }
    }

    #[test]
    fn parses_directory_entries_in_order() {
        let mut buf = header_bytes(b"IWAD", 2, 12);
        for &(pos, size, name) in &[(100u32, 8u32, b"PLAYPAL\0"), (108, 0, b"E1M1\0\0\0\0")] {
            buf.write_u32::<LittleEndian>(pos).unwrap();
            buf.write_u32::<LittleEndian>(size).unwrap();
            buf.extend_from_slice(name);
        }

        let header = parse_header(&buf).unwrap();
        let entries = parse_directory(&buf, &header).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "PLAYPAL");
        assert_eq!(entries[0].filepos, 100);
        assert_eq!(entries[0].size, 8);
        assert_eq!(entries[1].name, "E1M1");
    }

    #[test]
    fn fails_on_a_truncated_directory() {
        let buf = header_bytes(b"IWAD", 4, 12);
        assert!(parse_directory(&buf, &parse_header(&buf).unwrap()).is_err());
    }
}
