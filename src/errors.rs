use std::io;

use nom;

error_chain! {
    foreign_links {
        Io(io::Error);
    }

    errors {
        BadMagic(magic: String) {
            description("archive magic is not IWAD")
            display("bad magic: {:?}", magic)
        }
        LumpNotFound(name: String) {
            description("lump not found")
            display("lump not found: {}", name)
        }
        TruncatedLump(whence: String) {
            description("lump data shorter than the directory advertises")
            display("truncated lump while reading {}", whence)
        }
        SeekFailed(offset: usize) {
            description("seek landed outside the archive")
            display("seek to offset {} failed", offset)
        }
        BadLump(whence: &'static str, reason: String) {
            description("structural inconsistency inside a lump")
            display("bad {} lump: {}", whence, reason)
        }
    }
}

/// Adapt a nom parse result to the crate-wide `Result`, charging failures to
/// the named lump.
pub fn nom_to_result<O>(whence: &'static str, result: nom::IResult<&[u8], O>) -> Result<O> {
    match result {
        Ok((_leftovers, value)) => Ok(value),
        Err(nom::Err::Incomplete(_)) => Err(ErrorKind::TruncatedLump(whence.to_owned()).into()),
        Err(_) => Err(ErrorKind::BadLump(whence, "unparseable data".to_owned()).into()),
    }
}
