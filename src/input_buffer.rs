use std::fs::File;
use std::path::Path;

use memmap::{Mmap, MmapOptions};

use ::errors::{ErrorKind, Result};

/// A memory-mapped, read-only view of an archive file.
///
/// All lump access goes through `slice`, which plays the role of a checked
/// seek-and-read: an offset past the end of the file is a failed seek, and a
/// remainder shorter than the requested length is a truncated read.
pub struct InputBuffer {
    map: Mmap,
}

impl InputBuffer {
    /// Maps the file at `path` into read-only memory.
    pub fn open<P>(path: P) -> Result<InputBuffer>
    where
        P: AsRef<Path>,
    {
        let file = File::open(path)?;
        let map = unsafe { MmapOptions::new().map(&file)? };

        Ok(InputBuffer { map })
    }

    /// Gets the whole buffer of bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.map
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Gets exactly `len` bytes starting at `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        if offset > self.map.len() {
            bail!(ErrorKind::SeekFailed(offset));
        }
        if len > self.map.len() - offset {
            bail!(ErrorKind::TruncatedLump(format!(
                "{} bytes at offset {}",
                len, offset
            )));
        }
        Ok(&self.map[offset..offset + len])
    }
}
