//! Content reader (spec §4.4): stream / mmap / auto, with a hard size
//! ceiling and binary-safe truncation.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use safnari_core::ContentReadMode;

const ABSOLUTE_MAX_SIZE: u64 = 10 * 1024 * 1024;
const DEFAULT_CHUNK_SIZE: usize = 262_144;
const DEFAULT_OVERLAP: usize = 512;
const DEFAULT_MMAP_MIN_SIZE: u64 = 131_072;

#[derive(Debug, Clone, Copy)]
pub struct ReaderParams {
    pub max_size: u64,
    pub mode: ContentReadMode,
    pub mmap_min_size: u64,
    pub chunk_size: usize,
    pub overlap: usize,
}

impl ReaderParams {
    pub fn normalized(mut self) -> Self {
        if self.max_size == 0 || self.max_size > ABSOLUTE_MAX_SIZE {
            self.max_size = ABSOLUTE_MAX_SIZE;
        }
        if self.chunk_size == 0 {
            self.chunk_size = DEFAULT_CHUNK_SIZE;
        }
        if self.overlap == 0 {
            self.overlap = DEFAULT_OVERLAP;
        }
        if self.mmap_min_size == 0 {
            self.mmap_min_size = DEFAULT_MMAP_MIN_SIZE;
        }
        self
    }
}

/// Reads up to `params.max_size` bytes from `path`. The returned bytes are
/// always a binary-safe prefix of the file; never longer than the clamp.
pub fn read_content(path: &Path, params: ReaderParams) -> std::io::Result<Vec<u8>> {
    let params = params.normalized();
    match params.mode {
        ContentReadMode::Stream => read_stream(path, params.max_size),
        ContentReadMode::Mmap => read_mmap(path, params.max_size),
        ContentReadMode::Auto => {
            let size = std::fs::metadata(path)?.len();
            if size >= params.mmap_min_size {
                read_mmap(path, params.max_size).or_else(|_| read_stream(path, params.max_size))
            } else {
                read_stream(path, params.max_size)
            }
        }
    }
}

fn read_stream(path: &Path, max_size: u64) -> std::io::Result<Vec<u8>> {
    let size = std::fs::metadata(path)?.len();
    if size > max_size {
        return Ok(Vec::new());
    }
    let mut file = File::open(path)?;
    let mut buf = Vec::with_capacity(size.min(max_size) as usize);
    file.take(max_size).read_to_end(&mut buf)?;
    Ok(buf)
}

fn read_mmap(path: &Path, max_size: u64) -> std::io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let size = file.metadata()?.len();
    if size > max_size {
        return Ok(Vec::new());
    }
    if size == 0 {
        return Ok(Vec::new());
    }
    let mmap = unsafe { memmap2::Mmap::map(&file)? };
    let take = (size.min(max_size)) as usize;
    Ok(mmap[..take].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn params(mode: ContentReadMode) -> ReaderParams {
        ReaderParams {
            max_size: 1024,
            mode,
            mmap_min_size: 0,
            chunk_size: 0,
            overlap: 0,
        }
        .normalized()
    }

    #[test]
    fn stream_reads_within_limit() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"hello world").unwrap();
        let bytes = read_content(f.path(), params(ContentReadMode::Stream)).unwrap();
        assert_eq!(bytes, b"hello world");
    }

    #[test]
    fn stream_short_circuits_oversized_file() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(&vec![b'a'; 2000]).unwrap();
        let bytes = read_content(f.path(), params(ContentReadMode::Stream)).unwrap();
        assert!(bytes.is_empty());
    }

    #[test]
    fn mmap_matches_stream_for_same_file() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"mmap me please").unwrap();
        let streamed = read_content(f.path(), params(ContentReadMode::Stream)).unwrap();
        let mapped = read_content(f.path(), params(ContentReadMode::Mmap)).unwrap();
        assert_eq!(streamed, mapped);
    }

    #[test]
    fn auto_falls_back_to_stream_for_small_files() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"small").unwrap();
        let bytes = read_content(f.path(), params(ContentReadMode::Auto)).unwrap();
        assert_eq!(bytes, b"small");
    }
}
