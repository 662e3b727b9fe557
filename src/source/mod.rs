use std::{
    fmt,
    fs::{self, File},
    io::{self, Cursor, Read, Seek, SeekFrom, Take},
    path::Path,
};

use flate2::read::MultiGzDecoder;

use crate::{log, Error, Result, GZIP_MAGIC, GZIP_TRAILER_SIZE_LEN};

// 10 byte header, empty deflate block, 8 byte trailer.
const GZIP_MIN_LEN: u64 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Regular,
    /// FIFO or character device: no seeking, no trustworthy size.
    Stream,
    Directory,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceKind::Regular => "regular file",
            SourceKind::Stream => "stream",
            SourceKind::Directory => "directory",
        };
        f.write_str(s)
    }
}

pub fn classify(path: &Path) -> Result<SourceKind> {
    let meta = fs::metadata(path).map_err(|e| Error::filesystem(path, e))?;
    let file_type = meta.file_type();
    let kind = if file_type.is_dir() {
        SourceKind::Directory
    } else if is_stream(&file_type) {
        SourceKind::Stream
    } else {
        SourceKind::Regular
    };
    Ok(kind)
}

#[cfg(unix)]
fn is_stream(file_type: &fs::FileType) -> bool {
    use std::os::unix::fs::FileTypeExt;
    file_type.is_fifo() || file_type.is_char_device()
}

#[cfg(not(unix))]
fn is_stream(_file_type: &fs::FileType) -> bool {
    false
}

/// One input of a pending entry. Dropping a source closes its handle.
pub enum ByteSource {
    /// Plain file, capped at the length it had when it was added.
    File(Take<File>),
    /// Fully buffered stream content.
    Memory(Cursor<Vec<u8>>),
    /// Gzip file decompressed on read.
    Gzip(MultiGzDecoder<File>),
}

impl ByteSource {
    pub fn variant_name(&self) -> &'static str {
        match self {
            ByteSource::File(_) => "file",
            ByteSource::Memory(_) => "memory",
            ByteSource::Gzip(_) => "gzip",
        }
    }
}

impl fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ByteSource").field(&self.variant_name()).finish()
    }
}

impl Read for ByteSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ByteSource::File(f) => f.read(buf),
            ByteSource::Memory(m) => m.read(buf),
            ByteSource::Gzip(z) => z.read(buf),
        }
    }
}

/// Reads the uncompressed size from the trailer of a gzip container.
///
/// Gzip only records the size modulo 2^32, so payloads of 4 GiB or more
/// come back wrong. With `reset` the stream position is restored afterwards.
pub fn gzip_size<R: Read + Seek>(f: &mut R, reset: bool) -> io::Result<u64> {
    let old_pos = if reset {
        Some(f.stream_position()?)
    } else {
        None
    };
    f.seek(SeekFrom::End(-GZIP_TRAILER_SIZE_LEN))?;
    let mut isize_le = [0u8; GZIP_TRAILER_SIZE_LEN as usize];
    f.read_exact(&mut isize_le)?;
    if let Some(pos) = old_pos {
        f.seek(SeekFrom::Start(pos))?;
    }
    Ok(u64::from(u32::from_le_bytes(isize_le)))
}

/// Opens a regular file for lazy reading and reports its current length.
pub fn open_plain(path: &Path) -> Result<(ByteSource, u64)> {
    let file = File::open(path).map_err(|e| Error::filesystem(path, e))?;
    let len = file
        .metadata()
        .map_err(|e| Error::filesystem(path, e))?
        .len();
    log!("{}: {}, {} bytes", path.display(), SourceKind::Regular, len);
    Ok((ByteSource::File(file.take(len)), len))
}

/// Opens a seekable gzip file, sizing it from its trailer without inflating.
pub fn open_gzip(path: &Path) -> Result<(ByteSource, u64)> {
    let mut file = File::open(path).map_err(|e| Error::filesystem(path, e))?;
    let file_len = file
        .metadata()
        .map_err(|e| Error::filesystem(path, e))?
        .len();
    if file_len < GZIP_MIN_LEN {
        return Err(Error::format(
            path,
            format!("{file_len} bytes is too short for a gzip file"),
        ));
    }

    let mut magic = [0u8; 2];
    file.read_exact(&mut magic)
        .map_err(|e| Error::filesystem(path, e))?;
    if magic != GZIP_MAGIC {
        return Err(Error::format(path, "not in gzip format"));
    }
    file.rewind().map_err(|e| Error::filesystem(path, e))?;

    let len = gzip_size(&mut file, true).map_err(|e| match e.kind() {
        io::ErrorKind::InvalidInput | io::ErrorKind::UnexpectedEof => {
            Error::format(path, format!("unreadable gzip trailer: {e}"))
        }
        _ => Error::filesystem(path, e),
    })?;
    log!(
        "{}: gzip {}, {} bytes uncompressed",
        path.display(),
        SourceKind::Regular,
        len
    );
    Ok((ByteSource::Gzip(MultiGzDecoder::new(file)), len))
}

/// Drains a stream-type input into memory, optionally decompressing it.
pub fn buffer_stream(path: &Path, decompress: bool) -> Result<(ByteSource, u64)> {
    let raw = fs::read(path).map_err(|e| Error::filesystem(path, e))?;
    let data = if decompress {
        let mut inflated = Vec::new();
        MultiGzDecoder::new(&raw[..])
            .read_to_end(&mut inflated)
            .map_err(|e| Error::format(path, format!("cannot decompress: {e}")))?;
        inflated
    } else {
        raw
    };
    let len = data.len() as u64;
    log!("{}: buffered {}, {} bytes", path.display(), SourceKind::Stream, len);
    Ok((ByteSource::Memory(Cursor::new(data)), len))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::{write::GzEncoder, Compression};

    use super::*;

    fn gzip(payload: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(payload).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn classify_regular_and_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.log");
        fs::write(&file, b"hello").unwrap();

        assert_eq!(classify(&file).unwrap(), SourceKind::Regular);
        assert_eq!(classify(dir.path()).unwrap(), SourceKind::Directory);
    }

    #[cfg(unix)]
    #[test]
    fn classify_char_device_as_stream() {
        assert_eq!(classify(Path::new("/dev/null")).unwrap(), SourceKind::Stream);
    }

    #[test]
    fn kinds_read_naturally_in_log_lines() {
        assert_eq!(SourceKind::Regular.to_string(), "regular file");
        assert_eq!(SourceKind::Stream.to_string(), "stream");
        assert_eq!(SourceKind::Directory.to_string(), "directory");
    }

    #[test]
    fn classify_missing_path_is_filesystem_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = classify(&dir.path().join("nope")).unwrap_err();
        match err {
            Error::Filesystem { source, .. } => {
                assert_eq!(source.kind(), io::ErrorKind::NotFound)
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn gzip_size_reads_trailer_and_restores_position() {
        let payload = vec![b'x'; 12_345];
        let mut c = Cursor::new(gzip(&payload));
        c.seek(SeekFrom::Start(3)).unwrap();

        assert_eq!(gzip_size(&mut c, true).unwrap(), 12_345);
        assert_eq!(c.position(), 3);
    }

    #[test]
    fn gzip_size_without_reset_leaves_position_at_end() {
        let data = gzip(b"twenty bytes payload");
        let end = data.len() as u64;
        let mut c = Cursor::new(data);

        assert_eq!(gzip_size(&mut c, false).unwrap(), 20);
        assert_eq!(c.position(), end);
    }

    #[test]
    fn gzip_size_reports_low_32_bits_only() {
        // Trailer of a hypothetical 4 GiB + 7 byte payload.
        let mut data = vec![0u8; 16];
        data.extend_from_slice(&7u32.to_le_bytes());
        assert_eq!(gzip_size(&mut Cursor::new(data), true).unwrap(), 7);
    }

    #[test]
    fn gzip_size_fails_on_short_input() {
        let err = gzip_size(&mut Cursor::new(vec![1u8, 2]), true).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn open_plain_caps_at_length_seen_when_added() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("growing.log");
        fs::write(&path, b"0123456789").unwrap();

        let (mut src, len) = open_plain(&path).unwrap();
        fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"late")
            .unwrap();

        let mut out = Vec::new();
        src.read_to_end(&mut out).unwrap();
        assert_eq!(len, 10);
        assert_eq!(out, b"0123456789");
    }

    #[test]
    fn open_gzip_sizes_without_inflating_and_decodes_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.log.gz");
        fs::write(&path, gzip(b"compressed log line\n")).unwrap();

        let (mut src, len) = open_gzip(&path).unwrap();
        assert_eq!(len, 20);
        assert_eq!(src.variant_name(), "gzip");

        let mut out = Vec::new();
        src.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"compressed log line\n");
    }

    #[test]
    fn open_gzip_rejects_plain_and_truncated_files() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain.gz");
        fs::write(&plain, b"this is definitely not gzip data").unwrap();
        let short = dir.path().join("short.gz");
        fs::write(&short, [0x1f, 0x8b, 8]).unwrap();

        assert!(matches!(open_gzip(&plain), Err(Error::Format { .. })));
        assert!(matches!(open_gzip(&short), Err(Error::Format { .. })));
    }

    #[test]
    fn buffer_stream_decompresses_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.gz");
        fs::write(&path, gzip(b"abcdef")).unwrap();

        let (mut src, len) = buffer_stream(&path, true).unwrap();
        let mut out = Vec::new();
        src.read_to_end(&mut out).unwrap();
        assert_eq!(len, 6);
        assert_eq!(out, b"abcdef");
        assert_eq!(src.variant_name(), "memory");

        let (_, raw_len) = buffer_stream(&path, false).unwrap();
        assert_eq!(raw_len, fs::metadata(&path).unwrap().len());
    }

    #[cfg(unix)]
    #[test]
    fn buffer_stream_of_dev_null_is_empty() {
        let (_, len) = buffer_stream(Path::new("/dev/null"), false).unwrap();
        assert_eq!(len, 0);
    }
}
