use std::{
    fs,
    io::{self, Read, Write},
    path::{Component, Path, PathBuf},
};

use tar::{Builder, EntryType, Header};

use crate::log;

/// Destination of finished entries.
pub trait ArchiveEmitter {
    /// Archives `path` (recursively, for a directory) under `name`, taking
    /// all metadata from the filesystem.
    fn add_path(&mut self, path: &Path, name: &Path) -> io::Result<()>;

    /// Writes a regular-file entry of exactly `size` bytes taken from
    /// `content`, with mode, ownership and times copied from `template`.
    fn add_stream(
        &mut self,
        name: &Path,
        size: u64,
        template: &Path,
        content: &mut dyn Read,
    ) -> io::Result<()>;
}

/// Turns a filesystem path into a member name the way GNU tar does: root,
/// prefix and `.` components are dropped, as is everything up to the last
/// `..`.
pub fn archive_name(name: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    let mut stripped = name.has_root();
    for component in name.components() {
        match component {
            Component::Normal(part) => cleaned.push(part),
            Component::ParentDir => {
                cleaned = PathBuf::new();
                stripped = true;
            }
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
        }
    }
    if stripped {
        log!(
            "Removing leading components from member name {}, stored as {}",
            name.display(),
            cleaned.display()
        );
    }
    cleaned
}

pub struct TarEmitter<W: Write> {
    builder: Builder<W>,
    follow_symlinks: bool,
}

impl<W: Write> TarEmitter<W> {
    pub fn new(out: W, follow_symlinks: bool) -> Self {
        let mut builder = Builder::new(out);
        builder.follow_symlinks(follow_symlinks);
        TarEmitter {
            builder,
            follow_symlinks,
        }
    }

    /// Writes the end-of-archive marker and hands back the writer.
    pub fn finish(self) -> io::Result<W> {
        self.builder.into_inner()
    }
}

impl<W: Write> ArchiveEmitter for TarEmitter<W> {
    fn add_path(&mut self, path: &Path, name: &Path) -> io::Result<()> {
        let name = archive_name(name);
        let stat = if self.follow_symlinks {
            fs::metadata(path)?
        } else {
            fs::symlink_metadata(path)?
        };

        if stat.is_dir() {
            log!("Appending directory {} as {}", path.display(), name.display());
            self.builder.append_dir_all(&name, path)
        } else {
            log!("Appending {} as {}", path.display(), name.display());
            self.builder.append_path_with_name(path, &name)
        }
    }

    fn add_stream(
        &mut self,
        name: &Path,
        size: u64,
        template: &Path,
        content: &mut dyn Read,
    ) -> io::Result<()> {
        let name = archive_name(name);
        let meta = fs::metadata(template)?;

        let mut header = Header::new_gnu();
        header.set_metadata(&meta);
        header.set_entry_type(EntryType::Regular);
        header.set_size(size);

        log!(
            "Appending {} ({} bytes, metadata from {})",
            name.display(),
            size,
            template.display()
        );
        self.builder
            .append_data(&mut header, &name, ExactReader::new(content, size))
    }
}

/// Yields exactly `remaining` bytes of the inner reader: never more, and
/// an `UnexpectedEof` error instead of fewer.
struct ExactReader<R> {
    inner: R,
    remaining: u64,
}

impl<R: Read> ExactReader<R> {
    fn new(inner: R, remaining: u64) -> Self {
        ExactReader { inner, remaining }
    }
}

impl<R: Read> Read for ExactReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let max = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..max])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "content ended {} bytes short of the declared entry size",
                    self.remaining
                ),
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}
