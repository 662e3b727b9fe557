use std::{
    fs,
    io::Read,
    mem,
    path::{Path, PathBuf},
};

use crate::{
    archive::{self, ArchiveEmitter},
    concat::ConcatenatedSource,
    log,
    source::{self, ByteSource, SourceKind},
    Error, Result,
};

enum Pending<S> {
    Empty,
    /// A directory, archived recursively on flush. Admits no other inputs.
    Directory(PathBuf),
    Sources {
        queue: Vec<S>,
        total: u64,
        /// Last input added; supplies mode, ownership and times.
        template: PathBuf,
    },
}

impl<S> Default for Pending<S> {
    fn default() -> Self {
        Pending::Empty
    }
}

/// Collects the inputs of the next archive entry.
pub struct EntryAccumulator<S = ByteSource> {
    pending: Pending<S>,
}

impl<S> Default for EntryAccumulator<S> {
    fn default() -> Self {
        EntryAccumulator {
            pending: Pending::default(),
        }
    }
}

impl<S> EntryAccumulator<S> {
    pub fn is_empty(&self) -> bool {
        matches!(self.pending, Pending::Empty)
    }

    /// Number of queued byte sources.
    pub fn len(&self) -> usize {
        match &self.pending {
            Pending::Sources { queue, .. } => queue.len(),
            _ => 0,
        }
    }

    /// Size the next concatenated entry will be written with.
    pub fn total_size(&self) -> u64 {
        match &self.pending {
            Pending::Sources { total, .. } => *total,
            _ => 0,
        }
    }

    pub fn template(&self) -> Option<&Path> {
        match &self.pending {
            Pending::Sources { template, .. } => Some(template),
            _ => None,
        }
    }

    pub fn directory(&self) -> Option<&Path> {
        match &self.pending {
            Pending::Directory(dir) => Some(dir),
            _ => None,
        }
    }

    fn reject_after_directory(&self) -> Result<()> {
        match &self.pending {
            Pending::Directory(dir) => Err(Error::DirectoryNotAlone { path: dir.clone() }),
            _ => Ok(()),
        }
    }

    fn push(&mut self, path: &Path, source: S, len: u64) {
        match &mut self.pending {
            Pending::Sources {
                queue,
                total,
                template,
            } => {
                queue.push(source);
                *total += len;
                *template = path.to_path_buf();
            }
            pending => {
                *pending = Pending::Sources {
                    queue: vec![source],
                    total: len,
                    template: path.to_path_buf(),
                };
            }
        }
    }
}

impl EntryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an uncompressed file, stream or directory.
    pub fn add_plain(&mut self, path: &Path) -> Result<()> {
        let kind = source::classify(path)?;
        self.reject_after_directory()?;

        let (source, len) = match kind {
            SourceKind::Directory => {
                if !self.is_empty() {
                    return Err(Error::DirectoryNotAlone {
                        path: path.to_path_buf(),
                    });
                }
                log!("{}: {}", path.display(), SourceKind::Directory);
                self.pending = Pending::Directory(path.to_path_buf());
                return Ok(());
            }
            SourceKind::Stream => source::buffer_stream(path, false)?,
            SourceKind::Regular => source::open_plain(path)?,
        };
        self.push(path, source, len);
        Ok(())
    }

    /// Adds a gzip file or gzip stream, sized by its uncompressed length.
    pub fn add_compressed(&mut self, path: &Path) -> Result<()> {
        let kind = source::classify(path)?;
        self.reject_after_directory()?;

        let (source, len) = match kind {
            SourceKind::Directory => {
                return Err(Error::Usage(format!(
                    "{} is a directory and cannot be decompressed",
                    path.display()
                )))
            }
            // Streams can't seek to the trailer, so inflate them up front.
            SourceKind::Stream => source::buffer_stream(path, true)?,
            SourceKind::Regular => source::open_gzip(path)?,
        };
        self.push(path, source, len);
        Ok(())
    }
}

impl<S: Read> EntryAccumulator<S> {
    /// Writes the pending inputs as one entry called `name` and starts a
    /// new, empty group. With nothing pending, `name` itself is archived.
    pub fn flush<E>(&mut self, name: &Path, emitter: &mut E) -> Result<()>
    where
        E: ArchiveEmitter + ?Sized,
    {
        let archive_err = |source| Error::Archive {
            name: name.to_path_buf(),
            source,
        };

        match mem::take(&mut self.pending) {
            Pending::Empty => {
                fs::symlink_metadata(name).map_err(|e| Error::filesystem(name, e))?;
                log!("No pending inputs, archiving {} as itself", name.display());
                emitter.add_path(name, name).map_err(archive_err)
            }
            Pending::Directory(dir) => emitter.add_path(&dir, name).map_err(archive_err),
            Pending::Sources {
                queue,
                total,
                template,
            } => {
                if archive::archive_name(name).as_os_str().is_empty() {
                    return Err(Error::Usage(format!(
                        "{} is not a usable entry name",
                        name.display()
                    )));
                }
                log!(
                    "Concatenating {} input(s) into {} ({} bytes)",
                    queue.len(),
                    name.display(),
                    total
                );
                let mut content = ConcatenatedSource::new(queue);
                let written = emitter.add_stream(name, total, &template, &mut content);
                // A zero-length entry never reads, so its sources are still open.
                content.close();
                written.map_err(archive_err)
            }
        }
    }
}
