use std::{
    collections::VecDeque,
    io::{self, Read},
};

use crate::{log, source::ByteSource};

/// Reads a queue of sources back to back as one stream.
///
/// A source is dropped, and so closed, as soon as it reports end of data.
/// Whatever is still queued is dropped by [`ConcatenatedSource::close`] or
/// when the reader itself goes away.
pub struct ConcatenatedSource<S = ByteSource> {
    sources: VecDeque<S>,
}

impl<S> ConcatenatedSource<S> {
    pub fn new<I: IntoIterator<Item = S>>(sources: I) -> Self {
        ConcatenatedSource {
            sources: sources.into_iter().collect(),
        }
    }

    /// Number of sources not yet drained.
    pub fn remaining(&self) -> usize {
        self.sources.len()
    }

    /// Releases every source that has not been drained yet.
    pub fn close(&mut self) {
        if !self.sources.is_empty() {
            log!("Releasing {} undrained source(s)", self.sources.len());
        }
        self.sources.clear();
    }
}

impl<S: Read> Read for ConcatenatedSource<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        // Each pass either fills more of `buf` or pops a source.
        while filled < buf.len() {
            let Some(front) = self.sources.front_mut() else {
                break;
            };
            match front.read(&mut buf[filled..]) {
                Ok(0) => {
                    self.sources.pop_front();
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}
