use std::io::{self, BufRead, BufReader, ErrorKind, Read, Write};

/// The single upstream reader shared by every handle of a demultiplexer.
///
/// The reader is owned until [`Source::release`] is called, after which
/// every pull fails with [`ErrorKind::BrokenPipe`]. Releasing drops the
/// reader, which is how Rust readers are closed.
pub struct Source<R> {
    reader: Option<BufReader<R>>,
    pulled: u64,
}

impl<R: Read> Source<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            reader: Some(BufReader::new(reader)),
            pulled: 0,
        }
    }

    /// Pull exactly one byte. `Ok(None)` means the source is exhausted.
    pub fn pull_one(&mut self) -> io::Result<Option<u8>> {
        let reader = self.reader_mut()?;
        loop {
            let next = match reader.fill_buf() {
                Ok(buf) => buf.first().copied(),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };
            if next.is_some() {
                reader.consume(1);
                self.pulled += 1;
            }
            return Ok(next);
        }
    }

    /// Drain everything that is left into `writer`.
    pub fn copy_to<W: Write + ?Sized>(
        &mut self,
        writer: &mut W,
    ) -> io::Result<u64> {
        let reader = self.reader_mut()?;
        let copied = io::copy(reader, writer)?;
        self.pulled += copied;
        Ok(copied)
    }

    /// Drop the underlying reader. Returns `false` if it was already gone.
    pub fn release(&mut self) -> bool {
        self.reader.take().is_some()
    }

    pub fn is_released(&self) -> bool {
        self.reader.is_none()
    }

    /// Number of bytes handed out so far.
    pub fn pulled(&self) -> u64 {
        self.pulled
    }

    fn reader_mut(&mut self) -> io::Result<&mut BufReader<R>> {
        self.reader.as_mut().ok_or_else(|| {
            io::Error::new(
                ErrorKind::BrokenPipe,
                "source has already been released",
            )
        })
    }
}
