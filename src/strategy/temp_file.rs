use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use crate::errors::{DemuxError, Result};
use crate::source::Source;
use crate::strategy::Strategy;
use crate::{TEMP_FILE_PREFIX, TEMP_FILE_SUFFIX};

enum Materialization {
    Pending,
    Done,
    Failed(ErrorKind, String),
}

/// Serves every handle from its own reader over a temporary file.
///
/// The whole source is written to the file right before the first byte is
/// read from any handle, so there is nothing to coordinate afterwards. The
/// source itself stays open until the last handle is closed. The file is
/// deleted when the last handle is closed, or when the strategy is dropped.
/// Once deleted it is never written again.
///
/// Available disk space is the caller's concern.
pub struct TempFile {
    path: PathBuf,
    state: Materialization,
    removed: bool,
}

/// Per-handle state: the handle's own reader, opened on first use.
#[derive(Debug, Default)]
pub struct TempFileSlot {
    file: Option<File>,
    closed: bool,
}

impl TempFile {
    /// Create the backing file in the system temporary directory.
    pub fn new() -> Result<Self> {
        Self::new_in(env::temp_dir())
    }

    /// Create the backing file in `dir`.
    pub fn new_in(dir: impl AsRef<Path>) -> Result<Self> {
        let name: String = std::iter::repeat_with(fastrand::alphanumeric)
            .take(10)
            .collect();
        let path = dir.as_ref().join(format!(
            "{}{}{}",
            TEMP_FILE_PREFIX, name, TEMP_FILE_SUFFIX
        ));
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;

        Ok(Self {
            path,
            state: Materialization::Pending,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn materialize<R: Read>(&self, source: &mut Source<R>) -> io::Result<u64> {
        let mut writer = BufWriter::new(File::create(&self.path)?);
        let copied = source.copy_to(&mut writer)?;
        writer.flush()?;
        Ok(copied)
    }

    fn remove(&mut self) -> Result<()> {
        if self.removed {
            return Ok(());
        }
        self.removed = true;
        fs::remove_file(&self.path).map_err(|err| {
            DemuxError::Release(self.path.display().to_string(), err.to_string())
        })
    }
}

impl<R: Read> Strategy<R> for TempFile {
    type Slot = TempFileSlot;

    fn new_handle(&mut self) -> Result<TempFileSlot> {
        Ok(TempFileSlot::default())
    }

    fn read(
        &mut self,
        slot: &mut TempFileSlot,
        _source: &mut Source<R>,
        buf: &mut [u8],
    ) -> io::Result<usize> {
        if slot.closed {
            return Ok(0);
        }
        match &self.state {
            Materialization::Done => {}
            Materialization::Pending => {
                return Err(io::Error::new(
                    ErrorKind::Other,
                    "backing file has not been written yet",
                ))
            }
            Materialization::Failed(kind, message) => {
                return Err(io::Error::new(
                    *kind,
                    format!("backing file is incomplete: {}", message),
                ))
            }
        }

        if slot.file.is_none() {
            slot.file = Some(File::open(&self.path)?);
        }
        match slot.file.as_mut() {
            Some(file) => file.read(buf),
            None => Ok(0),
        }
    }

    fn close(&mut self, slot: &mut TempFileSlot) {
        slot.closed = true;
        slot.file = None;
    }

    fn on_first_activation(&mut self, source: &mut Source<R>) -> Result<()> {
        let result = if self.removed {
            Err(io::Error::new(
                ErrorKind::NotFound,
                format!("{} has already been removed", self.path.display()),
            ))
        } else {
            self.materialize(source)
        };
        match result {
            Ok(copied) => {
                log::debug!(
                    "temp-file: {} bytes written to {}",
                    copied,
                    self.path.display()
                );
                self.state = Materialization::Done;
                Ok(())
            }
            Err(err) => {
                self.state =
                    Materialization::Failed(err.kind(), err.to_string());
                Err(err.into())
            }
        }
    }

    fn on_last_close(&mut self) {
        if let Err(err) = self.remove() {
            log::warn!("temp-file: {}", err);
        }
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.removed {
            let _ = fs::remove_file(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempdir::TempDir;

    type Src = Source<Cursor<Vec<u8>>>;

    fn source(data: &[u8]) -> Src {
        Source::new(Cursor::new(data.to_vec()))
    }

    fn drain(strategy: &mut TempFile, slot: &mut TempFileSlot) -> Vec<u8> {
        let mut src = source(b"");
        let mut out = Vec::new();
        let mut buf = [0u8; 3];
        loop {
            let n = Strategy::<Cursor<Vec<u8>>>::read(
                strategy, slot, &mut src, &mut buf,
            )
            .unwrap();
            if n == 0 {
                return out;
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(ErrorKind::PermissionDenied, "denied"))
        }
    }

    #[test]
    fn backing_file_is_created_empty() {
        let dir = TempDir::new("temp_file_create").unwrap();
        let strategy = TempFile::new_in(dir.path()).unwrap();
        let name = strategy
            .path()
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .to_owned();

        assert!(name.starts_with(TEMP_FILE_PREFIX));
        assert!(name.ends_with(TEMP_FILE_SUFFIX));
        assert_eq!(fs::metadata(strategy.path()).unwrap().len(), 0);
    }

    #[test]
    fn every_handle_reads_the_materialized_file() {
        let dir = TempDir::new("temp_file_read").unwrap();
        let mut strategy = TempFile::new_in(dir.path()).unwrap();
        let mut src = source(b"Testing");
        let mut slots: Vec<TempFileSlot> = (0..3)
            .map(|_| Strategy::<Cursor<Vec<u8>>>::new_handle(&mut strategy))
            .collect::<Result<_>>()
            .unwrap();

        strategy.on_first_activation(&mut src).unwrap();
        assert!(!src.is_released());
        assert_eq!(src.pulled(), 7);
        assert_eq!(fs::metadata(strategy.path()).unwrap().len(), 7);

        for slot in slots.iter_mut() {
            assert_eq!(drain(&mut strategy, slot), b"Testing");
            Strategy::<Cursor<Vec<u8>>>::close(&mut strategy, slot);
        }
        assert!(strategy.path().exists());

        Strategy::<Cursor<Vec<u8>>>::on_last_close(&mut strategy);
        assert!(!strategy.path().exists());
    }

    #[test]
    fn failed_materialization_poisons_reads() {
        let dir = TempDir::new("temp_file_broken").unwrap();
        let mut strategy = TempFile::new_in(dir.path()).unwrap();
        let mut src = Source::new(Broken);
        let mut slot = Strategy::<Broken>::new_handle(&mut strategy).unwrap();

        let err = strategy.on_first_activation(&mut src).unwrap_err();
        assert!(matches!(err, DemuxError::Io(_)));
        assert!(!src.is_released());

        let mut buf = [0u8; 4];
        let err = Strategy::<Broken>::read(
            &mut strategy,
            &mut slot,
            &mut src,
            &mut buf,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[test]
    fn closed_slot_reads_end_of_stream() {
        let dir = TempDir::new("temp_file_closed").unwrap();
        let mut strategy = TempFile::new_in(dir.path()).unwrap();
        let mut src = source(b"abc");
        let mut slot =
            Strategy::<Cursor<Vec<u8>>>::new_handle(&mut strategy).unwrap();
        strategy.on_first_activation(&mut src).unwrap();

        Strategy::<Cursor<Vec<u8>>>::close(&mut strategy, &mut slot);
        assert_eq!(drain(&mut strategy, &mut slot), b"");
    }

    #[test]
    fn release_failure_is_swallowed() {
        let dir = TempDir::new("temp_file_gone").unwrap();
        let mut strategy = TempFile::new_in(dir.path()).unwrap();
        fs::remove_file(strategy.path()).unwrap();

        Strategy::<Cursor<Vec<u8>>>::on_last_close(&mut strategy);
        // a second last close is a no-op
        Strategy::<Cursor<Vec<u8>>>::on_last_close(&mut strategy);
    }

    #[test]
    fn removed_file_is_not_written_again() {
        let dir = TempDir::new("temp_file_reuse").unwrap();
        let mut strategy = TempFile::new_in(dir.path()).unwrap();
        let mut src = source(b"abc");
        let mut slot =
            Strategy::<Cursor<Vec<u8>>>::new_handle(&mut strategy).unwrap();

        Strategy::<Cursor<Vec<u8>>>::on_last_close(&mut strategy);
        assert!(!strategy.path().exists());

        let err = strategy.on_first_activation(&mut src).unwrap_err();
        assert!(matches!(err, DemuxError::Io(_)));
        assert!(!strategy.path().exists());
        assert_eq!(src.pulled(), 0);

        let mut buf = [0u8; 4];
        let err = Strategy::<Cursor<Vec<u8>>>::read(
            &mut strategy,
            &mut slot,
            &mut src,
            &mut buf,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        drop(strategy);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn dropping_the_strategy_removes_the_file() {
        let dir = TempDir::new("temp_file_drop").unwrap();
        let strategy = TempFile::new_in(dir.path()).unwrap();
        let path = strategy.path().to_path_buf();
        assert!(path.exists());

        drop(strategy);
        assert!(!path.exists());
    }
}
