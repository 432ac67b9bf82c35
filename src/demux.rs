use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::errors::Result;
use crate::handle::Handle;
use crate::strategy::{FollowTheLeader, Strategy, TempFile};
use crate::tracker::{lock, DemuxStats, Tracker};

/// Fans one forward-only source out to any number of handles.
///
/// All handles must be spawned before the first one is read from. Each
/// handle then sees the complete byte sequence of the source, at its own
/// pace. The source is released exactly once, when the last spawned handle
/// is closed (or dropped).
pub struct Demux<R: Read, S: Strategy<R>> {
    tracker: Arc<Mutex<Tracker<R, S>>>,
}

impl<R: Read> Demux<R, FollowTheLeader> {
    /// Buffer only the bytes between the slowest and the fastest handle.
    pub fn follow_the_leader(label: impl Into<String>, source: R) -> Self {
        Self::with_strategy(label, source, FollowTheLeader::new())
    }
}

impl<R: Read> Demux<R, TempFile> {
    /// Write the source to a file in the system temporary directory once
    /// the first handle starts reading.
    pub fn temp_file(label: impl Into<String>, source: R) -> Result<Self> {
        Ok(Self::with_strategy(label, source, TempFile::new()?))
    }

    pub fn temp_file_in(
        label: impl Into<String>,
        source: R,
        dir: impl AsRef<Path>,
    ) -> Result<Self> {
        Ok(Self::with_strategy(label, source, TempFile::new_in(dir)?))
    }
}

impl<R: Read, S: Strategy<R>> Demux<R, S> {
    pub fn with_strategy(
        label: impl Into<String>,
        source: R,
        strategy: S,
    ) -> Self {
        let label = label.into();
        log::debug!("demux/{}: created", label);
        Self {
            tracker: Arc::new(Mutex::new(Tracker::new(label, source, strategy))),
        }
    }

    /// Spawn a new handle.
    ///
    /// # Errors
    /// `DemuxError::InvalidState` once any handle has been read from. The
    /// demultiplexer stays usable for the handles already spawned.
    pub fn spawn(&self) -> Result<Handle<R, S>> {
        let (id, slot) = lock(&self.tracker).spawn()?;
        Ok(Handle::new(Arc::clone(&self.tracker), id, slot))
    }

    pub fn stats(&self) -> DemuxStats {
        lock(&self.tracker).stats()
    }
}
