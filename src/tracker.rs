use std::io::{self, Read};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::errors::{DemuxError, Result};
use crate::source::Source;
use crate::strategy::Strategy;

/// Snapshot of a demultiplexer's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemuxStats {
    pub spawned: usize,
    pub activated: usize,
    pub closed: usize,
    pub source_released: bool,
    /// Memory the strategy holds for buffering, in bytes.
    pub buffered_bytes: usize,
}

/// Counts handles through their lifecycle and fires the strategy hooks.
///
/// Everything in here sits behind a single mutex per demultiplexer: reads,
/// spawns and notifications never interleave.
pub(crate) struct Tracker<R, S> {
    label: String,
    source: Source<R>,
    strategy: S,
    spawned: usize,
    activated: usize,
    closed: usize,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // counters and windows are only touched by complete operations
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<R: Read, S: Strategy<R>> Tracker<R, S> {
    pub(crate) fn new(label: String, source: R, strategy: S) -> Self {
        Self {
            label,
            source: Source::new(source),
            strategy,
            spawned: 0,
            activated: 0,
            closed: 0,
        }
    }

    /// Mint a new handle slot. Refused once any handle has started reading.
    pub(crate) fn spawn(&mut self) -> Result<(usize, S::Slot)> {
        if self.activated > 0 {
            return Err(DemuxError::InvalidState(format!(
                "demux/{}: cannot spawn a handle once the source is being \
                 consumed",
                self.label
            )));
        }

        let slot = self.strategy.new_handle()?;
        let id = self.spawned;
        self.spawned += 1;
        log::debug!("demux/{}: spawned handle {}", self.label, id);
        Ok((id, slot))
    }

    pub(crate) fn notify_activated(
        &mut self,
        id: usize,
        slot: &S::Slot,
    ) -> Result<()> {
        self.activated += 1;
        log::debug!(
            "demux/{}: handle {} started reading ({} of {})",
            self.label,
            id,
            self.activated,
            self.spawned
        );
        if self.activated == 1 {
            self.strategy
                .on_first_activation(&mut self.source)?;
        }
        self.strategy.on_handle_activated(slot);
        Ok(())
    }

    pub(crate) fn read(
        &mut self,
        slot: &mut S::Slot,
        buf: &mut [u8],
    ) -> io::Result<usize> {
        self.strategy
            .read(slot, &mut self.source, buf)
    }

    pub(crate) fn close(&mut self, slot: &mut S::Slot) {
        self.strategy.close(slot);
    }

    pub(crate) fn notify_closed(&mut self, id: usize, slot: &S::Slot) {
        self.closed += 1;
        log::debug!(
            "demux/{}: handle {} closed ({} of {})",
            self.label,
            id,
            self.closed,
            self.spawned
        );

        let all_closed = self.closed == self.spawned;
        if self.closed == 1 {
            self.strategy.on_first_close();
        }
        if all_closed {
            self.strategy.on_last_close();
        }
        self.strategy.on_handle_closed(slot);

        if all_closed && self.source.release() {
            log::info!(
                "demux/{}: source released after {} bytes",
                self.label,
                self.source.pulled()
            );
        }
    }

    pub(crate) fn stats(&self) -> DemuxStats {
        DemuxStats {
            spawned: self.spawned,
            activated: self.activated,
            closed: self.closed,
            source_released: self.source.is_released(),
            buffered_bytes: self.strategy.footprint(),
        }
    }
}
