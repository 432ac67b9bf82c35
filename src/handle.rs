use std::io::{self, ErrorKind, Read};
use std::sync::{Arc, Mutex};

use crate::strategy::Strategy;
use crate::tracker::{lock, Tracker};

/// One independent reader over the shared source.
///
/// The first read reports the handle as active and the first close reports
/// it as closed, each exactly once; everything else is delegated to the
/// strategy. Dropping a handle closes it, so the source is released once
/// the last handle goes away.
pub struct Handle<R: Read, S: Strategy<R>> {
    tracker: Arc<Mutex<Tracker<R, S>>>,
    id: usize,
    slot: S::Slot,
    reported_active: bool,
    reported_closed: bool,
}

impl<R: Read, S: Strategy<R>> Handle<R, S> {
    pub(crate) fn new(
        tracker: Arc<Mutex<Tracker<R, S>>>,
        id: usize,
        slot: S::Slot,
    ) -> Self {
        Self {
            tracker,
            id,
            slot,
            reported_active: false,
            reported_closed: false,
        }
    }

    /// Position of this handle in spawn order, starting at 0.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.reported_closed
    }

    /// Read the next byte, `None` at end-of-stream.
    pub fn read_one(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }

    /// Close the handle. Calling it again only repeats the strategy's
    /// close, the tracker is told once.
    pub fn close(&mut self) {
        let mut tracker = lock(&self.tracker);
        tracker.close(&mut self.slot);
        if !self.reported_closed {
            self.reported_closed = true;
            tracker.notify_closed(self.id, &self.slot);
        }
    }
}

impl<R: Read, S: Strategy<R>> Read for Handle<R, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut tracker = lock(&self.tracker);
        if !self.reported_active {
            self.reported_active = true;
            tracker.notify_activated(self.id, &self.slot)?;
        }
        tracker.read(&mut self.slot, buf)
    }
}

impl<R: Read, S: Strategy<R>> Drop for Handle<R, S> {
    fn drop(&mut self) {
        self.close();
    }
}
