mod follow_the_leader;
mod temp_file;

use std::io::{self, Read};

use crate::errors::Result;
use crate::source::Source;

pub use follow_the_leader::{FollowTheLeader, FollowerSlot};
pub use temp_file::{TempFile, TempFileSlot};

/// How the bytes of one source are kept available to many handles.
///
/// Every method runs inside the demultiplexer's critical section, so an
/// implementation may freely mutate shared state. `Slot` is the per-handle
/// state owned by the handle itself and lent back on each call.
pub trait Strategy<R: Read> {
    type Slot;

    /// Mint the state for a newly spawned handle.
    fn new_handle(&mut self) -> Result<Self::Slot>;

    /// Fill `buf` for the handle owning `slot`. `Ok(0)` is end-of-stream.
    fn read(
        &mut self,
        slot: &mut Self::Slot,
        source: &mut Source<R>,
        buf: &mut [u8],
    ) -> io::Result<usize>;

    /// Close the handle owning `slot`. Runs before the tracker is told.
    fn close(&mut self, _slot: &mut Self::Slot) {}

    /// Runs once, before the very first byte is handed to any handle.
    fn on_first_activation(&mut self, _source: &mut Source<R>) -> Result<()> {
        Ok(())
    }

    fn on_handle_activated(&mut self, _slot: &Self::Slot) {}

    fn on_first_close(&mut self) {}

    /// Runs every time the closed count catches up with the spawned count.
    /// The source is released once all close hooks have returned.
    fn on_last_close(&mut self) {}

    fn on_handle_closed(&mut self, _slot: &Self::Slot) {}

    /// Bytes of memory currently held on behalf of the handles.
    fn footprint(&self) -> usize {
        0
    }
}
