use std::cmp;
use std::io::{self, ErrorKind, Read};

use crate::errors::Result;
use crate::source::Source;
use crate::strategy::Strategy;
use crate::MIN_CAPACITY;

/// Keeps only the bytes between the furthest-behind ("trailing") and the
/// furthest-ahead ("leading") live handle.
///
/// A handle that has caught up with everything pulled so far pulls exactly
/// one more byte from the source. Before that pull the window is compacted
/// to start at the trailing position and every position is rebased, so the
/// memory held is proportional to the spread between readers rather than to
/// the length of the stream.
///
/// Readers have to make progress concurrently for this to pay off: if one
/// handle is drained completely before another starts, the whole stream ends
/// up in the buffer.
pub struct FollowTheLeader {
    min_capacity: usize,
    /// Pulled bytes still needed by someone. Its length is the write
    /// position, relative to the trailing handle.
    buffer: Vec<u8>,
    /// Read position per handle id, `None` once the handle is closed.
    positions: Vec<Option<usize>>,
    exhausted: bool,
}

/// Per-handle state: the position-table index of the handle, plus a source
/// error that a bulk read could not report yet.
#[derive(Debug)]
pub struct FollowerSlot {
    id: usize,
    retired: bool,
    pending: Option<io::Error>,
}

impl FollowerSlot {
    pub fn id(&self) -> usize {
        self.id
    }
}

impl FollowTheLeader {
    pub fn new() -> Self {
        Self::with_min_capacity(MIN_CAPACITY)
    }

    pub fn with_min_capacity(min_capacity: usize) -> Self {
        let min_capacity = cmp::max(min_capacity, 1);
        Self {
            min_capacity,
            buffer: Vec::with_capacity(min_capacity),
            positions: Vec::new(),
            exhausted: false,
        }
    }

    /// Number of pulled bytes currently held in the window.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn trailing(&self) -> Option<usize> {
        self.positions.iter().flatten().copied().min()
    }

    fn position(&self, id: usize) -> io::Result<usize> {
        self.positions
            .get(id)
            .copied()
            .flatten()
            .ok_or_else(|| {
                io::Error::new(
                    ErrorKind::Other,
                    format!("handle {} is not part of the window", id),
                )
            })
    }

    /// Compact the window down to `[trailing, write position)` and make room
    /// for one more byte.
    ///
    /// Capacity never drops below twice the spread including the byte about
    /// to be pulled. A new buffer gets twice that, so growth is amortized,
    /// and a buffer more than four times too big is replaced.
    fn prepare_for_pull(&mut self) {
        let trailing = self.trailing().unwrap_or(self.buffer.len());
        let delta = self.buffer.len() - trailing;
        let target = cmp::max((delta + 1) * 2, self.min_capacity);

        if self.buffer.capacity() < target
            || self.buffer.capacity() > target * 4
        {
            let capacity = target * 2;
            let mut next = Vec::with_capacity(capacity);
            next.extend_from_slice(&self.buffer[trailing..]);
            log::debug!(
                "follow-the-leader: window of {} bytes moved to a buffer of {}",
                delta,
                capacity
            );
            self.buffer = next;
        } else if trailing > 0 {
            log::trace!("follow-the-leader: dropping {} bytes", trailing);
            self.buffer.drain(..trailing);
        }

        if trailing > 0 {
            for position in self.positions.iter_mut().flatten() {
                *position -= trailing;
            }
        }
    }
}

impl Default for FollowTheLeader {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Read> Strategy<R> for FollowTheLeader {
    type Slot = FollowerSlot;

    fn new_handle(&mut self) -> Result<FollowerSlot> {
        let start = self.trailing().unwrap_or(0);
        self.positions.push(Some(start));
        Ok(FollowerSlot {
            id: self.positions.len() - 1,
            retired: false,
            pending: None,
        })
    }

    fn read(
        &mut self,
        slot: &mut FollowerSlot,
        source: &mut Source<R>,
        buf: &mut [u8],
    ) -> io::Result<usize> {
        if slot.retired || buf.is_empty() {
            return Ok(0);
        }
        if let Some(err) = slot.pending.take() {
            return Err(err);
        }

        let mut copied = 0;
        while copied < buf.len() {
            let position = self.position(slot.id)?;

            if position >= self.buffer.len() {
                if self.exhausted {
                    break;
                }
                self.prepare_for_pull();
                match source.pull_one() {
                    Ok(Some(byte)) => self.buffer.push(byte),
                    Ok(None) => {
                        self.exhausted = true;
                        break;
                    }
                    Err(err) if copied == 0 => return Err(err),
                    Err(err) => {
                        // copied bytes go out first, the error comes next
                        log::debug!(
                            "follow-the-leader: pull failed after {} bytes: {}",
                            copied,
                            err
                        );
                        slot.pending = Some(err);
                        break;
                    }
                }
                continue;
            }

            let available = &self.buffer[position..];
            let n = cmp::min(available.len(), buf.len() - copied);
            buf[copied..copied + n].copy_from_slice(&available[..n]);
            self.positions[slot.id] = Some(position + n);
            copied += n;
        }

        Ok(copied)
    }

    fn close(&mut self, slot: &mut FollowerSlot) {
        slot.retired = true;
        slot.pending = None;
        if let Some(position) = self.positions.get_mut(slot.id) {
            *position = None;
        }
    }

    fn on_last_close(&mut self) {
        log::debug!(
            "follow-the-leader: releasing {} buffered bytes of {} handles",
            self.buffer.len(),
            self.positions.len()
        );
        self.buffer = Vec::new();
        self.positions.clear();
        self.exhausted = false;
    }

    fn footprint(&self) -> usize {
        self.buffer.capacity()
    }
}
