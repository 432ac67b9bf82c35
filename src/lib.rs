//! Fan a single forward-only byte source out to many independent readers.
//!
//! A [`Demux`] owns the source. Every [`Handle`] spawned from it reads the
//! complete byte sequence of the source at its own pace, without the source
//! being read more than once. Handles have to be spawned before any of them
//! is read from.
//!
//! Two strategies decide how the bytes are kept around:
//!
//! - [`FollowTheLeader`] keeps only the bytes between the slowest and the
//!   fastest live handle in memory. Memory follows the spread between
//!   readers, not the length of the stream.
//! - [`TempFile`] writes the whole source to a temporary file when the first
//!   handle starts reading and gives every handle its own file reader.
//!
//! ```
//! use std::io::{Cursor, Read};
//! use stream_demux::Demux;
//!
//! let demux = Demux::follow_the_leader("docs", Cursor::new(b"Testing"));
//! let mut first = demux.spawn().unwrap();
//! let mut second = demux.spawn().unwrap();
//!
//! let mut a = String::new();
//! let mut b = String::new();
//! first.read_to_string(&mut a).unwrap();
//! second.read_to_string(&mut b).unwrap();
//! assert_eq!(a, "Testing");
//! assert_eq!(b, "Testing");
//!
//! drop(first);
//! drop(second);
//! assert!(demux.stats().source_released);
//! ```
//!
//! All reads, spawns and lifecycle notifications of one demultiplexer run
//! under a single lock. Handles are `Send` and can be moved to other
//! threads. A handle that is neither closed nor dropped keeps the source
//! alive.

mod demux;
pub mod errors;
mod handle;
pub mod source;
pub mod strategy;
mod tracker;

pub use demux::Demux;
pub use errors::{DemuxError, Result};
pub use handle::Handle;
pub use source::Source;
pub use strategy::{FollowTheLeader, Strategy, TempFile};
pub use tracker::DemuxStats;

/// Smallest buffer the follow-the-leader strategy allocates.
pub const MIN_CAPACITY: usize = 4096;

pub const TEMP_FILE_PREFIX: &str = "demux-";
pub const TEMP_FILE_SUFFIX: &str = ".data";
