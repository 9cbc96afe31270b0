//! Paced, cancellable delivery of generated words.
//!
//! Output is written in small chunks with an uneven delay between them so a
//! client holds the connection open as long as possible. The only
//! suspension point is the inter-chunk wait, and it races against a
//! [`CancellationToken`](tokio_util::sync::CancellationToken), so a
//! disconnect is noticed within one chunk interval.

pub mod controller;
pub mod pacing;
pub mod sink;

pub use controller::{stream_words, StreamOutcome};
pub use pacing::Pacing;
pub use sink::{ChannelSink, ChunkSink};
