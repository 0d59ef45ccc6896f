//! Rate-limited outbound dispatch queues.
//!
//! Every category of outbound traffic (text, video, image) gets its own
//! FIFO [`DispatchQueue`] drained by at most one worker task, with a
//! per-category pause between items to stay under gateway rate limits.

pub mod delay;
pub mod dispatcher;
pub mod error;
pub mod queue;

pub use {
    delay::DelayPolicy,
    dispatcher::Dispatcher,
    error::QueueError,
    queue::{DispatchQueue, QueueKind},
};
