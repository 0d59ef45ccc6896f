use crate::queue::QueueKind;

/// Failures originating from the queue itself rather than the queued work.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// The work item panicked or its worker was torn down before it
    /// produced a result.
    #[error("{queue} queue dropped the work item before it completed")]
    Aborted { queue: QueueKind },
}
