//! Human-in-the-loop approval workflow.
//!
//! A policy check that lands on "needs approval" is parked here: the
//! request is persisted, surfaced to a human through a channel adapter,
//! and awaited with a hard timeout. Free-form replies are classified and
//! correlated back to the pending request they most plausibly address.

mod error;
mod queue;
mod store;
mod types;

pub use error::ApprovalError;
pub use queue::{ApprovalQueue, NotifyCallback};
pub use store::{ApprovalStore, JsonlStore, MemoryStore};
pub use types::{
    classify_response, ApprovalDetails, ApprovalOutcome, ApprovalRequest, ApprovalStatus,
    ResponseMatch,
};
