//! Grounding context for the inference service.
//!
//! [`AggregateSnapshot`] reads the business aggregates once per question;
//! [`ContextAssembler`] renders it into a bounded [`PromptContext`].

mod assembler;
mod snapshot;

pub use assembler::{format_money, ContextAssembler, PromptContext};
pub use snapshot::{AggregateSnapshot, EntityDetail, SnapshotLimits};
