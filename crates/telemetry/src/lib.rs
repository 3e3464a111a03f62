//! Execution metrics for splforge chains.
//!
//! Every unit, API call, retrieval, model request, and tool execution is a
//! [`Span`]. The [`InvocationMeter`] owned by the executor turns those spans
//! into the per-unit and cumulative [`Metrics`] carried by stream events, and
//! into the [`InvocationUsage`](splforge_core::InvocationUsage) handed to the
//! usage recorder once the invocation ends.

pub mod meter;
pub mod model;

pub use meter::{InvocationMeter, OpenSpan};
pub use model::{humanize_duration, Metrics, Span, SpanKind, TokenUsage, Trace};
