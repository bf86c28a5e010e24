use tracing::{Span, field};

use super::TraceId;

/// Root span for one harvest cycle. `branch` and `query` are recorded later,
/// once the cycle has decided what to do.
pub fn root_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "root",
        name = %name,
        trace_id = %trace_id,
        branch = field::Empty,
        query = field::Empty
    )
}

/// Child span (inherits trace_id from its parent).
pub fn child_span(name: &'static str) -> Span {
    tracing::info_span!("child", name = %name, target_url = field::Empty)
}
