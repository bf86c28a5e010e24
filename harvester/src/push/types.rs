use std::sync::Arc;

use crate::timeline::Timeline;

/// One query-tagged batch, to be delivered to every target.
#[derive(Clone, Debug)]
pub struct PushJob {
    pub targets: Arc<[String]>,
    pub timeline: Timeline,
}

impl PushJob {
    pub fn new(targets: Arc<[String]>, timeline: Timeline) -> Self {
        Self { targets, timeline }
    }

    pub fn query(&self) -> Option<&str> {
        self.timeline.query.as_deref()
    }
}
