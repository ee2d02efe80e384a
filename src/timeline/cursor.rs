use super::model::{Segment, Timeline};

/// Walks a timeline during playback, reporting each segment once as it becomes active.
pub struct TimelineCursor {
    timeline: Timeline,
    active: Option<usize>,
}

impl TimelineCursor {
    pub fn new(timeline: Timeline) -> Self {
        Self {
            timeline,
            active: None,
        }
    }

    /// The newly active segment if the playhead crossed into a different one.
    pub fn advance(&mut self, time_seconds: f32) -> Option<(usize, &Segment)> {
        let index = self.timeline.index_at(time_seconds);
        if index == self.active {
            return None;
        }
        self.active = index;
        let i = index?;
        self.timeline.segments().get(i).map(|s| (i, s))
    }

    pub fn rewind(&mut self) {
        self.active = None;
    }
}
