// Playback state machine for the single audio slot.
//
// Idle → Loading → Ready → Playing → Ended, with Failed reachable from any
// in-flight state. Every load gets a fresh segment id; events tagged with an
// older id are rejected as stale before they can touch any state.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotState {
    #[default]
    Idle,
    Loading,
    Ready,
    Playing,
    Ended,
    Failed,
}

impl SlotState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Playing => "playing",
            Self::Ended => "ended",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Failed)
    }
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotEvent {
    /// The asset is available (process spawned, or no asset needed).
    Loaded,
    /// Audio output began.
    Started,
    Finished,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("event {event:?} is not valid in state {from}")]
    Invalid { from: SlotState, event: SlotEvent },
    #[error("stale event for segment {got}, current segment is {current}")]
    Stale { got: u64, current: u64 },
}

#[derive(Debug, Clone)]
pub struct PlaybackSlot {
    state: SlotState,
    segment_id: u64,
}

impl Default for PlaybackSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackSlot {
    pub fn new() -> Self {
        Self {
            state: SlotState::Idle,
            segment_id: 0,
        }
    }

    /// Start loading a new segment from any state. Returns its id; events for
    /// every earlier id become stale.
    pub fn begin(&mut self) -> u64 {
        self.segment_id += 1;
        self.state = SlotState::Loading;
        self.segment_id
    }

    /// Drop back to idle and invalidate the in-flight segment.
    pub fn reset(&mut self) {
        self.segment_id += 1;
        self.state = SlotState::Idle;
    }

    pub fn handle(&mut self, segment_id: u64, event: SlotEvent) -> Result<SlotState, TransitionError> {
        if segment_id != self.segment_id || self.state == SlotState::Idle {
            return Err(TransitionError::Stale {
                got: segment_id,
                current: self.segment_id,
            });
        }
        use SlotEvent as E;
        use SlotState as S;
        let next = match (self.state, event) {
            (S::Loading, E::Loaded) => S::Ready,
            (S::Loading | S::Ready, E::Started) => S::Playing,
            (S::Ready | S::Playing, E::Finished) => S::Ended,
            (S::Loading | S::Ready | S::Playing, E::Failed) => S::Failed,
            (from, event) => return Err(TransitionError::Invalid { from, event }),
        };
        self.state = next;
        Ok(next)
    }

    /// True when `segment_id` is the segment currently owning the slot.
    pub fn is_current(&self, segment_id: u64) -> bool {
        segment_id == self.segment_id && self.state != SlotState::Idle
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn segment_id(&self) -> u64 {
        self.segment_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_lifecycle() {
        let mut slot = PlaybackSlot::new();
        let id = slot.begin();
        assert_eq!(slot.handle(id, SlotEvent::Loaded), Ok(SlotState::Ready));
        assert_eq!(slot.handle(id, SlotEvent::Started), Ok(SlotState::Playing));
        assert_eq!(slot.handle(id, SlotEvent::Finished), Ok(SlotState::Ended));
        assert!(slot.state().is_terminal());
    }

    #[test]
    fn ended_rejects_further_events() {
        let mut slot = PlaybackSlot::new();
        let id = slot.begin();
        slot.handle(id, SlotEvent::Failed).unwrap();
        assert_eq!(
            slot.handle(id, SlotEvent::Started),
            Err(TransitionError::Invalid {
                from: SlotState::Failed,
                event: SlotEvent::Started
            })
        );
    }

    #[test]
    fn reset_invalidates_in_flight_segment() {
        let mut slot = PlaybackSlot::new();
        let id = slot.begin();
        slot.reset();
        assert!(!slot.is_current(id));
        assert!(matches!(
            slot.handle(id, SlotEvent::Loaded),
            Err(TransitionError::Stale { .. })
        ));
    }
}
