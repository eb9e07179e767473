// Every user interaction, async result, and internal event is represented as an
// Action variant. The App event loop dispatches these to the session, the
// playback slot and the components.

use crate::data::SegmentSet;
use crate::viz::emotion::EmotionConfigUpdate;
use crate::viz::params::VisualParameterSet;

/// All events flowing through the app. Results of background work carry the
/// id they were started with so the [`App`](crate::app::App) can drop stale
/// completions.
#[derive(Debug, Clone)]
pub enum Action {
    Quit,
    Tick,
    Resize,

    LoadSegments,
    SegmentsLoaded {
        load_id: u64,
        set: SegmentSet,
    },

    TogglePause,
    NextSegment,
    PrevSegment,
    PlaybackStarted {
        segment_id: u64,
    },
    PlaybackFinished {
        segment_id: u64,
    },
    PlaybackFailed {
        segment_id: u64,
        error: String,
    },
    AudioLevels {
        segment_id: u64,
        rms: f64,
        peak: f64,
        zero_crossing_rate: f64,
    },

    ToggleConnections,
    ToggleVolumeEffects,
    ToggleAudioGrid,
    EmotionAmountUp,
    EmotionAmountDown,

    ReloadEmotions,
    EmotionConfigChanged(EmotionConfigUpdate),
    ParametersChanged(VisualParameterSet),

    ShowError(String),
    ClearError,
    ShowHelp,
    HideHelp,
}
