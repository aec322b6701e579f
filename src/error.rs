use thiserror::Error;

/// Errors raised by the timeline engine.
///
/// `InvalidProgress`, `StaleBindingUpdate` and `EmptySeries` are recoverable:
/// the engine clamps, skips or returns nothing and logs them. The rest reject
/// a scene before playback starts.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("progress {0} outside [0, 1]")]
    InvalidProgress(f32),

    #[error("binding {0} fired after it was unregistered")]
    StaleBindingUpdate(u64),

    #[error("sampled an empty series")]
    EmptySeries,

    #[error("object {0} is already anchored to {1:?} space")]
    DualAnchoring(usize, crate::engine::overlay::Space),

    #[error("segment '{segment}' has non-positive duration {duration}")]
    InvalidDuration { segment: String, duration: f32 },

    #[error("easing is degenerate: f(0) = {start}, f(1) = {end}")]
    DegenerateEasing { start: f32, end: f32 },

    #[error("invalid binding: {0}")]
    InvalidBinding(String),

    #[error("ownership conflict: {0}")]
    OwnershipConflict(String),

    #[error("unknown driver {0}")]
    UnknownDriver(usize),

    #[error("unknown object {0}")]
    UnknownObject(usize),

    #[error("timeline has no segments")]
    EmptyTimeline,
}
