//! Frame-stepped timeline engine: drivers fan out to visual attributes
//! through bindings, segments schedule drivers, the stage splits drawing
//! into world and screen passes.

pub mod compositor;
pub mod overlay;
pub mod registry;
pub mod sampler;
pub mod segment;
pub mod target;

pub use compositor::{GroupWait, Phase, TickReport, Timeline, TimelineState};
pub use overlay::{Space, Stage};
pub use registry::{BindingHandle, Registry, SegmentId};
pub use sampler::{PartialCurve, Sample, Series};
pub use segment::{DriverTarget, RestoreEntry, RestorePoint, Segment, SegmentBuilder};
pub use target::{Attribute, AttributeKind, ObjectId, Target, VisualTarget};
