//! The setter surface bindings write through.
//!
//! Anything that owns visual objects (the scene arena, a test double) can be
//! driven by the engine by implementing [`VisualTarget`].

use crate::error::EngineError;
use crate::gfx::math::{Color, Vec3};
use log::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub usize);

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a binding writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Object(ObjectId),
    Camera,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Points,
    Position,
    Rotation,
    Color,
    StrokeWidth,
    Opacity,
    Orientation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Points(Vec<Vec3>),
    Position(Vec3),
    /// Euler angles in radians, applied about the node's pivot.
    Rotation(Vec3),
    Color(Color),
    StrokeWidth(f32),
    Opacity(f32),
    /// Camera polar and azimuth angles in radians.
    Orientation { phi: f32, theta: f32 },
}

impl Attribute {
    pub fn kind(&self) -> AttributeKind {
        match self {
            Attribute::Points(_) => AttributeKind::Points,
            Attribute::Position(_) => AttributeKind::Position,
            Attribute::Rotation(_) => AttributeKind::Rotation,
            Attribute::Color(_) => AttributeKind::Color,
            Attribute::StrokeWidth(_) => AttributeKind::StrokeWidth,
            Attribute::Opacity(_) => AttributeKind::Opacity,
            Attribute::Orientation { .. } => AttributeKind::Orientation,
        }
    }
}

impl AttributeKind {
    /// Camera targets only take orientation, objects take everything else.
    pub fn fits(&self, target: Target) -> bool {
        match target {
            Target::Camera => *self == AttributeKind::Orientation,
            Target::Object(_) => *self != AttributeKind::Orientation,
        }
    }
}

pub trait VisualTarget {
    fn set_points(&mut self, id: ObjectId, points: Vec<Vec3>) -> Result<(), EngineError>;
    fn set_position(&mut self, id: ObjectId, position: Vec3) -> Result<(), EngineError>;
    fn set_rotation(&mut self, id: ObjectId, angles: Vec3) -> Result<(), EngineError>;
    fn set_color(&mut self, id: ObjectId, color: Color) -> Result<(), EngineError>;
    fn set_stroke_width(&mut self, id: ObjectId, width: f32) -> Result<(), EngineError>;
    fn set_opacity(&mut self, id: ObjectId, opacity: f32) -> Result<(), EngineError>;
    fn set_orientation(&mut self, phi: f32, theta: f32);

    /// Current value of an attribute, used to capture restore points.
    fn attribute(&self, target: Target, kind: AttributeKind) -> Option<Attribute>;
}

/// Routes one attribute value to the matching setter.
pub fn apply(sink: &mut dyn VisualTarget, target: Target, attribute: Attribute) -> Result<(), EngineError> {
    match (target, attribute) {
        (Target::Camera, Attribute::Orientation { phi, theta }) => {
            sink.set_orientation(phi, theta);
            Ok(())
        }
        (Target::Object(id), Attribute::Points(points)) => sink.set_points(id, points),
        (Target::Object(id), Attribute::Position(p)) => sink.set_position(id, p),
        (Target::Object(id), Attribute::Rotation(r)) => sink.set_rotation(id, r),
        (Target::Object(id), Attribute::Color(c)) => sink.set_color(id, c),
        (Target::Object(id), Attribute::StrokeWidth(w)) => sink.set_stroke_width(id, w),
        (Target::Object(id), Attribute::Opacity(o)) => sink.set_opacity(id, o),
        (target, attribute) => {
            warn!("dropping {:?} for {:?}: attribute does not apply", attribute.kind(), target);
            Ok(())
        }
    }
}
