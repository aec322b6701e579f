//! Named timeline phases and their validation.

use super::registry::DeriveFn;
use super::target::{apply, Attribute, AttributeKind, Target, VisualTarget};
use crate::error::EngineError;
use crate::gfx::anim::{DriverId, Easing};
use log::warn;
use std::collections::HashSet;
use std::rc::Rc;

/// One driver transition scheduled inside a segment.
#[derive(Debug, Clone, Copy)]
pub struct DriverTarget {
    pub driver: DriverId,
    pub value: f32,
    /// Seconds after segment start before the transition begins.
    pub delay: f32,
    pub duration: Option<f32>,
    pub easing: Option<Easing>,
}

impl DriverTarget {
    pub fn new(driver: DriverId, value: f32) -> Self {
        Self {
            driver,
            value,
            delay: 0.0,
            duration: None,
            easing: None,
        }
    }

    pub fn delay(mut self, seconds: f32) -> Self {
        self.delay = seconds;
        self
    }

    pub fn duration(mut self, seconds: f32) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn easing(mut self, easing: Easing) -> Self {
        self.easing = Some(easing);
        self
    }
}

#[derive(Clone)]
pub struct BindingSpec {
    pub driver: DriverId,
    pub target: Target,
    pub kind: AttributeKind,
    pub derive: DeriveFn,
}

impl std::fmt::Debug for BindingSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingSpec")
            .field("driver", &self.driver)
            .field("target", &self.target)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RestoreEntry {
    /// Read the attribute when the segment starts.
    Capture { target: Target, kind: AttributeKind },
    Value { target: Target, attribute: Attribute },
}

/// Attribute values to put back when a segment is torn down.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestorePoint {
    saved: Vec<(Target, Attribute)>,
}

impl RestorePoint {
    pub fn capture(entries: &[RestoreEntry], sink: &dyn VisualTarget) -> Self {
        let saved = entries
            .iter()
            .filter_map(|entry| match entry {
                RestoreEntry::Capture { target, kind } => match sink.attribute(*target, *kind) {
                    Some(attribute) => Some((*target, attribute)),
                    None => {
                        warn!("nothing to capture for {:?} {:?}", target, kind);
                        None
                    }
                },
                RestoreEntry::Value { target, attribute } => Some((*target, attribute.clone())),
            })
            .collect();
        Self { saved }
    }

    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }

    pub fn restore(&self, sink: &mut dyn VisualTarget) {
        for (target, attribute) in &self.saved {
            if let Err(err) = apply(sink, *target, attribute.clone()) {
                warn!("restore of {:?} failed: {}", target, err);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Segment {
    name: String,
    duration: f32,
    explicit_duration: Option<f32>,
    easing: Easing,
    targets: Vec<DriverTarget>,
    bindings: Vec<BindingSpec>,
    resets: Vec<(DriverId, f32)>,
    restore: Vec<RestoreEntry>,
}

impl Segment {
    pub fn builder(name: impl Into<String>) -> SegmentBuilder {
        SegmentBuilder {
            name: name.into(),
            duration: None,
            easing: Easing::Linear,
            targets: Vec::new(),
            bindings: Vec::new(),
            resets: Vec::new(),
            restore: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Time until the last transition ends, or the explicit duration if longer.
    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn easing(&self) -> Easing {
        self.easing
    }

    /// Targets ordered by delay.
    pub fn targets(&self) -> &[DriverTarget] {
        &self.targets
    }

    pub fn bindings(&self) -> &[BindingSpec] {
        &self.bindings
    }

    pub fn resets(&self) -> &[(DriverId, f32)] {
        &self.resets
    }

    pub fn restore_entries(&self) -> &[RestoreEntry] {
        &self.restore
    }

    pub fn target_duration(&self, target: &DriverTarget) -> f32 {
        target
            .duration
            .or(self.explicit_duration)
            .unwrap_or(self.duration - target.delay)
    }

    pub fn target_easing(&self, target: &DriverTarget) -> Easing {
        target.easing.unwrap_or(self.easing)
    }

    pub fn drivers(&self) -> impl Iterator<Item = DriverId> + '_ {
        self.targets
            .iter()
            .map(|t| t.driver)
            .chain(self.bindings.iter().map(|b| b.driver))
            .chain(self.resets.iter().map(|r| r.0))
    }

    /// Every (target, attribute) this segment writes to.
    pub fn written_attributes(&self) -> impl Iterator<Item = (Target, AttributeKind)> + '_ {
        self.bindings.iter().map(|b| (b.target, b.kind))
    }

    pub(crate) fn target_drivers(&self) -> HashSet<DriverId> {
        self.targets.iter().map(|t| t.driver).collect()
    }
}

pub struct SegmentBuilder {
    name: String,
    duration: Option<f32>,
    easing: Easing,
    targets: Vec<DriverTarget>,
    bindings: Vec<BindingSpec>,
    resets: Vec<(DriverId, f32)>,
    restore: Vec<RestoreEntry>,
}

impl SegmentBuilder {
    pub fn duration(mut self, seconds: f32) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    /// Moves `driver` to `value` over the segment's duration and easing.
    pub fn target(self, driver: DriverId, value: f32) -> Self {
        self.target_with(DriverTarget::new(driver, value))
    }

    pub fn target_with(mut self, target: DriverTarget) -> Self {
        self.targets.push(target);
        self
    }

    pub fn bind<F>(mut self, driver: DriverId, target: Target, kind: AttributeKind, derive: F) -> Self
    where
        F: Fn(f32) -> Attribute + 'static,
    {
        self.bindings.push(BindingSpec {
            driver,
            target,
            kind,
            derive: Rc::new(derive),
        });
        self
    }

    /// Hard-sets `driver` when the segment starts, before any transition.
    pub fn reset(mut self, driver: DriverId, value: f32) -> Self {
        self.resets.push((driver, value));
        self
    }

    /// Saves the current attribute at start and writes it back at teardown.
    pub fn restore_captured(mut self, target: Target, kind: AttributeKind) -> Self {
        self.restore.push(RestoreEntry::Capture { target, kind });
        self
    }

    pub fn restore_value(mut self, target: Target, attribute: Attribute) -> Self {
        self.restore.push(RestoreEntry::Value { target, attribute });
        self
    }

    pub fn build(mut self) -> Result<Segment, EngineError> {
        let invalid = |duration: f32| EngineError::InvalidDuration {
            segment: self.name.clone(),
            duration,
        };

        if let Some(d) = self.duration {
            if !d.is_finite() || d <= 0.0 {
                return Err(invalid(d));
            }
        }
        self.easing.validate()?;

        let mut end = 0.0f32;
        for target in &self.targets {
            if !target.delay.is_finite() || target.delay < 0.0 {
                return Err(invalid(target.delay));
            }
            if let Some(d) = target.duration {
                if !d.is_finite() || d <= 0.0 {
                    return Err(invalid(d));
                }
            }
            if let Some(easing) = target.easing {
                easing.validate()?;
            }
            let length = target.duration.or(self.duration).unwrap_or(0.0);
            end = end.max(target.delay + length);
        }

        let duration = self.duration.unwrap_or(0.0).max(end);
        if duration <= 0.0 {
            return Err(invalid(duration));
        }
        for target in &self.targets {
            if target.duration.is_none() && duration - target.delay <= 0.0 {
                return Err(invalid(duration - target.delay));
            }
        }

        let mut written = HashSet::new();
        for binding in &self.bindings {
            if !binding.kind.fits(binding.target) {
                return Err(EngineError::InvalidBinding(format!(
                    "{:?} cannot be written on {:?} in '{}'",
                    binding.kind, binding.target, self.name
                )));
            }
            if !written.insert((binding.target, binding.kind)) {
                return Err(EngineError::OwnershipConflict(format!(
                    "{:?} {:?} bound twice in '{}'",
                    binding.target, binding.kind, self.name
                )));
            }
        }

        self.targets.sort_by(|a, b| a.delay.total_cmp(&b.delay));

        Ok(Segment {
            name: self.name,
            duration,
            explicit_duration: self.duration,
            easing: self.easing,
            targets: self.targets,
            bindings: self.bindings,
            resets: self.resets,
            restore: self.restore,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::registry::tests::Recorder;
    use crate::engine::target::ObjectId;
    use crate::gfx::math::Vec3;

    const D0: DriverId = DriverId(0);
    const D1: DriverId = DriverId(1);

    #[test]
    fn test_duration_comes_from_longest_target() {
        let seg = Segment::builder("rotate")
            .duration(2.0)
            .target(D0, 1.0)
            .target_with(DriverTarget::new(D1, 1.0).duration(4.0))
            .build()
            .unwrap();
        assert_eq!(seg.duration(), 4.0);
        assert_eq!(seg.target_duration(&seg.targets()[0]), 2.0);
        assert_eq!(seg.target_duration(&seg.targets()[1]), 4.0);
    }

    #[test]
    fn test_stagger_is_sorted_by_delay() {
        let seg = Segment::builder("pulse-then-move")
            .target_with(DriverTarget::new(D1, 1.0).delay(0.5).duration(1.5))
            .target_with(DriverTarget::new(D0, 1.0).duration(0.5))
            .build()
            .unwrap();
        assert_eq!(seg.duration(), 2.0);
        assert_eq!(seg.targets()[0].driver, D0);
        assert_eq!(seg.targets()[1].delay, 0.5);
    }

    #[test]
    fn test_rejects_non_positive_durations() {
        assert!(matches!(
            Segment::builder("bad").duration(0.0).build(),
            Err(EngineError::InvalidDuration { .. })
        ));
        assert!(matches!(
            Segment::builder("bad").target_with(DriverTarget::new(D0, 1.0).duration(-1.0)).build(),
            Err(EngineError::InvalidDuration { .. })
        ));
        assert!(matches!(
            Segment::builder("empty").build(),
            Err(EngineError::InvalidDuration { .. })
        ));
        assert!(matches!(
            Segment::builder("nan").duration(f32::NAN).build(),
            Err(EngineError::InvalidDuration { .. })
        ));
    }

    #[test]
    fn test_rejects_degenerate_easing() {
        let result = Segment::builder("bad")
            .duration(1.0)
            .easing(Easing::Custom(|t| t + 1.0))
            .build();
        assert!(matches!(result, Err(EngineError::DegenerateEasing { .. })));
    }

    #[test]
    fn test_rejects_double_binding() {
        let target = Target::Object(ObjectId(4));
        let result = Segment::builder("twice")
            .duration(1.0)
            .bind(D0, target, AttributeKind::Opacity, Attribute::Opacity)
            .bind(D1, target, AttributeKind::Opacity, Attribute::Opacity)
            .build();
        assert!(matches!(result, Err(EngineError::OwnershipConflict(_))));
    }

    #[test]
    fn test_rejects_camera_color() {
        let result = Segment::builder("camera")
            .duration(1.0)
            .bind(D0, Target::Camera, AttributeKind::Color, |_| Attribute::Opacity(0.0))
            .build();
        assert!(matches!(result, Err(EngineError::InvalidBinding(_))));
    }

    #[test]
    fn test_restore_point_round_trip() {
        let target = Target::Object(ObjectId(0));
        let mut sink = Recorder::default();
        sink.calls.push((target, Attribute::Position(Vec3::new(1.0, 2.0, 3.0))));

        let entries = vec![
            RestoreEntry::Capture { target, kind: AttributeKind::Position },
            RestoreEntry::Value { target, attribute: Attribute::Opacity(1.0) },
        ];
        let point = RestorePoint::capture(&entries, &sink);
        sink.calls.push((target, Attribute::Position(Vec3::ZERO)));
        point.restore(&mut sink);

        assert_eq!(
            sink.last_for(target, AttributeKind::Position),
            Some(&Attribute::Position(Vec3::new(1.0, 2.0, 3.0)))
        );
        assert_eq!(sink.last_for(target, AttributeKind::Opacity), Some(&Attribute::Opacity(1.0)));
    }
}
