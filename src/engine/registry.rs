//! Per-frame fan-out from driver values to visual attributes.

use super::target::{apply, Attribute, AttributeKind, Target, VisualTarget};
use crate::error::EngineError;
use crate::gfx::anim::{DriverId, DriverSet};
use log::{debug, warn};
use std::rc::Rc;

/// Pure mapping from a driver value to one attribute value.
pub type DeriveFn = Rc<dyn Fn(f32) -> Attribute>;

/// Identifies the segment that installed a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentId(pub usize);

/// Handle returned by [`Registry::register`]. Handles are never reused, so a
/// handle outliving its binding can always be detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingHandle(u64);

impl BindingHandle {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

struct Binding {
    handle: BindingHandle,
    owner: SegmentId,
    driver: DriverId,
    target: Target,
    kind: AttributeKind,
    derive: DeriveFn,
}

#[derive(Default)]
pub struct Registry {
    bindings: Vec<Binding>,
    next_handle: u64,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("bindings", &self.bindings.len())
            .field("next_handle", &self.next_handle)
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        owner: SegmentId,
        driver: DriverId,
        target: Target,
        kind: AttributeKind,
        derive: DeriveFn,
    ) -> BindingHandle {
        let handle = BindingHandle(self.next_handle);
        self.next_handle += 1;
        self.bindings.push(Binding {
            handle,
            owner,
            driver,
            target,
            kind,
            derive,
        });
        handle
    }

    /// Returns false if the handle was not registered.
    pub fn unregister(&mut self, handle: BindingHandle) -> bool {
        let before = self.bindings.len();
        self.bindings.retain(|b| b.handle != handle);
        before != self.bindings.len()
    }

    /// Removes every binding owned by `owner`, returning how many were removed.
    pub fn clear_all_for_segment(&mut self, owner: SegmentId) -> usize {
        let before = self.bindings.len();
        self.bindings.retain(|b| b.owner != owner);
        let removed = before - self.bindings.len();
        if removed > 0 {
            debug!("cleared {} bindings of segment {:?}", removed, owner);
        }
        removed
    }

    pub fn is_registered(&self, handle: BindingHandle) -> bool {
        self.bindings.iter().any(|b| b.handle == handle)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn count_for_segment(&self, owner: SegmentId) -> usize {
        self.bindings.iter().filter(|b| b.owner == owner).count()
    }

    /// Fires a single binding. A handle that was unregistered is a no-op that
    /// reports `StaleBindingUpdate`.
    pub fn fire(
        &self,
        handle: BindingHandle,
        drivers: &DriverSet,
        sink: &mut dyn VisualTarget,
    ) -> Result<(), EngineError> {
        match self.bindings.iter().find(|b| b.handle == handle) {
            Some(binding) => Self::fire_binding(binding, drivers, sink),
            None => {
                let err = EngineError::StaleBindingUpdate(handle.raw());
                if cfg!(debug_assertions) {
                    warn!("{} (leaked handle or teardown ordering bug)", err);
                }
                Err(err)
            }
        }
    }

    /// Invokes every binding once, in registration order. Returns the number fired.
    pub fn fire_all(&self, drivers: &DriverSet, sink: &mut dyn VisualTarget) -> usize {
        let mut fired = 0;
        for binding in &self.bindings {
            match Self::fire_binding(binding, drivers, sink) {
                Ok(()) => fired += 1,
                Err(err) => warn!("binding {} skipped: {}", binding.handle.raw(), err),
            }
        }
        fired
    }

    /// Advances every driver once, then fires every binding once.
    pub fn tick(&self, dt: f32, drivers: &mut DriverSet, sink: &mut dyn VisualTarget) -> usize {
        drivers.advance_all(dt);
        self.fire_all(drivers, sink)
    }

    fn fire_binding(
        binding: &Binding,
        drivers: &DriverSet,
        sink: &mut dyn VisualTarget,
    ) -> Result<(), EngineError> {
        let value = drivers
            .value(binding.driver)
            .ok_or(EngineError::UnknownDriver(binding.driver.0))?;
        let attribute = (binding.derive)(value);
        if attribute.kind() != binding.kind {
            return Err(EngineError::InvalidBinding(format!(
                "produced {:?} but declared {:?}",
                attribute.kind(),
                binding.kind
            )));
        }
        apply(sink, binding.target, attribute)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::engine::target::ObjectId;
    use crate::gfx::anim::Easing;
    use crate::gfx::math::{Color, Vec3};

    /// Records every setter call in order.
    #[derive(Default)]
    pub(crate) struct Recorder {
        pub calls: Vec<(Target, Attribute)>,
    }

    impl Recorder {
        fn push(&mut self, id: ObjectId, attribute: Attribute) -> Result<(), EngineError> {
            self.calls.push((Target::Object(id), attribute));
            Ok(())
        }

        pub(crate) fn last_for(&self, target: Target, kind: AttributeKind) -> Option<&Attribute> {
            self.calls
                .iter()
                .rev()
                .find(|(t, a)| *t == target && a.kind() == kind)
                .map(|(_, a)| a)
        }
    }

    impl VisualTarget for Recorder {
        fn set_points(&mut self, id: ObjectId, points: Vec<Vec3>) -> Result<(), EngineError> {
            self.push(id, Attribute::Points(points))
        }
        fn set_position(&mut self, id: ObjectId, position: Vec3) -> Result<(), EngineError> {
            self.push(id, Attribute::Position(position))
        }
        fn set_rotation(&mut self, id: ObjectId, angles: Vec3) -> Result<(), EngineError> {
            self.push(id, Attribute::Rotation(angles))
        }
        fn set_color(&mut self, id: ObjectId, color: Color) -> Result<(), EngineError> {
            self.push(id, Attribute::Color(color))
        }
        fn set_stroke_width(&mut self, id: ObjectId, width: f32) -> Result<(), EngineError> {
            self.push(id, Attribute::StrokeWidth(width))
        }
        fn set_opacity(&mut self, id: ObjectId, opacity: f32) -> Result<(), EngineError> {
            self.push(id, Attribute::Opacity(opacity))
        }
        fn set_orientation(&mut self, phi: f32, theta: f32) {
            self.calls.push((Target::Camera, Attribute::Orientation { phi, theta }));
        }
        fn attribute(&self, target: Target, kind: AttributeKind) -> Option<Attribute> {
            self.last_for(target, kind).cloned()
        }
    }

    fn opacity(v: f32) -> Attribute {
        Attribute::Opacity(v)
    }

    #[test]
    fn test_tick_fires_in_registration_order_with_one_value() {
        let mut drivers = DriverSet::new();
        let d = drivers.add("fade", 0.0);
        drivers.get_mut(d).unwrap().set_target(1.0, 1.0, Easing::Linear);

        let mut registry = Registry::new();
        let a = Target::Object(ObjectId(1));
        let b = Target::Object(ObjectId(2));
        registry.register(SegmentId(0), d, a, AttributeKind::Opacity, Rc::new(opacity));
        registry.register(SegmentId(0), d, b, AttributeKind::Opacity, Rc::new(opacity));

        let mut sink = Recorder::default();
        assert_eq!(registry.tick(0.25, &mut drivers, &mut sink), 2);
        assert_eq!(sink.calls.len(), 2);
        assert_eq!(sink.calls[0], (a, Attribute::Opacity(0.25)));
        assert_eq!(sink.calls[1], (b, Attribute::Opacity(0.25)));
    }

    #[test]
    fn test_unregistered_handle_is_rejected() {
        let mut drivers = DriverSet::new();
        let d = drivers.add("x", 0.5);
        let mut registry = Registry::new();
        let h = registry.register(
            SegmentId(3),
            d,
            Target::Object(ObjectId(0)),
            AttributeKind::Opacity,
            Rc::new(opacity),
        );
        assert!(registry.unregister(h));
        assert!(!registry.unregister(h));

        let mut sink = Recorder::default();
        assert_eq!(
            registry.fire(h, &drivers, &mut sink),
            Err(EngineError::StaleBindingUpdate(h.raw()))
        );
        assert!(sink.calls.is_empty());
    }

    #[test]
    fn test_clear_all_for_segment_keeps_others() {
        let mut drivers = DriverSet::new();
        let d = drivers.add("x", 0.0);
        let mut registry = Registry::new();
        let t = Target::Object(ObjectId(0));
        let old = registry.register(SegmentId(0), d, t, AttributeKind::Opacity, Rc::new(opacity));
        let kept = registry.register(SegmentId(1), d, t, AttributeKind::Opacity, Rc::new(opacity));

        assert_eq!(registry.clear_all_for_segment(SegmentId(0)), 1);
        assert!(!registry.is_registered(old));
        assert!(registry.is_registered(kept));

        let mut sink = Recorder::default();
        assert_eq!(registry.fire_all(&drivers, &mut sink), 1);
    }

    #[test]
    fn test_mismatched_attribute_is_not_counted() {
        let mut drivers = DriverSet::new();
        let d = drivers.add("x", 0.0);
        let mut registry = Registry::new();
        let t = Target::Object(ObjectId(0));
        let wrong = registry.register(SegmentId(0), d, t, AttributeKind::Color, Rc::new(opacity));
        registry.register(SegmentId(0), d, t, AttributeKind::Opacity, Rc::new(opacity));

        let mut sink = Recorder::default();
        assert_eq!(registry.fire_all(&drivers, &mut sink), 1);
        assert_eq!(sink.calls, vec![(t, Attribute::Opacity(0.0))]);
        assert!(matches!(
            registry.fire(wrong, &drivers, &mut sink),
            Err(EngineError::InvalidBinding(_))
        ));
        assert_eq!(sink.calls.len(), 1);
    }
}
