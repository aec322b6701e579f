//! Sequential and parallel composition of segments.
//!
//! A [`Timeline`] owns its drivers and binding registry. Each `tick` is one
//! synchronous frame: the active phase's drivers advance exactly once, every
//! binding fires once against the post-advance values, and only then is
//! completion checked. A finished phase is torn down (bindings cleared,
//! restore points applied) before the next phase is set up on the following
//! tick, so two phases never write the same attribute in one frame.

use super::registry::{Registry, SegmentId};
use super::segment::{RestorePoint, Segment};
use super::target::VisualTarget;
use crate::error::EngineError;
use crate::gfx::anim::{DriverId, DriverSet, ProgressDriver, TIME_EPSILON};
use log::{debug, info, warn};
use std::collections::HashSet;

/// A step of the timeline: one segment or several running side by side.
#[derive(Debug, Clone)]
pub enum Phase {
    Single(Segment),
    Parallel { name: String, members: Vec<Segment> },
}

impl Phase {
    pub fn name(&self) -> &str {
        match self {
            Phase::Single(segment) => segment.name(),
            Phase::Parallel { name, .. } => name,
        }
    }

    pub fn members(&self) -> &[Segment] {
        match self {
            Phase::Single(segment) => std::slice::from_ref(segment),
            Phase::Parallel { members, .. } => members,
        }
    }

    /// Longest member duration.
    pub fn duration(&self) -> f32 {
        self.members().iter().map(Segment::duration).fold(0.0, f32::max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupWait {
    Single,
    /// Parallel phase still waiting on `remaining` members.
    WaitingAll { remaining: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineState {
    Pending,
    /// `started` is false between a teardown and the next tick.
    Running { phase: usize, started: bool, wait: GroupWait },
    Complete,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub frame: u64,
    pub time: f32,
    pub fired: usize,
    /// Name of the phase torn down during this tick.
    pub finished: Option<String>,
}

#[derive(Debug)]
struct ActiveMember {
    owner: SegmentId,
    elapsed: f64,
    started: Vec<bool>,
    restore: RestorePoint,
    complete: bool,
}

#[derive(Debug, Default)]
pub struct Timeline {
    drivers: DriverSet,
    registry: Registry,
    phases: Vec<Phase>,
    state: Option<TimelineState>,
    active: Vec<ActiveMember>,
    next_owner: usize,
    time: f32,
    frame: u64,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_driver(&mut self, name: impl Into<String>, initial: f32) -> DriverId {
        self.drivers.add(name, initial)
    }

    pub fn driver(&self, id: DriverId) -> Option<&ProgressDriver> {
        self.drivers.get(id)
    }

    pub fn drivers(&self) -> &DriverSet {
        &self.drivers
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn state(&self) -> TimelineState {
        self.state.unwrap_or(TimelineState::Pending)
    }

    pub fn is_complete(&self) -> bool {
        self.state() == TimelineState::Complete
    }

    /// Simulated seconds ticked so far.
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Sum of phase durations, ignoring frame quantization.
    pub fn total_duration(&self) -> f32 {
        self.phases.iter().map(Phase::duration).sum()
    }

    pub fn active_phase(&self) -> Option<&Phase> {
        match self.state() {
            TimelineState::Running { phase, .. } => self.phases.get(phase),
            _ => None,
        }
    }

    pub fn push(&mut self, segment: Segment) -> Result<(), EngineError> {
        self.check_drivers(&segment)?;
        self.phases.push(Phase::Single(segment));
        Ok(())
    }

    /// Adds segments that start together and finish when the slowest does.
    pub fn push_parallel(&mut self, name: impl Into<String>, members: Vec<Segment>) -> Result<(), EngineError> {
        let name = name.into();
        let mut drivers = HashSet::new();
        let mut written = HashSet::new();
        for member in &members {
            self.check_drivers(member)?;
            for driver in member.target_drivers() {
                if !drivers.insert(driver) {
                    return Err(EngineError::OwnershipConflict(format!(
                        "driver {} targeted by two members of '{}'",
                        driver.0, name
                    )));
                }
            }
            for attr in member.written_attributes() {
                if !written.insert(attr) {
                    return Err(EngineError::OwnershipConflict(format!(
                        "{:?} written by two members of '{}'",
                        attr, name
                    )));
                }
            }
        }
        if members.is_empty() {
            return Err(EngineError::EmptyTimeline);
        }
        self.phases.push(Phase::Parallel { name, members });
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.phases.is_empty() {
            return Err(EngineError::EmptyTimeline);
        }
        if self.state() == TimelineState::Pending {
            self.state = Some(TimelineState::Running {
                phase: 0,
                started: false,
                wait: GroupWait::Single,
            });
        }
        Ok(())
    }

    /// Advances the timeline by `dt` simulated seconds and produces one frame.
    pub fn tick(&mut self, dt: f32, sink: &mut dyn VisualTarget) -> TickReport {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.frame += 1;
        self.time += dt;

        let mut report = TickReport {
            frame: self.frame,
            time: self.time,
            ..TickReport::default()
        };

        if self.state() == TimelineState::Pending && self.start().is_err() {
            self.state = Some(TimelineState::Complete);
        }

        let phase = match self.state() {
            TimelineState::Running { phase, started, .. } => {
                if !started {
                    self.begin_phase(phase, sink);
                }
                phase
            }
            _ => return report,
        };

        self.advance_phase(phase, dt);
        report.fired = self.registry.fire_all(&self.drivers, sink);

        let remaining = self.update_completion(phase);
        if remaining == 0 {
            self.end_phase(phase, sink);
            report.finished = Some(self.phases[phase].name().to_string());
        } else if let Some(TimelineState::Running { wait, .. }) = self.state.as_mut() {
            if let GroupWait::WaitingAll { remaining: r } = wait {
                *r = remaining;
            }
        }

        debug!(
            "frame {} t={:.3} fired {} bindings, state {:?}",
            report.frame,
            report.time,
            report.fired,
            self.state()
        );
        report
    }

    /// Force-completes the active phase: every driver jumps to its final
    /// target, bindings fire once at those values, and the phase is torn
    /// down. The next phase begins on the following tick.
    pub fn cancel(&mut self, sink: &mut dyn VisualTarget) {
        if self.state() == TimelineState::Pending && self.start().is_err() {
            self.state = Some(TimelineState::Complete);
            return;
        }
        let phase = match self.state() {
            TimelineState::Running { phase, started, .. } => {
                if !started {
                    self.begin_phase(phase, sink);
                }
                phase
            }
            _ => return,
        };

        info!("cancelling '{}'", self.phases[phase].name());
        for (member, active) in self.phases[phase].members().iter().zip(&self.active) {
            for (t, target) in member.targets().iter().enumerate() {
                if let Some(driver) = self.drivers.get_mut(target.driver) {
                    if !active.started[t] {
                        driver.set_target(target.value, member.target_duration(target), member.target_easing(target));
                    }
                    driver.finish();
                }
            }
        }
        self.registry.fire_all(&self.drivers, sink);
        self.end_phase(phase, sink);
    }

    /// Tears down whatever is running and rewinds every driver.
    pub fn restart(&mut self, sink: &mut dyn VisualTarget) {
        if let Some(TimelineState::Running { phase, started: true, .. }) = self.state {
            self.teardown(phase, sink);
        }
        self.active.clear();
        self.drivers.reset_all();
        self.state = Some(TimelineState::Pending);
        self.time = 0.0;
        self.frame = 0;
        info!("timeline restarted");
    }

    fn check_drivers(&self, segment: &Segment) -> Result<(), EngineError> {
        match segment.drivers().find(|d| !self.drivers.contains(*d)) {
            Some(unknown) => Err(EngineError::UnknownDriver(unknown.0)),
            None => Ok(()),
        }
    }

    fn begin_phase(&mut self, index: usize, sink: &mut dyn VisualTarget) {
        let phase = &self.phases[index];
        info!("begin '{}' ({:.2}s)", phase.name(), phase.duration());

        self.active.clear();
        for member in phase.members() {
            let owner = SegmentId(self.next_owner);
            self.next_owner += 1;
            for &(driver, value) in member.resets() {
                if let Some(d) = self.drivers.get_mut(driver) {
                    d.reset(value);
                }
            }
            let restore = RestorePoint::capture(member.restore_entries(), sink);
            for binding in member.bindings() {
                self.registry
                    .register(owner, binding.driver, binding.target, binding.kind, binding.derive.clone());
            }

            let mut started = vec![false; member.targets().len()];
            for (t, target) in member.targets().iter().enumerate() {
                if target.delay <= 0.0 {
                    if let Some(d) = self.drivers.get_mut(target.driver) {
                        d.set_target(target.value, member.target_duration(target), member.target_easing(target));
                    }
                    started[t] = true;
                }
            }

            self.active.push(ActiveMember {
                owner,
                elapsed: 0.0,
                started,
                restore,
                complete: false,
            });
        }

        let wait = match phase {
            Phase::Single(_) => GroupWait::Single,
            Phase::Parallel { members, .. } => GroupWait::WaitingAll { remaining: members.len() },
        };
        self.state = Some(TimelineState::Running {
            phase: index,
            started: true,
            wait,
        });
    }

    /// Advances every driver of the phase once. A staggered target whose
    /// delay falls inside this tick starts at its delay and advances by the
    /// remainder.
    fn advance_phase(&mut self, index: usize, dt: f32) {
        let phase = &self.phases[index];
        for (member, active) in phase.members().iter().zip(self.active.iter_mut()) {
            let after = active.elapsed + f64::from(dt);
            active.elapsed = after;

            let mut in_flight: Vec<DriverId> = Vec::new();
            for (t, target) in member.targets().iter().enumerate() {
                if active.started[t] && !in_flight.contains(&target.driver) {
                    in_flight.push(target.driver);
                }
            }
            for driver in &in_flight {
                if let Some(d) = self.drivers.get_mut(*driver) {
                    d.advance(dt);
                }
            }

            for (t, target) in member.targets().iter().enumerate() {
                let delay = f64::from(target.delay);
                if active.started[t] || delay > after + TIME_EPSILON {
                    continue;
                }
                if let Some(d) = self.drivers.get_mut(target.driver) {
                    d.set_target(target.value, member.target_duration(target), member.target_easing(target));
                    d.advance((after - delay).max(0.0) as f32);
                }
                active.started[t] = true;
            }
        }
    }

    /// Marks finished members and returns how many are still running.
    fn update_completion(&mut self, index: usize) -> usize {
        let phase = &self.phases[index];
        let mut remaining = 0;
        for (member, active) in phase.members().iter().zip(self.active.iter_mut()) {
            if !active.complete {
                let all_started = active.started.iter().all(|s| *s);
                let drivers_done = member
                    .targets()
                    .iter()
                    .all(|t| self.drivers.get(t.driver).map_or(true, ProgressDriver::is_complete));
                let time_done = active.elapsed + TIME_EPSILON >= f64::from(member.duration());
                active.complete = all_started && drivers_done && time_done;
                if active.complete {
                    debug!("'{}' finished, holding for its group", member.name());
                }
            }
            if !active.complete {
                remaining += 1;
            }
        }
        remaining
    }

    fn end_phase(&mut self, index: usize, sink: &mut dyn VisualTarget) {
        self.teardown(index, sink);
        info!("end '{}' at t={:.3}", self.phases[index].name(), self.time);

        let next = index + 1;
        self.state = Some(if next < self.phases.len() {
            TimelineState::Running {
                phase: next,
                started: false,
                wait: GroupWait::Single,
            }
        } else {
            info!("timeline complete after {} frames", self.frame);
            TimelineState::Complete
        });
    }

    fn teardown(&mut self, index: usize, sink: &mut dyn VisualTarget) {
        for active in self.active.drain(..) {
            self.registry.clear_all_for_segment(active.owner);
            active.restore.restore(sink);
        }
        if self.registry.len() > 0 {
            warn!(
                "{} bindings outlived '{}'",
                self.registry.len(),
                self.phases[index].name()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::registry::tests::Recorder;
    use crate::engine::segment::DriverTarget;
    use crate::engine::target::{Attribute, AttributeKind, ObjectId, Target};
    use crate::gfx::anim::Easing;
    use crate::gfx::math::Vec3;

    const OBJ: Target = Target::Object(ObjectId(0));

    fn opacity_segment(tl: &mut Timeline, name: &str, duration: f32) -> (DriverId, Segment) {
        let d = tl.add_driver(name, 0.0);
        let seg = Segment::builder(name)
            .duration(duration)
            .target(d, 1.0)
            .bind(d, OBJ, AttributeKind::Opacity, Attribute::Opacity)
            .build()
            .unwrap();
        (d, seg)
    }

    #[test]
    fn test_sequential_order() {
        let mut tl = Timeline::new();
        let (a, seg_a) = opacity_segment(&mut tl, "a", 0.5);
        let (b, seg_b) = opacity_segment(&mut tl, "b", 0.5);
        tl.push(seg_a).unwrap();
        tl.push(seg_b).unwrap();

        let mut sink = Recorder::default();
        let report = tl.tick(0.5, &mut sink);
        assert_eq!(report.finished.as_deref(), Some("a"));
        assert_eq!(tl.driver(a).unwrap().value(), 1.0);
        assert_eq!(tl.driver(b).unwrap().value(), 0.0);
        assert!(tl.registry().is_empty());

        tl.tick(0.25, &mut sink);
        assert!((tl.driver(b).unwrap().value() - 0.5).abs() < 1e-6);
        tl.tick(0.25, &mut sink);
        assert!(tl.is_complete());

        let frames = tl.frame();
        let after = tl.tick(1.0, &mut sink);
        assert_eq!(after.fired, 0);
        assert_eq!(after.frame, frames + 1);
    }

    #[test]
    fn test_phase_ends_on_its_last_frame_at_60fps() {
        let mut tl = Timeline::new();
        let (_, seg) = opacity_segment(&mut tl, "fade", 1.0);
        tl.push(seg).unwrap();

        let mut sink = Recorder::default();
        for _ in 0..59 {
            assert_eq!(tl.tick(1.0 / 60.0, &mut sink).finished, None);
        }
        let last = tl.tick(1.0 / 60.0, &mut sink);
        assert_eq!(last.finished.as_deref(), Some("fade"));
        assert_eq!(last.frame, 60);
    }

    #[test]
    fn test_stagger_inside_one_segment() {
        let mut tl = Timeline::new();
        let pulse = tl.add_driver("pulse", 0.0);
        let motion = tl.add_driver("motion", 0.0);
        let seg = Segment::builder("pulse-then-move")
            .target_with(DriverTarget::new(pulse, 1.0).duration(0.5).easing(Easing::ThereAndBack))
            .target_with(DriverTarget::new(motion, 3.0).delay(0.5).duration(1.5))
            .build()
            .unwrap();
        tl.push(seg).unwrap();

        let mut sink = Recorder::default();
        tl.tick(0.25, &mut sink);
        assert!((tl.driver(pulse).unwrap().value() - 1.0).abs() < 1e-6);
        assert_eq!(tl.driver(motion).unwrap().value(), 0.0);

        tl.tick(0.5, &mut sink);
        assert_eq!(tl.driver(pulse).unwrap().value(), 0.0);
        assert!((tl.driver(motion).unwrap().value() - 0.5).abs() < 1e-5);

        tl.tick(1.25, &mut sink);
        assert_eq!(tl.driver(motion).unwrap().value(), 3.0);
        assert!(tl.is_complete());
    }

    #[test]
    fn test_parallel_group_waits_for_slowest() {
        let mut tl = Timeline::new();
        let (a, seg_a) = opacity_segment(&mut tl, "a", 2.0);
        let b = tl.add_driver("b", 0.0);
        let seg_b = Segment::builder("b")
            .duration(3.0)
            .target(b, 1.0)
            .bind(b, Target::Object(ObjectId(1)), AttributeKind::Opacity, Attribute::Opacity)
            .build()
            .unwrap();
        tl.push_parallel("group", vec![seg_a, seg_b]).unwrap();

        let mut sink = Recorder::default();
        for _ in 0..5 {
            tl.tick(0.5, &mut sink);
        }
        assert_eq!(tl.driver(a).unwrap().value(), 1.0);
        assert!(tl.driver(a).unwrap().is_complete());
        assert!(!tl.driver(b).unwrap().is_complete());
        assert_eq!(
            tl.state(),
            TimelineState::Running {
                phase: 0,
                started: true,
                wait: GroupWait::WaitingAll { remaining: 1 }
            }
        );
        assert_eq!(tl.registry().len(), 2);

        let report = tl.tick(0.5, &mut sink);
        assert_eq!(report.finished.as_deref(), Some("group"));
        assert!(tl.is_complete());
        assert!(tl.registry().is_empty());
    }

    #[test]
    fn test_parallel_rejects_shared_driver() {
        let mut tl = Timeline::new();
        let d = tl.add_driver("shared", 0.0);
        let one = Segment::builder("one").duration(1.0).target(d, 1.0).build().unwrap();
        let two = Segment::builder("two").duration(1.0).target(d, 2.0).build().unwrap();
        assert!(matches!(
            tl.push_parallel("clash", vec![one, two]),
            Err(EngineError::OwnershipConflict(_))
        ));
    }

    #[test]
    fn test_unknown_driver_rejected() {
        let mut tl = Timeline::new();
        let seg = Segment::builder("ghost")
            .duration(1.0)
            .target(DriverId(9), 1.0)
            .build()
            .unwrap();
        assert_eq!(tl.push(seg), Err(EngineError::UnknownDriver(9)));
    }

    #[test]
    fn test_empty_timeline() {
        let mut tl = Timeline::new();
        assert_eq!(tl.start(), Err(EngineError::EmptyTimeline));
        let mut sink = Recorder::default();
        tl.tick(0.1, &mut sink);
        assert!(tl.is_complete());
    }

    #[test]
    fn test_restore_point_applied_at_teardown() {
        let mut tl = Timeline::new();
        let bob = tl.add_driver("bob", 0.0);
        let home = Vec3::new(-3.8, 0.0, 0.0);
        let seg = Segment::builder("walk")
            .duration(1.0)
            .target(bob, 1.0)
            .bind(bob, OBJ, AttributeKind::Position, move |v| {
                Attribute::Position(home + Vec3::new(0.1 * v, 0.0, 0.0))
            })
            .restore_captured(OBJ, AttributeKind::Position)
            .build()
            .unwrap();
        tl.push(seg).unwrap();

        let mut sink = Recorder::default();
        sink.calls.push((OBJ, Attribute::Position(home)));
        tl.tick(0.5, &mut sink);
        assert_ne!(sink.last_for(OBJ, AttributeKind::Position), Some(&Attribute::Position(home)));
        tl.tick(0.5, &mut sink);
        assert_eq!(sink.last_for(OBJ, AttributeKind::Position), Some(&Attribute::Position(home)));
    }

    #[test]
    fn test_restart_rewinds_drivers() {
        let mut tl = Timeline::new();
        let (a, seg) = opacity_segment(&mut tl, "a", 1.0);
        tl.push(seg).unwrap();
        let mut sink = Recorder::default();
        tl.tick(0.5, &mut sink);
        tl.restart(&mut sink);
        assert_eq!(tl.driver(a).unwrap().value(), 0.0);
        assert_eq!(tl.state(), TimelineState::Pending);
        assert!(tl.registry().is_empty());
        tl.tick(1.0, &mut sink);
        assert!(tl.is_complete());
    }
}
