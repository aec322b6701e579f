use crate::error::EngineError;
use log::trace;

/// Rate curves mapping normalized time to normalized progress.
#[derive(Debug, Clone, Copy, Default)]
pub enum Easing {
    #[default]
    Linear,
    EaseInQuad,
    EaseOutQuad,
    EaseInOutQuad,
    /// Smoothstep, the usual default for object moves.
    Smooth,
    /// Out to 1 at the midpoint, back to 0 at the end. Used for pulses.
    ThereAndBack,
    Custom(fn(f32) -> f32),
}

impl Easing {
    /// Whether `ease(self, 1.0)` lands on the transition target.
    pub fn ends_at_target(&self) -> bool {
        match self {
            Easing::ThereAndBack => false,
            Easing::Custom(f) => (f(1.0) - 1.0).abs() < 1e-6,
            _ => true,
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if let Easing::Custom(f) = self {
            let (start, end) = (f(0.0), f(1.0));
            if !start.is_finite() || !end.is_finite() || start.abs() > 1e-6 {
                return Err(EngineError::DegenerateEasing { start, end });
            }
        }
        Ok(())
    }
}

fn smooth(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

pub fn ease(easing: Easing, t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);

    match easing {
        Easing::Linear => t,
        Easing::EaseInQuad => t * t,
        Easing::EaseOutQuad => 1.0 - (1.0 - t).powi(2),
        Easing::EaseInOutQuad => {
            if t < 0.5 {
                2.0 * t * t
            } else {
                1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
            }
        }
        Easing::Smooth => smooth(t),
        Easing::ThereAndBack => {
            let folded = if t < 0.5 { 2.0 * t } else { 2.0 - 2.0 * t };
            smooth(folded)
        }
        Easing::Custom(f) => f(t),
    }
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Slack for comparing accumulated simulated time against a duration.
///
/// Frame steps like 1/60 are not representable, so summed steps land a hair
/// short of the boundary they were meant to hit.
pub const TIME_EPSILON: f64 = 1e-6;

/// Index of a driver inside its owning timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DriverId(pub usize);

/// A scalar eased from its current value towards a target over simulated time.
///
/// The value is a pure function of elapsed time inside a transition and is
/// held at the terminal value once the transition completes.
#[derive(Debug, Clone)]
pub struct ProgressDriver {
    id: DriverId,
    name: String,
    value: f32,
    start: f32,
    target: f32,
    easing: Easing,
    elapsed: f64,
    duration: f32,
}

impl ProgressDriver {
    pub fn new(id: DriverId, name: impl Into<String>, initial: f32) -> Self {
        Self {
            id,
            name: name.into(),
            value: initial,
            start: initial,
            target: initial,
            easing: Easing::Linear,
            elapsed: 0.0,
            duration: 0.0,
        }
    }

    pub fn id(&self) -> DriverId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed as f32
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Starts a transition from the current value. Replaces any transition in flight.
    pub fn set_target(&mut self, value: f32, duration: f32, easing: Easing) {
        self.start = self.value;
        self.target = value;
        self.easing = easing;
        self.elapsed = 0.0;
        self.duration = duration.max(0.0);
        trace!(
            "driver {} -> {} over {}s ({:?})",
            self.name, value, self.duration, easing
        );
        if self.duration == 0.0 {
            self.value = self.terminal_value();
        }
    }

    pub fn advance(&mut self, dt: f32) {
        if self.is_complete() {
            return;
        }

        let duration = f64::from(self.duration);
        self.elapsed = (self.elapsed + f64::from(dt.max(0.0))).min(duration);
        if self.is_complete() {
            self.elapsed = duration;
            self.value = self.terminal_value();
        } else {
            let t = (self.elapsed / duration) as f32;
            self.value = lerp(self.start, self.target, ease(self.easing, t));
        }
    }

    /// Hard-sets the value without easing and drops any transition in flight.
    pub fn reset(&mut self, value: f32) {
        self.value = value;
        self.start = value;
        self.target = value;
        self.elapsed = 0.0;
        self.duration = 0.0;
    }

    /// Jumps to the end of the current transition.
    pub fn finish(&mut self) {
        self.elapsed = f64::from(self.duration);
        self.value = self.terminal_value();
    }

    pub fn is_complete(&self) -> bool {
        self.elapsed + TIME_EPSILON >= f64::from(self.duration)
    }

    /// Normalized elapsed time of the current transition.
    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed / f64::from(self.duration)).clamp(0.0, 1.0) as f32
        }
    }

    fn terminal_value(&self) -> f32 {
        if self.easing.ends_at_target() {
            self.target
        } else {
            lerp(self.start, self.target, ease(self.easing, 1.0))
        }
    }
}

/// Arena of drivers owned by one timeline. Ids are indices and never reused.
#[derive(Debug, Clone, Default)]
pub struct DriverSet {
    drivers: Vec<ProgressDriver>,
    initial: Vec<f32>,
}

impl DriverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, initial: f32) -> DriverId {
        let id = DriverId(self.drivers.len());
        self.drivers.push(ProgressDriver::new(id, name, initial));
        self.initial.push(initial);
        id
    }

    pub fn get(&self, id: DriverId) -> Option<&ProgressDriver> {
        self.drivers.get(id.0)
    }

    pub fn get_mut(&mut self, id: DriverId) -> Option<&mut ProgressDriver> {
        self.drivers.get_mut(id.0)
    }

    pub fn value(&self, id: DriverId) -> Option<f32> {
        self.get(id).map(ProgressDriver::value)
    }

    pub fn contains(&self, id: DriverId) -> bool {
        id.0 < self.drivers.len()
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    pub fn advance_all(&mut self, dt: f32) {
        for driver in &mut self.drivers {
            driver.advance(dt);
        }
    }

    /// Puts every driver back on the value it was created with.
    pub fn reset_all(&mut self) {
        for (driver, initial) in self.drivers.iter_mut().zip(&self.initial) {
            driver.reset(*initial);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProgressDriver> {
        self.drivers.iter()
    }
}
