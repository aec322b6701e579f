//! Progress-bounded prefixes of precomputed point series.

use crate::error::EngineError;
use crate::gfx::math::Vec3;
use log::{debug, warn};
use std::ops::Range;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub time: f32,
    pub value: f32,
}

/// Immutable ordered (time, value) samples for one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    channel: String,
    samples: Rc<[Sample]>,
}

impl Series {
    pub fn new(channel: impl Into<String>, samples: Vec<Sample>) -> Self {
        Self {
            channel: channel.into(),
            samples: samples.into(),
        }
    }

    /// `count` samples evenly spaced over `[0, window]`.
    pub fn from_fn(channel: impl Into<String>, count: usize, window: f32, f: impl Fn(f32) -> f32) -> Self {
        let step = if count > 1 { window / (count - 1) as f32 } else { 0.0 };
        let samples = (0..count)
            .map(|i| {
                let time = i as f32 * step;
                Sample { time, value: f(time) }
            })
            .collect();
        Self::new(channel, samples)
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn map_points(&self, f: impl Fn(&Sample) -> Vec3) -> Vec<Vec3> {
        self.samples.iter().map(f).collect()
    }

    pub fn sample(&self, progress: f32) -> Vec<Sample> {
        sample(&self.samples[..], progress)
    }
}

/// Number of leading items shown at `progress`.
///
/// `floor(progress * len)`, raised to 2 whenever progress is positive so a
/// line stays drawable, and never more than `len`.
pub fn prefix_len(len: usize, progress: f32) -> usize {
    if len == 0 || progress <= 0.0 {
        return 0;
    }
    let n = (progress.min(1.0) * len as f32).floor() as usize;
    n.max(2).min(len)
}

pub fn try_sample<T: Clone>(items: &[T], progress: f32) -> Result<Vec<T>, EngineError> {
    if items.is_empty() {
        return Err(EngineError::EmptySeries);
    }
    if !(0.0..=1.0).contains(&progress) {
        return Err(EngineError::InvalidProgress(progress));
    }
    Ok(items[..prefix_len(items.len(), progress)].to_vec())
}

/// Like [`try_sample`], but clamps out-of-range progress and returns nothing
/// for an empty series.
pub fn sample<T: Clone>(items: &[T], progress: f32) -> Vec<T> {
    match try_sample(items, progress) {
        Ok(prefix) => prefix,
        Err(EngineError::InvalidProgress(p)) => {
            warn!("progress {} outside [0, 1], clamping", p);
            let clamped = if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) };
            items[..prefix_len(items.len(), clamped)].to_vec()
        }
        Err(err) => {
            debug!("{}", err);
            Vec::new()
        }
    }
}

/// Keeps every k-th item so at most about `max_points` remain. The first and
/// last items always survive.
pub fn decimate<T: Clone>(items: &[T], max_points: usize) -> Vec<T> {
    let max_points = max_points.max(2);
    if items.len() <= max_points {
        return items.to_vec();
    }
    let stride = items.len().div_ceil(max_points);
    let last = items.len() - 1;
    let mut out: Vec<T> = items.iter().step_by(stride).cloned().collect();
    if last % stride != 0 {
        out.push(items[last].clone());
    }
    out
}

/// Catmull-Rom pass through `points`, inserting `subdivisions` points per span.
pub fn smooth(points: &[Vec3], subdivisions: u32) -> Vec<Vec3> {
    if points.len() < 3 || subdivisions == 0 {
        return points.to_vec();
    }
    let n = points.len();
    let steps = subdivisions + 1;
    let mut out = Vec::with_capacity((n - 1) * steps as usize + 1);
    for i in 0..n - 1 {
        let p0 = points[i.saturating_sub(1)];
        let p1 = points[i];
        let p2 = points[i + 1];
        let p3 = points[(i + 2).min(n - 1)];
        for s in 0..steps {
            out.push(catmull_rom(p0, p1, p2, p3, s as f32 / steps as f32));
        }
    }
    out.push(points[n - 1]);
    out
}

fn catmull_rom(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, t: f32) -> Vec3 {
    let t2 = t * t;
    let t3 = t2 * t;
    let h1 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h2 = -2.0 * t3 + 3.0 * t2;
    let h3 = t3 - 2.0 * t2 + t;
    let h4 = t3 - t2;
    let m1 = (p2 - p0).scale(0.5);
    let m2 = (p3 - p1).scale(0.5);
    p1.scale(h1) + p2.scale(h2) + m1.scale(h3) + m2.scale(h4)
}

/// A plotted curve revealed by progress, with display-side thinning.
#[derive(Debug, Clone)]
pub struct PartialCurve {
    points: Rc<[Vec3]>,
    max_points: Option<usize>,
    subdivisions: u32,
}

impl PartialCurve {
    pub fn new(points: Vec<Vec3>) -> Self {
        Self {
            points: points.into(),
            max_points: None,
            subdivisions: 0,
        }
    }

    pub fn with_decimation(mut self, max_points: usize) -> Self {
        self.max_points = Some(max_points);
        self
    }

    pub fn with_smoothing(mut self, subdivisions: u32) -> Self {
        self.subdivisions = subdivisions;
        self
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Underlying indices covered at `progress`, before thinning.
    pub fn included_range(&self, progress: f32) -> Range<usize> {
        let progress = if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 1.0) };
        0..prefix_len(self.points.len(), progress)
    }

    /// Points to display at `progress`.
    pub fn display(&self, progress: f32) -> Vec<Vec3> {
        let prefix = sample(&self.points[..], progress);
        let thinned = match self.max_points {
            Some(max) => decimate(&prefix, max),
            None => prefix,
        };
        smooth(&thinned, self.subdivisions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<usize> {
        (0..n).collect()
    }

    #[test]
    fn test_prefix_length_law() {
        let items = ramp(100);
        for i in 1..=100 {
            let p = i as f32 / 100.0;
            let expected = ((p * 100.0).floor() as usize).max(2);
            assert_eq!(sample(&items, p).len(), expected, "progress {}", p);
        }
        assert!(sample(&items, 0.0).is_empty());
        assert_eq!(sample(&items, 0.001).len(), 2);
    }

    #[test]
    fn test_prefix_is_monotonic() {
        let items = ramp(37);
        let mut prev: Vec<usize> = Vec::new();
        for i in 0..=50 {
            let cur = sample(&items, i as f32 / 50.0);
            assert!(cur.starts_with(&prev));
            prev = cur;
        }
        assert_eq!(prev, items);
    }

    #[test]
    fn test_empty_series() {
        let items: Vec<usize> = Vec::new();
        assert!(sample(&items, 0.5).is_empty());
        assert_eq!(try_sample(&items, 0.5), Err(EngineError::EmptySeries));
    }

    #[test]
    fn test_out_of_range_progress_is_clamped() {
        let items = ramp(10);
        assert_eq!(try_sample(&items, 1.5), Err(EngineError::InvalidProgress(1.5)));
        assert_eq!(sample(&items, 1.5).len(), 10);
        assert!(sample(&items, -0.2).is_empty());
        assert!(sample(&items, f32::NAN).is_empty());
    }

    #[test]
    fn test_single_point_series() {
        assert_eq!(sample(&[7], 1.0), vec![7]);
    }

    #[test]
    fn test_decimate_keeps_endpoints() {
        let items = ramp(150);
        let thinned = decimate(&items, 40);
        assert_eq!(thinned.first(), Some(&0));
        assert_eq!(thinned.last(), Some(&149));
        assert!(thinned.len() <= 41);
        assert!(thinned.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(decimate(&items[..10], 40).len(), 10);
    }

    #[test]
    fn test_series_from_fn() {
        let s = Series::from_fn("x", 5, 4.0, |t| t * 2.0);
        assert_eq!(s.len(), 5);
        assert_eq!(s.samples()[4], Sample { time: 4.0, value: 8.0 });
        assert_eq!(s.sample(0.5).len(), 2);
        assert_eq!(s.channel(), "x");
    }

    #[test]
    fn test_partial_curve_display() {
        let points: Vec<Vec3> = (0..100).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect();
        let curve = PartialCurve::new(points).with_decimation(20);
        assert_eq!(curve.included_range(0.5), 0..50);
        let shown = curve.display(0.5);
        assert_eq!(shown.first(), Some(&Vec3::new(0.0, 0.0, 0.0)));
        assert_eq!(shown.last(), Some(&Vec3::new(49.0, 0.0, 0.0)));
        assert!(shown.len() <= 21);
        assert_eq!(curve.display(0.5), shown);
    }

    #[test]
    fn test_smoothing_passes_through_endpoints() {
        let points = vec![Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0), Vec3::new(2.0, 0.0, 0.0)];
        let out = smooth(&points, 3);
        assert_eq!(out.len(), 9);
        assert_eq!(out[0], points[0]);
        assert_eq!(out[4], points[1]);
        assert_eq!(out[8], points[2]);
    }
}
