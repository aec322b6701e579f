//! Synthetic accelerometer channels.

use crate::engine::sampler::{Sample, Series};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};

/// Produces the samples for one channel of a clip.
pub trait SignalGenerator {
    fn generate(&self, channel: &str, samples: usize, window: f32) -> Series;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Term {
    /// `amplitude * sin(2 pi frequency t + phase)`
    Sine { amplitude: f32, frequency: f32, phase: f32 },
    /// Tilt profile: the angle rises as `angle * sin(pi u)` over the window
    /// and the term is `amplitude * cos(angle)` or `amplitude * sin(angle)`.
    Arch { amplitude: f32, angle: f32, cosine: bool },
    /// Gaussian noise with a fixed seed.
    Noise { sigma: f32, seed: u64 },
}

impl Term {
    pub fn sine(amplitude: f32, frequency: f32, phase: f32) -> Self {
        Term::Sine { amplitude, frequency, phase }
    }

    pub fn cosine(amplitude: f32, frequency: f32, phase: f32) -> Self {
        Term::Sine { amplitude, frequency, phase: phase + PI / 2.0 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Waveform {
    #[serde(default)]
    pub offset: f32,
    #[serde(default)]
    pub terms: Vec<Term>,
}

impl Waveform {
    pub fn new(offset: f32, terms: Vec<Term>) -> Self {
        Self { offset, terms }
    }

    /// Values at `times`, where `u` runs 0..1 across the window.
    pub fn values(&self, times: &[f32]) -> Vec<f32> {
        let last = times.len().saturating_sub(1).max(1) as f32;
        let mut out = vec![self.offset; times.len()];
        for term in &self.terms {
            match *term {
                Term::Sine { amplitude, frequency, phase } => {
                    for (v, t) in out.iter_mut().zip(times) {
                        *v += amplitude * (TAU * frequency * t + phase).sin();
                    }
                }
                Term::Arch { amplitude, angle, cosine } => {
                    for (i, v) in out.iter_mut().enumerate() {
                        let theta = angle * (PI * i as f32 / last).sin();
                        *v += amplitude * if cosine { theta.cos() } else { theta.sin() };
                    }
                }
                Term::Noise { sigma, seed } => {
                    let mut rng = StdRng::seed_from_u64(seed);
                    for v in out.iter_mut() {
                        *v += sigma * standard_normal(&mut rng);
                    }
                }
            }
        }
        out
    }
}

impl SignalGenerator for Waveform {
    fn generate(&self, channel: &str, samples: usize, window: f32) -> Series {
        let step = if samples > 1 { window / (samples - 1) as f32 } else { 0.0 };
        let times: Vec<f32> = (0..samples).map(|i| i as f32 * step).collect();
        let values = self.values(&times);
        let samples = times
            .into_iter()
            .zip(values)
            .map(|(time, value)| Sample { time, value })
            .collect();
        Series::new(channel, samples)
    }
}

/// Box-Muller transform.
fn standard_normal(rng: &mut StdRng) -> f32 {
    let u1: f32 = rng.gen_range(f32::EPSILON..1.0);
    let u2: f32 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_samples() {
        let w = Waveform::new(-1.0, vec![Term::sine(0.5, 0.25, 0.0)]);
        let s = w.generate("z", 5, 4.0);
        assert_eq!(s.len(), 5);
        assert!((s.samples()[1].value - (-0.5)).abs() < 1e-5);
        assert!((s.samples()[2].value - (-1.0)).abs() < 1e-5);
        assert_eq!(s.samples()[4].time, 4.0);
    }

    #[test]
    fn test_cosine_is_shifted_sine() {
        let w = Waveform::new(0.0, vec![Term::cosine(1.0, 1.0, 0.0)]);
        assert!((w.values(&[0.0])[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_tilt_arch_peaks_mid_window() {
        let w = Waveform::new(0.0, vec![Term::Arch { amplitude: -1.0, angle: PI / 5.0, cosine: true }]);
        let v = w.values(&[0.0, 2.5, 5.0]);
        assert!((v[0] + 1.0).abs() < 1e-6);
        assert!((v[1] + (PI / 5.0).cos()).abs() < 1e-6);
        assert!((v[2] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_noise_is_seeded() {
        let w = Waveform::new(0.0, vec![Term::Noise { sigma: 0.02, seed: 4 }]);
        let times: Vec<f32> = (0..240).map(|i| i as f32).collect();
        let a = w.values(&times);
        assert_eq!(a, w.values(&times));
        let mean = a.iter().sum::<f32>() / a.len() as f32;
        assert!(mean.abs() < 0.01);
        assert!(a.iter().all(|v| v.abs() < 0.2));
    }
}
