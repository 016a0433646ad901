//! Synthetic Tick Generation
//!
//! Produces one price observation for an instrument at a virtual time:
//!
//! ```text
//! value = base + sin(t / wave_period + len(instrument)) * amplitude + (u - 0.5) * noise
//! ```
//!
//! with `u` uniform in `[0, 1)` and `timestamp = floor(t)`. The generator has
//! no state; repeated calls with the same inputs may differ by the noise term.

use rand::Rng;

use super::instrument::Instrument;
use super::series::Observation;

/// Parameters of the synthetic waveform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickProfile {
    /// Centre of the oscillation.
    pub base_price: f64,
    /// Peak deviation of the sine component.
    pub amplitude: f64,
    /// Divisor applied to virtual time before the sine.
    pub wave_period_secs: f64,
    /// Width of the uniform noise band.
    pub noise: f64,
}

impl Default for TickProfile {
    fn default() -> Self {
        Self {
            base_price: 100.0,
            amplitude: 10.0,
            wave_period_secs: 5.0,
            noise: 2.0,
        }
    }
}

impl TickProfile {
    /// Name of the first parameter that is not finite, if any.
    #[must_use]
    pub fn non_finite_field(&self) -> Option<&'static str> {
        [
            ("base_price", self.base_price),
            ("amplitude", self.amplitude),
            ("wave_period_secs", self.wave_period_secs),
            ("noise", self.noise),
        ]
        .into_iter()
        .find(|(_, v)| !v.is_finite())
        .map(|(name, _)| name)
    }
}

/// Stateless tick generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickGenerator {
    profile: TickProfile,
}

impl TickGenerator {
    /// Create a generator for a waveform profile.
    #[must_use]
    pub const fn new(profile: TickProfile) -> Self {
        Self { profile }
    }

    /// Generate an observation using the thread-local RNG for noise.
    #[must_use]
    pub fn generate(&self, instrument: &Instrument, virtual_time: f64) -> Observation {
        self.generate_with(instrument, virtual_time, &mut rand::rng())
    }

    /// Generate an observation drawing noise from `rng`.
    ///
    /// The value is always finite: any non-finite intermediate falls back to
    /// the base price, and a non-finite time yields timestamp 0.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn generate_with<R: Rng + ?Sized>(
        &self,
        instrument: &Instrument,
        virtual_time: f64,
        rng: &mut R,
    ) -> Observation {
        let p = &self.profile;
        let phase = virtual_time / p.wave_period_secs + instrument.char_len() as f64;
        let jitter = (rng.random::<f64>() - 0.5) * p.noise;
        let value = p.amplitude.mul_add(phase.sin(), p.base_price) + jitter;

        let value = if value.is_finite() {
            value
        } else {
            self.fallback_value()
        };

        // `as` saturates for out-of-range finite values
        let timestamp = if virtual_time.is_finite() {
            virtual_time.floor() as i64
        } else {
            0
        };

        Observation::new(instrument.clone(), timestamp, value)
    }

    fn fallback_value(&self) -> f64 {
        if self.profile.base_price.is_finite() {
            self.profile.base_price
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn timestamp_is_floor_of_virtual_time() {
        let generator = TickGenerator::default();
        let obs = generator.generate(&Instrument::new("AAPL1"), 1_700_000_000.75);
        assert_eq!(obs.timestamp, 1_700_000_000);
        assert_eq!(obs.instrument.as_str(), "AAPL1");
    }

    #[test]
    fn value_stays_within_waveform_band() {
        let generator = TickGenerator::default();
        let mut rng = StdRng::seed_from_u64(7);
        for step in 0..1_000 {
            let t = 1_700_000_000.0 + f64::from(step) * 0.5;
            let obs = generator.generate_with(&Instrument::new("MSFT2"), t, &mut rng);
            // base ± amplitude ± noise/2
            assert!(obs.value >= 89.0 && obs.value <= 111.0, "value {}", obs.value);
        }
    }

    #[test]
    fn zero_noise_is_deterministic() {
        let generator = TickGenerator::new(TickProfile {
            noise: 0.0,
            ..TickProfile::default()
        });
        let mut rng = StdRng::seed_from_u64(1);
        let a = generator.generate_with(&Instrument::new("AMD8"), 12.0, &mut rng);
        let b = generator.generate_with(&Instrument::new("AMD8"), 12.0, &mut rng);
        assert_eq!(a, b);
        let expected = 100.0 + (12.0_f64 / 5.0 + 4.0).sin() * 10.0;
        assert!((a.value - expected).abs() < 1e-9);
    }

    #[test]
    fn non_finite_time_still_yields_finite_value() {
        let generator = TickGenerator::default();
        for t in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let obs = generator.generate(&Instrument::new("AAPL1"), t);
            assert!(obs.value.is_finite());
            assert_eq!(obs.timestamp, 0);
        }
    }

    #[test]
    fn zero_wave_period_falls_back_to_base() {
        let generator = TickGenerator::new(TickProfile {
            wave_period_secs: 0.0,
            ..TickProfile::default()
        });
        let obs = generator.generate(&Instrument::new("AAPL1"), 0.0);
        // 0/0 is NaN, so the waveform collapses to the base price
        assert!((obs.value - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn non_finite_profile_field_is_reported() {
        assert_eq!(TickProfile::default().non_finite_field(), None);
        let profile = TickProfile {
            noise: f64::NAN,
            ..TickProfile::default()
        };
        assert_eq!(profile.non_finite_field(), Some("noise"));
    }
}
