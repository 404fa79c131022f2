use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::TriggerError;

/// Easing curves, named after the `powerN` family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ease {
    Linear,
    PowerIn(u8),
    PowerOut(u8),
    PowerInOut(u8),
}

impl Default for Ease {
    fn default() -> Self {
        Ease::PowerInOut(1)
    }
}

impl Ease {
    /// Maps linear progress in `[0, 1]` to eased progress.
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Ease::Linear => t,
            Ease::PowerIn(power) => t.powi(exponent(power)),
            Ease::PowerOut(power) => 1.0 - (1.0 - t).powi(exponent(power)),
            Ease::PowerInOut(power) => {
                let n = exponent(power);
                if t < 0.5 {
                    0.5 * (2.0 * t).powi(n)
                } else {
                    1.0 - 0.5 * (2.0 - 2.0 * t).powi(n)
                }
            }
        }
    }
}

fn exponent(power: u8) -> i32 {
    i32::from(power) + 1
}

impl FromStr for Ease {
    type Err = TriggerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if matches!(value, "none" | "linear") {
            return Ok(Ease::Linear);
        }
        let (family, direction) = value.split_once('.').unwrap_or((value, "out"));
        let power = family
            .strip_prefix("power")
            .and_then(|digits| digits.parse::<u8>().ok())
            .ok_or_else(|| TriggerError::UnknownEase(value.to_string()))?;
        match direction {
            "in" => Ok(Ease::PowerIn(power)),
            "out" => Ok(Ease::PowerOut(power)),
            "inOut" => Ok(Ease::PowerInOut(power)),
            _ => Err(TriggerError::UnknownEase(value.to_string())),
        }
    }
}

/// Start delays spreading `amount` seconds evenly across `count` elements.
pub fn stagger_delays(count: usize, amount: f32) -> Vec<f32> {
    if count <= 1 {
        return vec![0.0; count];
    }
    let step = amount / (count - 1) as f32;
    (0..count).map(|i| i as f32 * step).collect()
}

/// Linear progress of a timed segment at `elapsed` seconds.
pub fn timed_progress(elapsed: f32, delay: f32, duration: f32) -> f32 {
    if elapsed < delay {
        return 0.0;
    }
    if duration <= 0.0 {
        return 1.0;
    }
    ((elapsed - delay) / duration).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eases_hit_both_ends() {
        for ease in [
            Ease::Linear,
            Ease::PowerIn(2),
            Ease::PowerOut(1),
            Ease::PowerInOut(1),
            Ease::PowerInOut(4),
        ] {
            assert_eq!(ease.apply(0.0), 0.0, "{ease:?}");
            assert!((ease.apply(1.0) - 1.0).abs() < 1e-6, "{ease:?}");
        }
    }

    #[test]
    fn in_out_is_symmetric_around_midpoint() {
        let ease = Ease::PowerInOut(1);
        assert!((ease.apply(0.5) - 0.5).abs() < 1e-6);
        assert!((ease.apply(0.25) + ease.apply(0.75) - 1.0).abs() < 1e-6);
        assert!((ease.apply(0.25) - 0.125).abs() < 1e-6);
    }

    #[test]
    fn parses_named_eases() {
        assert_eq!("power1.inOut".parse::<Ease>().unwrap(), Ease::PowerInOut(1));
        assert_eq!("power4.inOut".parse::<Ease>().unwrap(), Ease::PowerInOut(4));
        assert_eq!("power2".parse::<Ease>().unwrap(), Ease::PowerOut(2));
        assert_eq!("none".parse::<Ease>().unwrap(), Ease::Linear);
        assert!("bounce.out".parse::<Ease>().is_err());
    }

    #[test]
    fn stagger_spreads_amount() {
        assert_eq!(stagger_delays(3, 0.5), vec![0.0, 0.25, 0.5]);
        assert_eq!(stagger_delays(1, 0.5), vec![0.0]);
        assert!(stagger_delays(0, 0.5).is_empty());
    }

    #[test]
    fn timed_progress_waits_for_delay() {
        assert_eq!(timed_progress(0.5, 1.0, 0.3), 0.0);
        assert!((timed_progress(1.15, 1.0, 0.3) - 0.5).abs() < 1e-5);
        assert_eq!(timed_progress(5.0, 1.0, 0.3), 1.0);
        assert_eq!(timed_progress(3.0, 3.0, 0.0), 1.0);
    }
}
