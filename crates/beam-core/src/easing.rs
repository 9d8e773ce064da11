use serde::{Deserialize, Serialize};

/// Easing curve applied to a crossfade's normalized time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Easing {
    Linear,
    /// `1 - (1 - t)^(2 * factor)`; fast start, gentle landing.
    Decelerate { factor: f32 },
}

impl Default for Easing {
    fn default() -> Self {
        Easing::Decelerate { factor: 1.0 }
    }
}

impl Easing {
    /// Map `t` (clamped to [0, 1]) through the curve. Endpoints are exact.
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        if t >= 1.0 {
            return 1.0;
        }
        match self {
            Easing::Linear => t,
            Easing::Decelerate { factor } => {
                if factor == 1.0 {
                    1.0 - (1.0 - t) * (1.0 - t)
                } else {
                    1.0 - (1.0 - t).powf(2.0 * factor)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_exact() {
        for e in [Easing::Linear, Easing::default(), Easing::Decelerate { factor: 2.5 }] {
            assert_eq!(e.apply(0.0), 0.0);
            assert_eq!(e.apply(1.0), 1.0);
            assert_eq!(e.apply(7.0), 1.0);
            assert_eq!(e.apply(-1.0), 0.0);
        }
    }

    #[test]
    fn decelerate_is_ahead_of_linear() {
        let e = Easing::default();
        for i in 1..10 {
            let t = i as f32 / 10.0;
            assert!(e.apply(t) > t);
        }
        assert!((e.apply(0.5) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn decelerate_is_monotonic() {
        let e = Easing::Decelerate { factor: 1.5 };
        let mut last = 0.0;
        for i in 0..=100 {
            let v = e.apply(i as f32 / 100.0);
            assert!(v >= last);
            last = v;
        }
    }
}
