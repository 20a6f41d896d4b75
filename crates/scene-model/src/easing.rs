use serde::{Deserialize, Serialize};

/// Easing function for animation interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum Easing {
    #[default]
    Linear,
    CubicOut,
}

impl Easing {
    /// Apply the easing function to a normalized time value t in [0, 1].
    pub fn apply(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::CubicOut => {
                let t1 = t - 1.0;
                t1 * t1 * t1 + 1.0
            }
        }
    }
}

/// `1 - (1 - t)^3`, the entrance curve shared by counters, progress bars,
/// slides and bar growth.
pub fn ease_out_cubic(t: f64) -> f64 {
    Easing::CubicOut.apply(t)
}

/// Progress of the `index`-th of `count` staggered children when the parent
/// animation is at `progress`.
///
/// Each child starts `stagger` (a fraction of the whole animation) after the
/// previous one, and the spread is compressed so that every child reaches
/// 1.0 exactly when `progress` does.
pub fn staggered(progress: f64, index: usize, count: usize, stagger: f64) -> f64 {
    let progress = progress.clamp(0.0, 1.0);
    if count <= 1 || stagger <= 0.0 {
        return progress;
    }
    let spread = stagger * (count - 1) as f64;
    (progress * (1.0 + spread) - stagger * index as f64).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cubic_out_midpoint() {
        assert!((ease_out_cubic(0.5) - 0.875).abs() < 1e-12);
    }

    #[test]
    fn test_easing_boundaries() {
        for easing in [Easing::Linear, Easing::CubicOut] {
            assert!(easing.apply(0.0).abs() < 1e-12, "{:?} should start at 0", easing);
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-12, "{:?} should end at 1", easing);
            assert_eq!(easing.apply(-3.0), easing.apply(0.0));
            assert_eq!(easing.apply(7.0), easing.apply(1.0));
        }
    }

    #[test]
    fn test_staggered_children_finish_together() {
        for i in 0..5 {
            assert_eq!(staggered(1.0, i, 5, 0.1), 1.0);
            assert_eq!(staggered(0.0, i, 5, 0.1), 0.0);
        }
        // Later children lag behind earlier ones mid-animation.
        assert!(staggered(0.3, 0, 5, 0.1) > staggered(0.3, 4, 5, 0.1));
    }

    #[test]
    fn test_staggered_without_stagger_is_identity() {
        assert_eq!(staggered(0.42, 3, 5, 0.0), 0.42);
        assert_eq!(staggered(0.42, 0, 1, 0.2), 0.42);
    }
}
