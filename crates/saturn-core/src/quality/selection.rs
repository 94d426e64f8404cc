use serde::{Deserialize, Serialize};

/// Rule deciding which frames make it into the stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityCriterion {
    /// Keep the best N percent of frames (1..=100).
    PercentageBest(u32),
    /// Keep the N best frames.
    NumberBest(u32),
    /// Keep frames whose quality is at least N percent (1..=100) of the way
    /// from the worst to the best frame.
    MinRelativeQuality(u32),
}

impl Default for QualityCriterion {
    fn default() -> Self {
        Self::PercentageBest(crate::consts::DEFAULT_QUALITY_PERCENTAGE)
    }
}

impl QualityCriterion {
    /// The raw threshold, interpreted according to the variant.
    pub fn threshold(self) -> u32 {
        match self {
            Self::PercentageBest(t) | Self::NumberBest(t) | Self::MinRelativeQuality(t) => t,
        }
    }

    /// Check that the threshold makes sense for the variant.
    pub fn validate(self) -> Result<(), String> {
        match self {
            Self::PercentageBest(p) | Self::MinRelativeQuality(p) if !(1..=100).contains(&p) => {
                Err(format!("{self} threshold must be within 1..=100, got {p}"))
            }
            Self::NumberBest(0) => Err("number of best frames must be at least 1".into()),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Display for QualityCriterion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PercentageBest(p) => write!(f, "best {p}%"),
            Self::NumberBest(n) => write!(f, "best {n} frames"),
            Self::MinRelativeQuality(p) => write!(f, "relative quality >= {p}%"),
        }
    }
}

/// Pick the frames to stack. `qualities[i]` is the quality of frame `i`;
/// the result is the selected indices in ascending order. At least one frame
/// is selected whenever `qualities` is non-empty.
pub fn select_frames(qualities: &[f64], criterion: QualityCriterion) -> Vec<usize> {
    let n = qualities.len();
    if n == 0 {
        return Vec::new();
    }

    let mut ranked: Vec<usize> = (0..n).collect();
    // Stable sort keeps earlier frames first among equal qualities.
    ranked.sort_by(|&a, &b| qualities[b].total_cmp(&qualities[a]));

    let keep = match criterion {
        QualityCriterion::PercentageBest(p) => {
            ((n as f64 * p.min(100) as f64 / 100.0).ceil() as usize).max(1)
        }
        QualityCriterion::NumberBest(k) => (k as usize).clamp(1, n),
        QualityCriterion::MinRelativeQuality(p) => {
            let best = qualities[ranked[0]];
            let worst = qualities[ranked[n - 1]];
            let cutoff = worst + (best - worst) * p.min(100) as f64 / 100.0;
            ranked
                .iter()
                .take_while(|&&i| qualities[i] >= cutoff)
                .count()
                .max(1)
        }
    };

    let mut selected: Vec<usize> = ranked.into_iter().take(keep.min(n)).collect();
    selected.sort_unstable();
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_rounds_up() {
        let q = [1.0, 5.0, 3.0, 4.0, 2.0];
        assert_eq!(select_frames(&q, QualityCriterion::PercentageBest(30)), vec![1, 3]);
    }

    #[test]
    fn number_best_is_capped() {
        let q = [1.0, 2.0];
        assert_eq!(select_frames(&q, QualityCriterion::NumberBest(10)), vec![0, 1]);
    }

    #[test]
    fn relative_quality_keeps_best_at_full_threshold() {
        let q = [0.0, 10.0, 5.0];
        assert_eq!(select_frames(&q, QualityCriterion::MinRelativeQuality(100)), vec![1]);
        assert_eq!(select_frames(&q, QualityCriterion::MinRelativeQuality(50)), vec![1, 2]);
    }

    #[test]
    fn validate_rejects_out_of_range() {
        assert!(QualityCriterion::PercentageBest(0).validate().is_err());
        assert!(QualityCriterion::MinRelativeQuality(101).validate().is_err());
        assert!(QualityCriterion::NumberBest(0).validate().is_err());
        assert!(QualityCriterion::NumberBest(3).validate().is_ok());
    }
}
