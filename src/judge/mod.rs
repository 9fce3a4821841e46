//! Hit judging — timing windows, combo scoring and grading.
//!
//! Everything here is a pure function of its inputs. The configurable
//! constants live in [`JudgeWindows`], [`ScoreRules`] and
//! [`GradeThresholds`]; the free functions apply the reference defaults.

pub mod grade;

pub use grade::{accuracy_percent, grade_for, Grade, GradeThresholds};

use serde::{Deserialize, Serialize};

/// Categorical outcome of a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Judgment {
    Perfect,
    Good,
    Miss,
}

impl Judgment {
    pub fn is_miss(self) -> bool {
        self == Judgment::Miss
    }
}

/// Timing windows, in milliseconds either side of the beat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeWindows {
    /// `|offset| <= perfect_ms` is Perfect.
    pub perfect_ms: f64,
    /// `perfect_ms < |offset| <= good_ms` is Good; anything wider is a Miss.
    pub good_ms: f64,
}

impl Default for JudgeWindows {
    fn default() -> Self {
        Self {
            perfect_ms: 50.0,
            good_ms: 150.0,
        }
    }
}

impl JudgeWindows {
    /// Judge a signed timing offset. Early and late hits are treated alike.
    pub fn judge(&self, offset_ms: f64) -> Judgment {
        let distance = offset_ms.abs();
        if distance <= self.perfect_ms {
            Judgment::Perfect
        } else if distance <= self.good_ms {
            Judgment::Good
        } else {
            // NaN lands here too.
            Judgment::Miss
        }
    }
}

/// Points awarded for a hit and the combo that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scored {
    pub points: u32,
    pub combo: u32,
}

/// Base points, multipliers and combo bonus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreRules {
    pub perfect_points: u32,
    pub good_points: u32,
    pub perfect_multiplier: f64,
    pub good_multiplier: f64,
    /// Every `combo_step` consecutive hits add `combo_bonus` to the multiplier.
    pub combo_step: u32,
    pub combo_bonus: f64,
}

impl Default for ScoreRules {
    fn default() -> Self {
        Self {
            perfect_points: 100,
            good_points: 50,
            perfect_multiplier: 1.5,
            good_multiplier: 1.2,
            combo_step: 10,
            combo_bonus: 0.1,
        }
    }
}

impl ScoreRules {
    /// Multiplier for a non-miss judgment at `combo` (0.0 for a miss).
    pub fn multiplier(&self, judgment: Judgment, combo: u32) -> f64 {
        let base = match judgment {
            Judgment::Perfect => self.perfect_multiplier,
            Judgment::Good => self.good_multiplier,
            Judgment::Miss => return 0.0,
        };
        let tiers = combo.checked_div(self.combo_step).unwrap_or(0);
        base + tiers as f64 * self.combo_bonus
    }

    /// Score one judgment given the combo before it.
    pub fn score(&self, judgment: Judgment, combo: u32) -> Scored {
        let base = match judgment {
            Judgment::Perfect => self.perfect_points,
            Judgment::Good => self.good_points,
            Judgment::Miss => return Scored { points: 0, combo: 0 },
        };
        let points = (base as f64 * self.multiplier(judgment, combo)).round();
        Scored {
            points: points.max(0.0) as u32,
            combo: combo.saturating_add(1),
        }
    }
}

/// Judge an offset with the default windows.
pub fn judge_timing(offset_ms: f64) -> Judgment {
    JudgeWindows::default().judge(offset_ms)
}

/// Score a judgment with the default rules.
pub fn score_for(judgment: Judgment, combo: u32) -> Scored {
    ScoreRules::default().score(judgment, combo)
}

/// Offset between the beat a hit landed on and the beat it was expected on.
pub fn offset_between(actual_beat: u64, expected_beat: u64, interval_ms: f64) -> f64 {
    (actual_beat as f64 - expected_beat as f64) * interval_ms
}
