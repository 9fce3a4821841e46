//! Session summary.

use std::time::SystemTime;

use serde::Serialize;

use crate::judge::{Grade, GradeThresholds};

/// Final (or in-progress) outcome of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    pub session_id: String,
    pub score: u64,
    pub grade: Grade,
    pub accuracy: u8,
    pub max_combo: u32,
    pub perfect_count: u32,
    pub good_count: u32,
    pub miss_count: u32,
    pub completed_at: SystemTime,
}

/// Hit tallies a result is computed from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub score: u64,
    pub max_combo: u32,
    pub perfect: u32,
    pub good: u32,
    pub miss: u32,
}

impl RunResult {
    pub fn new(
        session_id: impl Into<String>,
        tally: Tally,
        thresholds: &GradeThresholds,
        completed_at: SystemTime,
    ) -> Self {
        let accuracy = crate::judge::accuracy_percent(tally.perfect, tally.good, tally.miss);
        Self {
            session_id: session_id.into(),
            score: tally.score,
            grade: thresholds.grade(accuracy),
            accuracy,
            max_combo: tally.max_combo,
            perfect_count: tally.perfect,
            good_count: tally.good,
            miss_count: tally.miss,
            completed_at,
        }
    }

    /// Number of judgments behind this result.
    pub fn total_hits(&self) -> u32 {
        self.perfect_count + self.good_count + self.miss_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_follows_accuracy() {
        let tally = Tally {
            score: 1000,
            max_combo: 7,
            perfect: 6,
            good: 2,
            miss: 2,
        };
        let result = RunResult::new(
            "daily-1",
            tally,
            &GradeThresholds::default(),
            SystemTime::UNIX_EPOCH,
        );
        // (6 + 1) / 10 = 70%
        assert_eq!(result.accuracy, 70);
        assert_eq!(result.grade, Grade::B);
        assert_eq!(result.total_hits(), 10);
        assert_eq!(result.session_id, "daily-1");
    }

    #[test]
    fn empty_tally_grades_f() {
        let result = RunResult::new(
            "x",
            Tally::default(),
            &GradeThresholds::default(),
            SystemTime::UNIX_EPOCH,
        );
        assert_eq!(result.accuracy, 0);
        assert_eq!(result.grade, Grade::F);
    }

    #[test]
    fn serializes_to_yaml() {
        let result = RunResult::new(
            "s",
            Tally {
                perfect: 1,
                ..Tally::default()
            },
            &GradeThresholds::default(),
            SystemTime::UNIX_EPOCH,
        );
        let yaml = serde_yaml::to_string(&result).unwrap();
        assert!(yaml.contains("grade: S"));
        assert!(yaml.contains("accuracy: 100"));
    }
}
