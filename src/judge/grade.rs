//! Accuracy and letter grades.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Letter summary of a session's accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    S,
    A,
    B,
    C,
    D,
    F,
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Grade::S => "S",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        };
        f.write_str(letter)
    }
}

/// Minimum accuracy percent for each grade, checked from S down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradeThresholds {
    pub s: u8,
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
}

impl Default for GradeThresholds {
    fn default() -> Self {
        Self {
            s: 95,
            a: 85,
            b: 70,
            c: 50,
            d: 30,
        }
    }
}

impl GradeThresholds {
    pub fn grade(&self, accuracy: u8) -> Grade {
        [
            (self.s, Grade::S),
            (self.a, Grade::A),
            (self.b, Grade::B),
            (self.c, Grade::C),
            (self.d, Grade::D),
        ]
        .into_iter()
        .find(|&(min, _)| accuracy >= min)
        .map_or(Grade::F, |(_, grade)| grade)
    }
}

/// Weighted accuracy: Perfect counts 1.0, Good 0.5, Miss 0. Zero when nothing was hit.
pub fn accuracy_percent(perfect: u32, good: u32, miss: u32) -> u8 {
    let total = perfect as u64 + good as u64 + miss as u64;
    if total == 0 {
        return 0;
    }
    let weighted = perfect as f64 + good as f64 * 0.5;
    (weighted / total as f64 * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Grade an accuracy with the default thresholds.
pub fn grade_for(accuracy: u8) -> Grade {
    GradeThresholds::default().grade(accuracy)
}
