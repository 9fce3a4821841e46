//! Stage layout — per-stage word quotas and tempos, and the word partition.

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Number of stages in the reference layout.
pub const DEFAULT_TOTAL_STAGES: usize = 5;

/// One word the player has to hit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WordItem {
    pub text: String,
}

impl WordItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl From<&str> for WordItem {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for WordItem {
    fn from(text: String) -> Self {
        Self { text }
    }
}

/// Word quota and tempo of a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    pub word_quota: usize,
    pub tempo_bpm: f64,
}

impl StageConfig {
    pub fn new(word_quota: usize, tempo_bpm: f64) -> Self {
        Self {
            word_quota,
            tempo_bpm,
        }
    }
}

/// Ordered stage layout. Its length is the session's total stage count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageDistribution {
    stages: Vec<StageConfig>,
}

impl Default for StageDistribution {
    /// Five stages of 4, 5, 6, 6 and 7 words at 80 to 160 BPM.
    fn default() -> Self {
        Self::new(vec![
            StageConfig::new(4, 80.0),
            StageConfig::new(5, 100.0),
            StageConfig::new(6, 120.0),
            StageConfig::new(6, 140.0),
            StageConfig::new(7, 160.0),
        ])
    }
}

impl StageDistribution {
    pub fn new(stages: Vec<StageConfig>) -> Self {
        Self { stages }
    }

    pub fn total_stages(&self) -> usize {
        self.stages.len()
    }

    /// Sum of all stage quotas.
    pub fn total_quota(&self) -> usize {
        self.stages.iter().map(|s| s.word_quota).sum()
    }

    /// Stage by 1-based index.
    pub fn stage(&self, index: usize) -> Option<&StageConfig> {
        index.checked_sub(1).and_then(|i| self.stages.get(i))
    }

    pub fn stages(&self) -> &[StageConfig] {
        &self.stages
    }

    /// Reject layouts that could never produce a playable session.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.stages.is_empty() {
            return Err(SessionError::NoStages);
        }
        if let Some((i, stage)) = self
            .stages
            .iter()
            .enumerate()
            .find(|(_, s)| !(s.tempo_bpm.is_finite() && s.tempo_bpm > 0.0))
        {
            return Err(SessionError::InvalidTempo {
                stage: i + 1,
                bpm: stage.tempo_bpm,
            });
        }
        if self.total_quota() == 0 {
            return Err(SessionError::ZeroWordQuota);
        }
        Ok(())
    }
}

/// Split `words` into one bucket per stage, in order.
///
/// Each stage takes up to its quota; words left over after the last quota go
/// to the final stage. Every input word lands in exactly one bucket. Fails if
/// the input is empty or if any stage would end up with no words.
pub fn partition_words(
    words: Vec<WordItem>,
    distribution: &StageDistribution,
) -> Result<Vec<Vec<WordItem>>, SessionError> {
    distribution.validate()?;
    if words.is_empty() {
        return Err(SessionError::EmptyWordList);
    }

    let mut remaining = words.into_iter();
    let mut buckets: Vec<Vec<WordItem>> = distribution
        .stages()
        .iter()
        .map(|stage| remaining.by_ref().take(stage.word_quota).collect())
        .collect();

    if let Some(last) = buckets.last_mut() {
        last.extend(remaining);
    }

    if let Some(empty) = buckets.iter().position(Vec::is_empty) {
        return Err(SessionError::EmptyStage { stage: empty + 1 });
    }
    Ok(buckets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> Vec<WordItem> {
        (1..=n).map(|i| WordItem::new(format!("w{i}"))).collect()
    }

    #[test]
    fn default_layout() {
        let d = StageDistribution::default();
        assert_eq!(d.total_stages(), DEFAULT_TOTAL_STAGES);
        assert_eq!(d.total_quota(), 28);
        assert_eq!(d.stage(1).unwrap().tempo_bpm, 80.0);
        assert_eq!(d.stage(5).unwrap().word_quota, 7);
        assert!(d.stage(0).is_none());
        assert!(d.stage(6).is_none());
    }

    #[test]
    fn partition_exact_quota() {
        let buckets = partition_words(words(28), &StageDistribution::default()).unwrap();
        let sizes: Vec<usize> = buckets.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![4, 5, 6, 6, 7]);
    }

    #[test]
    fn remainder_goes_to_last_stage() {
        let buckets = partition_words(words(31), &StageDistribution::default()).unwrap();
        assert_eq!(buckets[4].len(), 10);
        assert_eq!(buckets[4].last().unwrap().text, "w31");
    }

    #[test]
    fn partition_keeps_every_word_once_in_order() {
        let input = words(22);
        let buckets = partition_words(input.clone(), &StageDistribution::default()).unwrap();
        let flat: Vec<WordItem> = buckets.into_iter().flatten().collect();
        assert_eq!(flat, input);
    }

    #[test]
    fn short_list_fills_early_stages_first() {
        let buckets = partition_words(words(22), &StageDistribution::default()).unwrap();
        let sizes: Vec<usize> = buckets.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![4, 5, 6, 6, 1]);
    }

    #[test]
    fn too_few_words_leaves_a_stage_empty() {
        let err = partition_words(words(10), &StageDistribution::default()).unwrap_err();
        assert_eq!(err, SessionError::EmptyStage { stage: 3 });
    }

    #[test]
    fn empty_word_list_is_rejected() {
        let err = partition_words(Vec::new(), &StageDistribution::default()).unwrap_err();
        assert_eq!(err, SessionError::EmptyWordList);
    }

    #[test]
    fn zero_quota_is_rejected() {
        let d = StageDistribution::new(vec![StageConfig::new(0, 90.0), StageConfig::new(0, 100.0)]);
        assert_eq!(partition_words(words(3), &d).unwrap_err(), SessionError::ZeroWordQuota);
    }

    #[test]
    fn invalid_tempo_is_rejected() {
        let d = StageDistribution::new(vec![StageConfig::new(2, 90.0), StageConfig::new(2, -1.0)]);
        assert_eq!(
            d.validate().unwrap_err(),
            SessionError::InvalidTempo { stage: 2, bpm: -1.0 }
        );
    }

    #[test]
    fn no_stages_is_rejected() {
        let d = StageDistribution::new(Vec::new());
        assert_eq!(d.validate().unwrap_err(), SessionError::NoStages);
    }

    #[test]
    fn zero_quota_middle_stage_is_empty() {
        let d = StageDistribution::new(vec![
            StageConfig::new(2, 90.0),
            StageConfig::new(0, 100.0),
            StageConfig::new(2, 110.0),
        ]);
        assert_eq!(
            partition_words(words(4), &d).unwrap_err(),
            SessionError::EmptyStage { stage: 2 }
        );
    }
}
