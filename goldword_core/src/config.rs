//! Per-namespace study settings

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::{RecordRepository, Result};

/// Settings key the config is stored under
const CONFIG_KEY: &str = "study_config";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("plan quotas add up to {0}%, more than 100%")]
    QuotaOverflow(u32),

    #[error("typed answer threshold {0} is outside 0.0..=1.0")]
    Threshold(f64),
}

/// Share of the daily target given to each pool, in whole percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanQuotas {
    pub new: u32,
    pub review: u32,
    pub familiar: u32,
    pub difficult: u32,
}

impl Default for PlanQuotas {
    fn default() -> Self {
        Self {
            new: 20,
            review: 40,
            familiar: 20,
            difficult: 20,
        }
    }
}

impl PlanQuotas {
    pub fn total(&self) -> u32 {
        self.new
            .saturating_add(self.review)
            .saturating_add(self.familiar)
            .saturating_add(self.difficult)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudyConfig {
    /// Words in a full daily plan
    pub daily_target: usize,
    pub quotas: PlanQuotas,
    /// Similarity a typed answer needs to count as correct
    pub typed_answer_threshold: f64,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            daily_target: 50,
            quotas: PlanQuotas::default(),
            typed_answer_threshold: 0.85,
        }
    }
}

impl StudyConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let total = self.quotas.total();
        if total > 100 {
            return Err(ConfigError::QuotaOverflow(total));
        }
        if !(0.0..=1.0).contains(&self.typed_answer_threshold) {
            return Err(ConfigError::Threshold(self.typed_answer_threshold));
        }
        Ok(())
    }

    /// Stored config for a namespace, defaults when missing or unusable
    pub fn load<R: RecordRepository>(repo: &R, namespace: &str) -> Result<Self> {
        let Some(raw) = repo.load_setting(namespace, CONFIG_KEY)? else {
            return Ok(Self::default());
        };

        let config = match serde_json::from_str::<StudyConfig>(&raw) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Ignoring unreadable study config for '{}': {}", namespace, e);
                return Ok(Self::default());
            }
        };

        match config.validate() {
            Ok(()) => Ok(config),
            Err(e) => {
                log::warn!("Ignoring study config for '{}': {}", namespace, e);
                Ok(Self::default())
            }
        }
    }

    pub fn save<R: RecordRepository>(&self, repo: &mut R, namespace: &str) -> Result<()> {
        self.validate()?;
        let raw = serde_json::to_string(self).map_err(crate::db::StoreError::Serialize)?;
        repo.save_setting(namespace, CONFIG_KEY, &raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryRepository, StoreError};

    #[test]
    fn test_defaults_when_missing() {
        let repo = MemoryRepository::new();
        assert_eq!(StudyConfig::load(&repo, "guest").unwrap(), StudyConfig::default());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let mut repo = MemoryRepository::new();
        repo.save_setting("guest", CONFIG_KEY, r#"{"dailyTarget": 30, "quotas": {"review": 50, "new": 10}}"#)
            .unwrap();

        let config = StudyConfig::load(&repo, "guest").unwrap();
        assert_eq!(config.daily_target, 30);
        assert_eq!(config.quotas.review, 50);
        assert_eq!(config.quotas.new, 10);
        assert_eq!(config.quotas.familiar, 20);
        assert_eq!(config.typed_answer_threshold, 0.85);
    }

    #[test]
    fn test_partial_quotas_that_overflow_fall_back() {
        let mut repo = MemoryRepository::new();
        // the defaults filled in for the other pools push the total to 110%
        repo.save_setting("guest", CONFIG_KEY, r#"{"dailyTarget": 30, "quotas": {"review": 50}}"#)
            .unwrap();

        assert_eq!(StudyConfig::load(&repo, "guest").unwrap(), StudyConfig::default());
    }

    #[test]
    fn test_invalid_or_corrupt_config_falls_back() {
        let mut repo = MemoryRepository::new();
        repo.save_setting("a", CONFIG_KEY, r#"{"quotas": {"new": 90}}"#).unwrap();
        repo.save_setting("b", CONFIG_KEY, "not json").unwrap();

        assert_eq!(StudyConfig::load(&repo, "a").unwrap(), StudyConfig::default());
        assert_eq!(StudyConfig::load(&repo, "b").unwrap(), StudyConfig::default());
    }

    #[test]
    fn test_save_rejects_invalid() {
        let mut repo = MemoryRepository::new();
        let config = StudyConfig {
            typed_answer_threshold: 1.5,
            ..Default::default()
        };

        let err = config.save(&mut repo, "guest").unwrap_err();
        assert!(matches!(err, StoreError::Config(ConfigError::Threshold(_))));
        assert_eq!(repo.load_setting("guest", CONFIG_KEY).unwrap(), None);
    }

    #[test]
    fn test_save_then_load() {
        let mut repo = MemoryRepository::new();
        let config = StudyConfig {
            daily_target: 80,
            quotas: PlanQuotas { new: 10, review: 50, familiar: 20, difficult: 20 },
            typed_answer_threshold: 0.9,
        };
        config.save(&mut repo, "guest").unwrap();

        assert_eq!(StudyConfig::load(&repo, "guest").unwrap(), config);
    }
}
