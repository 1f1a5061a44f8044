//! Engine tuning knobs, clamped to the declared ranges at load time so a
//! corrupt or hand-edited config can never push the engine outside its
//! supported operating envelope. Mirrors
//! `transcription_job_service.py::_load_settings`'s clamp-on-read approach.

use serde::{Deserialize, Serialize};

fn clamp_u32(value: u32, min: u32, max: u32) -> u32 {
    value.clamp(min, max)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub max_concurrent_jobs: u32,
    pub max_queued_jobs: u32,
    pub history_max_entries: u32,
    pub history_ttl_days: u32,
    pub retry_max: u32,
    pub retry_base_ms: u32,
    pub auto_requeue_interrupted: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            max_queued_jobs: 50,
            history_max_entries: 200,
            history_ttl_days: 30,
            retry_max: 3,
            retry_base_ms: 1000,
            auto_requeue_interrupted: true,
        }
    }
}

impl Settings {
    /// Clamps every field to its declared inclusive range. Called once on
    /// load and whenever settings are replaced at runtime, so a value read
    /// back from disk (or set by a caller) can never leave the supported
    /// envelope even if the source was edited by hand.
    pub fn clamped(self) -> Self {
        Self {
            max_concurrent_jobs: clamp_u32(self.max_concurrent_jobs, 1, 8),
            max_queued_jobs: clamp_u32(self.max_queued_jobs, 1, 500),
            history_max_entries: clamp_u32(self.history_max_entries, 10, 5000),
            history_ttl_days: clamp_u32(self.history_ttl_days, 1, 365),
            retry_max: clamp_u32(self.retry_max, 0, 10),
            retry_base_ms: clamp_u32(self.retry_base_ms, 100, 60000),
            auto_requeue_interrupted: self.auto_requeue_interrupted,
        }
    }

    pub fn history_ttl_secs(&self) -> u64 {
        u64::from(self.history_ttl_days) * 24 * 60 * 60
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_already_within_range() {
        assert_eq!(Settings::default(), Settings::default().clamped());
    }

    #[test]
    fn out_of_range_values_clamp_to_bounds() {
        let settings = Settings {
            max_concurrent_jobs: 99,
            max_queued_jobs: 0,
            history_max_entries: 1,
            history_ttl_days: 0,
            retry_max: 999,
            retry_base_ms: 1,
            auto_requeue_interrupted: false,
        }
        .clamped();

        assert_eq!(settings.max_concurrent_jobs, 8);
        assert_eq!(settings.max_queued_jobs, 1);
        assert_eq!(settings.history_max_entries, 10);
        assert_eq!(settings.history_ttl_days, 1);
        assert_eq!(settings.retry_max, 10);
        assert_eq!(settings.retry_base_ms, 100);
    }
}
