use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dispatcher::PressStrategy;
use crate::logger;
use crate::sleep::Timings;

/// Operator preferences persisted to `settings.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub images_dir: PathBuf,
    pub confidence_threshold: f64,
    pub scan_interval_secs: f64,
    pub direct_click_mode: bool,
    pub input_text: String,
    pub fallback_text: String,
    pub button_log: PathBuf,
    pub input_pause_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            images_dir: PathBuf::from("."),
            confidence_threshold: 0.8,
            scan_interval_secs: 2.0,
            direct_click_mode: true,
            input_text: "keep".into(),
            fallback_text: "KEEP".into(),
            button_log: PathBuf::from("button_press.log"),
            input_pause_ms: 500,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Non-positive values scan back to back; values too large for a
    /// `Duration` fall back to the default interval.
    fn scan_interval(&self) -> Duration {
        let secs = self.scan_interval_secs;
        if secs.is_nan() || secs <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(secs).unwrap_or_else(|_| {
            let fallback = Timings::default().scan_interval;
            logger::warn(&format!(
                "scan interval {}s out of range, using {}s",
                secs,
                fallback.as_secs_f64()
            ));
            fallback
        })
    }

    pub fn loop_config(&self) -> LoopConfig {
        let strategy = if self.direct_click_mode {
            PressStrategy::DirectClick
        } else {
            PressStrategy::TextEntry {
                text: self.input_text.clone(),
                fallback: self.fallback_text.clone(),
            }
        };
        let interval = self.scan_interval();
        LoopConfig {
            images_dir: self.images_dir.clone(),
            button_log: self.button_log.clone(),
            confidence_threshold: self.confidence_threshold.clamp(0.0, 1.0),
            strategy,
            timings: Timings { scan_interval: interval, ..Timings::default() },
        }
    }
}

/// In-process configuration of one scan loop instance.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    /// Directory holding keep.png, btn.png, approved.png, stop.png
    pub images_dir: PathBuf,
    pub button_log: PathBuf,
    pub confidence_threshold: f64,
    pub strategy: PressStrategy,
    pub timings: Timings,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Settings::default().loop_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = LoopConfig::default();
        assert_eq!(cfg.confidence_threshold, 0.8);
        assert_eq!(cfg.timings.scan_interval, Duration::from_secs(2));
        assert_eq!(cfg.timings.settle, Duration::from_secs(1));
        assert_eq!(cfg.strategy, PressStrategy::DirectClick);
        assert_eq!(cfg.button_log, PathBuf::from("button_press.log"));
    }

    #[test]
    fn text_entry_mode_carries_both_texts() {
        let s = Settings { direct_click_mode: false, ..Settings::default() };
        assert_eq!(
            s.loop_config().strategy,
            PressStrategy::TextEntry { text: "keep".into(), fallback: "KEEP".into() }
        );
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "direct_click_mode": false, "scan_interval_secs": 0.5 }"#).unwrap();

        let s = Settings::load(&path);
        assert!(!s.direct_click_mode);
        assert_eq!(s.scan_interval_secs, 0.5);
        assert_eq!(s.input_text, "keep");
        assert_eq!(s.loop_config().timings.scan_interval, Duration::from_millis(500));
    }

    #[test]
    fn unreadable_file_gives_defaults_and_save_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load(&path), Settings::default());

        let s = Settings { confidence_threshold: 0.9, ..Settings::default() };
        s.save(&path).unwrap();
        assert_eq!(Settings::load(&path), s);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let s = Settings { confidence_threshold: 1.7, scan_interval_secs: -3.0, ..Settings::default() };
        let cfg = s.loop_config();
        assert_eq!(cfg.confidence_threshold, 1.0);
        assert_eq!(cfg.timings.scan_interval, Duration::ZERO);
    }

    #[test]
    fn huge_or_invalid_interval_does_not_panic() {
        let huge = Settings { scan_interval_secs: 1e20, ..Settings::default() };
        assert_eq!(huge.loop_config().timings.scan_interval, Duration::from_secs(2));

        let infinite = Settings { scan_interval_secs: f64::INFINITY, ..Settings::default() };
        assert_eq!(infinite.loop_config().timings.scan_interval, Duration::from_secs(2));

        let nan = Settings { scan_interval_secs: f64::NAN, ..Settings::default() };
        assert_eq!(nan.loop_config().timings.scan_interval, Duration::ZERO);
    }

    #[test]
    fn huge_interval_in_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "scan_interval_secs": 1e20 }"#).unwrap();

        let cfg = Settings::load(&path).loop_config();
        assert_eq!(cfg.timings.scan_interval, Duration::from_secs(2));
    }
}
