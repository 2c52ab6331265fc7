//! Append-only local event log

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;

use ee_core::{AppConfig, Error, Result, TelemetryEvent};

/// Destination for completion events
pub trait TelemetrySink: Send + Sync {
    fn log_event(&self, config: &AppConfig, event: &TelemetryEvent) -> Result<()>;
}

/// Writes one JSON object per line to `config.local_log_path` when
/// `config.enable_local_logs` is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonlTelemetrySink;

#[derive(Serialize)]
struct TimestampedEvent<'a> {
    timestamp: String,
    #[serde(flatten)]
    event: &'a TelemetryEvent,
}

impl TelemetrySink for JsonlTelemetrySink {
    fn log_event(&self, config: &AppConfig, event: &TelemetryEvent) -> Result<()> {
        if !config.enable_local_logs {
            return Ok(());
        }

        let path = &config.local_log_path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                Error::Telemetry(format!("Cannot create log directory {}: {}", parent.display(), e))
            })?;
        }

        let record = TimestampedEvent {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
            event,
        };
        let line = serde_json::to_string(&record).map_err(|e| Error::Serialization(e.to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::Telemetry(format!("Cannot open {}: {}", path.display(), e)))?;
        writeln!(file, "{}", line)
            .map_err(|e| Error::Telemetry(format!("Cannot write {}: {}", path.display(), e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ee_core::{Interaction, COMPLETION_EVENT};
    use serde_json::Value;

    fn event(request_id: &str) -> TelemetryEvent {
        TelemetryEvent {
            event: COMPLETION_EVENT.to_string(),
            request_id: Some(request_id.to_string()),
            interaction: Interaction::Ask,
            provider: "ollama".to_string(),
            model: "deepseek-r1".to_string(),
            skill_level: "beginner".to_string(),
            retrieval_chunk_count: 3,
        }
    }

    #[test]
    fn test_disabled_sink_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            local_log_path: dir.path().join("logs/events.jsonl"),
            ..AppConfig::default()
        };

        JsonlTelemetrySink.log_event(&config, &event("r1")).unwrap();
        assert!(!config.local_log_path.exists());
        assert!(!dir.path().join("logs").exists());
    }

    #[test]
    fn test_enabled_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            enable_local_logs: true,
            local_log_path: dir.path().join("nested/logs/events.jsonl"),
            ..AppConfig::default()
        };

        JsonlTelemetrySink.log_event(&config, &event("r1")).unwrap();
        JsonlTelemetrySink.log_event(&config, &event("r2")).unwrap();

        let content = fs::read_to_string(&config.local_log_path).unwrap();
        let lines: Vec<Value> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["request_id"], "r1");
        assert_eq!(lines[1]["request_id"], "r2");
        assert_eq!(lines[0]["event"], "completion");
        assert_eq!(lines[0]["interaction"], "ask");
        assert_eq!(lines[0]["retrieval_chunk_count"], 3);
        let timestamp = lines[0]["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
    }
}
