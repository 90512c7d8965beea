// Run artifacts: per-frame result log (CSV) and end-of-run summary (JSON)

use crate::pipeline::tally::TallySnapshot;
use crate::pipeline::types::Prediction;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

/// Summary written at the end of a capture session
#[derive(Serialize, Debug, Clone)]
pub struct SessionReport {
    pub source: String,
    pub workers: usize,
    /// Frame rate the source reports, if any
    pub source_fps: Option<f64>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub tally: TallySnapshot,
}

pub fn write_report(path: &Path, report: &SessionReport) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json)?;
    Ok(())
}

#[derive(Serialize, Debug)]
struct ResultRow<'a> {
    frame: u64,
    label: &'a str,
    confidence: f32,
    elapsed_ms: f64,
}

/// One CSV row per completed prediction. Rows arrive in completion order,
/// not frame order.
pub struct ResultLog {
    writer: Mutex<csv::Writer<File>>,
}

impl ResultLog {
    pub fn create(path: &Path) -> Result<Self> {
        let writer = csv::Writer::from_path(path)?;
        Ok(Self {
            writer: Mutex::new(writer),
        })
    }

    pub fn record(&self, frame: u64, prediction: &Prediction, elapsed_ms: f64) -> Result<()> {
        let mut writer = self.writer.lock().map_err(|_| anyhow!("Mutex poisoned"))?;
        writer.serialize(ResultRow {
            frame,
            label: &prediction.label,
            confidence: prediction.confidence,
            elapsed_ms,
        })?;
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        let mut writer = self.writer.lock().map_err(|_| anyhow!("Mutex poisoned"))?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_result_log_writes_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");

        let log = ResultLog::create(&path).unwrap();
        log.record(3, &Prediction::new("Happy", 0.75), 12.5).unwrap();
        log.record(1, &Prediction::none(), 4.0).unwrap();
        log.flush().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines[0], "frame,label,confidence,elapsed_ms");
        assert_eq!(lines[1], "3,Happy,0.75,12.5");
        assert_eq!(lines[2], "1,,0.0,4.0");
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("summary.json");

        let mut counts = BTreeMap::new();
        counts.insert("Happy".to_string(), 4);
        let now = Utc::now();
        let report = SessionReport {
            source: "0".to_string(),
            workers: 4,
            source_fps: Some(30.0),
            started_at: now,
            finished_at: now,
            elapsed_secs: 1.5,
            tally: TallySnapshot {
                dispatched: 6,
                completed: 5,
                no_face: 1,
                failed: 1,
                skipped: 0,
                counts,
            },
        };
        write_report(&path, &report).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["workers"], 4);
        assert_eq!(value["source_fps"], 30.0);
        assert_eq!(value["tally"]["counts"]["Happy"], 4);
        assert_eq!(value["tally"]["no_face"], 1);
    }
}
