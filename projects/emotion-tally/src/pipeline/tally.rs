use crate::pipeline::types::{LabelCatalog, Prediction};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Running per-label counts, shared by every in-flight prediction task.
#[derive(Debug)]
pub struct EmotionTally {
    counts: Mutex<BTreeMap<String, u64>>,
    dispatched: AtomicU64,
    completed: AtomicU64,
    no_face: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

/// Point-in-time copy of an [`EmotionTally`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TallySnapshot {
    pub dispatched: u64,
    pub completed: u64,
    pub no_face: u64,
    pub failed: u64,
    pub skipped: u64,
    pub counts: BTreeMap<String, u64>,
}

impl EmotionTally {
    /// Every catalog label starts at zero so it shows up in the summary.
    pub fn new(labels: &LabelCatalog) -> Self {
        Self {
            counts: Mutex::new(labels.iter().map(|l| (l.to_string(), 0)).collect()),
            dispatched: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            no_face: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        }
    }

    pub fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record(&self, prediction: &Prediction) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        if prediction.is_none() {
            self.no_face.fetch_add(1, Ordering::Relaxed);
            return;
        }
        if let Ok(mut counts) = self.counts.lock() {
            *counts.entry(prediction.label.clone()).or_insert(0) += 1;
        }
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TallySnapshot {
        let counts = self
            .counts
            .lock()
            .map(|c| c.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone());
        TallySnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            no_face: self.no_face.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            counts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_counts_by_label() {
        let tally = EmotionTally::new(&LabelCatalog::emotions());
        tally.record(&Prediction::new("Happy", 0.9));
        tally.record(&Prediction::new("Happy", 0.6));
        tally.record(&Prediction::new("Sad", 0.7));
        tally.record(&Prediction::none());
        tally.record(&Prediction::new("Angry", 0.0));
        tally.record_failure();
        tally.record_skipped();

        let snap = tally.snapshot();
        assert_eq!(snap.completed, 5);
        assert_eq!(snap.no_face, 2);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.skipped, 1);
        assert_eq!(snap.counts["Happy"], 2);
        assert_eq!(snap.counts["Sad"], 1);
        assert_eq!(snap.counts["Angry"], 0);
        assert_eq!(snap.counts.len(), 7);
    }

    #[test]
    fn test_concurrent_recording() {
        let tally = Arc::new(EmotionTally::new(&LabelCatalog::emotions()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tally = tally.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        tally.record_dispatched();
                        tally.record(&Prediction::new("Neutral", 0.5));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snap = tally.snapshot();
        assert_eq!(snap.dispatched, 800);
        assert_eq!(snap.completed, 800);
        assert_eq!(snap.counts["Neutral"], 800);
    }
}
