// Dispatcher: hands each captured frame to a pooled worker and runs the
// prediction on its own thread
//
// The worker guard moves into the prediction thread, so the worker goes back
// to the pool when that thread finishes, however it finishes.

use crate::pipeline::error::PoolError;
use crate::pipeline::pool::WorkerPool;
use crate::pipeline::tally::{EmotionTally, TallySnapshot};
use crate::pipeline::worker::Predictor;
use crate::report::ResultLog;
use anyhow::{Context, Result};
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// What to do with a frame when every worker is busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyPolicy {
    /// Wait for a worker (frames are delayed, never dropped).
    Wait,
    /// Drop the frame and count it as skipped.
    Skip,
}

type PredictionTask = Box<dyn FnOnce() + Send + 'static>;

fn spawn_prediction(name: String, task: PredictionTask) -> io::Result<()> {
    thread::Builder::new().name(name).spawn(task).map(drop)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Prediction is running on its own thread.
    Started,
    /// No worker was free and the frame was dropped.
    Skipped,
    /// The frame could not be loaded into the worker.
    Rejected,
}

pub struct Dispatcher<P: Predictor> {
    pool: WorkerPool<P>,
    tally: Arc<EmotionTally>,
    results: Option<Arc<ResultLog>>,
    policy: BusyPolicy,
}

impl<P: Predictor> Dispatcher<P> {
    pub fn new(pool: WorkerPool<P>, tally: Arc<EmotionTally>, policy: BusyPolicy) -> Self {
        Self {
            pool,
            tally,
            results: None,
            policy,
        }
    }

    pub fn with_result_log(mut self, results: ResultLog) -> Self {
        self.results = Some(Arc::new(results));
        self
    }

    pub fn pool(&self) -> &WorkerPool<P> {
        &self.pool
    }

    pub fn tally(&self) -> &Arc<EmotionTally> {
        &self.tally
    }

    /// Checks out a worker, copies `frame` into it and starts the prediction.
    ///
    /// Returns an error only for pool-level failures (a closed pool or a
    /// thread that could not be spawned); per-frame failures are logged and
    /// tallied.
    pub fn dispatch(&self, frame_id: u64, frame: &P::Frame) -> Result<DispatchOutcome> {
        self.dispatch_with(frame_id, frame, spawn_prediction)
    }

    fn dispatch_with<S>(&self, frame_id: u64, frame: &P::Frame, spawn: S) -> Result<DispatchOutcome>
    where
        S: FnOnce(String, PredictionTask) -> io::Result<()>,
    {
        let mut worker = match self.policy {
            BusyPolicy::Wait => self.pool.acquire()?,
            BusyPolicy::Skip => match self.pool.try_acquire()? {
                Some(worker) => worker,
                None => {
                    tracing::debug!("All workers busy, skipping frame {}", frame_id);
                    self.tally.record_skipped();
                    return Ok(DispatchOutcome::Skipped);
                }
            },
        };

        if let Err(e) = worker.load_frame(frame) {
            tracing::warn!("Frame {}: could not load into worker: {}", frame_id, e);
            self.tally.record_failure();
            return Ok(DispatchOutcome::Rejected);
        }

        self.tally.record_dispatched();
        let tally = self.tally.clone();
        let results = self.results.clone();

        let task: PredictionTask = Box::new(move || {
            let start = Instant::now();
            match worker.predict() {
                Ok(prediction) => {
                    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
                    tracing::debug!(
                        "Frame {}: {:?} ({:.3}) in {:.1}ms",
                        frame_id,
                        prediction.label,
                        prediction.confidence,
                        elapsed_ms
                    );
                    tally.record(&prediction);
                    if let Some(results) = results {
                        if let Err(e) = results.record(frame_id, &prediction, elapsed_ms) {
                            tracing::warn!("Failed to log result for frame {}: {}", frame_id, e);
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("Frame {}: prediction failed: {}", frame_id, e);
                    tally.record_failure();
                }
            }
        });

        // A task that never ran has already dropped its worker guard.
        if let Err(e) = spawn(format!("predict-{}", frame_id), task) {
            self.tally.record_failure();
            return Err(e)
                .with_context(|| format!("Failed to spawn prediction thread for frame {}", frame_id));
        }

        Ok(DispatchOutcome::Started)
    }

    /// Waits for every running prediction, tears the pool down and returns
    /// the final counts.
    ///
    /// If another handle already shut the pool down, this still waits for
    /// that drain to finish before reading the counts.
    pub fn finish(self) -> Result<TallySnapshot> {
        match self.pool.shutdown() {
            Ok(()) | Err(PoolError::Closed) => {}
            Err(e) => return Err(e.into()),
        }
        if let Some(results) = &self.results {
            results.flush()?;
        }
        Ok(self.tally.snapshot())
    }
}
