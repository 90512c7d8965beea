// Capture session: reads frames from the source, dispatches each one to the
// worker pool, optionally shows them, and reports the tally at the end.

use crate::config::SessionConfig;
use crate::pipeline::dispatcher::{BusyPolicy, Dispatcher};
use crate::pipeline::dnn::{build_worker, EmotionWorker};
use crate::pipeline::pool::WorkerPool;
use crate::pipeline::tally::EmotionTally;
use crate::pipeline::types::LabelCatalog;
use crate::report::{write_report, ResultLog, SessionReport};
use crate::video::progress::capture_progress;
use crate::video::{FrameSource, OpencvReader, SourceSpec};
use anyhow::{Context, Result};
use chrono::Utc;
use indicatif::ProgressBar;
use opencv::highgui;
use opencv::prelude::*;
use std::sync::Arc;
use std::time::Instant;

const WINDOW_NAME: &str = "Emotion Tally";
const ESC_KEY: i32 = 27;

/// Runs a full capture session and returns its report.
///
/// Workers are shut down (waiting for in-flight predictions) even when the
/// capture loop fails, so every dispatched frame is accounted for.
pub fn run_session(config: &SessionConfig) -> Result<SessionReport> {
    let labels = Arc::new(LabelCatalog::new(config.labels.iter().cloned()));
    if labels.is_empty() {
        anyhow::bail!("Label catalog is empty");
    }

    let source = SourceSpec::parse(&config.source);
    let mut reader = OpencvReader::open(&source)?;

    tracing::info!("Loading {} inference workers", config.workers);
    let pool = WorkerPool::new(config.workers, |i| {
        build_worker(i, &config.models, labels.clone())
    })
    .context("Failed to start inference workers")?;

    let tally = Arc::new(EmotionTally::new(&labels));
    let policy = if config.skip_when_busy {
        BusyPolicy::Skip
    } else {
        BusyPolicy::Wait
    };
    let mut dispatcher = Dispatcher::new(pool, tally, policy);
    if let Some(path) = &config.results_csv {
        let log = ResultLog::create(path)
            .with_context(|| format!("Failed to create results file {:?}", path))?;
        dispatcher = dispatcher.with_result_log(log);
    }

    if config.display {
        highgui::named_window(WINDOW_NAME, highgui::WINDOW_AUTOSIZE)?;
    }

    tracing::info!("Start reading {}", source);
    let started_at = Utc::now();
    let start = Instant::now();
    let pb = capture_progress(reader.frame_count())?;

    let captured = capture_loop(&mut reader, &dispatcher, config, &pb);
    pb.finish_and_clear();

    let tally = dispatcher.finish()?;
    captured?;

    if config.display {
        highgui::destroy_window(WINDOW_NAME)?;
    }

    let report = SessionReport {
        source: source.to_string(),
        workers: config.workers,
        source_fps: reader.source_fps(),
        started_at,
        finished_at: Utc::now(),
        elapsed_secs: start.elapsed().as_secs_f64(),
        tally,
    };

    if let Some(path) = &config.report {
        write_report(path, &report)
            .with_context(|| format!("Failed to write report to {:?}", path))?;
        tracing::info!("Report written to {:?}", path);
    }

    Ok(report)
}

fn capture_loop(
    reader: &mut dyn FrameSource,
    dispatcher: &Dispatcher<EmotionWorker>,
    config: &SessionConfig,
    pb: &ProgressBar,
) -> Result<()> {
    let mut frame_id: u64 = 0;

    loop {
        if config.max_frames.is_some_and(|max| frame_id >= max) {
            tracing::info!("Reached frame limit ({})", frame_id);
            break;
        }

        let frame = match reader.next_frame()? {
            Some(frame) => frame,
            None => {
                tracing::info!("Device closed: {}", config.source);
                break;
            }
        };
        if frame.empty() {
            continue;
        }

        dispatcher.dispatch(frame_id, &frame)?;
        frame_id += 1;
        pb.inc(1);

        if config.display {
            highgui::imshow(WINDOW_NAME, &frame)?;
            if highgui::wait_key(1)? == ESC_KEY {
                tracing::info!("ESC pressed, stopping capture");
                break;
            }
        }

        if config.grab_skip > 0 {
            reader.skip_frames(config.grab_skip)?;
            pb.inc(config.grab_skip as u64);
        }
    }

    Ok(())
}

/// Logs the end-of-run summary.
pub fn log_summary(report: &SessionReport) {
    let tally = &report.tally;
    tracing::info!(
        "Frames: {} dispatched, {} completed, {} without a face, {} failed, {} skipped",
        tally.dispatched,
        tally.completed,
        tally.no_face,
        tally.failed,
        tally.skipped
    );
    for (label, count) in &tally.counts {
        tracing::info!("  {}: {}", label, count);
    }
    tracing::info!("Elapsed: {:.2}s", report.elapsed_secs);
}
