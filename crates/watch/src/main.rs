//! `jobsync-watch` -- follow one workflow job from the terminal.
//!
//! Prints the live event log as it grows, a status line whenever the
//! snapshot changes, and the normalized completion as JSON once the job
//! finishes. The first Ctrl-C asks the server to cancel the job; a second
//! one exits immediately.
//!
//! # Environment variables
//!
//! | Variable                           | Required | Default                      |
//! |------------------------------------|----------|------------------------------|
//! | `JOB_ID`                           | yes*     | --                           |
//! | `JOBSYNC_BASE_URL`                 | no       | `http://localhost:8000/api`  |
//! | `JOBSYNC_REQUEST_TIMEOUT_SECS`     | no       | `30`                         |
//! | `JOBSYNC_THROTTLE_WINDOW_MS`       | no       | `2000`                       |
//! | `JOBSYNC_FALLBACK_POLL_SECS`       | no       | `10`                         |
//! | `JOBSYNC_RECONNECT`                | no       | `backoff`                    |
//! | `JOBSYNC_RECONNECT_MAX_DELAY_SECS` | no       | `30`                         |
//! | `LOG_FORMAT`                       | no       | `pretty` (`json` for JSON)   |
//!
//! \* The job id may be given as the first argument instead.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use jobsync_client::{ClientConfig, JobApi};
use jobsync_core::status::JobStatus;
use jobsync_monitor::{JobMonitor, MonitorConfig};
use jobsync_watch::render::{completion_json, format_entry, phase_lines, status_line, LogCursor};
use tokio::sync::oneshot;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    init_tracing();

    let job_id = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("JOB_ID").ok())
        .unwrap_or_else(|| {
            tracing::error!("Pass a job id as the first argument or set JOB_ID");
            std::process::exit(2);
        });

    let client_config = ClientConfig::from_env();
    let monitor_config = MonitorConfig::from_env();

    tracing::info!(
        job_id = %job_id,
        base_url = %client_config.base_url,
        throttle_ms = monitor_config.throttle_window.as_millis() as u64,
        "Starting jobsync-watch",
    );

    let api = Arc::new(JobApi::new(&client_config));
    let (done_tx, mut done_rx) = oneshot::channel();
    let handle = JobMonitor::spawn(api, job_id.clone(), monitor_config, move |done| {
        let _ = done_tx.send(done);
    })
    .with_context(|| format!("Cannot monitor job {job_id}"))?;

    let mut views = handle.subscribe();
    let mut cursor = LogCursor::default();
    let mut last_status_line = String::new();
    let mut cancel_sent = false;
    let mut final_status = None;

    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();

                for entry in cursor.advance(&view.log) {
                    println!("{}", format_entry(entry));
                }

                let line = status_line(&view);
                if line != last_status_line {
                    println!("{line}");
                    if let Some(job) = &view.job {
                        for phase in phase_lines(job) {
                            println!("{phase}");
                        }
                    }
                    last_status_line = line;
                }

                if view.is_finished() {
                    final_status = view.last_status.or_else(|| view.status());
                    break;
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                if cancel_sent {
                    tracing::info!("Interrupted, exiting without waiting for the job");
                    break;
                }
                cancel_sent = true;
                eprintln!("Cancellation requested; press Ctrl-C again to stop watching");
                handle.cancel()?;
            }
        }
    }

    handle.stop().await;

    if let Ok(done) = done_rx.try_recv() {
        println!("{}", completion_json(&done));
        if done.needs_cleanup() {
            eprintln!("Job {} left resources behind that may need cleanup", done.job_id);
        }
        final_status = Some(done.status);
    }

    Ok(match final_status {
        Some(JobStatus::Completed) => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}

/// Install the global subscriber. `RUST_LOG` wins; `LOG_FORMAT=json`
/// switches to one JSON object per line.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "jobsync_watch=info,jobsync_monitor=info".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json");
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
