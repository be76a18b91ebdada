//! Concurrent scan of all devices.

use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::device::Device;
use crate::dialog::{FetchOptions, FetchResult};
use crate::error::FetchErrorCode;
use crate::store::find_last_config;

/// Scheduler knobs for one scan pass.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Fetches in flight at once; `0` means unbounded.
    pub max_concurrency: usize,

    /// Each fetch waits a random delay in `[delay_min, delay_max]` before
    /// connecting. A zero `delay_max` disables the delay.
    pub delay_min: Duration,
    pub delay_max: Duration,

    /// Devices that succeeded less than this long ago are skipped.
    pub holdtime: Duration,

    pub fetch: FetchOptions,
}

/// Counts and timing of one scan pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub success: usize,
    /// Completed fetches that did not succeed. Skipped devices are not
    /// counted here.
    pub failure: usize,
    pub skipped: usize,
    pub elapsed: Duration,
    /// Fastest and slowest single fetch.
    pub elapsed_min: Option<Duration>,
    pub elapsed_max: Option<Duration>,
}

impl ScanSummary {
    pub fn completed(&self) -> usize {
        self.success + self.failure
    }

    fn record(&mut self, good: bool, took: Duration) {
        if good {
            self.success += 1;
        } else {
            self.failure += 1;
        }
        self.elapsed_min = Some(self.elapsed_min.map_or(took, |m| m.min(took)));
        self.elapsed_max = Some(self.elapsed_max.map_or(took, |m| m.max(took)));
    }
}

/// Fetch every device once, honoring the holdtime and concurrency ceiling.
///
/// Devices are started in slice order. The scheduler is the only writer of
/// device status: results are applied here as they arrive, never from the
/// fetch tasks. Returns once every started fetch has reported.
pub async fn scan_devices(devices: &mut [Device], options: &ScanOptions) -> ScanSummary {
    let count = devices.len();
    let ceiling = if options.max_concurrency == 0 {
        "unlimited".to_string()
    } else {
        options.max_concurrency.to_string()
    };
    info!(
        "scan: starting devices={} max_concurrency={} delay=[{:?},{:?}] holdtime={:?}",
        count, ceiling, options.delay_min, options.delay_max, options.holdtime
    );

    let mut summary = ScanSummary::default();
    if count == 0 {
        info!("scan: no devices, aborting");
        return summary;
    }

    let begin = Instant::now();
    let fetch_options = Arc::new(options.fetch.clone());
    let mut rng = StdRng::from_entropy();
    let (tx, mut rx) = mpsc::unbounded_channel::<(usize, FetchResult)>();

    let mut next = 0;
    let mut in_flight = 0;

    while next < count || in_flight > 0 {
        while next < count {
            if options.max_concurrency > 0 && in_flight >= options.max_concurrency {
                break;
            }
            let index = next;
            next += 1;

            let device = &devices[index];
            if let Some(remaining) = device.holdtime_remaining(Utc::now(), options.holdtime) {
                info!(
                    "scan: {}: skipping, holdtime has {:?} left",
                    device.label(),
                    Duration::from_secs(remaining.as_secs())
                );
                summary.skipped += 1;
                continue;
            }

            let delay = jitter(&mut rng, options.delay_min, options.delay_max);
            spawn_fetch(index, device.clone(), delay, Arc::clone(&fetch_options), tx.clone());
            in_flight += 1;
        }

        if in_flight == 0 {
            // Everything left was skipped
            continue;
        }

        let Some((index, result)) = rx.recv().await else {
            warn!("scan: result channel closed with {} fetches in flight", in_flight);
            break;
        };
        in_flight -= 1;

        let end = Utc::now();
        let took = (end - result.begin).to_std().unwrap_or_default();
        let good = result.is_success();
        summary.record(good, took);
        log_result(&result, took);

        devices[index].record_fetch(good, end);
    }

    summary.elapsed = begin.elapsed();
    let average = if summary.completed() > 0 {
        summary.elapsed / summary.completed() as u32
    } else {
        Duration::ZERO
    };
    info!(
        "scan: finished devices={} success={} failure={} skipped={} elapsed={:?} average={:?} min={:?} max={:?}",
        count,
        summary.success,
        summary.failure,
        summary.skipped,
        summary.elapsed,
        average,
        summary.elapsed_min.unwrap_or_default(),
        summary.elapsed_max.unwrap_or_default(),
    );

    summary
}

fn spawn_fetch(
    index: usize,
    device: Device,
    delay: Duration,
    options: Arc<FetchOptions>,
    tx: mpsc::UnboundedSender<(usize, FetchResult)>,
) {
    tokio::spawn(async move {
        let outcome = AssertUnwindSafe(device.fetch(delay, &options))
            .catch_unwind()
            .await;
        let result = match outcome {
            Ok(result) => result,
            Err(_) => FetchResult::new(
                &device,
                "",
                FetchErrorCode::Commands,
                "fetch task panicked",
                Utc::now(),
            ),
        };
        // The scheduler holds the receiver until every fetch has reported.
        let _ = tx.send((index, result));
    });
}

fn jitter<R: Rng>(rng: &mut R, min: Duration, max: Duration) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    if max <= min {
        return min;
    }
    rng.gen_range(min..=max)
}

fn log_result(result: &FetchResult, took: Duration) {
    let took = Duration::from_millis(took.as_millis() as u64);
    if result.is_success() {
        info!(
            "scan: {} {} {} {}: ok elapsed={:?}",
            result.model, result.device_id, result.host_port, result.transport, took
        );
    } else {
        warn!(
            "scan: {} {} {} {}: error code={} ({}) elapsed={:?}: {}",
            result.model,
            result.device_id,
            result.host_port,
            result.transport,
            result.code.code(),
            result.code,
            took,
            result.message
        );
    }
}

/// Seed every device's last success time from its newest version file.
///
/// Run once at startup so holdtimes survive a restart.
pub fn update_last_success(devices: &mut [Device], repository: &Path) {
    for device in devices.iter_mut() {
        let prefix = device.version_prefix(repository);
        let last = match find_last_config(&prefix) {
            Ok(Some(version)) => version,
            Ok(None) => {
                debug!("scan: {}: no previous version", device.label());
                continue;
            }
            Err(e) => {
                warn!("scan: {}: finding last version: {}", device.label(), e);
                continue;
            }
        };

        match std::fs::metadata(&last.path).and_then(|m| m.modified()) {
            Ok(modified) => {
                let at = DateTime::<Utc>::from(modified);
                debug!("scan: {}: last success {}", device.label(), at);
                device.set_last_success(at);
            }
            Err(e) => warn!("scan: {}: stat {}: {}", device.label(), last.path.display(), e),
        }
    }
}
