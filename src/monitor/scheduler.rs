use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::monitor::{TickReport, UnbidMonitor};

/// Clears the busy flag on drop, including when a tick unwinds.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Drives an [`UnbidMonitor`] on a fixed period.
///
/// A busy flag keeps ticks in this process from overlapping. It says nothing
/// about other processes; cross-instance exclusion is the alert claim's job.
pub struct MonitorScheduler {
    monitor: Arc<UnbidMonitor>,
    interval: Duration,
    busy: AtomicBool,
    running: Mutex<Option<Running>>,
}

impl MonitorScheduler {
    pub fn new(monitor: Arc<UnbidMonitor>, interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            monitor,
            interval: interval.max(Duration::from_millis(1)),
            busy: AtomicBool::new(false),
            running: Mutex::new(None),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .map(|r| r.is_some())
            .unwrap_or(false)
    }

    /// Run one tick unless another is already in flight. Returns `None` when
    /// the tick was skipped or the candidate query failed.
    pub async fn run_tick_guarded(&self) -> Option<TickReport> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Previous unbid tick still running, skipping");
            return None;
        }

        let result = {
            let _busy = BusyGuard(&self.busy);
            self.monitor.tick().await
        };

        match result {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!(error = %e, "Unbid monitor tick failed");
                None
            }
        }
    }

    /// Start the periodic loop. The first tick fires one full interval after
    /// start. Calling `start` on a running scheduler does nothing.
    pub fn start(self: &Arc<Self>) {
        let Ok(mut running) = self.running.lock() else {
            tracing::error!("Monitor scheduler state poisoned, not starting");
            return;
        };
        if running.is_some() {
            return;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let period = scheduler.interval;
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::info!("Unbid monitor stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        // Runs to completion even if stop() lands mid-tick.
                        scheduler.run_tick_guarded().await;
                    }
                }
            }
        });

        tracing::info!(interval_ms = self.interval.as_millis() as u64, "Unbid monitor started");
        *running = Some(Running { cancel, handle });
    }

    /// Clear the recurring timer. An in-flight tick finishes; await the
    /// returned handle to wait for it.
    pub fn stop(&self) -> Option<JoinHandle<()>> {
        let running = self.running.lock().ok()?.take()?;
        running.cancel.cancel();
        Some(running.handle)
    }
}
