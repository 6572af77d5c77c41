use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::api::{run_api, ApiState};
use crate::clock::{Clock, SystemClock};
use crate::config::ServiceConfig;
use crate::engine::{DispatchEngine, LinkBuilder};
use crate::monitor::{AlertDispatcher, LogDispatcher, MonitorScheduler, UnbidMonitor};
use crate::store::{DispatchStore, MemoryStore};

/// Process wiring: one store, one engine, one monitor, one HTTP server.
pub struct Service {
    pub config: ServiceConfig,
    pub engine: Arc<DispatchEngine>,
    pub scheduler: Arc<MonitorScheduler>,
}

impl Service {
    /// In-memory store, wall clock, alerts to the log.
    pub fn new(config: ServiceConfig) -> Self {
        Self::with_parts(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
            Arc::new(LogDispatcher),
        )
    }

    pub fn with_parts(
        config: ServiceConfig,
        store: Arc<dyn DispatchStore>,
        clock: Arc<dyn Clock>,
        dispatcher: Arc<dyn AlertDispatcher>,
    ) -> Self {
        let engine = Arc::new(DispatchEngine::new(
            store.clone(),
            clock.clone(),
            LinkBuilder::new(config.public_base_url.clone()),
        ));
        let monitor = Arc::new(UnbidMonitor::new(
            store,
            dispatcher,
            clock,
            config.monitor.clone(),
        ));
        let scheduler = MonitorScheduler::new(monitor, config.monitor.interval());
        Self {
            config,
            engine,
            scheduler,
        }
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// 1. Spawns the event log loop
    /// 2. Starts the unbid monitor unless alerts are disabled
    /// 3. Serves the HTTP API (blocks until shutdown, then drains)
    /// 4. Stops the monitor and waits for an in-flight tick
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), Box<dyn std::error::Error>> {
        let events = self.engine.subscribe();
        let event_shutdown = shutdown.clone();
        tokio::spawn(async move {
            Self::event_loop(events, event_shutdown).await;
        });

        if self.config.monitor.enabled {
            self.scheduler.start();
        } else {
            tracing::info!("Unbid alerts disabled");
        }

        let state = ApiState::new(self.engine.clone());
        let served = run_api(self.config.listen_addr, state, shutdown.clone()).await;

        // The server may also exit on its own error; make sure everyone stops.
        shutdown.cancel();
        if let Some(handle) = self.scheduler.stop() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Monitor task ended abnormally");
            }
        }
        tracing::info!("Service stopped");
        served?;
        Ok(())
    }

    async fn event_loop(
        mut events: tokio::sync::broadcast::Receiver<crate::events::DispatchEvent>,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                received = events.recv() => match received {
                    Ok(event) => tracing::debug!(job_id = %event.job_id(), event = ?event, "Dispatch event"),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Event log lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    }
}
