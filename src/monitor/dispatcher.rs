use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{DispatchError, Result};
use crate::model::Alert;

/// Delivers persisted alerts to whoever watches the dispatch desk.
#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    async fn dispatch(&self, alert: &Alert) -> Result<()>;
}

/// Writes alerts to the log. Default when no other channel is wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDispatcher;

#[async_trait]
impl AlertDispatcher for LogDispatcher {
    async fn dispatch(&self, alert: &Alert) -> Result<()> {
        tracing::warn!(
            alert_id = %alert.id,
            job_id = %alert.job_id,
            severity = ?alert.severity,
            route = %alert.meta.route,
            "{}: {}",
            alert.title,
            alert.body
        );
        Ok(())
    }
}

/// Forwards alerts into an mpsc channel.
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    tx: mpsc::Sender<Alert>,
}

impl ChannelDispatcher {
    pub fn new(tx: mpsc::Sender<Alert>) -> Self {
        Self { tx }
    }

    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Alert>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl AlertDispatcher for ChannelDispatcher {
    async fn dispatch(&self, alert: &Alert) -> Result<()> {
        self.tx
            .send(alert.clone())
            .await
            .map_err(|_| DispatchError::Notify("alert receiver dropped".to_string()))
    }
}
