use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_GRACE_MINUTES: u64 = 10;
pub const DEFAULT_MONITOR_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_ALERT_BATCH: usize = 25;
/// One year.
pub const MAX_GRACE_MINUTES: u64 = 525_600;

/// Settings for the unbid monitor.
///
/// Mirrors the `DISABLE_UNBID_ALERTS`, `UNBID_ALERT_MINUTES`,
/// `UNBID_MONITOR_INTERVAL_MS` and `UNBID_ALERT_BATCH` environment settings.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// When false the monitor is never started.
    pub enabled: bool,
    /// How long a job may stay bid-less before it is escalated.
    pub grace_minutes: u64,
    /// Period between ticks.
    pub interval_ms: u64,
    /// Max candidates examined per tick.
    pub batch_limit: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            grace_minutes: DEFAULT_GRACE_MINUTES,
            interval_ms: DEFAULT_MONITOR_INTERVAL_MS,
            batch_limit: DEFAULT_ALERT_BATCH,
        }
    }
}

impl MonitorConfig {
    /// `None` when `grace_minutes` exceeds [`MAX_GRACE_MINUTES`].
    pub fn grace_window(&self) -> Option<chrono::Duration> {
        if self.grace_minutes > MAX_GRACE_MINUTES {
            return None;
        }
        chrono::Duration::try_minutes(i64::try_from(self.grace_minutes).ok()?)
    }

    pub fn interval(&self) -> Duration {
        // A zero period would make tokio's interval panic.
        Duration::from_millis(self.interval_ms.max(1))
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub listen_addr: SocketAddr,
    /// Base for the status, vendor and customer links handed out on
    /// `open_bidding`.
    pub public_base_url: String,
    pub monitor: MonitorConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            public_base_url: "http://localhost:8080".to_string(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Default::default()
        }
    }

    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = url.into();
        self
    }

    pub fn with_monitor(mut self, monitor: MonitorConfig) -> Self {
        self.monitor = monitor;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitor_config_default() {
        let cfg = MonitorConfig::default();
        assert!(cfg.enabled);
        assert_eq!(cfg.grace_minutes, 10);
        assert_eq!(cfg.interval_ms, 60_000);
        assert_eq!(cfg.batch_limit, 25);
        assert_eq!(cfg.grace_window(), Some(chrono::Duration::minutes(10)));
        assert_eq!(cfg.interval(), Duration::from_secs(60));
    }

    #[test]
    fn grace_window_is_bounded() {
        let at_max = MonitorConfig {
            grace_minutes: MAX_GRACE_MINUTES,
            ..Default::default()
        };
        assert_eq!(at_max.grace_window(), Some(chrono::Duration::days(365)));

        for grace_minutes in [MAX_GRACE_MINUTES + 1, 1 << 60, u64::MAX] {
            let cfg = MonitorConfig {
                grace_minutes,
                ..Default::default()
            };
            assert_eq!(cfg.grace_window(), None);
        }
    }

    #[test]
    fn zero_interval_is_clamped() {
        let cfg = MonitorConfig {
            interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(cfg.interval(), Duration::from_millis(1));
    }

    #[test]
    fn service_config_default() {
        let cfg = ServiceConfig::default();
        assert_eq!(cfg.listen_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(cfg.public_base_url, "http://localhost:8080");
        assert!(cfg.monitor.enabled);
    }

    #[test]
    fn service_config_builders() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let cfg = ServiceConfig::new(addr)
            .with_public_base_url("https://dispatch.example.com")
            .with_monitor(MonitorConfig {
                enabled: false,
                ..Default::default()
            });
        assert_eq!(cfg.listen_addr, addr);
        assert_eq!(cfg.public_base_url, "https://dispatch.example.com");
        assert!(!cfg.monitor.enabled);
    }
}
