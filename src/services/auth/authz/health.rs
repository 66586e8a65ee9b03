use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Tracks consecutive policy-service failures so an outage is reported once
/// instead of once per denied request.
#[derive(Debug)]
pub struct PolicyServiceHealth {
    consecutive_failures: AtomicU64,
    alerting: AtomicBool,
    alert_threshold: u64,
}

impl PolicyServiceHealth {
    pub fn new(alert_threshold: u64) -> Self {
        Self {
            consecutive_failures: AtomicU64::new(0),
            alerting: AtomicBool::new(false),
            alert_threshold: alert_threshold.max(1),
        }
    }

    pub fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= self.alert_threshold && !self.alerting.swap(true, Ordering::Relaxed) {
            tracing::error!(
                consecutive_failures = failures,
                "policy service unavailable; delegated-policy requests are being denied"
            );
        }
    }

    pub fn record_success(&self) {
        let failures = self.consecutive_failures.swap(0, Ordering::Relaxed);
        if self.alerting.swap(false, Ordering::Relaxed) {
            tracing::info!(
                failed_before_recovery = failures,
                "policy service recovered"
            );
        }
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    pub fn is_alerting(&self) -> bool {
        self.alerting.load(Ordering::Relaxed)
    }
}
