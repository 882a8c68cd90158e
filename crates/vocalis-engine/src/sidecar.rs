//! Recognition worker health.
//!
//! Reflects what the external supervisor reports. Retry and backoff live in
//! the supervisor; this monitor only records transitions and forwards a
//! user-initiated restart.

use tracing::{info, warn};
use vocalis_core::events::SidecarStatusPayload;
use vocalis_core::types::{SidecarState, SidecarStatus};

use crate::host::{HostError, PlatformHost};

/// Result of folding one sidecar-status event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SidecarTransition {
    pub previous: SidecarState,
    pub current: SidecarState,
}

impl SidecarTransition {
    /// The worker came back after a crash or restart loop.
    pub fn recovered(&self) -> bool {
        self.current == SidecarState::Ready && self.previous != SidecarState::Ready
    }
}

#[derive(Debug, Clone, Default)]
pub struct SidecarHealthMonitor {
    status: SidecarStatus,
}

impl SidecarHealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> &SidecarStatus {
        &self.status
    }

    pub fn recovery_needed(&self) -> bool {
        self.status.recovery_needed()
    }

    /// Fold a status event. `restart_count` never decreases.
    pub fn apply(&mut self, payload: &SidecarStatusPayload) -> SidecarTransition {
        let previous = self.status.state;
        let current = match SidecarState::from_wire(&payload.state) {
            Some(state) => state,
            None => {
                warn!(state = %payload.state, "Unknown sidecar state, keeping {}", previous);
                previous
            }
        };

        let restart_count = self.status.restart_count.max(payload.restart_count);
        if current != previous {
            info!(from = %previous, to = %current, restart_count, "Sidecar state changed");
        }

        self.status = SidecarStatus {
            state: current,
            restart_count,
            message: payload.message.clone(),
        };
        SidecarTransition { previous, current }
    }

    /// Ask the supervisor for a restart. No retry here.
    pub async fn restart(&self, host: &dyn PlatformHost) -> Result<(), HostError> {
        info!(restart_count = self.status.restart_count, "Requesting sidecar restart");
        host.restart_sidecar().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(state: &str, restart_count: u32) -> SidecarStatusPayload {
        SidecarStatusPayload {
            state: state.to_string(),
            restart_count,
            message: None,
        }
    }

    #[test]
    fn test_recovery_flag() {
        let mut monitor = SidecarHealthMonitor::new();
        assert!(!monitor.recovery_needed());

        monitor.apply(&payload("restarting", 1));
        assert!(monitor.recovery_needed());

        monitor.apply(&payload("failed", 3));
        assert!(monitor.recovery_needed());

        let transition = monitor.apply(&payload("ready", 3));
        assert!(transition.recovered());
        assert!(!monitor.recovery_needed());
    }

    #[test]
    fn test_restart_count_is_monotonic() {
        let mut monitor = SidecarHealthMonitor::new();
        monitor.apply(&payload("restarting", 4));
        monitor.apply(&payload("ready", 0));
        assert_eq!(monitor.status().restart_count, 4);
        monitor.apply(&payload("crashed", 5));
        assert_eq!(monitor.status().restart_count, 5);
        assert_eq!(monitor.status().state, SidecarState::Restarting);
    }

    #[test]
    fn test_unknown_state_keeps_previous() {
        let mut monitor = SidecarHealthMonitor::new();
        monitor.apply(&payload("failed", 2));
        let transition = monitor.apply(&SidecarStatusPayload {
            state: "hibernating".into(),
            restart_count: 2,
            message: Some("zzz".into()),
        });
        assert_eq!(transition.current, SidecarState::Failed);
        assert!(!transition.recovered());
        assert_eq!(monitor.status().message.as_deref(), Some("zzz"));
    }

    #[test]
    fn test_ready_to_ready_is_not_recovery() {
        let mut monitor = SidecarHealthMonitor::new();
        assert!(!monitor.apply(&payload("ready", 0)).recovered());
    }
}
