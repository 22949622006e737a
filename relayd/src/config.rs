//! Framework configuration.
//!
//! Plain serde structs with per-field defaults; embedding applications are
//! responsible for loading them from wherever their configuration lives.
//! `validate()` catches capacities and sizes that would wedge the pipeline.

use serde::{Deserialize, Serialize};

use relayd_wire::{DEFAULT_FRAME_CAPACITY, MIN_FRAME_LEN};

/// Queue capacity configuration.
///
/// Both pipeline queues are bounded. The inbound queue's bound is the
/// backpressure point of the whole server: when it fills, the reactor
/// drops newly read frames instead of blocking. The outbound bound pushes
/// the failure back to `send`/`broadcast` callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Capacity of the reactor → worker queue.
    pub inbound_capacity: usize,

    /// Capacity of the worker/application → sender queue.
    pub outbound_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            inbound_capacity: 1000,
            outbound_capacity: 1000,
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.inbound_capacity == 0 {
            return Err("inbound_capacity must be at least 1".to_string());
        }
        if self.outbound_capacity == 0 {
            return Err("outbound_capacity must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to.
    pub host: String,

    /// Port to bind to. Zero asks the kernel for an ephemeral port; read
    /// it back from `Server::local_addr`.
    pub port: u16,

    /// Listen backlog.
    pub backlog: i32,

    /// Worker thread count. Per-peer inbound ordering is only guaranteed
    /// with a single worker; raising this trades that guarantee for
    /// parallel handler execution.
    pub worker_count: usize,

    /// Per-frame buffer capacity. Frames larger than this are never
    /// produced and peers claiming one are disconnected.
    pub frame_capacity: usize,

    /// Strategy code advertised in the handshake and applied to the data
    /// path (0 = plaintext, 1 = XOR; unknown degrades to plaintext).
    pub strategy_code: u32,

    /// Ceiling on one epoll wait, so the exit flag is observed promptly.
    pub poll_timeout_ms: i32,

    /// Events drained per epoll wait.
    pub max_events: usize,

    /// Pipeline queue capacities.
    pub queue: QueueConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            backlog: 100,
            worker_count: 1,
            frame_capacity: DEFAULT_FRAME_CAPACITY,
            strategy_code: 1,
            poll_timeout_ms: 100,
            max_events: 100,
            queue: QueueConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be at least 1".to_string());
        }
        if self.worker_count > 1 {
            tracing::warn!(
                workers = self.worker_count,
                "multiple workers disable per-peer inbound ordering"
            );
        }
        if self.frame_capacity < MIN_FRAME_LEN {
            return Err(format!(
                "frame_capacity must be at least {MIN_FRAME_LEN} bytes"
            ));
        }
        if self.backlog <= 0 {
            return Err("backlog must be positive".to_string());
        }
        if self.poll_timeout_ms <= 0 {
            return Err("poll_timeout_ms must be positive".to_string());
        }
        if self.max_events == 0 {
            return Err("max_events must be at least 1".to_string());
        }
        self.queue.validate()
    }
}

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Per-frame buffer capacity; servers claiming a larger frame get the
    /// connection reset.
    pub frame_capacity: usize,

    /// Delay between reconnect attempts.
    pub reconnect_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            frame_capacity: DEFAULT_FRAME_CAPACITY,
            reconnect_delay_ms: 1000,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.frame_capacity < MIN_FRAME_LEN {
            return Err(format!(
                "frame_capacity must be at least {MIN_FRAME_LEN} bytes"
            ));
        }
        if self.reconnect_delay_ms == 0 {
            return Err("reconnect_delay_ms must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ServerConfig::default().validate().is_ok());
        assert!(ClientConfig::default().validate().is_ok());
        assert!(QueueConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_capacity_queue_is_rejected() {
        let config = QueueConfig {
            inbound_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn undersized_frame_capacity_is_rejected() {
        let config = ServerConfig {
            frame_capacity: 8,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ClientConfig {
            frame_capacity: 12,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_workers_are_rejected() {
        let config = ServerConfig {
            worker_count: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
