//! Outbound JSON bodies: `status`, `servo_status` and `heartbeat`.
use alloc::vec::Vec;
use serde::Serialize;

use super::lifecycle::ConnectionState;
use crate::config::Instant;
use crate::robot::registry::ServoRegistry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusMessage {
    pub wifi: bool,
    pub mqtt: bool,
    /// Free heap in bytes.
    pub heap: u32,
    /// Seconds since boot.
    pub uptime: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServoEntry<'a> {
    pub name: &'a str,
    pub angle: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServoStatusMessage<'a> {
    pub servos: Vec<ServoEntry<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeartbeatMessage<'a> {
    pub device_id: &'a str,
    /// Milliseconds since boot.
    pub timestamp: u64,
}

/// Stateless projection of the controller state into messages.
pub struct StatusReporter;

impl StatusReporter {
    pub fn status(conn: &ConnectionState, free_heap: u32, now: Instant) -> StatusMessage {
        StatusMessage {
            wifi: conn.transport_connected,
            mqtt: conn.channel_connected,
            heap: free_heap,
            uptime: now.duration_since_epoch().to_secs(),
        }
    }

    pub fn servo_status<S, const N: usize>(registry: &ServoRegistry<S, N>) -> ServoStatusMessage<'_> {
        ServoStatusMessage {
            servos: registry
                .iter()
                .map(|a| ServoEntry {
                    name: a.id(),
                    angle: a.angle(),
                })
                .collect(),
        }
    }

    pub fn heartbeat(device_id: &str, now: Instant) -> HeartbeatMessage<'_> {
        HeartbeatMessage {
            device_id,
            timestamp: now.ticks(),
        }
    }

    pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(message)
    }
}
