//! Everything between the hand and the broker.
//!
//! - [`lifecycle`]: reconnect and heartbeat state machine.
//! - [`status`]: JSON projections published on the outbound topics.
//! - [`topics`]: the `robohand/{device_id}/...` topic layout.
//! - [`mqtt`]: the MQTT 3.1.1 packets the firmware session speaks.
//!
//! The [`Link`] trait is the seam the controller drives; the firmware backs it
//! with the network task, tests with in-memory fakes.
use alloc::string::String;
use alloc::vec::Vec;

use crate::config::Credentials;
use crate::error::ConnError;

pub mod lifecycle;
pub mod mqtt;
pub mod status;
pub mod topics;

pub use lifecycle::{ConnectionState, Lifecycle, LinkState};
pub use status::StatusReporter;
pub use topics::Topics;

/// One message delivered on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl Inbound {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Network and session are up and the command topic is subscribed.
    Established,
    /// Network or session dropped while connected.
    Lost,
    HeartbeatDue,
}

/// Transport (wifi) plus publish/subscribe channel (MQTT). No method may
/// block for longer than it takes to queue work.
pub trait Link {
    fn connect_network(&mut self) -> Result<(), ConnError>;

    fn network_connected(&self) -> bool;

    fn connect_channel(
        &mut self,
        client_id: &str,
        credentials: Option<&Credentials>,
    ) -> Result<(), ConnError>;

    fn channel_connected(&self) -> bool;

    fn subscribe(&mut self, topic: &str) -> Result<(), ConnError>;

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), ConnError>;

    /// Next inbound message, if one is waiting.
    fn poll(&mut self) -> Option<Inbound>;
}
