//! Connection lifecycle: keeps the MQTT session alive and paces heartbeats.
//!
//! `Disconnected -> Connecting -> Connected`, and back to `Connecting` as soon
//! as the network or the broker session drops. Retries never give up. Each
//! [`Lifecycle::step`] does at most one connection attempt and returns
//! immediately, the retry delay is a deadline rather than a sleep.
use alloc::string::String;
use log::{debug, info, warn};

use super::{Link, LinkEvent};
use crate::config::{ControllerConfig, Credentials, Duration, Instant};
use crate::error::ConnError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting { next_attempt: Instant },
    Connected,
}

/// Connectivity snapshot read by the status reporter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub transport_connected: bool,
    pub channel_connected: bool,
    pub last_heartbeat: Option<Instant>,
}

#[derive(Debug)]
pub struct Lifecycle {
    state: LinkState,
    conn: ConnectionState,
    client_id: String,
    command_topic: String,
    credentials: Option<Credentials>,
    heartbeat_interval: Duration,
    retry_delay: Duration,
    attempts: u32,
}

impl Lifecycle {
    pub fn new(config: &ControllerConfig, command_topic: impl Into<String>) -> Self {
        Self {
            state: LinkState::Disconnected,
            conn: ConnectionState::default(),
            client_id: config.device_id.clone(),
            command_topic: command_topic.into(),
            credentials: config.credentials.clone(),
            heartbeat_interval: config.heartbeat_interval,
            retry_delay: config.retry_delay,
            attempts: 0,
        }
    }

    /// Takes effect from the next heartbeat / connection attempt.
    pub fn configure(&mut self, heartbeat_interval: Duration, credentials: Option<Credentials>) {
        self.heartbeat_interval = heartbeat_interval;
        self.credentials = credentials;
    }

    pub fn set_retry_delay(&mut self, delay: Duration) {
        self.retry_delay = delay;
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn connection(&self) -> ConnectionState {
        self.conn
    }

    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    /// Failed attempts since the last successful connection.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn step<L: Link>(&mut self, now: Instant, link: &mut L) -> Option<LinkEvent> {
        self.refresh(link);
        match self.state {
            LinkState::Disconnected => {
                info!("[NET] connecting to broker as {}", self.client_id);
                self.try_connect(now, link)
            }
            LinkState::Connecting { next_attempt } if now >= next_attempt => {
                self.try_connect(now, link)
            }
            LinkState::Connecting { .. } => None,
            LinkState::Connected => {
                if !(self.conn.transport_connected && self.conn.channel_connected) {
                    warn!(
                        "[NET] connection lost (wifi: {}, mqtt: {})",
                        self.conn.transport_connected, self.conn.channel_connected
                    );
                    self.state = LinkState::Connecting { next_attempt: now };
                    return Some(LinkEvent::Lost);
                }
                if self.heartbeat_due(now) {
                    self.conn.last_heartbeat = Some(now);
                    return Some(LinkEvent::HeartbeatDue);
                }
                None
            }
        }
    }

    fn heartbeat_due(&self, now: Instant) -> bool {
        match self.conn.last_heartbeat {
            Some(last) => now
                .checked_duration_since(last)
                .is_some_and(|elapsed| elapsed >= self.heartbeat_interval),
            None => true,
        }
    }

    fn refresh<L: Link>(&mut self, link: &L) {
        self.conn.transport_connected = link.network_connected();
        self.conn.channel_connected = link.channel_connected();
    }

    fn try_connect<L: Link>(&mut self, now: Instant, link: &mut L) -> Option<LinkEvent> {
        let result = self.bring_up(link);
        self.refresh(link);
        match result {
            Ok(()) => {
                info!(
                    "[NET] connected, subscribed to {} after {} failed attempts",
                    self.command_topic, self.attempts
                );
                self.attempts = 0;
                self.state = LinkState::Connected;
                // the status snapshot sent on connect restarts the heartbeat window
                self.conn.last_heartbeat = Some(now);
                Some(LinkEvent::Established)
            }
            Err(e) => {
                self.attempts = self.attempts.saturating_add(1);
                let next_attempt = now + self.retry_delay;
                if e == ConnError::Pending {
                    debug!("[NET] session pending, retry at {} ms", next_attempt.ticks());
                } else {
                    warn!(
                        "[NET] connect attempt {} failed: {e}, retrying in {} ms",
                        self.attempts,
                        self.retry_delay.to_millis()
                    );
                }
                self.state = LinkState::Connecting { next_attempt };
                None
            }
        }
    }

    fn bring_up<L: Link>(&self, link: &mut L) -> Result<(), ConnError> {
        if !link.network_connected() {
            link.connect_network()?;
        }
        if !link.channel_connected() {
            link.connect_channel(&self.client_id, self.credentials.as_ref())?;
        }
        link.subscribe(&self.command_topic)
    }
}
