//! [`Link`] implementation for the firmware.
//!
//! The controller runs synchronously on the control task while the socket
//! lives on the MQTT task. Connection flags are shared atomics, messages go
//! through bounded channels and a session is requested with a signal. Nothing
//! here awaits.
use alloc::string::String;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use log::debug;

use crate::config::Credentials;
use crate::error::ConnError;
use crate::link::{Inbound, Link};
use crate::{INBOUND_CHANNEL_SIZE, OUTBOUND_CHANNEL_SIZE};

pub static WIFI_UP: AtomicBool = AtomicBool::new(false);
pub static MQTT_UP: AtomicBool = AtomicBool::new(false);

pub static SESSION_REQUEST: Signal<CriticalSectionRawMutex, SessionRequest> = Signal::new();
pub static INBOUND: Channel<CriticalSectionRawMutex, Inbound, INBOUND_CHANNEL_SIZE> =
    Channel::new();
pub static OUTBOUND: Channel<CriticalSectionRawMutex, Outbound, OUTBOUND_CHANNEL_SIZE> =
    Channel::new();

/// Asks the MQTT task to open a broker session.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub client_id: String,
    pub credentials: Option<Credentials>,
}

#[derive(Debug)]
pub enum Outbound {
    Subscribe(String),
    Publish { topic: String, payload: Vec<u8> },
}

#[derive(Debug, Default)]
pub struct MqttBridge;

impl Link for MqttBridge {
    fn connect_network(&mut self) -> Result<(), ConnError> {
        // the wifi connection task reconnects on its own
        if WIFI_UP.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(ConnError::Network)
        }
    }

    fn network_connected(&self) -> bool {
        WIFI_UP.load(Ordering::Acquire)
    }

    fn connect_channel(
        &mut self,
        client_id: &str,
        credentials: Option<&Credentials>,
    ) -> Result<(), ConnError> {
        if MQTT_UP.load(Ordering::Acquire) {
            return Ok(());
        }
        debug!("[NET] requesting broker session");
        SESSION_REQUEST.signal(SessionRequest {
            client_id: client_id.into(),
            credentials: credentials.cloned(),
        });
        Err(ConnError::Pending)
    }

    fn channel_connected(&self) -> bool {
        MQTT_UP.load(Ordering::Acquire)
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), ConnError> {
        OUTBOUND
            .try_send(Outbound::Subscribe(topic.into()))
            .map_err(|_| ConnError::QueueFull)
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), ConnError> {
        if !MQTT_UP.load(Ordering::Acquire) {
            return Err(ConnError::NotConnected);
        }
        OUTBOUND
            .try_send(Outbound::Publish {
                topic: topic.into(),
                payload: payload.into(),
            })
            .map_err(|_| ConnError::QueueFull)
    }

    fn poll(&mut self) -> Option<Inbound> {
        INBOUND.try_receive().ok()
    }
}
