//! Library root for the Robohand firmware.
//!
//! Re-exports the main modules: [`robot`] (servo registry, gestures, command
//! interpretation), [`link`] (MQTT lifecycle, status reporting) and the
//! [`controller`] that ties them together into one loop step.
//! The embassy [`tasks`] only exist with the `firmware` feature.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod controller;
pub mod error;
pub mod link;
pub mod proximity;
pub mod robot;
#[cfg(feature = "firmware")]
pub mod tasks;

pub use config::{ControllerConfig, Credentials, Duration, Instant};
pub use controller::{Robohand, SystemProbe};
pub use error::{CommandError, ConnError, DecodeError, RegistryError};

pub const INBOUND_CHANNEL_SIZE: usize = 4;
pub const OUTBOUND_CHANNEL_SIZE: usize = 8;
