//! Compile-time constants and the runtime controller configuration.
use alloc::string::String;
use core::fmt;

/// Milliseconds since boot.
pub type Instant = fugit::TimerInstantU64<1000>;
pub type Duration = fugit::MillisDurationU64;

/// Max number of actuators a hand can register.
pub const MAX_SERVOS: usize = 5;
/// Max length in bytes of an actuator id.
pub const MAX_ID_LEN: usize = 16;

pub const DEFAULT_MIN_ANGLE: i32 = 0;
pub const DEFAULT_MAX_ANGLE: i32 = 180;

pub const DEFAULT_HEARTBEAT_MS: u64 = 30_000;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 5_000;
/// Inbound messages dispatched per loop step, the rest wait for the next one.
pub const MAX_MESSAGES_PER_STEP: usize = 8;

pub const TOPIC_PREFIX: &str = "robohand";
pub const DEFAULT_DEVICE_ID: &str = "robohand_001";

// SERVO PWM
pub const SERVO_FREQUENCY_HZ: u32 = 50;
pub const SERVO_MIN_PULSE_US: u32 = 544;
pub const SERVO_MAX_PULSE_US: u32 = 2400;

// MQTT
pub const MQTT_PORT: u16 = 1883;
pub const MQTT_KEEP_ALIVE_SECS: u16 = 60;
pub const RX_BUF_SIZE: usize = 1024;
pub const TX_BUF_SIZE: usize = 1024;
/// Inbound packets longer than this are skipped without being buffered.
pub const MAX_INBOUND_PACKET: usize = RX_BUF_SIZE;

/// Username/password pair sent in the MQTT CONNECT packet.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

// never prints the password
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub device_id: String,
    pub heartbeat_interval: Duration,
    pub retry_delay: Duration,
    pub credentials: Option<Credentials>,
}

impl ControllerConfig {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            ..Self::default()
        }
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            device_id: String::from(DEFAULT_DEVICE_ID),
            heartbeat_interval: Duration::millis(DEFAULT_HEARTBEAT_MS),
            retry_delay: Duration::millis(DEFAULT_RETRY_DELAY_MS),
            credentials: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_firmware_timings() {
        let config = ControllerConfig::default();
        assert_eq!(config.heartbeat_interval.to_millis(), 30_000);
        assert_eq!(config.retry_delay.to_millis(), 5_000);
        assert!(config.credentials.is_none());
    }

    #[test]
    fn builder_overrides_fields() {
        let config = ControllerConfig::new("hand_7")
            .with_heartbeat_interval(Duration::millis(1_000))
            .with_credentials(Some(Credentials::new("user", "secret")));
        assert_eq!(config.device_id, "hand_7");
        assert_eq!(config.heartbeat_interval.to_millis(), 1_000);
        assert_eq!(config.credentials.unwrap().username, "user");
    }

    #[test]
    fn debug_output_hides_the_password() {
        let config = ControllerConfig::new("hand_7")
            .with_credentials(Some(Credentials::new("user", "hunter2")));
        let printed = format!("{config:?}");
        assert!(printed.contains("user"));
        assert!(!printed.contains("hunter2"));
    }
}
