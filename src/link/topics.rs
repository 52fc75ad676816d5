use alloc::format;
use alloc::string::String;

use crate::config::TOPIC_PREFIX;

/// MQTT topics of one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub command: String,
    pub status: String,
    pub servo_status: String,
    pub heartbeat: String,
}

impl Topics {
    pub fn new(device_id: &str) -> Self {
        Self {
            command: format!("{TOPIC_PREFIX}/{device_id}/cmd/servo"),
            status: format!("{TOPIC_PREFIX}/{device_id}/status"),
            servo_status: format!("{TOPIC_PREFIX}/{device_id}/servo_status"),
            heartbeat: format!("{TOPIC_PREFIX}/{device_id}/heartbeat"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_layout() {
        let topics = Topics::new("robohand_001");
        assert_eq!(topics.command, "robohand/robohand_001/cmd/servo");
        assert_eq!(topics.status, "robohand/robohand_001/status");
        assert_eq!(topics.servo_status, "robohand/robohand_001/servo_status");
        assert_eq!(topics.heartbeat, "robohand/robohand_001/heartbeat");
    }
}
