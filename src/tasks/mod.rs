//! Embassy tasks of the ESP32 firmware.
//!
//! - [`net_task`]: wifi station, the embassy-net runner and the MQTT session.
//! - [`bridge`]: the [`crate::link::Link`] the controller drives, backed by
//!   channels into the MQTT session task.
//! - [`servo_task`]: LEDC timer/channel setup for the finger servos.
//! - [`control_task`]: ticks [`crate::Robohand::run_once`].
//!
//! Tasks are spawned from `main.rs` and communicate via embassy-sync
//! channels, so every registry write happens on the control task.
pub mod bridge;
pub mod control_task;
pub mod net_task;
pub mod servo_task;
