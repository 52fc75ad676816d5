//! Hand-side types: servos, the registry that owns them, gestures and the
//! command interpreter.
//!
//! - [`servo`]: the [`servo::ServoDriver`] seam and the PWM servo.
//! - [`registry`]: named actuators with clamped angle state.
//! - [`gesture`]: preset poses expressed as min/max roles.
//! - [`commands`]: decoding of inbound JSON payloads.
//! - [`interpreter`]: dispatch of decoded commands onto the registry.
pub mod commands;
pub mod gesture;
pub mod interpreter;
pub mod registry;
pub mod servo;
