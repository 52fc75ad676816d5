//! Inbound command payloads.
//!
//! Decodes the JSON body of a `cmd/servo` message into one of the four
//! command shapes. When several fields are present the first match in
//! `servo`+`angle`, `servos`, `gesture`, `fingers` order wins.
use alloc::string::String;
use alloc::vec::Vec;
use micromath::F32Ext;
use serde::Deserialize;

use crate::error::DecodeError;

#[derive(Debug, Clone, PartialEq)]
pub struct ServoAngle {
    pub name: String,
    pub angle: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandShape {
    SetOne { servo: String, angle: i32 },
    SetMany(Vec<ServoAngle>),
    Gesture(String),
    ContinuousPositions(Vec<f32>),
    /// Valid JSON carrying none of the known fields.
    Unrecognized,
}

#[derive(Debug, Deserialize)]
struct RawServoAngle {
    name: String,
    angle: f32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCommand {
    servo: Option<String>,
    angle: Option<f32>,
    servos: Option<Vec<RawServoAngle>>,
    gesture: Option<String>,
    fingers: Option<Vec<f32>>,
}

/// Angles may arrive as floats, they are rounded and saturated into `i32`.
fn whole_degrees(angle: f32) -> i32 {
    F32Ext::round(angle) as i32
}

impl CommandShape {
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let raw: RawCommand = serde_json::from_slice(payload)?;
        Ok(raw.into())
    }
}

impl TryFrom<&[u8]> for CommandShape {
    type Error = DecodeError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Self::decode(value)
    }
}

impl From<RawCommand> for CommandShape {
    fn from(raw: RawCommand) -> Self {
        match raw {
            RawCommand {
                servo: Some(servo),
                angle: Some(angle),
                ..
            } => CommandShape::SetOne {
                servo,
                angle: whole_degrees(angle),
            },
            RawCommand {
                servos: Some(servos),
                ..
            } => CommandShape::SetMany(
                servos
                    .into_iter()
                    .map(|s| ServoAngle {
                        name: s.name,
                        angle: whole_degrees(s.angle),
                    })
                    .collect(),
            ),
            RawCommand {
                gesture: Some(name),
                ..
            } => CommandShape::Gesture(name),
            RawCommand {
                fingers: Some(ratios),
                ..
            } => CommandShape::ContinuousPositions(ratios),
            _ => CommandShape::Unrecognized,
        }
    }
}
