//! Ultrasonic follower: one servo whose angle tracks the distance read by an
//! HC-SR04 style echo sensor.
use log::debug;

use crate::robot::servo::ServoDriver;

pub const DEFAULT_NEAR_CM: u32 = 5;
pub const DEFAULT_FAR_CM: u32 = 50;

/// Round trip echo time to distance, with sound at 343 m/s.
pub fn echo_to_cm(echo_us: u32) -> u32 {
    echo_us * 343 / 20_000
}

pub trait EchoSensor {
    /// Distance in centimetres, `None` when no echo came back.
    fn read_distance_cm(&mut self) -> Option<u32>;
}

pub struct UltraServo<E, S> {
    sensor: E,
    servo: S,
    near_cm: u32,
    far_cm: u32,
    min_angle: i32,
    max_angle: i32,
    angle: Option<i32>,
}

impl<E: EchoSensor, S: ServoDriver> UltraServo<E, S> {
    pub fn new(sensor: E, mut servo: S) -> Self {
        servo.attach();
        Self {
            sensor,
            servo,
            near_cm: DEFAULT_NEAR_CM,
            far_cm: DEFAULT_FAR_CM,
            min_angle: 0,
            max_angle: 180,
            angle: None,
        }
    }

    /// Distances below `near_cm` map to `min_angle`, above `far_cm` to
    /// `max_angle`.
    pub fn with_mapping(mut self, near_cm: u32, far_cm: u32, min_angle: i32, max_angle: i32) -> Self {
        self.near_cm = near_cm.min(far_cm);
        self.far_cm = far_cm.max(near_cm);
        self.min_angle = min_angle;
        self.max_angle = max_angle;
        self
    }

    pub fn angle(&self) -> Option<i32> {
        self.angle
    }

    pub fn angle_for(&self, distance_cm: u32) -> i32 {
        let span_cm = (self.far_cm - self.near_cm) as i64;
        if span_cm == 0 {
            return self.min_angle;
        }
        let d = (distance_cm.clamp(self.near_cm, self.far_cm) - self.near_cm) as i64;
        let span_deg = (self.max_angle - self.min_angle) as i64;
        self.min_angle + (d * span_deg / span_cm) as i32
    }

    /// Reads the sensor once and moves the servo if the target changed.
    pub fn update(&mut self) -> Option<i32> {
        let distance = self.sensor.read_distance_cm()?;
        let angle = self.angle_for(distance);
        if self.angle != Some(angle) {
            debug!("distance {distance} cm -> {angle}°");
            self.servo.write(angle);
            self.angle = Some(angle);
        }
        Some(angle)
    }
}
