//! Physical actuator side: the [`ServoDriver`] seam and a PWM implementation.
use crate::config::{SERVO_FREQUENCY_HZ, SERVO_MAX_PULSE_US, SERVO_MIN_PULSE_US};
use embedded_hal::pwm::SetDutyCycle;
use fugit::HertzU32;
use log::{debug, error, warn};

/// What the registry needs from a servo output.
pub trait ServoDriver {
    /// Start driving the output. Called once at registration.
    fn attach(&mut self);

    /// Move to `angle` degrees. The registry has already clamped it to the
    /// actuator range.
    fn write(&mut self, angle: i32);
}

#[derive(Debug)]
pub struct PwmServo<PWM> {
    pwm: PWM,
    max_duty: u32,
    frequency: HertzU32,
    attached: bool,
}

impl<PWM> PwmServo<PWM>
where
    PWM: SetDutyCycle,
{
    pub fn new(pwm: PWM) -> Self {
        Self::with_frequency(pwm, HertzU32::from_raw(SERVO_FREQUENCY_HZ))
    }

    pub fn with_frequency(pwm: PWM, frequency: HertzU32) -> Self {
        let max_duty = pwm.max_duty_cycle() as u32;
        Self {
            pwm,
            max_duty,
            frequency,
            attached: false,
        }
    }

    /// Duty cycle for `angle` (0–180, clamped) at this PWM resolution.
    pub fn duty_for(&self, angle: i32) -> u16 {
        let angle = angle.clamp(0, 180) as u32;

        // Linearly interpolate the pulse, e.g. 90° -> 1472 µs
        let pulse =
            SERVO_MIN_PULSE_US + angle * (SERVO_MAX_PULSE_US - SERVO_MIN_PULSE_US) / 180;

        // THE WIDTH OF THE PULSE DRIVES THE ANGLE, NOT FREQ
        let period_us = 1_000_000 / self.frequency.raw();
        ((pulse * self.max_duty) / period_us).min(self.max_duty) as u16
    }

    pub fn into_inner(self) -> PWM {
        self.pwm
    }
}

impl<PWM> ServoDriver for PwmServo<PWM>
where
    PWM: SetDutyCycle,
{
    fn attach(&mut self) {
        self.attached = true;
    }

    fn write(&mut self, angle: i32) {
        if !self.attached {
            warn!("write of {angle}° to a detached servo ignored");
            return;
        }
        let duty = self.duty_for(angle);
        debug!("duty: {duty}");
        if let Err(e) = self.pwm.set_duty_cycle(duty) {
            error!("Error writing angle {angle}: {e:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;

    /// 8 bit PWM channel that remembers the last duty.
    struct FakePwm {
        duty: Option<u16>,
    }

    impl embedded_hal::pwm::ErrorType for FakePwm {
        type Error = Infallible;
    }

    impl SetDutyCycle for FakePwm {
        fn max_duty_cycle(&self) -> u16 {
            255
        }

        fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
            self.duty = Some(duty);
            Ok(())
        }
    }

    #[test]
    fn angle_maps_to_pulse_width() {
        let servo = PwmServo::new(FakePwm { duty: None });
        // 544 µs of a 20000 µs period on 8 bits
        assert_eq!(servo.duty_for(0), 6);
        // 2400 µs
        assert_eq!(servo.duty_for(180), 30);
        assert_eq!(servo.duty_for(400), servo.duty_for(180));
        assert_eq!(servo.duty_for(-20), servo.duty_for(0));
    }

    #[test]
    fn write_needs_attach() {
        let mut servo = PwmServo::new(FakePwm { duty: None });
        servo.write(90);
        assert_eq!(servo.pwm.duty, None);

        servo.attach();
        servo.write(90);
        assert_eq!(servo.into_inner().duty, Some(18));
    }
}
