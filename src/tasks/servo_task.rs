//! LEDC setup for the finger servos.
extern crate alloc;

use alloc::boxed::Box;
use anyhow::anyhow;
use esp_hal::gpio::AnyPin;
use esp_hal::ledc::channel::{self, Channel, ChannelIFace, Number};
use esp_hal::ledc::timer::{self, LSClockSource, TimerIFace};
use esp_hal::ledc::{LSGlobalClkSource, Ledc, LowSpeed};
use esp_hal::peripherals::LEDC;
use esp_hal::time::Rate;
use log::info;

use crate::config::{MAX_SERVOS, SERVO_FREQUENCY_HZ};
use crate::robot::servo::PwmServo;

pub type FingerServo = PwmServo<Channel<'static, LowSpeed>>;

pub fn create_configure_timer(
    ledc: &Ledc<'static>,
) -> anyhow::Result<timer::Timer<'static, LowSpeed>> {
    let mut timer_low = ledc.timer::<LowSpeed>(timer::Number::Timer0);
    timer_low
        .configure(timer::config::Config {
            duty: timer::config::Duty::Duty14Bit,
            clock_source: LSClockSource::APBClk,
            frequency: Rate::from_hz(SERVO_FREQUENCY_HZ),
        })
        .map_err(|e| anyhow!("Fail creating ledc timer: {e:?}"))?;
    Ok(timer_low)
}

/// One low speed channel per finger, all on timer 0.
pub fn create_finger_servos(
    ledc: LEDC<'static>,
    pins: [AnyPin<'static>; MAX_SERVOS],
) -> anyhow::Result<[FingerServo; MAX_SERVOS]> {
    info!("Configuring finger servos");
    let mut ledc = Ledc::new(ledc);
    ledc.set_global_slow_clock(LSGlobalClkSource::APBClk);
    // timer and driver must outlive the channels: leak them to get static lifetime.
    let ledc: &'static Ledc<'static> = Box::leak(Box::new(ledc));
    let timer_low: &'static timer::Timer<'static, LowSpeed> =
        Box::leak(Box::new(create_configure_timer(ledc)?));

    let [p0, p1, p2, p3, p4] = pins;
    let channels: [Channel<'static, LowSpeed>; MAX_SERVOS] = [
        ledc.channel(Number::Channel0, p0),
        ledc.channel(Number::Channel1, p1),
        ledc.channel(Number::Channel2, p2),
        ledc.channel(Number::Channel3, p3),
        ledc.channel(Number::Channel4, p4),
    ];

    let mut servos = heapless::Vec::<FingerServo, MAX_SERVOS>::new();
    for mut channel in channels {
        channel
            .configure(channel::config::Config {
                timer: timer_low,
                duty_pct: 0,
                pin_config: channel::config::PinConfig::PushPull,
            })
            .map_err(|e| anyhow!("Fail configurating channel: {e:?}"))?;
        let _ = servos.push(PwmServo::new(channel));
    }
    servos
        .into_array()
        .map_err(|_| anyhow!("expected {MAX_SERVOS} servos"))
}
