//! Control loop: the single place where commands touch the servos.
use embassy_time::{Duration, Instant as EmbassyInstant, Ticker};
use log::info;

use super::bridge::MqttBridge;
use super::servo_task::FingerServo;
use crate::config::{Instant, MAX_SERVOS};
use crate::controller::{Robohand, SystemProbe};

const LOOP_PERIOD: Duration = Duration::from_millis(20);

pub struct HeapProbe;

impl SystemProbe for HeapProbe {
    fn free_heap(&self) -> u32 {
        esp_alloc::HEAP.free() as u32
    }
}

pub type FirmwareHand = Robohand<MqttBridge, FingerServo, HeapProbe, MAX_SERVOS>;

#[embassy_executor::task]
pub async fn control_task(mut hand: FirmwareHand) {
    info!("[CONTROL] starting control loop for {}", hand.device_id());
    let mut ticker = Ticker::every(LOOP_PERIOD);
    loop {
        let now = Instant::from_ticks(EmbassyInstant::now().as_millis());
        hand.run_once(now);
        ticker.next().await;
    }
}
