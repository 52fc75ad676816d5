#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]

extern crate alloc;

use alloc::boxed::Box;
use core::future::pending;
use embassy_executor::Spawner;
use embassy_net::{Config as NetConfig, StackResources};
use esp_backtrace as _;
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{AnyPin, Pin};
use esp_hal::timer::timg::TimerGroup;
use log::{error, info};
use robohand::config::{DEFAULT_DEVICE_ID, MAX_SERVOS};
use robohand::tasks::bridge::MqttBridge;
use robohand::tasks::control_task::{control_task, FirmwareHand, HeapProbe};
use robohand::tasks::net_task::{mqtt_task, runner_task, wifi_task};
use robohand::tasks::servo_task::create_finger_servos;
use robohand::{ControllerConfig, Credentials, Robohand};

esp_bootloader_esp_idf::esp_app_desc!();

//FINGERS: [thumb, index, middle, ring, pinky]
//PINS:    [13, 12, 14, 27, 26]
const FINGERS: [&str; MAX_SERVOS] = ["thumb", "index", "middle", "ring", "pinky"];

macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        STATIC_CELL.init_with(|| $val)
    }};
}

fn controller_config() -> ControllerConfig {
    let credentials = option_env!("MQTT_USER")
        .map(|user| Credentials::new(user, option_env!("MQTT_PASS").unwrap_or("")));
    ControllerConfig::new(option_env!("DEVICE_ID").unwrap_or(DEFAULT_DEVICE_ID))
        .with_credentials(credentials)
}

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    esp_println::logger::init_logger_from_env();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let p = esp_hal::init(config);

    esp_alloc::heap_allocator!(size: 32 * 1024);
    esp_alloc::heap_allocator!(#[unsafe(link_section = ".dram2_uninit")] size: 96 * 1024);

    let timer0 = TimerGroup::new(p.TIMG1);
    esp_hal_embassy::init(timer0.timer0);

    // take important peripherals
    let mut rng = esp_hal::rng::Rng::new(p.RNG);
    let timer1 = TimerGroup::new(p.TIMG0);
    let wifi_init = esp_wifi::init(timer1.timer0, rng, p.RADIO_CLK)
        .expect("Failed to initialize WIFI controller");
    let wifi_init = Box::leak(Box::new(wifi_init));
    let (wifi_controller, interfaces) =
        esp_wifi::wifi::new(wifi_init, p.WIFI).expect("Failed to initialize WIFI controller");

    let servo_pins: [AnyPin<'static>; MAX_SERVOS] = [
        p.GPIO13.degrade(),
        p.GPIO12.degrade(),
        p.GPIO14.degrade(),
        p.GPIO27.degrade(),
        p.GPIO26.degrade(),
    ];
    let servos = create_finger_servos(p.LEDC, servo_pins).expect("Fail configurating servos");

    let mut hand: FirmwareHand = Robohand::new(controller_config(), MqttBridge, HeapProbe);
    for (finger, servo) in FINGERS.into_iter().zip(servos) {
        if let Err(e) = hand.register_actuator(finger, servo, 0, 180) {
            error!("Could not register {finger}: {e}");
        }
    }

    //Get the embassy net stack up and working.
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;
    let config = NetConfig::dhcpv4(Default::default());
    let device = interfaces.sta;
    let (stack, runner) = embassy_net::new(
        device,
        config,
        mk_static!(StackResources<3>, StackResources::new()),
        seed,
    );

    info!("Starting robohand {}...", hand.device_id());
    spawner
        .spawn(wifi_task(wifi_controller))
        .expect("Fail spawning wifi task");
    spawner
        .spawn(runner_task(runner))
        .expect("Fail spawning runner task");
    spawner
        .spawn(mqtt_task(stack))
        .expect("Fail spawning mqtt task");
    spawner
        .spawn(control_task(hand))
        .expect("Fail spawning control task");

    loop {
        pending::<()>().await;
    }
}
