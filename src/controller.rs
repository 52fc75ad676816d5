//! The hand controller: registry, interpreter and link lifecycle behind one
//! explicit loop step.
//!
//! [`Robohand::run_once`] is the whole control loop body. It services the
//! connection, dispatches waiting commands strictly one after another in
//! arrival order and publishes whatever telemetry is due. Nothing in it
//! sleeps, so the caller decides the loop cadence.
use alloc::string::String;
use log::{debug, info, warn};
use serde::Serialize;

use crate::config::{ControllerConfig, Credentials, Duration, Instant, MAX_MESSAGES_PER_STEP};
use crate::error::RegistryError;
use crate::link::{
    ConnectionState, Inbound, Lifecycle, Link, LinkEvent, LinkState, StatusReporter, Topics,
};
use crate::robot::gesture::GestureLibrary;
use crate::robot::interpreter::{DispatchReport, Interpreter};
use crate::robot::registry::ServoRegistry;
use crate::robot::servo::ServoDriver;

/// Resource figures for the status message.
pub trait SystemProbe {
    fn free_heap(&self) -> u32;
}

/// No probe: reports a heap of 0.
impl SystemProbe for () {
    fn free_heap(&self) -> u32 {
        0
    }
}

/// What one [`Robohand::run_once`] did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StepSummary {
    pub event: Option<LinkEvent>,
    /// Inbound messages taken off the link.
    pub handled: usize,
}

pub struct Robohand<L, S, P, const N: usize> {
    device_id: String,
    topics: Topics,
    registry: ServoRegistry<S, N>,
    interpreter: Interpreter,
    lifecycle: Lifecycle,
    link: L,
    probe: P,
}

impl<L, S, P, const N: usize> Robohand<L, S, P, N>
where
    L: Link,
    S: ServoDriver,
    P: SystemProbe,
{
    pub fn new(config: ControllerConfig, link: L, probe: P) -> Self {
        let topics = Topics::new(&config.device_id);
        let lifecycle = Lifecycle::new(&config, topics.command.clone());
        Self {
            device_id: config.device_id,
            topics,
            registry: ServoRegistry::new(),
            interpreter: Interpreter::default(),
            lifecycle,
            link,
            probe,
        }
    }

    pub fn with_gestures(mut self, gestures: GestureLibrary) -> Self {
        self.interpreter = Interpreter::new(gestures);
        self
    }

    pub fn register_actuator(
        &mut self,
        id: &str,
        driver: S,
        min_angle: i32,
        max_angle: i32,
    ) -> Result<usize, RegistryError> {
        self.registry.register(id, driver, min_angle, max_angle)
    }

    pub fn configure(&mut self, heartbeat_interval: Duration, credentials: Option<Credentials>) {
        self.lifecycle.configure(heartbeat_interval, credentials);
    }

    pub fn set_retry_delay(&mut self, delay: Duration) {
        self.lifecycle.set_retry_delay(delay);
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    pub fn registry(&self) -> &ServoRegistry<S, N> {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ServoRegistry<S, N> {
        &mut self.registry
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn link_state(&self) -> LinkState {
        self.lifecycle.state()
    }

    pub fn connection(&self) -> ConnectionState {
        self.lifecycle.connection()
    }

    /// One loop iteration: lifecycle, inbound commands, telemetry.
    pub fn run_once(&mut self, now: Instant) -> StepSummary {
        let event = self.lifecycle.step(now, &mut self.link);
        match event {
            Some(LinkEvent::Established) => self.publish_status(now),
            Some(LinkEvent::HeartbeatDue) => {
                self.publish_heartbeat(now);
                self.publish_status(now);
            }
            Some(LinkEvent::Lost) | None => {}
        }

        let mut handled = 0;
        while handled < MAX_MESSAGES_PER_STEP {
            let Some(message) = self.link.poll() else {
                break;
            };
            handled += 1;
            self.handle(message);
        }

        StepSummary { event, handled }
    }

    /// Dispatches one inbound message. Returns `None` when it was dropped
    /// before reaching the registry.
    pub fn handle(&mut self, message: Inbound) -> Option<DispatchReport> {
        if message.topic != self.topics.command {
            debug!("[CONTROL] ignoring message on {}", message.topic);
            return None;
        }
        // only changes made by this message are reported below
        self.registry.take_changed();
        let report = match self
            .interpreter
            .handle_payload(&message.payload, &mut self.registry)
        {
            Ok(report) => report,
            Err(e) => {
                warn!("[CONTROL] {e}");
                return None;
            }
        };
        if self.registry.take_changed() {
            self.publish_servo_status();
        }
        Some(report)
    }

    pub fn publish_status(&mut self, now: Instant) {
        let msg = StatusReporter::status(
            &self.lifecycle.connection(),
            self.probe.free_heap(),
            now,
        );
        send(&mut self.link, &self.lifecycle, &self.topics.status, &msg);
    }

    pub fn publish_servo_status(&mut self) {
        let msg = StatusReporter::servo_status(&self.registry);
        send(
            &mut self.link,
            &self.lifecycle,
            &self.topics.servo_status,
            &msg,
        );
    }

    pub fn publish_heartbeat(&mut self, now: Instant) {
        let msg = StatusReporter::heartbeat(&self.device_id, now);
        send(&mut self.link, &self.lifecycle, &self.topics.heartbeat, &msg);
        info!("[NET] heartbeat at {} ms", now.ticks());
    }
}

fn send<L: Link, T: Serialize>(link: &mut L, lifecycle: &Lifecycle, topic: &str, message: &T) {
    if !lifecycle.is_connected() {
        debug!("[NET] offline, {topic} not published");
        return;
    }
    let payload = match StatusReporter::encode(message) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("[NET] could not encode {topic}: {e}");
            return;
        }
    };
    if let Err(e) = link.publish(topic, &payload) {
        warn!("[NET] publish on {topic} failed: {e}");
    }
}
