//! Turns decoded commands into registry writes.
//!
//! The interpreter holds no state of its own besides the gesture table. Every
//! element of a command is applied independently: one failing servo never
//! stops the others, except for finger arrays whose length must match the
//! number of active servos before anything moves.
use alloc::vec::Vec;
use log::{debug, info, warn};

use super::commands::CommandShape;
use super::gesture::GestureLibrary;
use super::registry::ServoRegistry;
use super::servo::ServoDriver;
use crate::error::{CommandError, DecodeError};

/// Outcome of one dispatched command.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DispatchReport {
    /// Servo writes that went through.
    pub applied: usize,
    /// Per-element failures, in input order.
    pub errors: Vec<CommandError>,
    /// The command had no effect by definition (unknown gesture,
    /// unrecognised shape).
    pub ignored: bool,
}

impl DispatchReport {
    fn ignored() -> Self {
        Self {
            ignored: true,
            ..Self::default()
        }
    }

    fn record<T>(&mut self, result: Result<T, impl Into<CommandError>>) {
        match result {
            Ok(_) => self.applied += 1,
            Err(e) => {
                let e = e.into();
                warn!("[CONTROL] {e}");
                self.errors.push(e);
            }
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Interpreter {
    gestures: GestureLibrary,
}

impl Interpreter {
    pub fn new(gestures: GestureLibrary) -> Self {
        Self { gestures }
    }

    pub fn gestures(&self) -> &GestureLibrary {
        &self.gestures
    }

    /// Decodes and dispatches a raw payload. Malformed payloads are dropped
    /// whole.
    pub fn handle_payload<S: ServoDriver, const N: usize>(
        &self,
        payload: &[u8],
        registry: &mut ServoRegistry<S, N>,
    ) -> Result<DispatchReport, DecodeError> {
        let cmd = CommandShape::decode(payload)?;
        Ok(self.dispatch(cmd, registry))
    }

    pub fn dispatch<S: ServoDriver, const N: usize>(
        &self,
        cmd: CommandShape,
        registry: &mut ServoRegistry<S, N>,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        match cmd {
            CommandShape::SetOne { servo, angle } => {
                info!("[CONTROL] set {servo} to {angle}");
                report.record(registry.apply(servo.as_str(), angle));
            }
            CommandShape::SetMany(servos) => {
                info!("[CONTROL] set {} servos", servos.len());
                for s in &servos {
                    report.record(registry.apply(s.name.as_str(), s.angle));
                }
            }
            CommandShape::Gesture(name) => {
                let Some(preset) = self.gestures.resolve(&name) else {
                    warn!("[CONTROL] unknown gesture {name:?} ignored");
                    return DispatchReport::ignored();
                };
                info!("[CONTROL] gesture {}", preset.name);
                for &(id, role) in preset.roles {
                    report.record(registry.apply_role(id, role));
                }
            }
            CommandShape::ContinuousPositions(ratios) => {
                let expected = registry.active_count();
                if ratios.len() != expected {
                    report.record::<()>(Err(CommandError::ArityMismatch {
                        expected,
                        actual: ratios.len(),
                    }));
                    return report;
                }
                debug!("[CONTROL] fingers {ratios:?}");
                let slots: heapless::Vec<usize, N> = registry
                    .iter()
                    .enumerate()
                    .filter(|(_, a)| a.is_active())
                    .map(|(slot, _)| slot)
                    .collect();
                for (slot, ratio) in slots.into_iter().zip(ratios) {
                    report.record(registry.apply_ratio(slot, ratio));
                }
            }
            CommandShape::Unrecognized => {
                debug!("[CONTROL] message without a known command ignored");
                return DispatchReport::ignored();
            }
        }
        report
    }
}
