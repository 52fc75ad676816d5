//! Fixed-capacity table of named actuators and their angle state.
//!
//! Slots are never freed: an actuator that should stop moving is deactivated
//! instead, so slot indexes stay stable for the lifetime of the process.
use core::fmt::{self, Display};

use heapless::Vec;
use log::{debug, info, warn};

use super::gesture::AngleRole;
use super::servo::ServoDriver;
use crate::config::{DEFAULT_MAX_ANGLE, DEFAULT_MIN_ANGLE, MAX_ID_LEN};
use crate::error::RegistryError;

pub type ServoId = heapless::String<MAX_ID_LEN>;

/// Lowercase copy of `id`, truncated to [`MAX_ID_LEN`] bytes.
fn id_key(id: &str) -> ServoId {
    let mut key = ServoId::new();
    for c in id.chars() {
        if key.push(c.to_ascii_lowercase()).is_err() {
            break;
        }
    }
    key
}

#[derive(Debug)]
pub struct Actuator<S> {
    id: ServoId,
    driver: S,
    min_angle: i32,
    max_angle: i32,
    current_angle: i32,
    active: bool,
}

impl<S> Actuator<S> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn min_angle(&self) -> i32 {
        self.min_angle
    }

    pub fn max_angle(&self) -> i32 {
        self.max_angle
    }

    pub fn angle(&self) -> i32 {
        self.current_angle
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn driver(&self) -> &S {
        &self.driver
    }

    pub fn clamp(&self, angle: i32) -> i32 {
        angle.clamp(self.min_angle, self.max_angle)
    }

    /// Resolves a gesture role against the current range.
    pub fn angle_for_role(&self, role: AngleRole) -> i32 {
        match role {
            AngleRole::Min => self.min_angle,
            AngleRole::Max => self.max_angle,
        }
    }

    /// Maps a bend ratio (0.0 = min, 1.0 = max) onto the range.
    pub fn angle_for_ratio(&self, ratio: f32) -> i32 {
        let ratio = if ratio.is_nan() {
            0.0
        } else {
            ratio.clamp(0.0, 1.0)
        };
        // the span of a full i32 range does not fit in an i32
        let span = self.max_angle as i64 - self.min_angle as i64;
        // never negative, so adding a half rounds to nearest
        let offset = (ratio as f64 * span as f64 + 0.5) as i64;
        let angle = (self.min_angle as i64 + offset.min(span)) as i32;
        self.clamp(angle)
    }
}

impl<S> Display for Actuator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}..={}] @ {}°",
            self.id, self.min_angle, self.max_angle, self.current_angle
        )
    }
}

/// Addresses an actuator either by id or by slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorRef<'a> {
    Id(&'a str),
    Slot(usize),
}

impl<'a> From<&'a str> for ActuatorRef<'a> {
    fn from(id: &'a str) -> Self {
        ActuatorRef::Id(id)
    }
}

impl From<usize> for ActuatorRef<'_> {
    fn from(slot: usize) -> Self {
        ActuatorRef::Slot(slot)
    }
}

pub struct ServoRegistry<S, const N: usize> {
    slots: Vec<Actuator<S>, N>,
    changed: bool,
}

impl<S, const N: usize> Default for ServoRegistry<S, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, const N: usize> ServoRegistry<S, N> {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            changed: false,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|a| a.active).count()
    }

    /// All registered actuators in slot order, active or not.
    pub fn iter(&self) -> impl Iterator<Item = &Actuator<S>> {
        self.slots.iter()
    }

    pub fn get(&self, slot: usize) -> Option<&Actuator<S>> {
        self.slots.get(slot)
    }

    /// Case-insensitive exact match on the id.
    pub fn lookup(&self, id: &str) -> Result<usize, RegistryError> {
        self.slots
            .iter()
            .position(|a| a.id.eq_ignore_ascii_case(id))
            .ok_or_else(|| RegistryError::NotFound(id_key(id)))
    }

    pub fn angle_of(&self, id: &str) -> Result<i32, RegistryError> {
        self.lookup(id).map(|slot| self.slots[slot].current_angle)
    }

    fn resolve(&self, target: ActuatorRef<'_>) -> Result<usize, RegistryError> {
        match target {
            ActuatorRef::Id(id) => self.lookup(id),
            ActuatorRef::Slot(slot) if slot < self.slots.len() => Ok(slot),
            ActuatorRef::Slot(slot) => Err(RegistryError::SlotNotFound(slot)),
        }
    }

    pub fn deactivate<'a>(&mut self, target: impl Into<ActuatorRef<'a>>) -> Result<(), RegistryError> {
        let slot = self.resolve(target.into())?;
        let actuator = &mut self.slots[slot];
        if actuator.active {
            info!("servo {} deactivated", actuator.id);
            actuator.active = false;
            self.changed = true;
        }
        Ok(())
    }

    pub fn activate<'a>(&mut self, target: impl Into<ActuatorRef<'a>>) -> Result<(), RegistryError> {
        let slot = self.resolve(target.into())?;
        let actuator = &mut self.slots[slot];
        if !actuator.active {
            info!("servo {} activated", actuator.id);
            actuator.active = true;
            self.changed = true;
        }
        Ok(())
    }

    /// Returns whether any angle or activation changed since the last call.
    pub fn take_changed(&mut self) -> bool {
        core::mem::take(&mut self.changed)
    }
}

impl<S: ServoDriver, const N: usize> ServoRegistry<S, N> {
    /// Registers a servo with the default 0..=180 range.
    pub fn register_default(&mut self, id: &str, driver: S) -> Result<usize, RegistryError> {
        self.register(id, driver, DEFAULT_MIN_ANGLE, DEFAULT_MAX_ANGLE)
    }

    /// Attaches `driver`, parks it at `min_angle` and returns the slot index.
    ///
    /// Ids are unique ignoring ASCII case; registering one twice is refused.
    /// Only ASCII letters are folded, so `"Ä"` and `"ä"` are two different ids.
    pub fn register(
        &mut self,
        id: &str,
        mut driver: S,
        min_angle: i32,
        max_angle: i32,
    ) -> Result<usize, RegistryError> {
        if self.slots.is_full() {
            return Err(RegistryError::Full(N));
        }
        if id.len() > MAX_ID_LEN {
            return Err(RegistryError::IdTooLong);
        }
        if min_angle > max_angle {
            return Err(RegistryError::InvalidRange {
                min: min_angle,
                max: max_angle,
            });
        }
        if self.lookup(id).is_ok() {
            return Err(RegistryError::Duplicate(id_key(id)));
        }

        driver.attach();
        driver.write(min_angle);
        let actuator = Actuator {
            id: id_key(id),
            driver,
            min_angle,
            max_angle,
            current_angle: min_angle,
            active: true,
        };
        info!("registered servo {actuator}");
        let slot = self.slots.len();
        if self.slots.push(actuator).is_err() {
            return Err(RegistryError::Full(N));
        }
        Ok(slot)
    }

    /// Clamps `requested` into the actuator range and writes it.
    ///
    /// Out of range input is never an error, the applied angle is returned.
    pub fn apply<'a>(
        &mut self,
        target: impl Into<ActuatorRef<'a>>,
        requested: i32,
    ) -> Result<i32, RegistryError> {
        let slot = self.resolve(target.into())?;
        let actuator = &mut self.slots[slot];
        if !actuator.active {
            warn!("servo {} is inactive, {requested}° dropped", actuator.id);
            return Err(RegistryError::Inactive(actuator.id.clone()));
        }

        let angle = actuator.clamp(requested);
        if angle != requested {
            debug!("servo {}: {requested}° clamped to {angle}°", actuator.id);
        }
        actuator.driver.write(angle);
        actuator.current_angle = angle;
        self.changed = true;
        Ok(angle)
    }

    pub fn apply_role<'a>(
        &mut self,
        target: impl Into<ActuatorRef<'a>>,
        role: AngleRole,
    ) -> Result<i32, RegistryError> {
        let slot = self.resolve(target.into())?;
        let angle = self.slots[slot].angle_for_role(role);
        self.apply(slot, angle)
    }

    pub fn apply_ratio<'a>(
        &mut self,
        target: impl Into<ActuatorRef<'a>>,
        ratio: f32,
    ) -> Result<i32, RegistryError> {
        let slot = self.resolve(target.into())?;
        let angle = self.slots[slot].angle_for_ratio(ratio);
        self.apply(slot, angle)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Servo that records every attach and written angle into a shared log.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingServo {
        pub(crate) writes: Rc<RefCell<std::vec::Vec<i32>>>,
        pub(crate) attached: Rc<RefCell<bool>>,
    }

    impl ServoDriver for RecordingServo {
        fn attach(&mut self) {
            *self.attached.borrow_mut() = true;
        }

        fn write(&mut self, angle: i32) {
            self.writes.borrow_mut().push(angle);
        }
    }

    fn hand() -> ServoRegistry<RecordingServo, 5> {
        let mut registry = ServoRegistry::new();
        for id in ["thumb", "index", "middle", "ring", "pinky"] {
            registry
                .register_default(id, RecordingServo::default())
                .unwrap();
        }
        registry
    }

    #[test]
    fn register_attaches_and_parks_at_min() {
        let mut registry: ServoRegistry<RecordingServo, 2> = ServoRegistry::new();
        let servo = RecordingServo::default();
        let slot = registry.register("Thumb", servo.clone(), 20, 160).unwrap();

        assert_eq!(slot, 0);
        assert!(*servo.attached.borrow());
        assert_eq!(*servo.writes.borrow(), vec![20]);
        assert_eq!(registry.angle_of("thumb"), Ok(20));
        assert_eq!(registry.get(0).unwrap().id(), "thumb");
    }

    #[test]
    fn register_fails_when_full() {
        let mut registry: ServoRegistry<RecordingServo, 1> = ServoRegistry::new();
        registry
            .register_default("thumb", RecordingServo::default())
            .unwrap();
        assert_eq!(
            registry.register_default("index", RecordingServo::default()),
            Err(RegistryError::Full(1))
        );
    }

    #[test]
    fn register_rejects_duplicates_bad_ranges_and_long_ids() {
        let mut registry: ServoRegistry<RecordingServo, 4> = ServoRegistry::new();
        registry
            .register_default("thumb", RecordingServo::default())
            .unwrap();

        assert!(matches!(
            registry.register_default("THUMB", RecordingServo::default()),
            Err(RegistryError::Duplicate(_))
        ));
        assert_eq!(
            registry.register("index", RecordingServo::default(), 90, 10),
            Err(RegistryError::InvalidRange { min: 90, max: 10 })
        );
        assert_eq!(
            registry.register_default("a_really_long_finger_name", RecordingServo::default()),
            Err(RegistryError::IdTooLong)
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn lookup_ignores_case_but_not_prefixes() {
        let registry = hand();
        assert_eq!(registry.lookup("THUMB"), Ok(0));
        assert_eq!(registry.lookup("Pinky"), Ok(4));
        assert!(matches!(
            registry.lookup("thu"),
            Err(RegistryError::NotFound(_))
        ));
        assert!(matches!(
            registry.lookup("thumbs"),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn apply_clamps_into_range() {
        let mut registry = hand();
        assert_eq!(registry.apply("thumb", 999), Ok(180));
        assert_eq!(registry.angle_of("thumb"), Ok(180));
        assert_eq!(registry.apply("index", -40), Ok(0));
        assert_eq!(registry.apply(2, 45), Ok(45));

        let mut narrow: ServoRegistry<RecordingServo, 1> = ServoRegistry::new();
        let servo = RecordingServo::default();
        narrow.register("ring", servo.clone(), 30, 120).unwrap();
        assert_eq!(narrow.apply("ring", 10), Ok(30));
        assert_eq!(narrow.apply("ring", 150), Ok(120));
        assert_eq!(*servo.writes.borrow(), vec![30, 30, 120]);
    }

    #[test]
    fn apply_reports_unknown_and_inactive() {
        let mut registry = hand();
        assert!(matches!(
            registry.apply("bogus", 10),
            Err(RegistryError::NotFound(_))
        ));
        assert_eq!(
            registry.apply(9, 10),
            Err(RegistryError::SlotNotFound(9))
        );

        registry.deactivate("ring").unwrap();
        assert!(matches!(
            registry.apply("ring", 10),
            Err(RegistryError::Inactive(_))
        ));
        assert_eq!(registry.active_count(), 4);
        assert_eq!(registry.angle_of("ring"), Ok(0));

        registry.activate("ring").unwrap();
        assert_eq!(registry.apply("ring", 10), Ok(10));
    }

    #[test]
    fn roles_and_ratios_follow_the_configured_range() {
        let mut registry: ServoRegistry<RecordingServo, 1> = ServoRegistry::new();
        registry
            .register("index", RecordingServo::default(), 20, 120)
            .unwrap();

        assert_eq!(registry.apply_role("index", AngleRole::Max), Ok(120));
        assert_eq!(registry.apply_role("index", AngleRole::Min), Ok(20));
        assert_eq!(registry.apply_ratio(0, 0.5), Ok(70));
        assert_eq!(registry.apply_ratio(0, 7.0), Ok(120));
        assert_eq!(registry.apply_ratio(0, f32::NAN), Ok(20));
    }

    #[test]
    fn ratios_on_a_full_width_range_do_not_overflow() {
        let mut registry: ServoRegistry<RecordingServo, 1> = ServoRegistry::new();
        registry
            .register("wide", RecordingServo::default(), -2_000_000_000, 2_000_000_000)
            .unwrap();

        assert_eq!(registry.apply_ratio(0, 0.5), Ok(0));
        assert_eq!(registry.apply_ratio(0, 1.0), Ok(2_000_000_000));
        assert_eq!(registry.apply_ratio(0, 0.0), Ok(-2_000_000_000));
    }

    #[test]
    fn only_ascii_letters_fold_case() {
        let mut registry: ServoRegistry<RecordingServo, 2> = ServoRegistry::new();
        registry
            .register_default("Ärm", RecordingServo::default())
            .unwrap();
        assert!(registry
            .register_default("ärm", RecordingServo::default())
            .is_ok());
        assert_eq!(registry.lookup("ÄRM"), Ok(0));
    }

    #[test]
    fn changed_flag_is_drained() {
        let mut registry = hand();
        registry.take_changed();
        assert!(!registry.take_changed());

        registry.apply("thumb", 10).unwrap();
        assert!(registry.take_changed());
        assert!(!registry.take_changed());

        let _ = registry.apply("bogus", 10);
        assert!(!registry.take_changed());
    }
}
