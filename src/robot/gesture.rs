//! Named hand poses.
//!
//! A preset only says, per finger, whether it goes to the bottom or the top of
//! its range. The actual angle is read from the registry when the gesture is
//! applied, so the same table works on differently calibrated hands.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleRole {
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GesturePreset {
    pub name: &'static str,
    pub roles: &'static [(&'static str, AngleRole)],
}

use AngleRole::{Max, Min};

/// Extended = `Min`, bent = `Max`.
pub static HAND_GESTURES: [GesturePreset; 5] = [
    GesturePreset {
        name: "open",
        roles: &[
            ("thumb", Min),
            ("index", Min),
            ("middle", Min),
            ("ring", Min),
            ("pinky", Min),
        ],
    },
    GesturePreset {
        name: "fist",
        roles: &[
            ("thumb", Max),
            ("index", Max),
            ("middle", Max),
            ("ring", Max),
            ("pinky", Max),
        ],
    },
    GesturePreset {
        name: "point",
        roles: &[
            ("thumb", Max),
            ("index", Min),
            ("middle", Max),
            ("ring", Max),
            ("pinky", Max),
        ],
    },
    GesturePreset {
        name: "peace",
        roles: &[
            ("thumb", Max),
            ("index", Min),
            ("middle", Min),
            ("ring", Max),
            ("pinky", Max),
        ],
    },
    GesturePreset {
        name: "thumbs_up",
        roles: &[
            ("thumb", Min),
            ("index", Max),
            ("middle", Max),
            ("ring", Max),
            ("pinky", Max),
        ],
    },
];

#[derive(Debug, Clone, Copy)]
pub struct GestureLibrary {
    presets: &'static [GesturePreset],
}

impl Default for GestureLibrary {
    fn default() -> Self {
        Self::new(&HAND_GESTURES)
    }
}

impl GestureLibrary {
    pub const fn new(presets: &'static [GesturePreset]) -> Self {
        Self { presets }
    }

    pub fn resolve(&self, name: &str) -> Option<&'static GesturePreset> {
        self.presets
            .iter()
            .find(|preset| preset.name.eq_ignore_ascii_case(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        self.presets.iter().map(|preset| preset.name)
    }
}
