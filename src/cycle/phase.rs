use serde::{Deserialize, Serialize};
use std::fmt;

/// The four phases of a cycle, in the order they occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PhaseKind {
    Menstrual,
    Follicular,
    Ovulatory,
    Luteal,
}

impl PhaseKind {
    pub const ALL: [PhaseKind; 4] = [
        PhaseKind::Menstrual,
        PhaseKind::Follicular,
        PhaseKind::Ovulatory,
        PhaseKind::Luteal,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Menstrual => "Menstrual",
            Self::Follicular => "Follicular",
            Self::Ovulatory => "Ovulatory",
            Self::Luteal => "Luteal",
        }
    }

    /// Row id in the seeded `phases` table.
    pub fn catalog_id(self) -> i16 {
        match self {
            Self::Menstrual => 1,
            Self::Follicular => 2,
            Self::Ovulatory => 3,
            Self::Luteal => 4,
        }
    }

    pub fn from_catalog_id(id: i16) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.catalog_id() == id)
    }

    pub fn daily_message(self) -> &'static str {
        match self {
            Self::Menstrual => "It's your period! Rest and take care of yourself. Prioritise this time to recover. Light yoga or stretching is recommended.",
            Self::Follicular => "Time to build and grow! Focus on strength training and cardio. You're in the mood to get things done!",
            Self::Ovulatory => "You're at your peak! Focus on high-intensity workouts and try pushing your limits. Body temperature is at its highest. You may feel hotter than usual.",
            Self::Luteal => "Time to wind down. Focus on low-intensity workouts and yoga. You may feel more tired than usual. Rest and recovery are key.",
        }
    }

    /// Heavy compound lifts are best scaled down in these phases.
    pub fn lower_intensity(self) -> bool {
        matches!(self, Self::Menstrual | Self::Luteal)
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub const NO_CYCLE_MESSAGE: &str =
    "Period Not Logged. Log your last period in the calendar section to start tracking your cycle.";

pub const CYCLE_ENDED_MESSAGE: &str =
    "Cycle has ended. Log the first day of your next period to start a new cycle.";
