use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cycle::phase::PhaseKind;
use crate::error::{CycleError, Result};

/// Per-user phase lengths, in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CycleConfig {
    pub menstrual_length: i32,
    pub follicular_length: i32,
    pub ovulation_length: i32,
    pub luteal_length: i32,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            menstrual_length: 5,
            follicular_length: 9,
            ovulation_length: 1,
            luteal_length: 13,
        }
    }
}

impl CycleConfig {
    pub fn length_of(&self, kind: PhaseKind) -> i32 {
        match kind {
            PhaseKind::Menstrual => self.menstrual_length,
            PhaseKind::Follicular => self.follicular_length,
            PhaseKind::Ovulatory => self.ovulation_length,
            PhaseKind::Luteal => self.luteal_length,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for kind in PhaseKind::ALL {
            if self.length_of(kind) <= 0 {
                return Err(CycleError::InvalidConfig(format!(
                    "{} phase length must be positive, got {}",
                    kind,
                    self.length_of(kind)
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub config: CycleConfig,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub name: Option<String>,
    pub menstrual_length: Option<i32>,
    pub follicular_length: Option<i32>,
    pub ovulation_length: Option<i32>,
    pub luteal_length: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub menstrual_length: Option<i32>,
    pub follicular_length: Option<i32>,
    pub ovulation_length: Option<i32>,
    pub luteal_length: Option<i32>,
}

impl UserUpdate {
    pub fn touches_config(&self) -> bool {
        self.menstrual_length.is_some()
            || self.follicular_length.is_some()
            || self.ovulation_length.is_some()
            || self.luteal_length.is_some()
    }

    /// Overlays the provided lengths on `current`.
    pub fn merge_config(&self, current: CycleConfig) -> CycleConfig {
        CycleConfig {
            menstrual_length: self.menstrual_length.unwrap_or(current.menstrual_length),
            follicular_length: self.follicular_length.unwrap_or(current.follicular_length),
            ovulation_length: self.ovulation_length.unwrap_or(current.ovulation_length),
            luteal_length: self.luteal_length.unwrap_or(current.luteal_length),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Cycle {
    pub id: Uuid,
    pub user_id: Uuid,
    pub start_date: NaiveDate,
    pub cycle_length: i32,
    pub created_at: DateTime<Utc>,
}

impl Cycle {
    /// 1-based day of the cycle `date` falls on. Zero or negative before the start.
    pub fn cycle_day(&self, date: NaiveDate) -> i64 {
        (date - self.start_date).num_days() + 1
    }

    /// Whether `date` lies within `[start_date, start_date + cycle_length - 1]`.
    pub fn covers(&self, date: NaiveDate) -> bool {
        let day = self.cycle_day(date);
        day >= 1 && day <= i64::from(self.cycle_length)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseInterval {
    pub id: Uuid,
    pub cycle_id: Uuid,
    /// `None` for legacy rows never assigned a phase.
    pub phase: Option<PhaseKind>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl PhaseInterval {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct CycleLog {
    pub id: Uuid,
    pub cycle_phase_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Symptom {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct NewSymptom {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SymptomSelection {
    pub symptom_ids: Vec<Uuid>,
}

/// A log together with the cycle that owns it.
#[derive(Debug, Clone)]
pub struct LogLocation {
    pub log: CycleLog,
    pub cycle: Cycle,
}

/// One row per (log, symptom) pair; logs without symptoms appear once with `symptom: None`.
#[derive(Debug, Clone)]
pub struct LogEntryRow {
    pub log_id: Uuid,
    pub date: NaiveDate,
    pub phase: Option<PhaseKind>,
    pub symptom: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggedDay {
    pub log_id: Uuid,
    pub date: NaiveDate,
    pub phase: Option<PhaseKind>,
    pub symptoms: Vec<String>,
}

/// What `create_cycle` persisted.
#[derive(Debug, Clone)]
pub struct CreatedCycle {
    pub cycle: Cycle,
    pub phases: Vec<PhaseInterval>,
    pub log: CycleLog,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodLogged {
    pub cycle_id: Uuid,
    pub cycle_is_new: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodLogDeleted {
    pub cycle_deleted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    NoCycle,
    CycleEnded,
    InCycle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleStatus {
    pub state: CycleState,
    pub current_phase: Option<PhaseKind>,
    pub cycle_day: Option<i64>,
    pub cycle_length: Option<i32>,
    pub daily_message: String,
    pub lower_intensity: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodRun {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: Vec<NaiveDate>,
}
