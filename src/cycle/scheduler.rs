//! Period logging, cycle teardown and "where am I today" queries.
//!
//! Every mutating operation holds the owner's lock from its first read to its
//! last write, so two requests for the same user cannot both decide that no
//! cycle covers a date and create overlapping cycles.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::cycle::history::group_period_runs;
use crate::cycle::phase::{PhaseKind, CYCLE_ENDED_MESSAGE, NO_CYCLE_MESSAGE};
use crate::cycle::timeline::build_timeline;
use crate::error::{CycleError, Result};
use crate::models::{
    Cycle, CycleConfig, CycleState, CycleStatus, LoggedDay, NewUser, PeriodLogDeleted,
    PeriodLogged, PeriodRun, PhaseInterval, Symptom, User, UserUpdate,
};
use crate::store::{CycleStore, Rederivation};

/// One async mutex per user with a request in flight. An entry is dropped
/// once no guard holds it and no caller is waiting on it.
#[derive(Default)]
pub struct UserLocks {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

pub struct UserLockGuard<'a> {
    locks: &'a DashMap<Uuid, Arc<Mutex<()>>>,
    user_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl UserLocks {
    pub async fn acquire(&self, user_id: Uuid) -> UserLockGuard<'_> {
        let lock = self.locks.entry(user_id).or_default().clone();
        UserLockGuard {
            locks: &self.locks,
            user_id,
            guard: Some(lock.lock_owned().await),
        }
    }
}

impl Drop for UserLockGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // remove_if holds the shard lock, so no acquire can clone the Arc mid-check
        self.locks.remove_if(&self.user_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

pub struct CycleScheduler {
    store: Arc<dyn CycleStore>,
    locks: UserLocks,
}

impl CycleScheduler {
    pub fn new(store: Arc<dyn CycleStore>) -> Self {
        Self {
            store,
            locks: UserLocks::default(),
        }
    }

    async fn require_user(&self, user_id: Uuid) -> Result<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or(CycleError::NotFound("user"))
    }

    async fn require_cycle(&self, user_id: Uuid, cycle_id: Uuid) -> Result<Cycle> {
        self.store
            .get_cycle(user_id, cycle_id)
            .await?
            .ok_or(CycleError::NotFound("cycle"))
    }

    pub async fn register_user(&self, new_user: NewUser) -> Result<User> {
        let email = new_user.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(CycleError::InvalidInput("A valid email is required".into()));
        }

        let defaults = CycleConfig::default();
        let config = CycleConfig {
            menstrual_length: new_user.menstrual_length.unwrap_or(defaults.menstrual_length),
            follicular_length: new_user.follicular_length.unwrap_or(defaults.follicular_length),
            ovulation_length: new_user.ovulation_length.unwrap_or(defaults.ovulation_length),
            luteal_length: new_user.luteal_length.unwrap_or(defaults.luteal_length),
        };
        config.validate()?;

        let new_user = NewUser {
            email: email.to_string(),
            ..new_user
        };
        let user = self.store.create_user(&new_user, config).await?;
        info!("👤 Registered user {}", user.id);
        Ok(user)
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<User> {
        self.require_user(user_id).await
    }

    /// Applies a profile update. When any phase length is given, the cycle
    /// covering `today` has its intervals re-derived from its own start date;
    /// earlier cycles keep their bounds.
    #[instrument(skip(self, update))]
    pub async fn update_user(
        &self,
        user_id: Uuid,
        update: UserUpdate,
        today: NaiveDate,
    ) -> Result<User> {
        let _guard = self.locks.acquire(user_id).await;
        let mut user = self.require_user(user_id).await?;

        if let Some(name) = update.name.as_deref().filter(|n| !n.trim().is_empty()) {
            user.name = name.trim().to_string();
        }
        if let Some(email) = update.email.as_deref().filter(|e| !e.trim().is_empty()) {
            if !email.contains('@') {
                return Err(CycleError::InvalidInput("A valid email is required".into()));
            }
            user.email = email.trim().to_string();
        }

        let rederivation = if update.touches_config() {
            let config = update.merge_config(user.config);
            config.validate().inspect_err(|e| warn!("Rejected cycle config: {}", e))?;
            user.config = config;
            self.rederive_current(&user, today).await?
        } else {
            None
        };

        self.store.update_user(&user, rederivation.as_ref()).await?;

        if let Some(rederivation) = &rederivation {
            info!(
                "🔁 Re-derived cycle {}: {} to {} ({} days)",
                rederivation.cycle_id,
                rederivation.timeline.start_date,
                rederivation.timeline.end_date(),
                rederivation.timeline.cycle_length
            );
        }
        Ok(user)
    }

    pub async fn update_cycle_config(
        &self,
        user_id: Uuid,
        config: CycleConfig,
        today: NaiveDate,
    ) -> Result<User> {
        let update = UserUpdate {
            menstrual_length: Some(config.menstrual_length),
            follicular_length: Some(config.follicular_length),
            ovulation_length: Some(config.ovulation_length),
            luteal_length: Some(config.luteal_length),
            ..UserUpdate::default()
        };
        self.update_user(user_id, update, today).await
    }

    async fn rederive_current(
        &self,
        user: &User,
        today: NaiveDate,
    ) -> Result<Option<Rederivation>> {
        let Some(cycle) = self.store.find_covering_cycle(user.id, today).await? else {
            return Ok(None);
        };
        if !cycle.covers(today) {
            return Ok(None);
        }

        let timeline = build_timeline(cycle.start_date, &user.config)?;
        Ok(Some(Rederivation {
            cycle_id: cycle.id,
            timeline,
        }))
    }

    /// Records a period day. A date inside the covering cycle's span is
    /// attached to that cycle's Menstrual interval; any other date starts a
    /// new cycle anchored on it. Skipped cycles are never back-filled.
    #[instrument(skip(self))]
    pub async fn log_period(&self, user_id: Uuid, date: NaiveDate) -> Result<PeriodLogged> {
        let _guard = self.locks.acquire(user_id).await;
        let user = self.require_user(user_id).await?;

        if let Some(existing) = self.store.find_log(user_id, date).await? {
            if existing.cycle.covers(date) {
                return Ok(PeriodLogged {
                    cycle_id: existing.cycle.id,
                    cycle_is_new: false,
                });
            }
        }

        match self.store.find_covering_cycle(user_id, date).await? {
            Some(cycle) if cycle.covers(date) => {
                let menstrual = self
                    .store
                    .find_phase_interval(cycle.id, PhaseKind::Menstrual)
                    .await?
                    .ok_or_else(|| {
                        error!("❌ Cycle {} has no Menstrual interval", cycle.id);
                        CycleError::InconsistentState(format!(
                            "cycle {} has no Menstrual phase",
                            cycle.id
                        ))
                    })?;

                self.store.attach_log(menstrual.id, date).await?;
                info!("🩸 Logged period day {} in cycle {}", date, cycle.id);
                Ok(PeriodLogged {
                    cycle_id: cycle.id,
                    cycle_is_new: false,
                })
            }
            _ => {
                let timeline = build_timeline(date, &user.config)
                    .inspect_err(|e| warn!("Cannot start cycle for {}: {}", user_id, e))?;
                let created = self.store.create_cycle(user_id, &timeline, date).await?;
                info!(
                    "🩸 Started cycle {}: {} to {} ({} days)",
                    created.cycle.id,
                    date,
                    timeline.end_date(),
                    timeline.cycle_length
                );
                Ok(PeriodLogged {
                    cycle_id: created.cycle.id,
                    cycle_is_new: true,
                })
            }
        }
    }

    /// Removes the period log dated `date`. Removing a cycle's first day
    /// removes the whole cycle.
    #[instrument(skip(self))]
    pub async fn delete_period_log(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> Result<PeriodLogDeleted> {
        let _guard = self.locks.acquire(user_id).await;

        let found = self
            .store
            .find_log(user_id, date)
            .await?
            .ok_or(CycleError::NotFound("period log"))?;

        if found.log.date == found.cycle.start_date {
            self.store.delete_cycle(found.cycle.id).await?;
            info!("🗑️ Deleted cycle {} starting {}", found.cycle.id, date);
            Ok(PeriodLogDeleted {
                cycle_deleted: true,
            })
        } else {
            self.store.delete_log(found.log.id).await?;
            info!("🗑️ Deleted period log {} in cycle {}", date, found.cycle.id);
            Ok(PeriodLogDeleted {
                cycle_deleted: false,
            })
        }
    }

    pub async fn current_status(&self, user_id: Uuid, today: NaiveDate) -> Result<CycleStatus> {
        let Some(cycle) = self.store.find_covering_cycle(user_id, today).await? else {
            return Ok(idle_status(CycleState::NoCycle, NO_CYCLE_MESSAGE));
        };

        let cycle_day = cycle.cycle_day(today);
        if cycle_day > i64::from(cycle.cycle_length) {
            return Ok(idle_status(CycleState::CycleEnded, CYCLE_ENDED_MESSAGE));
        }

        let phase = self
            .store
            .list_phase_intervals(cycle.id)
            .await?
            .into_iter()
            .find(|interval| interval.contains(today))
            .and_then(|interval| interval.phase);

        Ok(CycleStatus {
            state: CycleState::InCycle,
            current_phase: phase,
            cycle_day: Some(cycle_day),
            cycle_length: Some(cycle.cycle_length),
            daily_message: phase
                .map(PhaseKind::daily_message)
                .unwrap_or_default()
                .to_string(),
            lower_intensity: phase.is_some_and(PhaseKind::lower_intensity),
        })
    }

    pub async fn period_dates(&self, user_id: Uuid) -> Result<Vec<NaiveDate>> {
        self.store.list_log_dates(user_id, PhaseKind::Menstrual).await
    }

    pub async fn period_history(&self, user_id: Uuid) -> Result<Vec<PeriodRun>> {
        let dates = self.period_dates(user_id).await?;
        Ok(group_period_runs(&dates))
    }

    pub async fn cycles(&self, user_id: Uuid) -> Result<Vec<Cycle>> {
        self.store.list_cycles(user_id).await
    }

    pub async fn phase_intervals(
        &self,
        user_id: Uuid,
        cycle_id: Uuid,
    ) -> Result<Vec<PhaseInterval>> {
        let cycle = self.require_cycle(user_id, cycle_id).await?;
        self.store.list_phase_intervals(cycle.id).await
    }

    /// Logs with their symptom names, newest first.
    pub async fn logged_days(
        &self,
        user_id: Uuid,
        cycle_id: Option<Uuid>,
    ) -> Result<Vec<LoggedDay>> {
        if let Some(cycle_id) = cycle_id {
            self.require_cycle(user_id, cycle_id).await?;
        }

        let rows = self.store.list_log_entries(user_id, cycle_id).await?;
        let mut days: Vec<LoggedDay> = Vec::new();
        for row in rows {
            match days.last_mut() {
                Some(day) if day.log_id == row.log_id => day.symptoms.extend(row.symptom),
                _ => days.push(LoggedDay {
                    log_id: row.log_id,
                    date: row.date,
                    phase: row.phase,
                    symptoms: row.symptom.into_iter().collect(),
                }),
            }
        }
        Ok(days)
    }

    pub async fn symptoms(&self) -> Result<Vec<Symptom>> {
        self.store.list_symptoms().await
    }

    pub async fn create_symptom(&self, name: &str) -> Result<Symptom> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CycleError::InvalidInput("Symptom name is required".into()));
        }
        self.store.create_symptom(name).await
    }

    /// Replaces the symptoms recorded on the user's log for `date`.
    pub async fn set_log_symptoms(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        symptom_ids: &[Uuid],
    ) -> Result<LoggedDay> {
        let _guard = self.locks.acquire(user_id).await;

        let found = self
            .store
            .find_log(user_id, date)
            .await?
            .ok_or(CycleError::NotFound("log"))?;

        let known: HashSet<Uuid> = self
            .store
            .list_symptoms()
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();
        if symptom_ids.iter().any(|id| !known.contains(id)) {
            return Err(CycleError::NotFound("symptom"));
        }

        self.store.set_log_symptoms(found.log.id, symptom_ids).await?;

        self.logged_days(user_id, Some(found.cycle.id))
            .await?
            .into_iter()
            .find(|day| day.log_id == found.log.id)
            .ok_or(CycleError::NotFound("log"))
    }
}

fn idle_status(state: CycleState, message: &str) -> CycleStatus {
    CycleStatus {
        state,
        current_phase: None,
        cycle_day: None,
        cycle_length: None,
        daily_message: message.to_string(),
        lower_intensity: false,
    }
}
