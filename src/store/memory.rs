//! In-process store. Each call holds one lock over the whole state, so
//! multi-row writes are atomic by construction.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{CycleStore, Rederivation};
use crate::cycle::phase::PhaseKind;
use crate::cycle::timeline::Timeline;
use crate::error::{CycleError, Result};
use crate::models::{
    CreatedCycle, Cycle, CycleConfig, CycleLog, LogEntryRow, LogLocation, NewUser, PhaseInterval,
    Symptom, User,
};

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    cycles: HashMap<Uuid, Cycle>,
    phases: HashMap<Uuid, PhaseInterval>,
    logs: HashMap<Uuid, CycleLog>,
    symptoms: HashMap<Uuid, Symptom>,
    log_symptoms: BTreeSet<(Uuid, Uuid)>,
}

impl MemoryState {
    fn cycle_of_log(&self, log: &CycleLog) -> Option<&Cycle> {
        let phase = self.phases.get(&log.cycle_phase_id)?;
        self.cycles.get(&phase.cycle_id)
    }

    fn remove_log(&mut self, log_id: Uuid) -> Option<CycleLog> {
        self.log_symptoms.retain(|(log, _)| *log != log_id);
        self.logs.remove(&log_id)
    }
}

#[derive(Default)]
pub struct MemoryCycleStore {
    state: Mutex<MemoryState>,
}

impl MemoryCycleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CycleStore for MemoryCycleStore {
    async fn create_user(&self, user: &NewUser, config: CycleConfig) -> Result<User> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(CycleError::Conflict("Email already exists".into()));
        }

        let created = User {
            id: Uuid::new_v4(),
            email: user.email.clone(),
            name: user.name.clone().unwrap_or_default(),
            config,
            created_at: Utc::now(),
        };
        state.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        Ok(self.state.lock().await.users.get(&user_id).cloned())
    }

    async fn update_user(&self, user: &User, rederivation: Option<&Rederivation>) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&user.id) {
            return Err(CycleError::NotFound("user"));
        }
        if state
            .users
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(CycleError::Conflict("Email already exists".into()));
        }

        if let Some(rederivation) = rederivation {
            let cycle = state
                .cycles
                .get_mut(&rederivation.cycle_id)
                .ok_or(CycleError::NotFound("cycle"))?;
            cycle.cycle_length = rederivation.timeline.cycle_length;

            for phase in state.phases.values_mut() {
                if phase.cycle_id != rederivation.cycle_id {
                    continue;
                }
                if let Some(kind) = phase.phase {
                    let span = rederivation.timeline.span(kind);
                    phase.start_date = span.start_date;
                    phase.end_date = span.end_date;
                }
            }
        }

        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_covering_cycle(&self, owner: Uuid, date: NaiveDate) -> Result<Option<Cycle>> {
        let state = self.state.lock().await;
        Ok(state
            .cycles
            .values()
            .filter(|c| c.user_id == owner && c.start_date <= date)
            .max_by_key(|c| c.start_date)
            .cloned())
    }

    async fn get_cycle(&self, owner: Uuid, cycle_id: Uuid) -> Result<Option<Cycle>> {
        let state = self.state.lock().await;
        Ok(state
            .cycles
            .get(&cycle_id)
            .filter(|c| c.user_id == owner)
            .cloned())
    }

    async fn list_cycles(&self, owner: Uuid) -> Result<Vec<Cycle>> {
        let state = self.state.lock().await;
        let mut cycles: Vec<Cycle> = state
            .cycles
            .values()
            .filter(|c| c.user_id == owner)
            .cloned()
            .collect();
        cycles.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        Ok(cycles)
    }

    async fn list_phase_intervals(&self, cycle_id: Uuid) -> Result<Vec<PhaseInterval>> {
        let state = self.state.lock().await;
        let mut phases: Vec<PhaseInterval> = state
            .phases
            .values()
            .filter(|p| p.cycle_id == cycle_id)
            .cloned()
            .collect();
        phases.sort_by_key(|p| p.start_date);
        Ok(phases)
    }

    async fn find_phase_interval(
        &self,
        cycle_id: Uuid,
        kind: PhaseKind,
    ) -> Result<Option<PhaseInterval>> {
        let state = self.state.lock().await;
        Ok(state
            .phases
            .values()
            .find(|p| p.cycle_id == cycle_id && p.phase == Some(kind))
            .cloned())
    }

    async fn create_cycle(
        &self,
        owner: Uuid,
        timeline: &Timeline,
        first_log_date: NaiveDate,
    ) -> Result<CreatedCycle> {
        let mut state = self.state.lock().await;
        if state
            .cycles
            .values()
            .any(|c| c.user_id == owner && c.start_date == timeline.start_date)
        {
            return Err(CycleError::Conflict(format!(
                "a cycle already starts on {}",
                timeline.start_date
            )));
        }

        let cycle = Cycle {
            id: Uuid::new_v4(),
            user_id: owner,
            start_date: timeline.start_date,
            cycle_length: timeline.cycle_length,
            created_at: Utc::now(),
        };
        let phases: Vec<PhaseInterval> = timeline
            .spans
            .iter()
            .map(|span| PhaseInterval {
                id: Uuid::new_v4(),
                cycle_id: cycle.id,
                phase: Some(span.kind),
                start_date: span.start_date,
                end_date: span.end_date,
            })
            .collect();
        let log = CycleLog {
            id: Uuid::new_v4(),
            cycle_phase_id: phases[0].id,
            date: first_log_date,
        };

        state.cycles.insert(cycle.id, cycle.clone());
        for phase in &phases {
            state.phases.insert(phase.id, phase.clone());
        }
        state.logs.insert(log.id, log.clone());

        Ok(CreatedCycle { cycle, phases, log })
    }

    async fn delete_cycle(&self, cycle_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.cycles.contains_key(&cycle_id) {
            return Err(CycleError::NotFound("cycle"));
        }

        let phase_ids: Vec<Uuid> = state
            .phases
            .values()
            .filter(|p| p.cycle_id == cycle_id)
            .map(|p| p.id)
            .collect();
        let log_ids: Vec<Uuid> = state
            .logs
            .values()
            .filter(|l| phase_ids.contains(&l.cycle_phase_id))
            .map(|l| l.id)
            .collect();

        for log_id in log_ids {
            state.remove_log(log_id);
        }
        for phase_id in phase_ids {
            state.phases.remove(&phase_id);
        }
        state.cycles.remove(&cycle_id);
        Ok(())
    }

    async fn attach_log(&self, interval_id: Uuid, date: NaiveDate) -> Result<CycleLog> {
        let mut state = self.state.lock().await;
        if !state.phases.contains_key(&interval_id) {
            return Err(CycleError::NotFound("phase interval"));
        }
        if state
            .logs
            .values()
            .any(|l| l.cycle_phase_id == interval_id && l.date == date)
        {
            return Err(CycleError::Conflict(format!("{date} is already logged")));
        }

        let log = CycleLog {
            id: Uuid::new_v4(),
            cycle_phase_id: interval_id,
            date,
        };
        state.logs.insert(log.id, log.clone());
        Ok(log)
    }

    async fn find_log(&self, owner: Uuid, date: NaiveDate) -> Result<Option<LogLocation>> {
        let state = self.state.lock().await;
        Ok(state
            .logs
            .values()
            .filter(|l| l.date == date)
            .filter_map(|l| {
                let cycle = state.cycle_of_log(l)?;
                (cycle.user_id == owner).then(|| LogLocation {
                    log: l.clone(),
                    cycle: cycle.clone(),
                })
            })
            .max_by_key(|found| found.cycle.start_date))
    }

    async fn delete_log(&self, log_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().await;
        state
            .remove_log(log_id)
            .map(|_| ())
            .ok_or(CycleError::NotFound("log"))
    }

    async fn list_log_dates(&self, owner: Uuid, kind: PhaseKind) -> Result<Vec<NaiveDate>> {
        let state = self.state.lock().await;
        let mut dates: Vec<NaiveDate> = state
            .logs
            .values()
            .filter(|l| {
                let Some(phase) = state.phases.get(&l.cycle_phase_id) else {
                    return false;
                };
                phase.phase == Some(kind)
                    && state
                        .cycles
                        .get(&phase.cycle_id)
                        .is_some_and(|c| c.user_id == owner)
            })
            .map(|l| l.date)
            .collect();
        dates.sort_unstable();
        Ok(dates)
    }

    async fn list_log_entries(
        &self,
        owner: Uuid,
        cycle_id: Option<Uuid>,
    ) -> Result<Vec<LogEntryRow>> {
        let state = self.state.lock().await;
        let mut rows = Vec::new();

        for log in state.logs.values() {
            let Some(phase) = state.phases.get(&log.cycle_phase_id) else {
                continue;
            };
            let Some(cycle) = state.cycles.get(&phase.cycle_id) else {
                continue;
            };
            if cycle.user_id != owner || cycle_id.is_some_and(|id| id != cycle.id) {
                continue;
            }

            let mut symptoms: Vec<String> = state
                .log_symptoms
                .iter()
                .filter(|(l, _)| *l == log.id)
                .filter_map(|(_, s)| state.symptoms.get(s).map(|s| s.name.clone()))
                .collect();
            symptoms.sort();

            let row = |symptom| LogEntryRow {
                log_id: log.id,
                date: log.date,
                phase: phase.phase,
                symptom,
            };
            if symptoms.is_empty() {
                rows.push(row(None));
            } else {
                rows.extend(symptoms.into_iter().map(|s| row(Some(s))));
            }
        }

        rows.sort_by(|a, b| b.date.cmp(&a.date).then(a.log_id.cmp(&b.log_id)));
        Ok(rows)
    }

    async fn list_symptoms(&self) -> Result<Vec<Symptom>> {
        let state = self.state.lock().await;
        let mut symptoms: Vec<Symptom> = state.symptoms.values().cloned().collect();
        symptoms.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(symptoms)
    }

    async fn create_symptom(&self, name: &str) -> Result<Symptom> {
        let mut state = self.state.lock().await;
        if state.symptoms.values().any(|s| s.name == name) {
            return Err(CycleError::Conflict(format!(
                "symptom '{name}' already exists"
            )));
        }

        let symptom = Symptom {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        state.symptoms.insert(symptom.id, symptom.clone());
        Ok(symptom)
    }

    async fn set_log_symptoms(&self, log_id: Uuid, symptom_ids: &[Uuid]) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.logs.contains_key(&log_id) {
            return Err(CycleError::NotFound("log"));
        }
        if let Some(missing) = symptom_ids
            .iter()
            .find(|id| !state.symptoms.contains_key(*id))
        {
            tracing::warn!("unknown symptom {}", missing);
            return Err(CycleError::NotFound("symptom"));
        }

        state.log_symptoms.retain(|(log, _)| *log != log_id);
        state
            .log_symptoms
            .extend(symptom_ids.iter().map(|symptom_id| (log_id, *symptom_id)));
        Ok(())
    }
}
