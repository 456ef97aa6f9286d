use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
};
use chrono::NaiveDate;
use cyclefit_backend::cycle::timeline::Timeline;
use cyclefit_backend::cycle::{CycleScheduler, PhaseKind};
use cyclefit_backend::error::{CycleError, Result};
use cyclefit_backend::models::{
    CreatedCycle, Cycle, CycleConfig, CycleLog, LogEntryRow, LogLocation, NewUser, PhaseInterval,
    Symptom, User,
};
use cyclefit_backend::routes;
use cyclefit_backend::store::{CycleStore, MemoryCycleStore, Rederivation};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

/// Delegates to a `MemoryCycleStore` but never finds a Menstrual interval,
/// as if the row had been removed behind the service's back.
struct MissingMenstrualStore {
    inner: MemoryCycleStore,
}

#[async_trait]
impl CycleStore for MissingMenstrualStore {
    async fn create_user(&self, user: &NewUser, config: CycleConfig) -> Result<User> {
        self.inner.create_user(user, config).await
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        self.inner.get_user(user_id).await
    }

    async fn update_user(&self, user: &User, rederivation: Option<&Rederivation>) -> Result<()> {
        self.inner.update_user(user, rederivation).await
    }

    async fn find_covering_cycle(&self, owner: Uuid, date: NaiveDate) -> Result<Option<Cycle>> {
        self.inner.find_covering_cycle(owner, date).await
    }

    async fn get_cycle(&self, owner: Uuid, cycle_id: Uuid) -> Result<Option<Cycle>> {
        self.inner.get_cycle(owner, cycle_id).await
    }

    async fn list_cycles(&self, owner: Uuid) -> Result<Vec<Cycle>> {
        self.inner.list_cycles(owner).await
    }

    async fn list_phase_intervals(&self, cycle_id: Uuid) -> Result<Vec<PhaseInterval>> {
        self.inner.list_phase_intervals(cycle_id).await
    }

    async fn find_phase_interval(
        &self,
        cycle_id: Uuid,
        kind: PhaseKind,
    ) -> Result<Option<PhaseInterval>> {
        if kind == PhaseKind::Menstrual {
            return Ok(None);
        }
        self.inner.find_phase_interval(cycle_id, kind).await
    }

    async fn create_cycle(
        &self,
        owner: Uuid,
        timeline: &Timeline,
        first_log_date: NaiveDate,
    ) -> Result<CreatedCycle> {
        self.inner.create_cycle(owner, timeline, first_log_date).await
    }

    async fn delete_cycle(&self, cycle_id: Uuid) -> Result<()> {
        self.inner.delete_cycle(cycle_id).await
    }

    async fn attach_log(&self, interval_id: Uuid, date: NaiveDate) -> Result<CycleLog> {
        self.inner.attach_log(interval_id, date).await
    }

    async fn find_log(&self, owner: Uuid, date: NaiveDate) -> Result<Option<LogLocation>> {
        self.inner.find_log(owner, date).await
    }

    async fn delete_log(&self, log_id: Uuid) -> Result<()> {
        self.inner.delete_log(log_id).await
    }

    async fn list_log_dates(&self, owner: Uuid, kind: PhaseKind) -> Result<Vec<NaiveDate>> {
        self.inner.list_log_dates(owner, kind).await
    }

    async fn list_log_entries(
        &self,
        owner: Uuid,
        cycle_id: Option<Uuid>,
    ) -> Result<Vec<LogEntryRow>> {
        self.inner.list_log_entries(owner, cycle_id).await
    }

    async fn list_symptoms(&self) -> Result<Vec<Symptom>> {
        self.inner.list_symptoms().await
    }

    async fn create_symptom(&self, name: &str) -> Result<Symptom> {
        self.inner.create_symptom(name).await
    }

    async fn set_log_symptoms(&self, log_id: Uuid, symptom_ids: &[Uuid]) -> Result<()> {
        self.inner.set_log_symptoms(log_id, symptom_ids).await
    }
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

async fn setup() -> (Arc<CycleScheduler>, Uuid) {
    let store = MissingMenstrualStore {
        inner: MemoryCycleStore::new(),
    };
    let scheduler = Arc::new(CycleScheduler::new(Arc::new(store)));
    let user = scheduler
        .register_user(NewUser {
            email: "ada@example.com".to_string(),
            name: None,
            menstrual_length: None,
            follicular_length: None,
            ovulation_length: None,
            luteal_length: None,
        })
        .await
        .unwrap();

    // a new cycle is written in one call and does not look the interval up
    let logged = scheduler.log_period(user.id, date("2025-01-01")).await.unwrap();
    assert!(logged.cycle_is_new);
    (scheduler, user.id)
}

#[tokio::test]
async fn log_in_span_without_menstrual_interval_fails() {
    let (scheduler, user_id) = setup().await;

    let err = scheduler
        .log_period(user_id, date("2025-01-03"))
        .await
        .unwrap_err();

    assert!(matches!(err, CycleError::InconsistentState(_)));
    assert_eq!(
        scheduler.period_dates(user_id).await.unwrap(),
        vec![date("2025-01-01")]
    );
    assert_eq!(scheduler.cycles(user_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn route_hides_inconsistent_state_details() {
    let (scheduler, user_id) = setup().await;
    let app = routes::router(scheduler.clone());

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(format!("/log-period/2025-01-03?user_id={user_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({ "error": "Internal error" }));
    assert_eq!(
        scheduler.period_dates(user_id).await.unwrap(),
        vec![date("2025-01-01")]
    );
}
