use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use uuid::Uuid;

use super::{CycleStore, Rederivation};
use crate::cycle::phase::PhaseKind;
use crate::cycle::timeline::Timeline;
use crate::error::{CycleError, Result};
use crate::models::{
    CreatedCycle, Cycle, CycleConfig, CycleLog, LogEntryRow, LogLocation, NewUser, PhaseInterval,
    Symptom, User,
};

const USER_COLUMNS: &str = "id, email, name, menstrual_length, follicular_length, \
                            ovulation_length, luteal_length, created_at";

#[derive(Clone)]
pub struct PgCycleStore {
    pool: PgPool,
}

#[derive(FromRow)]
struct PhaseRow {
    id: Uuid,
    cycle_id: Uuid,
    phase_id: Option<i16>,
    start_date: NaiveDate,
    end_date: NaiveDate,
}

impl From<PhaseRow> for PhaseInterval {
    fn from(row: PhaseRow) -> Self {
        Self {
            id: row.id,
            cycle_id: row.cycle_id,
            phase: row.phase_id.and_then(PhaseKind::from_catalog_id),
            start_date: row.start_date,
            end_date: row.end_date,
        }
    }
}

#[derive(FromRow)]
struct LogLocationRow {
    id: Uuid,
    cycle_phase_id: Uuid,
    date: NaiveDate,
    cycle_id: Uuid,
    user_id: Uuid,
    start_date: NaiveDate,
    cycle_length: i32,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct LogEntryDbRow {
    log_id: Uuid,
    date: NaiveDate,
    phase_id: Option<i16>,
    symptom: Option<String>,
}

impl PgCycleStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl CycleStore for PgCycleStore {
    async fn create_user(&self, user: &NewUser, config: CycleConfig) -> Result<User> {
        let sql = format!(
            "INSERT INTO users (id, email, name, menstrual_length, follicular_length, \
             ovulation_length, luteal_length) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.email)
            .bind(user.name.clone().unwrap_or_default())
            .bind(config.menstrual_length)
            .bind(config.follicular_length)
            .bind(config.ovulation_length)
            .bind(config.luteal_length)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CycleError::from_write(e, |_| "Email already exists".into()))
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_user(&self, user: &User, rederivation: Option<&Rederivation>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE users SET email = $2, name = $3, menstrual_length = $4, \
             follicular_length = $5, ovulation_length = $6, luteal_length = $7 \
             WHERE id = $1",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.config.menstrual_length)
        .bind(user.config.follicular_length)
        .bind(user.config.ovulation_length)
        .bind(user.config.luteal_length)
        .execute(&mut *tx)
        .await
        .map_err(|e| CycleError::from_write(e, |_| "Email already exists".into()))?;

        if updated.rows_affected() == 0 {
            return Err(CycleError::NotFound("user"));
        }

        if let Some(rederivation) = rederivation {
            for span in &rederivation.timeline.spans {
                sqlx::query(
                    "UPDATE cycle_phases SET start_date = $3, end_date = $4 \
                     WHERE cycle_id = $1 AND phase_id = $2",
                )
                .bind(rederivation.cycle_id)
                .bind(span.kind.catalog_id())
                .bind(span.start_date)
                .bind(span.end_date)
                .execute(&mut *tx)
                .await?;
            }

            sqlx::query("UPDATE cycles SET cycle_length = $2 WHERE id = $1")
                .bind(rederivation.cycle_id)
                .bind(rederivation.timeline.cycle_length)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_covering_cycle(&self, owner: Uuid, date: NaiveDate) -> Result<Option<Cycle>> {
        Ok(sqlx::query_as::<_, Cycle>(
            "SELECT id, user_id, start_date, cycle_length, created_at FROM cycles \
             WHERE user_id = $1 AND start_date <= $2 ORDER BY start_date DESC LIMIT 1",
        )
        .bind(owner)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn get_cycle(&self, owner: Uuid, cycle_id: Uuid) -> Result<Option<Cycle>> {
        Ok(sqlx::query_as::<_, Cycle>(
            "SELECT id, user_id, start_date, cycle_length, created_at FROM cycles \
             WHERE id = $1 AND user_id = $2",
        )
        .bind(cycle_id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_cycles(&self, owner: Uuid) -> Result<Vec<Cycle>> {
        Ok(sqlx::query_as::<_, Cycle>(
            "SELECT id, user_id, start_date, cycle_length, created_at FROM cycles \
             WHERE user_id = $1 ORDER BY start_date DESC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_phase_intervals(&self, cycle_id: Uuid) -> Result<Vec<PhaseInterval>> {
        let rows = sqlx::query_as::<_, PhaseRow>(
            "SELECT id, cycle_id, phase_id, start_date, end_date FROM cycle_phases \
             WHERE cycle_id = $1 ORDER BY start_date ASC",
        )
        .bind(cycle_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PhaseInterval::from).collect())
    }

    async fn find_phase_interval(
        &self,
        cycle_id: Uuid,
        kind: PhaseKind,
    ) -> Result<Option<PhaseInterval>> {
        let row = sqlx::query_as::<_, PhaseRow>(
            "SELECT id, cycle_id, phase_id, start_date, end_date FROM cycle_phases \
             WHERE cycle_id = $1 AND phase_id = $2 LIMIT 1",
        )
        .bind(cycle_id)
        .bind(kind.catalog_id())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(PhaseInterval::from))
    }

    async fn create_cycle(
        &self,
        owner: Uuid,
        timeline: &Timeline,
        first_log_date: NaiveDate,
    ) -> Result<CreatedCycle> {
        let mut tx = self.pool.begin().await?;

        let cycle = sqlx::query_as::<_, Cycle>(
            "INSERT INTO cycles (id, user_id, start_date, cycle_length) VALUES ($1, $2, $3, $4) \
             RETURNING id, user_id, start_date, cycle_length, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(owner)
        .bind(timeline.start_date)
        .bind(timeline.cycle_length)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            CycleError::from_write(e, |_| {
                format!("a cycle already starts on {}", timeline.start_date)
            })
        })?;

        let mut phases = Vec::with_capacity(timeline.spans.len());
        for span in &timeline.spans {
            let row = sqlx::query_as::<_, PhaseRow>(
                "INSERT INTO cycle_phases (id, cycle_id, phase_id, start_date, end_date) \
                 VALUES ($1, $2, $3, $4, $5) \
                 RETURNING id, cycle_id, phase_id, start_date, end_date",
            )
            .bind(Uuid::new_v4())
            .bind(cycle.id)
            .bind(span.kind.catalog_id())
            .bind(span.start_date)
            .bind(span.end_date)
            .fetch_one(&mut *tx)
            .await?;
            phases.push(PhaseInterval::from(row));
        }

        let menstrual = phases
            .iter()
            .find(|p| p.phase == Some(PhaseKind::Menstrual))
            .ok_or_else(|| {
                CycleError::InconsistentState(format!("cycle {} built without Menstrual", cycle.id))
            })?;

        let log = sqlx::query_as::<_, CycleLog>(
            "INSERT INTO cycle_logs (id, cycle_phase_id, date) VALUES ($1, $2, $3) \
             RETURNING id, cycle_phase_id, date",
        )
        .bind(Uuid::new_v4())
        .bind(menstrual.id)
        .bind(first_log_date)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(CreatedCycle { cycle, phases, log })
    }

    async fn delete_cycle(&self, cycle_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM cycle_log_symptoms WHERE cycle_log_id IN ( \
                SELECT l.id FROM cycle_logs l \
                JOIN cycle_phases cp ON cp.id = l.cycle_phase_id \
                WHERE cp.cycle_id = $1)",
        )
        .bind(cycle_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "DELETE FROM cycle_logs WHERE cycle_phase_id IN ( \
                SELECT id FROM cycle_phases WHERE cycle_id = $1)",
        )
        .bind(cycle_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM cycle_phases WHERE cycle_id = $1")
            .bind(cycle_id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM cycles WHERE id = $1")
            .bind(cycle_id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(CycleError::NotFound("cycle"));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn attach_log(&self, interval_id: Uuid, date: NaiveDate) -> Result<CycleLog> {
        sqlx::query_as::<_, CycleLog>(
            "INSERT INTO cycle_logs (id, cycle_phase_id, date) VALUES ($1, $2, $3) \
             RETURNING id, cycle_phase_id, date",
        )
        .bind(Uuid::new_v4())
        .bind(interval_id)
        .bind(date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CycleError::from_write(e, |_| format!("{date} is already logged")))
    }

    async fn find_log(&self, owner: Uuid, date: NaiveDate) -> Result<Option<LogLocation>> {
        let row = sqlx::query_as::<_, LogLocationRow>(
            "SELECT l.id, l.cycle_phase_id, l.date, \
                    c.id AS cycle_id, c.user_id, c.start_date, c.cycle_length, c.created_at \
             FROM cycle_logs l \
             JOIN cycle_phases cp ON cp.id = l.cycle_phase_id \
             JOIN cycles c ON c.id = cp.cycle_id \
             WHERE c.user_id = $1 AND l.date = $2 \
             ORDER BY c.start_date DESC LIMIT 1",
        )
        .bind(owner)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| LogLocation {
            log: CycleLog {
                id: r.id,
                cycle_phase_id: r.cycle_phase_id,
                date: r.date,
            },
            cycle: Cycle {
                id: r.cycle_id,
                user_id: r.user_id,
                start_date: r.start_date,
                cycle_length: r.cycle_length,
                created_at: r.created_at,
            },
        }))
    }

    async fn delete_log(&self, log_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM cycle_log_symptoms WHERE cycle_log_id = $1")
            .bind(log_id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM cycle_logs WHERE id = $1")
            .bind(log_id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(CycleError::NotFound("log"));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_log_dates(&self, owner: Uuid, kind: PhaseKind) -> Result<Vec<NaiveDate>> {
        Ok(sqlx::query_scalar::<_, NaiveDate>(
            "SELECT l.date FROM cycle_logs l \
             JOIN cycle_phases cp ON cp.id = l.cycle_phase_id \
             JOIN cycles c ON c.id = cp.cycle_id \
             WHERE c.user_id = $1 AND cp.phase_id = $2 \
             ORDER BY l.date ASC",
        )
        .bind(owner)
        .bind(kind.catalog_id())
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_log_entries(
        &self,
        owner: Uuid,
        cycle_id: Option<Uuid>,
    ) -> Result<Vec<LogEntryRow>> {
        let rows = sqlx::query_as::<_, LogEntryDbRow>(
            "SELECT l.id AS log_id, l.date, cp.phase_id, s.name AS symptom \
             FROM cycle_logs l \
             JOIN cycle_phases cp ON cp.id = l.cycle_phase_id \
             JOIN cycles c ON c.id = cp.cycle_id \
             LEFT JOIN cycle_log_symptoms ls ON ls.cycle_log_id = l.id \
             LEFT JOIN symptoms s ON s.id = ls.symptom_id \
             WHERE c.user_id = $1 AND ($2::uuid IS NULL OR c.id = $2) \
             ORDER BY l.date DESC, l.id, s.name",
        )
        .bind(owner)
        .bind(cycle_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| LogEntryRow {
                log_id: row.log_id,
                date: row.date,
                phase: row.phase_id.and_then(PhaseKind::from_catalog_id),
                symptom: row.symptom,
            })
            .collect())
    }

    async fn list_symptoms(&self) -> Result<Vec<Symptom>> {
        Ok(
            sqlx::query_as::<_, Symptom>("SELECT id, name FROM symptoms ORDER BY name ASC")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn create_symptom(&self, name: &str) -> Result<Symptom> {
        sqlx::query_as::<_, Symptom>(
            "INSERT INTO symptoms (id, name) VALUES ($1, $2) RETURNING id, name",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CycleError::from_write(e, |_| format!("symptom '{name}' already exists")))
    }

    async fn set_log_symptoms(&self, log_id: Uuid, symptom_ids: &[Uuid]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM cycle_log_symptoms WHERE cycle_log_id = $1")
            .bind(log_id)
            .execute(&mut *tx)
            .await?;

        for symptom_id in symptom_ids {
            sqlx::query(
                "INSERT INTO cycle_log_symptoms (cycle_log_id, symptom_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(log_id)
            .bind(symptom_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
