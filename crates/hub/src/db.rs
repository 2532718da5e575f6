use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};
use std::collections::HashMap;
use std::str::FromStr;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use plant_core::{DliSnapshot, WateringState};

#[derive(Clone)]
pub struct Db {
    pool: Pool<Sqlite>,
}

fn format_ts(ts: Option<OffsetDateTime>) -> Result<Option<String>> {
    ts.map(|t| t.format(&Rfc3339).context("failed to format timestamp"))
        .transpose()
}

fn now_ts() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("failed to format timestamp")
}

fn parse_ts(column: &str, raw: Option<String>) -> Result<Option<OffsetDateTime>> {
    raw.map(|s| {
        OffsetDateTime::parse(&s, &Rfc3339)
            .with_context(|| format!("bad {column} timestamp: {s}"))
    })
    .transpose()
}

impl Db {
    /// db_url examples:
    /// - "sqlite:/home/pi/plants/plants.db"
    /// - "sqlite::memory:" (tests)
    pub async fn connect(db_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(db_url)
            .with_context(|| format!("invalid sqlite connection string: {db_url}"))?
            .journal_mode(SqliteJournalMode::Wal);

        // A single connection keeps `sqlite::memory:` one database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to connect to sqlite db: {db_url}"))?;

        Ok(Self { pool })
    }

    /// Runs SQLx migrations from ./migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("failed to run migrations")?;
        Ok(())
    }

    // ----------------------------
    // Watering snapshots
    // ----------------------------

    pub async fn save_snapshot(&self, plant_id: &str, state: &WateringState) -> Result<()> {
        let now = now_ts()?;
        sqlx::query(
            r#"
            INSERT INTO watering_state (
              plant_id, last_watered, snooze_until, last_notified, last_due_notified, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(plant_id) DO UPDATE SET
              last_watered=excluded.last_watered,
              snooze_until=excluded.snooze_until,
              last_notified=excluded.last_notified,
              last_due_notified=excluded.last_due_notified,
              updated_at=excluded.updated_at
            "#,
        )
        .bind(plant_id)
        .bind(format_ts(state.last_watered)?)
        .bind(format_ts(state.snooze_until)?)
        .bind(format_ts(state.last_notified)?)
        .bind(format_ts(state.last_due_notified)?)
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("save_snapshot failed plant={plant_id}"))?;
        Ok(())
    }

    pub async fn load_snapshots(&self) -> Result<HashMap<String, WateringState>> {
        let rows = sqlx::query(
            r#"
            SELECT plant_id, last_watered, snooze_until, last_notified, last_due_notified
            FROM watering_state
            ORDER BY plant_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("load_snapshots failed")?;

        let mut out = HashMap::with_capacity(rows.len());
        for r in rows {
            let plant_id: String = r.try_get("plant_id")?;
            let state = WateringState {
                last_watered: parse_ts("last_watered", r.try_get("last_watered")?)?,
                snooze_until: parse_ts("snooze_until", r.try_get("snooze_until")?)?,
                last_notified: parse_ts("last_notified", r.try_get("last_notified")?)?,
                last_due_notified: parse_ts("last_due_notified", r.try_get("last_due_notified")?)?,
            };
            out.insert(plant_id, state);
        }
        Ok(out)
    }

    pub async fn load_snapshot(&self, plant_id: &str) -> Result<Option<WateringState>> {
        Ok(self.load_snapshots().await?.remove(plant_id))
    }

    // ----------------------------
    // Daily light integral
    // ----------------------------

    /// Shares the plant's `watering_state` row; leaves the watering columns
    /// alone.
    pub async fn save_dli(&self, plant_id: &str, dli: &DliSnapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO watering_state (
              plant_id, dli_day, dli_today, dli_last_period, updated_at
            ) VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(plant_id) DO UPDATE SET
              dli_day=excluded.dli_day,
              dli_today=excluded.dli_today,
              dli_last_period=excluded.dli_last_period,
              updated_at=excluded.updated_at
            "#,
        )
        .bind(plant_id)
        .bind(dli.day.to_string())
        .bind(dli.today)
        .bind(dli.last_period)
        .bind(now_ts()?)
        .execute(&self.pool)
        .await
        .with_context(|| format!("save_dli failed plant={plant_id}"))?;
        Ok(())
    }

    /// Plants that never recorded a light sample are absent.
    pub async fn load_dli_snapshots(&self) -> Result<HashMap<String, DliSnapshot>> {
        let rows = sqlx::query(
            r#"
            SELECT plant_id, dli_day, dli_today, dli_last_period
            FROM watering_state
            WHERE dli_day IS NOT NULL
            ORDER BY plant_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("load_dli_snapshots failed")?;

        let mut out = HashMap::with_capacity(rows.len());
        for r in rows {
            let plant_id: String = r.try_get("plant_id")?;
            let raw: String = r.try_get("dli_day")?;
            let day = Date::parse(&raw, format_description!("[year]-[month]-[day]"))
                .with_context(|| format!("bad dli_day for {plant_id}: {raw}"))?;
            let today: Option<f64> = r.try_get("dli_today")?;
            let last_period: Option<f64> = r.try_get("dli_last_period")?;
            let snapshot = DliSnapshot {
                day,
                today: today.unwrap_or(0.0),
                last_period: last_period.unwrap_or(0.0),
            };
            out.insert(plant_id, snapshot);
        }
        Ok(out)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
