use crate::error::{EngineError, EngineResult};
use crate::services::analysis::temporal::types::TimeSeriesPoint;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBounds {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Read-only source of event boundaries and metric series.
///
/// Rows come back ordered by timestamp, restricted to the requested fields and with
/// records that carry none of them dropped.
pub trait TimeSeriesRepository: Send + Sync {
    fn event_bounds(
        &self,
        event_id: &str,
    ) -> impl Future<Output = EngineResult<EventBounds>> + Send;

    fn fetch_series(
        &self,
        event_id: &str,
        fields: &[String],
    ) -> impl Future<Output = EngineResult<Vec<TimeSeriesPoint>>> + Send;
}

fn project(point: &TimeSeriesPoint, fields: &[String]) -> Option<TimeSeriesPoint> {
    if fields.is_empty() {
        return Some(point.clone());
    }
    let selected: BTreeMap<String, f64> = fields
        .iter()
        .filter_map(|field| point.value(field).map(|value| (field.clone(), value)))
        .collect();
    (!selected.is_empty()).then(|| TimeSeriesPoint::new(point.timestamp, selected))
}

#[derive(Debug, Clone, Deserialize)]
struct DatasetEvent {
    id: String,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
struct Dataset {
    #[serde(default)]
    events: Vec<DatasetEvent>,
    #[serde(default)]
    points: HashMap<String, Vec<TimeSeriesPoint>>,
}

/// Repository over data already held in memory: tests and JSON datasets for the CLI.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    events: HashMap<String, EventBounds>,
    points: HashMap<String, Vec<TimeSeriesPoint>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event(
        mut self,
        event_id: impl Into<String>,
        bounds: EventBounds,
        mut points: Vec<TimeSeriesPoint>,
    ) -> Self {
        let event_id = event_id.into();
        points.sort_by_key(|point| point.timestamp);
        self.events.insert(event_id.clone(), bounds);
        self.points.insert(event_id, points);
        self
    }

    /// Loads `{"events": [{"id", "start", "end"}], "points": {"<event id>": [...]}}`.
    pub fn from_json_str(raw: &str) -> EngineResult<Self> {
        let dataset: Dataset = serde_json::from_str(raw)?;
        let mut repo = Self::new();
        for event in dataset.events {
            if event.end < event.start {
                return Err(EngineError::validation(format!(
                    "event {} ends before it starts",
                    event.id
                )));
            }
            repo.events.insert(
                event.id,
                EventBounds {
                    start: event.start,
                    end: event.end,
                },
            );
        }
        for (event_id, mut points) in dataset.points {
            points.sort_by_key(|point| point.timestamp);
            repo.points.insert(event_id, points);
        }
        Ok(repo)
    }

    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read dataset {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("invalid dataset {}", path.display()))
    }
}

impl TimeSeriesRepository for InMemoryRepository {
    async fn event_bounds(&self, event_id: &str) -> EngineResult<EventBounds> {
        self.events
            .get(event_id)
            .copied()
            .ok_or_else(|| EngineError::NotFound {
                event_id: event_id.to_string(),
            })
    }

    async fn fetch_series(
        &self,
        event_id: &str,
        fields: &[String],
    ) -> EngineResult<Vec<TimeSeriesPoint>> {
        Ok(self
            .points
            .get(event_id)
            .map(|points| points.iter().filter_map(|p| project(p, fields)).collect())
            .unwrap_or_default())
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    start_ts: DateTime<Utc>,
    end_ts: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct MetricRow {
    ts: DateTime<Utc>,
    field: String,
    value: f64,
}

/// Postgres-backed repository over `business_events` and the long-format
/// `event_metric_points` table.
#[derive(Clone)]
pub struct PgTimeSeriesRepository {
    db: PgPool,
}

impl PgTimeSeriesRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

impl TimeSeriesRepository for PgTimeSeriesRepository {
    async fn event_bounds(&self, event_id: &str) -> EngineResult<EventBounds> {
        let row: Option<EventRow> = sqlx::query_as(
            r#"
            SELECT start_ts, end_ts
            FROM business_events
            WHERE id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.db)
        .await?;
        row.map(|row| EventBounds {
            start: row.start_ts,
            end: row.end_ts,
        })
        .ok_or_else(|| EngineError::NotFound {
            event_id: event_id.to_string(),
        })
    }

    async fn fetch_series(
        &self,
        event_id: &str,
        fields: &[String],
    ) -> EngineResult<Vec<TimeSeriesPoint>> {
        let rows: Vec<MetricRow> = sqlx::query_as(
            r#"
            SELECT ts, field, value
            FROM event_metric_points
            WHERE event_id = $1
              AND (cardinality($2::text[]) = 0 OR field = ANY($2))
              AND value IS NOT NULL
            ORDER BY ts ASC, field ASC
            "#,
        )
        .bind(event_id)
        .bind(fields)
        .fetch_all(&self.db)
        .await?;

        let mut pivot: BTreeMap<DateTime<Utc>, BTreeMap<String, f64>> = BTreeMap::new();
        for row in rows {
            pivot.entry(row.ts).or_default().insert(row.field, row.value);
        }
        Ok(pivot
            .into_iter()
            .map(|(ts, fields)| TimeSeriesPoint::new(ts, fields))
            .collect())
    }
}
