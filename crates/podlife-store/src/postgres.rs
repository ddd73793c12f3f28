//! # PostgreSQL Backend
//!
//! Persists lifecycle records in the `pod_lifecycle` table, one row per pod
//! UID. Every save is a single statement guarded by the row's `revision`
//! column, so concurrent writers (in this process or another) cannot
//! overwrite each other:
//!
//! - first save: `INSERT .. ON CONFLICT (uid) DO NOTHING`
//! - later saves: `UPDATE .. WHERE uid = $1 AND revision = $expected`
//!
//! Zero affected rows means another writer got there first and is reported
//! as [`StoreError::Conflict`]. Milestone columns are additionally written
//! through `COALESCE(column, $n)`, so the database never replaces a
//! timestamp it already holds.

use chrono::{DateTime, Utc};
use podlife_core::{MilestoneKind, PodIdentity, PodUid, Timestamp};
use podlife_state::{LifecycleRecord, Milestones};
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::backend::{RecordBackend, Revision, VersionedRecord};
use crate::config::StoreConfig;
use crate::error::StoreError;

/// Open a connection pool for `config.database_url`.
///
/// Returns `None` if no database is configured (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection fails.
pub async fn connect(config: &StoreConfig) -> Result<Option<PgPool>, sqlx::Error> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!(
            "DATABASE_URL not set, recording pod lifecycles in memory only. \
             Records will not survive restarts."
        );
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(1)
        .acquire_timeout(config.acquire_timeout)
        .connect(url)
        .await?;

    tracing::info!(
        max_connections = config.max_connections,
        "connected to PostgreSQL"
    );
    Ok(Some(pool))
}

/// Apply the embedded schema migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("database migrations applied");
    Ok(())
}

/// [`RecordBackend`] over a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Number of stored pod records.
    pub async fn count(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pod_lifecycle")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(count)
    }

    /// Every stored record, ordered by UID.
    pub async fn load_all(&self) -> Result<Vec<LifecycleRecord>, StoreError> {
        let rows = sqlx::query_as::<_, LifecycleRow>(
            "SELECT uid, namespace, name, scheduled, network_ready, pull_started,
                    pull_finished, container_created, container_started, killing, revision
             FROM pod_lifecycle ORDER BY uid",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| row.into_versioned().map(|v| v.record))
            .collect()
    }

    async fn insert(&self, record: &LifecycleRecord) -> Result<u64, sqlx::Error> {
        let m = record.milestones();
        let result = sqlx::query(
            "INSERT INTO pod_lifecycle (uid, namespace, name, scheduled, network_ready,
                 pull_started, pull_finished, container_created, container_started, killing,
                 revision, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 1, now(), now())
             ON CONFLICT (uid) DO NOTHING",
        )
        .bind(record.uid().as_str())
        .bind(&record.identity().namespace)
        .bind(&record.identity().name)
        .bind(column(m, MilestoneKind::Scheduled))
        .bind(column(m, MilestoneKind::NetworkReady))
        .bind(column(m, MilestoneKind::PullStarted))
        .bind(column(m, MilestoneKind::PullFinished))
        .bind(column(m, MilestoneKind::ContainerCreated))
        .bind(column(m, MilestoneKind::ContainerStarted))
        .bind(column(m, MilestoneKind::Killing))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn update(&self, record: &LifecycleRecord, expected: i64) -> Result<u64, sqlx::Error> {
        let m = record.milestones();
        let result = sqlx::query(
            "UPDATE pod_lifecycle SET
                 namespace = $2,
                 name = $3,
                 scheduled = COALESCE(scheduled, $4),
                 network_ready = COALESCE(network_ready, $5),
                 pull_started = COALESCE(pull_started, $6),
                 pull_finished = COALESCE(pull_finished, $7),
                 container_created = COALESCE(container_created, $8),
                 container_started = COALESCE(container_started, $9),
                 killing = COALESCE(killing, $10),
                 revision = revision + 1,
                 updated_at = now()
             WHERE uid = $1 AND revision = $11",
        )
        .bind(record.uid().as_str())
        .bind(&record.identity().namespace)
        .bind(&record.identity().name)
        .bind(column(m, MilestoneKind::Scheduled))
        .bind(column(m, MilestoneKind::NetworkReady))
        .bind(column(m, MilestoneKind::PullStarted))
        .bind(column(m, MilestoneKind::PullFinished))
        .bind(column(m, MilestoneKind::ContainerCreated))
        .bind(column(m, MilestoneKind::ContainerStarted))
        .bind(column(m, MilestoneKind::Killing))
        .bind(expected)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

impl RecordBackend for PgBackend {
    async fn load(&self, uid: &PodUid) -> Result<Option<VersionedRecord>, StoreError> {
        let row = sqlx::query_as::<_, LifecycleRow>(
            "SELECT uid, namespace, name, scheduled, network_ready, pull_started,
                    pull_finished, container_created, container_started, killing, revision
             FROM pod_lifecycle WHERE uid = $1",
        )
        .bind(uid.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(LifecycleRow::into_versioned).transpose()
    }

    async fn save(
        &self,
        record: &LifecycleRecord,
        expected: Revision,
    ) -> Result<Revision, StoreError> {
        let affected = if expected.is_absent() {
            self.insert(record).await
        } else {
            let expected_db = i64::try_from(expected.get()).map_err(|_| StoreError::Corrupt {
                uid: record.uid().to_string(),
                reason: format!("revision {expected} exceeds BIGINT"),
            })?;
            self.update(record, expected_db).await
        }
        .map_err(|e| {
            if is_lost_race(&e) {
                tracing::debug!(uid = %record.uid(), error = %e, "transient database conflict");
                StoreError::Conflict {
                    uid: record.uid().clone(),
                    expected,
                }
            } else {
                map_sqlx_error(e)
            }
        })?;

        if affected == 0 {
            return Err(StoreError::Conflict {
                uid: record.uid().clone(),
                expected,
            });
        }
        Ok(expected.next())
    }

    fn kind(&self) -> &'static str {
        "postgres"
    }
}

fn column(milestones: &Milestones, kind: MilestoneKind) -> Option<DateTime<Utc>> {
    milestones.get(kind).map(DateTime::from)
}

/// SQLSTATEs that mean "lost a race, try again".
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

fn is_lost_race(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => matches!(
            db.code().as_deref(),
            Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED)
        ),
        _ => false,
    }
}

/// Sort a driver error into the store's failure classes.
fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match &err {
        _ if is_lost_race(&err) => StoreError::Unavailable(err.to_string()),
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
        _ => StoreError::Database(err.to_string()),
    }
}

/// Internal row type for SQLx mapping.
#[derive(Debug, sqlx::FromRow)]
struct LifecycleRow {
    uid: String,
    namespace: String,
    name: String,
    scheduled: Option<DateTime<Utc>>,
    network_ready: Option<DateTime<Utc>>,
    pull_started: Option<DateTime<Utc>>,
    pull_finished: Option<DateTime<Utc>>,
    container_created: Option<DateTime<Utc>>,
    container_started: Option<DateTime<Utc>>,
    killing: Option<DateTime<Utc>>,
    revision: i64,
}

impl LifecycleRow {
    fn into_versioned(self) -> Result<VersionedRecord, StoreError> {
        let uid = PodUid::new(self.uid.clone()).map_err(|e| {
            tracing::error!(uid = ?self.uid, error = %e, "unreadable pod_lifecycle row");
            StoreError::Corrupt {
                uid: self.uid.clone(),
                reason: e.to_string(),
            }
        })?;
        let revision = u64::try_from(self.revision)
            .ok()
            .filter(|&r| r > 0)
            .map(Revision::new)
            .ok_or_else(|| StoreError::Corrupt {
                uid: self.uid.clone(),
                reason: format!("invalid revision {}", self.revision),
            })?;

        let ts = |v: Option<DateTime<Utc>>| v.map(Timestamp::from_utc);
        let milestones = Milestones {
            scheduled: ts(self.scheduled),
            network_ready: ts(self.network_ready),
            pull_started: ts(self.pull_started),
            pull_finished: ts(self.pull_finished),
            container_created: ts(self.container_created),
            container_started: ts(self.container_started),
            killing: ts(self.killing),
        };

        Ok(VersionedRecord {
            record: LifecycleRecord::from_parts(
                PodIdentity::new(uid, self.namespace, self.name),
                milestones,
            ),
            revision,
        })
    }
}
