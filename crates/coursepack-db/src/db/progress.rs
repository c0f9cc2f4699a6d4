use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coursepack_core::models::{LessonStatus, ProgressRecord, ProgressUpdate, DEFAULT_TOTAL_TIME};
use coursepack_core::AppError;
use sqlx::{PgPool, Postgres};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Progress tracker storage.
///
/// Implementations keep at most one record per (`learner_id`, `package_id`).
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    async fn find_one(
        &self,
        learner_id: &str,
        package_id: Uuid,
    ) -> Result<Option<ProgressRecord>, AppError>;

    /// Create the record if absent, otherwise overwrite only the supplied fields.
    /// `last_accessed` is refreshed on every call.
    async fn upsert(
        &self,
        learner_id: &str,
        package_id: Uuid,
        update: &ProgressUpdate,
    ) -> Result<ProgressRecord, AppError>;

    async fn delete_many_by_package(&self, package_id: Uuid) -> Result<u64, AppError>;

    /// Most recently accessed first.
    async fn list_for_package(&self, package_id: Uuid) -> Result<Vec<ProgressRecord>, AppError>;
}

/// Row type for the progress_records table.
#[derive(Debug, sqlx::FromRow)]
pub struct ProgressRow {
    pub id: Uuid,
    pub learner_id: String,
    pub package_id: Uuid,
    pub lesson_status: String,
    pub location: String,
    pub score: f64,
    pub total_time: String,
    pub suspend_data: String,
    pub last_accessed: DateTime<Utc>,
}

impl ProgressRow {
    pub fn into_record(self) -> Result<ProgressRecord, AppError> {
        let lesson_status: LessonStatus = self.lesson_status.parse()?;
        Ok(ProgressRecord {
            id: self.id,
            learner_id: self.learner_id,
            package_id: self.package_id,
            lesson_status,
            location: self.location,
            score: self.score,
            total_time: self.total_time,
            suspend_data: self.suspend_data,
            last_accessed: self.last_accessed,
        })
    }
}

const PROGRESS_COLUMNS: &str = "id, learner_id, package_id, lesson_status, location, score, total_time, suspend_data, last_accessed";

#[derive(Clone)]
pub struct PostgresProgressRepository {
    pool: PgPool,
}

impl PostgresProgressRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProgressRepository for PostgresProgressRepository {
    #[tracing::instrument(skip(self), fields(db.table = "progress_records", db.operation = "select"))]
    async fn find_one(
        &self,
        learner_id: &str,
        package_id: Uuid,
    ) -> Result<Option<ProgressRecord>, AppError> {
        let row = sqlx::query_as::<Postgres, ProgressRow>(&format!(
            "SELECT {} FROM progress_records WHERE learner_id = $1 AND package_id = $2",
            PROGRESS_COLUMNS
        ))
        .bind(learner_id)
        .bind(package_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ProgressRow::into_record).transpose()
    }

    #[tracing::instrument(skip(self, update), fields(db.table = "progress_records", db.operation = "upsert"))]
    async fn upsert(
        &self,
        learner_id: &str,
        package_id: Uuid,
        update: &ProgressUpdate,
    ) -> Result<ProgressRecord, AppError> {
        // Single statement: the unique (learner_id, package_id) constraint arbitrates concurrent first saves.
        let row = sqlx::query_as::<Postgres, ProgressRow>(&format!(
            r#"
            INSERT INTO progress_records (
                id, learner_id, package_id, lesson_status, location, score,
                total_time, suspend_data, last_accessed
            )
            VALUES (
                $1, $2, $3,
                COALESCE($4, $10), COALESCE($5, ''), COALESCE($6, 0),
                COALESCE($7, $11), COALESCE($8, ''), $9
            )
            ON CONFLICT (learner_id, package_id) DO UPDATE SET
                lesson_status = COALESCE($4, progress_records.lesson_status),
                location = COALESCE($5, progress_records.location),
                score = COALESCE($6, progress_records.score),
                total_time = COALESCE($7, progress_records.total_time),
                suspend_data = COALESCE($8, progress_records.suspend_data),
                last_accessed = EXCLUDED.last_accessed
            RETURNING {}
            "#,
            PROGRESS_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(learner_id)
        .bind(package_id)
        .bind(update.lesson_status.map(|s| s.as_str()))
        .bind(update.location.as_deref())
        .bind(update.score)
        .bind(update.total_time.as_deref())
        .bind(update.suspend_data.as_deref())
        .bind(Utc::now())
        .bind(LessonStatus::default().as_str())
        .bind(DEFAULT_TOTAL_TIME)
        .fetch_one(&self.pool)
        .await?;

        row.into_record()
    }

    #[tracing::instrument(skip(self), fields(db.table = "progress_records", db.operation = "delete"))]
    async fn delete_many_by_package(&self, package_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM progress_records WHERE package_id = $1")
            .bind(package_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self), fields(db.table = "progress_records", db.operation = "select"))]
    async fn list_for_package(&self, package_id: Uuid) -> Result<Vec<ProgressRecord>, AppError> {
        let rows = sqlx::query_as::<Postgres, ProgressRow>(&format!(
            "SELECT {} FROM progress_records WHERE package_id = $1 ORDER BY last_accessed DESC, learner_id",
            PROGRESS_COLUMNS
        ))
        .bind(package_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ProgressRow::into_record).collect()
    }
}

/// Process-local progress store keyed by (learner, package).
#[derive(Default)]
pub struct InMemoryProgressRepository {
    records: Mutex<HashMap<(String, Uuid), ProgressRecord>>,
}

impl InMemoryProgressRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressRepository for InMemoryProgressRepository {
    async fn find_one(
        &self,
        learner_id: &str,
        package_id: Uuid,
    ) -> Result<Option<ProgressRecord>, AppError> {
        let records = self.records.lock().await;
        Ok(records.get(&(learner_id.to_string(), package_id)).cloned())
    }

    async fn upsert(
        &self,
        learner_id: &str,
        package_id: Uuid,
        update: &ProgressUpdate,
    ) -> Result<ProgressRecord, AppError> {
        let mut records = self.records.lock().await;
        let record = records
            .entry((learner_id.to_string(), package_id))
            .or_insert_with(|| ProgressRecord::new(learner_id, package_id));
        record.apply(update, Utc::now());
        Ok(record.clone())
    }

    async fn delete_many_by_package(&self, package_id: Uuid) -> Result<u64, AppError> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|(_, pid), _| *pid != package_id);
        Ok((before - records.len()) as u64)
    }

    async fn list_for_package(&self, package_id: Uuid) -> Result<Vec<ProgressRecord>, AppError> {
        let records = self.records.lock().await;
        let mut matching: Vec<ProgressRecord> = records
            .values()
            .filter(|r| r.package_id == package_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.last_accessed
                .cmp(&a.last_accessed)
                .then_with(|| a.learner_id.cmp(&b.learner_id))
        });
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_upsert_creates_with_defaults() {
        let repo = InMemoryProgressRepository::new();
        let package_id = Uuid::new_v4();

        let record = repo
            .upsert(
                "learner-1",
                package_id,
                &ProgressUpdate {
                    score: Some(42.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(record.learner_id, "learner-1");
        assert_eq!(record.score, 42.0);
        assert_eq!(record.lesson_status, LessonStatus::NotAttempted);
        assert_eq!(record.total_time, DEFAULT_TOTAL_TIME);
        assert_eq!(record.location, "");
    }

    #[tokio::test]
    async fn test_upsert_merges_supplied_fields_only() {
        let repo = InMemoryProgressRepository::new();
        let package_id = Uuid::new_v4();

        let first = repo
            .upsert(
                "l",
                package_id,
                &ProgressUpdate {
                    lesson_status: Some(LessonStatus::Incomplete),
                    location: Some("page-3".to_string()),
                    suspend_data: Some("a=1".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let second = repo
            .upsert(
                "l",
                package_id,
                &ProgressUpdate {
                    score: Some(80.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.location, "page-3");
        assert_eq!(second.suspend_data, "a=1");
        assert_eq!(second.lesson_status, LessonStatus::Incomplete);
        assert_eq!(second.score, 80.0);
        assert!(second.last_accessed > first.last_accessed);
    }

    #[tokio::test]
    async fn test_concurrent_first_saves_share_one_record() {
        let repo = Arc::new(InMemoryProgressRepository::new());
        let package_id = Uuid::new_v4();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let repo = repo.clone();
                tokio::spawn(async move {
                    repo.upsert(
                        "same-learner",
                        package_id,
                        &ProgressUpdate {
                            score: Some(i as f64),
                            ..Default::default()
                        },
                    )
                    .await
                    .unwrap()
                })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().id);
        }
        ids.dedup();

        assert_eq!(ids.len(), 1);
        assert_eq!(repo.list_for_package(package_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_many_by_package() {
        let repo = InMemoryProgressRepository::new();
        let doomed = Uuid::new_v4();
        let kept = Uuid::new_v4();
        let update = ProgressUpdate::default();

        repo.upsert("a", doomed, &update).await.unwrap();
        repo.upsert("b", doomed, &update).await.unwrap();
        repo.upsert("a", kept, &update).await.unwrap();

        assert_eq!(repo.delete_many_by_package(doomed).await.unwrap(), 2);
        assert!(repo.find_one("a", doomed).await.unwrap().is_none());
        assert!(repo.find_one("a", kept).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_for_package_most_recent_first() {
        let repo = InMemoryProgressRepository::new();
        let package_id = Uuid::new_v4();
        let update = ProgressUpdate::default();

        repo.upsert("older", package_id, &update).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        repo.upsert("newer", package_id, &update).await.unwrap();

        let learners: Vec<String> = repo
            .list_for_package(package_id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.learner_id)
            .collect();
        assert_eq!(learners, vec!["newer".to_string(), "older".to_string()]);
    }
}
