use coursepack_core::constants::MAX_LEARNER_ID_LENGTH;
use coursepack_core::models::{ProgressRecord, ProgressUpdate};
use coursepack_core::AppError;
use coursepack_db::{PackageRepository, ProgressRepository, Repositories};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Per-learner progress against registered packages.
#[derive(Clone)]
pub struct ProgressService {
    packages: Arc<dyn PackageRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl ProgressService {
    pub fn new(repositories: &Repositories) -> Self {
        Self {
            packages: repositories.packages.clone(),
            progress: repositories.progress.clone(),
        }
    }

    /// Upsert the learner's record, overwriting only the supplied fields.
    #[tracing::instrument(skip(self, update), fields(package.id = %package_id))]
    pub async fn save(
        &self,
        learner_id: &str,
        package_id: Uuid,
        update: ProgressUpdate,
    ) -> Result<ProgressRecord, AppError> {
        validate_learner_id(learner_id)?;
        update.validate()?;
        self.ensure_package_exists(package_id).await?;

        let record = self.progress.upsert(learner_id, package_id, &update).await?;
        tracing::debug!(
            learner_id = %learner_id,
            lesson_status = %record.lesson_status,
            score = record.score,
            "Progress saved"
        );
        Ok(record)
    }

    /// Never creates a record.
    pub async fn get(&self, learner_id: &str, package_id: Uuid) -> Result<ProgressRecord, AppError> {
        validate_learner_id(learner_id)?;
        self.progress
            .find_one(learner_id, package_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "No progress for learner {} on package {}",
                    learner_id, package_id
                ))
            })
    }

    pub async fn list_for_package(&self, package_id: Uuid) -> Result<Vec<ProgressRecord>, AppError> {
        self.ensure_package_exists(package_id).await?;
        self.progress.list_for_package(package_id).await
    }

    // Point-in-time check; packages are not cached.
    async fn ensure_package_exists(&self, package_id: Uuid) -> Result<(), AppError> {
        match self.packages.find_by_id(package_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::PackageNotFound(format!(
                "Package {} not found",
                package_id
            ))),
        }
    }
}

fn validate_learner_id(learner_id: &str) -> Result<(), AppError> {
    if learner_id.trim().is_empty() {
        return Err(AppError::InvalidInput("learnerId is required".to_string()));
    }
    if learner_id.contains('\0') {
        return Err(AppError::InvalidInput(
            "learnerId must not contain NUL characters".to_string(),
        ));
    }
    if learner_id.chars().count() > MAX_LEARNER_ID_LENGTH {
        return Err(AppError::InvalidInput(format!(
            "learnerId must be at most {} characters",
            MAX_LEARNER_ID_LENGTH
        )));
    }
    Ok(())
}
