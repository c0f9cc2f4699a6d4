use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coursepack_core::models::{NewPackage, Package, PackageVersion};
use coursepack_core::AppError;
use serde_json::{Map, Value as JsonValue};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Package registry operations.
#[async_trait]
pub trait PackageRepository: Send + Sync {
    async fn insert(&self, package: NewPackage) -> Result<Package, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Package>, AppError>;

    /// All packages, newest upload first.
    async fn find_all(&self) -> Result<Vec<Package>, AppError>;

    /// Returns `false` when no record matched.
    async fn delete_one(&self, id: Uuid) -> Result<bool, AppError>;
}

/// Row type for the packages table.
#[derive(Debug, sqlx::FromRow)]
pub struct PackageRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub version: String,
    pub stored_file_name: String,
    pub storage_path: String,
    pub upload_date: DateTime<Utc>,
    pub metadata: Json<Map<String, JsonValue>>,
}

impl PackageRow {
    pub fn into_package(self) -> Result<Package, AppError> {
        let version: PackageVersion = self.version.parse()?;
        Ok(Package {
            id: self.id,
            title: self.title,
            description: self.description,
            version,
            stored_file_name: self.stored_file_name,
            storage_path: self.storage_path,
            upload_date: self.upload_date,
            metadata: self.metadata.0,
        })
    }
}

const PACKAGE_COLUMNS: &str =
    "id, title, description, version, stored_file_name, storage_path, upload_date, metadata";

#[derive(Clone)]
pub struct PostgresPackageRepository {
    pool: PgPool,
}

impl PostgresPackageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PackageRepository for PostgresPackageRepository {
    #[tracing::instrument(skip(self, package), fields(db.table = "packages", db.operation = "insert"))]
    async fn insert(&self, package: NewPackage) -> Result<Package, AppError> {
        let row = sqlx::query_as::<Postgres, PackageRow>(&format!(
            r#"
            INSERT INTO packages (id, title, description, version, stored_file_name, storage_path, upload_date, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            PACKAGE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&package.title)
        .bind(&package.description)
        .bind(package.version.as_str())
        .bind(&package.stored_file_name)
        .bind(&package.storage_path)
        .bind(Utc::now())
        .bind(Json(&package.metadata))
        .fetch_one(&self.pool)
        .await?;

        row.into_package()
    }

    #[tracing::instrument(skip(self), fields(db.table = "packages", db.operation = "select", db.record_id = %id))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Package>, AppError> {
        let row = sqlx::query_as::<Postgres, PackageRow>(&format!(
            "SELECT {} FROM packages WHERE id = $1",
            PACKAGE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PackageRow::into_package).transpose()
    }

    #[tracing::instrument(skip(self), fields(db.table = "packages", db.operation = "select"))]
    async fn find_all(&self) -> Result<Vec<Package>, AppError> {
        let rows = sqlx::query_as::<Postgres, PackageRow>(&format!(
            "SELECT {} FROM packages ORDER BY upload_date DESC, id",
            PACKAGE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PackageRow::into_package).collect()
    }

    #[tracing::instrument(skip(self), fields(db.table = "packages", db.operation = "delete", db.record_id = %id))]
    async fn delete_one(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM packages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Process-local package registry.
#[derive(Default)]
pub struct InMemoryPackageRepository {
    packages: RwLock<HashMap<Uuid, Package>>,
}

impl InMemoryPackageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PackageRepository for InMemoryPackageRepository {
    async fn insert(&self, package: NewPackage) -> Result<Package, AppError> {
        let record = Package {
            id: Uuid::new_v4(),
            title: package.title,
            description: package.description,
            version: package.version,
            stored_file_name: package.stored_file_name,
            storage_path: package.storage_path,
            upload_date: Utc::now(),
            metadata: package.metadata,
        };
        self.packages
            .write()
            .await
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Package>, AppError> {
        Ok(self.packages.read().await.get(&id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Package>, AppError> {
        let mut packages: Vec<Package> = self.packages.read().await.values().cloned().collect();
        packages.sort_by(|a, b| {
            b.upload_date
                .cmp(&a.upload_date)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(packages)
    }

    async fn delete_one(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.packages.write().await.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_package(title: &str) -> NewPackage {
        NewPackage {
            title: title.to_string(),
            description: String::new(),
            version: PackageVersion::Scorm12,
            stored_file_name: format!("{}.zip", title),
            storage_path: format!("packages/{}.zip", title),
            metadata: Map::new(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let repo = InMemoryPackageRepository::new();
        let created = repo.insert(new_package("alpha")).await.unwrap();

        let found = repo.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found, created);
        assert!(repo.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_all_newest_first() {
        let repo = InMemoryPackageRepository::new();
        let first = repo.insert(new_package("first")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = repo.insert(new_package("second")).await.unwrap();

        let all = repo.find_all().await.unwrap();
        assert_eq!(
            all.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );
    }

    #[tokio::test]
    async fn test_delete_one() {
        let repo = InMemoryPackageRepository::new();
        let created = repo.insert(new_package("gone")).await.unwrap();

        assert!(repo.delete_one(created.id).await.unwrap());
        assert!(!repo.delete_one(created.id).await.unwrap());
        assert!(repo.find_all().await.unwrap().is_empty());
    }

    #[test]
    fn test_row_conversion_rejects_unknown_version() {
        let row = PackageRow {
            id: Uuid::new_v4(),
            title: "t".to_string(),
            description: String::new(),
            version: "3.0".to_string(),
            stored_file_name: "a.zip".to_string(),
            storage_path: "packages/a.zip".to_string(),
            upload_date: Utc::now(),
            metadata: Json(Map::new()),
        };
        assert!(row.into_package().is_err());
    }
}
