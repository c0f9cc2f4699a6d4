use coursepack_core::constants::{METADATA_ENTRY_POINT, METADATA_MANIFEST_TITLE};
use coursepack_core::models::{
    content_dir_name, LaunchInfo, NewPackage, Package, PackageVersion,
};
use coursepack_core::{AppError, Config};
use coursepack_db::{PackageRepository, ProgressRepository, Repositories};
use coursepack_processing::{
    extract_archive, read_manifest, resolve_manifest, resolve_package, ExtractLimits,
};
use coursepack_storage::{Storage, StoredFile};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Settings for package ingestion and launch.
#[derive(Debug, Clone)]
pub struct PackageServiceConfig {
    /// Root under which each package gets its own extracted directory.
    pub content_dir: PathBuf,
    /// Public URL prefix the content root is served under.
    pub content_base_url: String,
    pub limits: ExtractLimits,
}

impl PackageServiceConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            content_dir: config.content_dir.clone(),
            content_base_url: config.content_base_url.clone(),
            limits: ExtractLimits {
                max_total_bytes: config.max_extracted_size_bytes,
                max_files: config.max_extracted_files,
            },
        }
    }
}

/// An uploaded archive plus the caller-supplied form fields.
#[derive(Debug, Clone, Default)]
pub struct UploadedPackage {
    /// Original name of the uploaded file.
    pub file_name: String,
    pub data: Vec<u8>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Overrides the version detected from the manifest.
    pub version: Option<PackageVersion>,
    pub metadata: Map<String, JsonValue>,
}

#[derive(Clone)]
pub struct PackageService {
    packages: Arc<dyn PackageRepository>,
    progress: Arc<dyn ProgressRepository>,
    storage: Arc<dyn Storage>,
    config: PackageServiceConfig,
    /// One lock per package whose content directory is being rebuilt.
    restore_locks: Arc<Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl PackageService {
    pub fn new(
        repositories: &Repositories,
        storage: Arc<dyn Storage>,
        config: PackageServiceConfig,
    ) -> Self {
        Self {
            packages: repositories.packages.clone(),
            progress: repositories.progress.clone(),
            storage,
            config,
            restore_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Store, extract and register an uploaded package.
    ///
    /// Nothing is left behind when any step fails: the stored archive and the
    /// extracted directory are removed and no record is created.
    #[tracing::instrument(skip(self, upload), fields(package.file_name = %upload.file_name, package.size = upload.data.len()))]
    pub async fn ingest(&self, upload: UploadedPackage) -> Result<Package, AppError> {
        let start = Instant::now();

        if upload.data.is_empty() {
            return Err(AppError::InvalidInput("No package file uploaded".to_string()));
        }

        let title = upload
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(upload.file_name.as_str())
            .to_string();
        if title.is_empty() {
            return Err(AppError::InvalidInput("Package title is required".to_string()));
        }

        let UploadedPackage {
            file_name,
            data,
            description,
            version,
            metadata,
            ..
        } = upload;

        let stored = self.storage.store(data, &file_name).await?;
        let content_path = self
            .config
            .content_dir
            .join(content_dir_name(&stored.file_name));

        let new_package = NewPackage {
            title,
            description: description.unwrap_or_default(),
            version: version.unwrap_or_default(),
            stored_file_name: stored.file_name.clone(),
            storage_path: stored.key.clone(),
            metadata,
        };

        match self
            .register(&stored, &content_path, new_package, version.is_some())
            .await
        {
            Ok(package) => {
                tracing::info!(
                    package_id = %package.id,
                    version = %package.version,
                    entry_point = package.entry_point().unwrap_or(""),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Package ingested"
                );
                Ok(package)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    storage_key = %stored.key,
                    "Package ingestion failed, removing stored archive"
                );
                self.discard_archive(&stored.key).await;
                remove_content_dir(&content_path).await;
                Err(e)
            }
        }
    }

    async fn register(
        &self,
        stored: &StoredFile,
        content_path: &Path,
        mut new_package: NewPackage,
        version_supplied: bool,
    ) -> Result<Package, AppError> {
        let report = extract_archive(
            stored.path.clone(),
            content_path.to_path_buf(),
            self.config.limits,
        )
        .await?;
        tracing::debug!(
            files = report.files,
            directories = report.directories,
            total_bytes = report.total_bytes,
            "Archive extracted"
        );

        let dir = content_path.to_path_buf();
        let manifest = tokio::task::spawn_blocking(move || read_manifest(&dir))
            .await
            .map_err(|e| AppError::Internal(format!("Manifest task failed: {}", e)))??;

        let resolved = resolve_manifest(&manifest);
        if resolved.entry_point.is_empty() {
            tracing::warn!(
                stored_file_name = %stored.file_name,
                "No launchable resource found in manifest"
            );
        }

        if !version_supplied {
            new_package.version = resolved.version;
        }
        new_package.metadata.insert(
            METADATA_ENTRY_POINT.to_string(),
            JsonValue::String(resolved.entry_point),
        );
        if let Some(title) = resolved.title {
            new_package
                .metadata
                .insert(METADATA_MANIFEST_TITLE.to_string(), JsonValue::String(title));
        }

        self.packages.insert(new_package).await
    }

    /// All packages, newest upload first.
    pub async fn list(&self) -> Result<Vec<Package>, AppError> {
        self.packages.find_all().await
    }

    pub async fn get(&self, id: Uuid) -> Result<Package, AppError> {
        self.packages
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::PackageNotFound(format!("Package {} not found", id)))
    }

    /// Delete a package together with its archive, extracted files and progress.
    ///
    /// Only a failure to delete the record itself is returned; cleanup failures are logged.
    #[tracing::instrument(skip(self), fields(package.id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let package = self
            .packages
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Package {} not found", id)))?;

        self.discard_archive(&package.storage_path).await;
        remove_content_dir(&self.content_path(&package)).await;
        self.restore_locks.lock().await.remove(&id);

        match self.progress.delete_many_by_package(id).await {
            Ok(removed) => tracing::debug!(removed, "Progress records removed"),
            Err(e) => tracing::warn!(error = %e, "Failed to remove progress records"),
        }

        if !self.packages.delete_one(id).await? {
            tracing::debug!("Package record already removed");
        }

        tracing::info!(package_id = %id, "Package deleted");
        Ok(())
    }

    /// Resolve how to launch a package from its extracted content.
    ///
    /// A missing content directory is rebuilt from the stored archive. An empty
    /// entry point means no launch resource could be determined.
    #[tracing::instrument(skip(self), fields(package.id = %id))]
    pub async fn launch(&self, id: Uuid) -> Result<LaunchInfo, AppError> {
        let package = self.get(id).await?;
        let content_path = self.content_path(&package);

        if !content_exists(&content_path).await {
            let lock = self.restore_lock(package.id).await;
            let _guard = lock.lock().await;
            // A concurrent launch may have rebuilt it while we waited.
            if !content_exists(&content_path).await {
                self.restore_content(&package, &content_path).await;
            }
        }

        let dir = content_path.clone();
        let resolved = tokio::task::spawn_blocking(move || resolve_package(&dir))
            .await
            .map_err(|e| AppError::Internal(format!("Manifest task failed: {}", e)))?;

        let entry_point = if resolved.entry_point.is_empty() {
            package.entry_point().unwrap_or_default().to_string()
        } else {
            resolved.entry_point
        };
        let launch_url = (!entry_point.is_empty()).then(|| {
            format!(
                "{}/{}/{}",
                self.config.content_base_url.trim_end_matches('/'),
                package.content_dir_name(),
                entry_point.trim_start_matches('/')
            )
        });

        Ok(LaunchInfo {
            package_id: package.id,
            version: package.version,
            entry_point,
            launch_url,
        })
    }

    async fn restore_lock(&self, id: Uuid) -> Arc<Mutex<()>> {
        self.restore_locks
            .lock()
            .await
            .entry(id)
            .or_default()
            .clone()
    }

    fn content_path(&self, package: &Package) -> PathBuf {
        self.config.content_dir.join(package.content_dir_name())
    }

    async fn restore_content(&self, package: &Package, content_path: &Path) {
        let archive = match self.storage.resolve_path(&package.storage_path) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot resolve stored archive");
                return;
            }
        };
        if !self
            .storage
            .exists(&package.storage_path)
            .await
            .unwrap_or(false)
        {
            tracing::warn!(
                storage_key = %package.storage_path,
                "Stored archive missing, package cannot be re-extracted"
            );
            return;
        }

        match extract_archive(
            archive,
            content_path.to_path_buf(),
            self.config.limits,
        )
        .await
        {
            Ok(report) => tracing::info!(files = report.files, "Package content re-extracted"),
            Err(e) => tracing::warn!(error = %e, "Re-extraction failed"),
        }
    }

    async fn discard_archive(&self, key: &str) {
        if let Err(e) = self.storage.delete(key).await {
            tracing::warn!(error = %e, storage_key = %key, "Failed to delete stored archive");
        }
    }
}

async fn content_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

async fn remove_content_dir(path: &Path) {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(error = %e, path = %path.display(), "Failed to remove content directory")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{
        build_zip, manifest_12, manifest_2004, TestContext,
    };
    use coursepack_core::models::ProgressUpdate;

    fn upload(file_name: &str, data: Vec<u8>) -> UploadedPackage {
        UploadedPackage {
            file_name: file_name.to_string(),
            data,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_ingest_scorm12_package() {
        let ctx = TestContext::new().await;
        let archive = build_zip(&[
            ("imsmanifest.xml", manifest_12("index.html").as_bytes()),
            ("index.html", b"<html></html>"),
            ("assets/app.js", b"console.log(1)"),
        ]);

        let package = ctx
            .packages
            .ingest(UploadedPackage {
                title: Some("Fire Safety".to_string()),
                ..upload("fire.zip", archive)
            })
            .await
            .unwrap();

        assert_eq!(package.title, "Fire Safety");
        assert_eq!(package.version, PackageVersion::Scorm12);
        assert_eq!(package.entry_point(), Some("index.html"));
        assert_eq!(package.manifest_title(), Some("Course"));
        assert!(package.storage_path.starts_with("packages/"));

        let content = ctx.content_dir().join(package.content_dir_name());
        assert!(content.join("assets/app.js").is_file());
    }

    #[tokio::test]
    async fn test_ingest_file_name_with_double_dots() {
        let ctx = TestContext::new().await;
        let archive = build_zip(&[
            ("imsmanifest.xml", manifest_12("index.html").as_bytes()),
            ("index.html", b"<html></html>"),
        ]);

        let package = ctx
            .packages
            .ingest(upload("Safety Course v1..2.zip", archive))
            .await
            .unwrap();

        assert_eq!(package.title, "Safety Course v1..2.zip");
        assert!(package.stored_file_name.ends_with("-Safety_Course_v1.2.zip"));
        assert_eq!(ctx.stored_archive_count(), 1);
        let content = ctx.content_dir().join(package.content_dir_name());
        assert!(content.join("index.html").is_file());
    }

    #[tokio::test]
    async fn test_ingest_detects_2004_and_title_falls_back_to_file_name() {
        let ctx = TestContext::new().await;
        let archive = build_zip(&[
            ("imsmanifest.xml", manifest_2004("start/launch.html").as_bytes()),
            ("start/launch.html", b"<html></html>"),
        ]);

        let package = ctx
            .packages
            .ingest(UploadedPackage {
                title: Some("   ".to_string()),
                ..upload("modern.zip", archive)
            })
            .await
            .unwrap();

        assert_eq!(package.title, "modern.zip");
        assert_eq!(package.version, PackageVersion::Scorm2004);
    }

    #[tokio::test]
    async fn test_explicit_version_overrides_detection() {
        let ctx = TestContext::new().await;
        let archive = build_zip(&[("imsmanifest.xml", manifest_2004("a.html").as_bytes())]);

        let package = ctx
            .packages
            .ingest(UploadedPackage {
                version: Some(PackageVersion::Scorm12),
                ..upload("c.zip", archive)
            })
            .await
            .unwrap();

        assert_eq!(package.version, PackageVersion::Scorm12);
    }

    #[tokio::test]
    async fn test_ingest_without_manifest_leaves_nothing_behind() {
        let ctx = TestContext::new().await;
        let archive = build_zip(&[("index.html", b"<html></html>")]);

        let err = ctx
            .packages
            .ingest(upload("plain.zip", archive))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ManifestMissing(_)));
        assert!(ctx.packages.list().await.unwrap().is_empty());
        assert_eq!(ctx.stored_archive_count(), 0);
        assert_eq!(ctx.content_entry_count(), 0);
    }

    #[tokio::test]
    async fn test_ingest_malformed_manifest() {
        let ctx = TestContext::new().await;
        let archive = build_zip(&[("imsmanifest.xml", b"<manifest><resources></manifest>")]);

        let err = ctx
            .packages
            .ingest(upload("broken.zip", archive))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ManifestMalformed(_)));
        assert!(ctx.packages.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ingest_corrupt_archive() {
        let ctx = TestContext::new().await;

        let err = ctx
            .packages
            .ingest(upload("junk.zip", b"definitely not a zip".to_vec()))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::CorruptArchive(_)));
        assert_eq!(ctx.stored_archive_count(), 0);
    }

    #[tokio::test]
    async fn test_ingest_rejects_empty_upload() {
        let ctx = TestContext::new().await;
        let err = ctx
            .packages
            .ingest(upload("empty.zip", Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_get_missing_package() {
        let ctx = TestContext::new().await;
        let err = ctx.packages.get(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::PackageNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let ctx = TestContext::new().await;
        let package = ctx.ingest_sample().await;
        ctx.progress
            .save(
                "learner",
                package.id,
                ProgressUpdate {
                    score: Some(50.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        ctx.packages.delete(package.id).await.unwrap();

        assert!(matches!(
            ctx.packages.get(package.id).await,
            Err(AppError::PackageNotFound(_))
        ));
        assert!(ctx.repositories.progress.find_one("learner", package.id).await.unwrap().is_none());
        assert_eq!(ctx.stored_archive_count(), 0);
        assert!(!ctx.content_dir().join(package.content_dir_name()).exists());
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing_files() {
        let ctx = TestContext::new().await;
        let package = ctx.ingest_sample().await;
        std::fs::remove_dir_all(ctx.content_dir().join(package.content_dir_name())).unwrap();
        ctx.storage.delete(&package.storage_path).await.unwrap();

        ctx.packages.delete(package.id).await.unwrap();
        assert!(ctx.packages.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_package() {
        let ctx = TestContext::new().await;
        let err = ctx.packages.delete(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_launch_builds_url() {
        let ctx = TestContext::new().await;
        let package = ctx.ingest_sample().await;

        let launch = ctx.packages.launch(package.id).await.unwrap();
        assert_eq!(launch.entry_point, "index.html");
        assert_eq!(
            launch.launch_url,
            Some(format!("/content/{}/index.html", package.content_dir_name()))
        );
    }

    #[tokio::test]
    async fn test_launch_re_extracts_missing_content() {
        let ctx = TestContext::new().await;
        let package = ctx.ingest_sample().await;
        let content = ctx.content_dir().join(package.content_dir_name());
        std::fs::remove_dir_all(&content).unwrap();

        let launch = ctx.packages.launch(package.id).await.unwrap();
        assert_eq!(launch.entry_point, "index.html");
        assert!(content.join("index.html").is_file());
    }

    #[tokio::test]
    async fn test_concurrent_launches_restore_content_once() {
        let ctx = TestContext::new().await;
        let package = ctx.ingest_sample().await;
        let content = ctx.content_dir().join(package.content_dir_name());
        std::fs::remove_dir_all(&content).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = ctx.packages.clone();
                tokio::spawn(async move { service.launch(package.id).await })
            })
            .collect();
        for handle in handles {
            let launch = handle.await.unwrap().unwrap();
            assert_eq!(launch.entry_point, "index.html");
            assert!(launch.launch_url.is_some());
        }

        assert!(content.join("index.html").is_file());
        assert!(content.join("imsmanifest.xml").is_file());
        // Only the package directory remains; no staging trees are left over
        assert_eq!(ctx.content_entry_count(), 1);
        assert_eq!(ctx.packages.restore_locks.lock().await.len(), 1);

        ctx.packages.delete(package.id).await.unwrap();
        assert!(ctx.packages.restore_locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_launch_without_entry_point() {
        let ctx = TestContext::new().await;
        let archive = build_zip(&[(
            "imsmanifest.xml",
            b"<manifest><resources><resource identifier=\"R\" href=\"x.pdf\"/></resources></manifest>",
        )]);
        let package = ctx.packages.ingest(upload("nolaunch.zip", archive)).await.unwrap();

        let launch = ctx.packages.launch(package.id).await.unwrap();
        assert_eq!(launch.entry_point, "");
        assert!(launch.launch_url.is_none());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let ctx = TestContext::new().await;
        let first = ctx.ingest_sample().await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = ctx.ingest_sample().await;

        let ids: Vec<Uuid> = ctx.packages.list().await.unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert_ne!(first.stored_file_name, second.stored_file_name);
    }
}
