use super::package::{PackageService, PackageServiceConfig, UploadedPackage};
use super::progress::ProgressService;
use coursepack_core::models::Package;
use coursepack_db::Repositories;
use coursepack_processing::ExtractLimits;
use coursepack_storage::{LocalStorage, Storage};
use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use zip::write::FileOptions;
use zip::ZipWriter;

pub fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        for (name, data) in entries {
            zip.start_file(*name, FileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }
    buffer
}

pub fn manifest_12(entry: &str) -> String {
    format!(
        r#"<?xml version="1.0"?>
<manifest identifier="course" xmlns="http://www.imsproject.org/xsd/imscp_rootv1p1p2"
          xmlns:adlcp="http://www.adlnet.org/xsd/adlcp_rootv1p2">
  <organizations default="ORG">
    <organization identifier="ORG">
      <title>Course</title>
      <item identifier="ITEM" identifierref="RES"><title>Lesson</title></item>
    </organization>
  </organizations>
  <resources>
    <resource identifier="RES" type="webcontent" adlcp:scormtype="sco" href="{}"/>
  </resources>
</manifest>"#,
        entry
    )
}

pub fn manifest_2004(entry: &str) -> String {
    format!(
        r#"<?xml version="1.0"?>
<manifest identifier="course" xmlns="http://www.imsglobal.org/xsd/imscp_v1p1"
          xmlns:adlcp="http://www.adlnet.org/xsd/adlcp_v1p3"
          xmlns:adlnav="http://www.adlnet.org/xsd/adlnav_v1p3">
  <metadata><schema>ADL SCORM</schema><schemaversion>2004 4th Edition</schemaversion></metadata>
  <organizations>
    <organization identifier="ORG"><title>Modern</title></organization>
  </organizations>
  <resources>
    <resource identifier="RES" type="webcontent" adlcp:scormType="sco" href="{}"/>
  </resources>
</manifest>"#,
        entry
    )
}

pub struct TestContext {
    _dir: TempDir,
    root: PathBuf,
    pub repositories: Repositories,
    pub storage: Arc<dyn Storage>,
    pub packages: PackageService,
    pub progress: ProgressService,
}

impl TestContext {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let storage: Arc<dyn Storage> =
            Arc::new(LocalStorage::new(root.join("uploads")).await.unwrap());
        let repositories = Repositories::in_memory();
        let packages = PackageService::new(
            &repositories,
            storage.clone(),
            PackageServiceConfig {
                content_dir: root.join("content"),
                content_base_url: "/content".to_string(),
                limits: ExtractLimits::default(),
            },
        );
        let progress = ProgressService::new(&repositories);

        Self {
            _dir: dir,
            root,
            repositories,
            storage,
            packages,
            progress,
        }
    }

    pub fn content_dir(&self) -> PathBuf {
        self.root.join("content")
    }

    pub async fn ingest_sample(&self) -> Package {
        let archive = build_zip(&[
            ("imsmanifest.xml", manifest_12("index.html").as_bytes()),
            ("index.html", b"<html></html>"),
        ]);
        self.packages
            .ingest(UploadedPackage {
                file_name: "sample.zip".to_string(),
                data: archive,
                title: Some("Sample".to_string()),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    pub fn stored_archive_count(&self) -> usize {
        count_entries(self.root.join("uploads").join("packages"))
    }

    pub fn content_entry_count(&self) -> usize {
        count_entries(self.content_dir())
    }
}

fn count_entries(dir: PathBuf) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
