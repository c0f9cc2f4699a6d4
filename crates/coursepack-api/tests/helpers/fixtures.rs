//! Course package fixtures built in memory.

use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::ZipWriter;

pub fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        for (name, data) in entries {
            zip.start_file(*name, FileOptions::default())
                .expect("start zip entry");
            zip.write_all(data).expect("write zip entry");
        }
        zip.finish().expect("finish zip");
    }
    buffer
}

pub const SCORM12_MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest identifier="com.example.safety" version="1.0"
    xmlns="http://www.imsproject.org/xsd/imscp_rootv1p1p2"
    xmlns:adlcp="http://www.adlnet.org/xsd/adlcp_rootv1p2">
  <organizations default="ORG">
    <organization identifier="ORG">
      <title>Workplace Safety</title>
      <item identifier="ITEM1" identifierref="R1"><title>Introduction</title></item>
    </organization>
  </organizations>
  <resources>
    <resource identifier="R1" type="webcontent" adlcp:scormtype="sco" href="index.html">
      <file href="index.html"/>
    </resource>
    <resource identifier="R2" type="webcontent" adlcp:scormtype="sco" href="other.html"/>
  </resources>
</manifest>"#;

pub const SCORM2004_MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest identifier="com.example.modern"
    xmlns="http://www.imsglobal.org/xsd/imscp_v1p1"
    xmlns:adlcp="http://www.adlnet.org/xsd/adlcp_v1p3"
    xmlns:adlseq="http://www.adlnet.org/xsd/adlseq_v1p3"
    xmlns:adlnav="http://www.adlnet.org/xsd/adlnav_v1p3">
  <metadata>
    <schema>ADL SCORM</schema>
    <schemaversion>2004 4th Edition</schemaversion>
  </metadata>
  <organizations default="ORG">
    <organization identifier="ORG"><title>Modern Course</title></organization>
  </organizations>
  <resources>
    <resource identifier="SCO" type="webcontent" adlcp:scormType="sco" href="content/start.html"/>
  </resources>
</manifest>"#;

pub fn scorm12_package() -> Vec<u8> {
    zip_archive(&[
        ("imsmanifest.xml", SCORM12_MANIFEST.as_bytes()),
        ("index.html", b"<html><body>Intro</body></html>"),
        ("other.html", b"<html></html>"),
    ])
}

pub fn scorm2004_package() -> Vec<u8> {
    zip_archive(&[
        ("imsmanifest.xml", SCORM2004_MANIFEST.as_bytes()),
        ("content/start.html", b"<html></html>"),
    ])
}
