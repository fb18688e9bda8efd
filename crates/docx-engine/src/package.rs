//! Word package (ZIP container) loading and saving
//!
//! A `.docx` file is a ZIP archive of XML parts. The package is read fully
//! into memory, parts are replaced in place, and the archive is written
//! back with the original entry order.

use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::compiler::EngineError;

/// Main document part every word-processing package must contain
pub const MAIN_DOCUMENT_PART: &str = "word/document.xml";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

/// A single archive entry
#[derive(Debug, Clone)]
struct PackageEntry {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
    is_dir: bool,
}

/// An opened Word package
#[derive(Debug, Clone)]
pub struct TemplatePackage {
    entries: Vec<PackageEntry>,
}

impl TemplatePackage {
    /// Open package bytes, failing fast on anything that is not a Word package
    pub fn open(bytes: &[u8]) -> Result<Self, EngineError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| EngineError::InvalidArchive(e.to_string()))?;

        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut file = archive
                .by_index(index)
                .map_err(|e| EngineError::InvalidArchive(e.to_string()))?;
            let name = file.name().to_string();
            let compression = file.compression();
            let is_dir = file.is_dir();

            let mut data = Vec::new();
            file.read_to_end(&mut data).map_err(|e| {
                EngineError::InvalidArchive(format!("Failed to read '{}': {}", name, e))
            })?;

            entries.push(PackageEntry {
                name,
                data,
                compression,
                is_dir,
            });
        }

        let package = Self { entries };
        if !package.contains(MAIN_DOCUMENT_PART) {
            return Err(EngineError::InvalidArchive(format!(
                "Missing main document part '{}'",
                MAIN_DOCUMENT_PART
            )));
        }

        Ok(package)
    }

    /// Build a minimal package whose document body is `body_xml`
    ///
    /// `body_xml` is the content of `<w:body>`, typically a run of `<w:p>`
    /// elements.
    pub fn with_body(body_xml: &str) -> Self {
        let document = format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                "\n",
                r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
                "<w:body>{}</w:body></w:document>"
            ),
            body_xml
        );

        let mut package = Self {
            entries: Vec::new(),
        };
        package.insert_part("[Content_Types].xml", CONTENT_TYPES.as_bytes().to_vec());
        package.insert_part("_rels/.rels", PACKAGE_RELS.as_bytes().to_vec());
        package.insert_part(MAIN_DOCUMENT_PART, document.into_bytes());
        package
    }

    /// Check whether a part exists
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| !e.is_dir && e.name == name)
    }

    /// Names of all file parts, in archive order
    pub fn part_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| !e.is_dir)
            .map(|e| e.name.clone())
            .collect()
    }

    /// Names of the parts that may carry template tags, main document first
    pub fn templated_parts(&self) -> Vec<String> {
        let mut parts: Vec<String> = self
            .part_names()
            .into_iter()
            .filter(|name| is_templated_part(name))
            .collect();
        parts.sort_by_key(|name| name != MAIN_DOCUMENT_PART);
        parts
    }

    /// Raw bytes of a part
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| !e.is_dir && e.name == name)
            .map(|e| e.data.as_slice())
    }

    /// A part decoded as UTF-8 XML
    pub fn xml_part(&self, name: &str) -> Result<&str, EngineError> {
        let data = self.part(name).ok_or_else(|| {
            EngineError::InvalidArchive(format!("Missing part '{}'", name))
        })?;
        std::str::from_utf8(data).map_err(|e| {
            EngineError::InvalidArchive(format!("Part '{}' is not valid UTF-8: {}", name, e))
        })
    }

    /// Replace a part, or append it when absent
    pub fn insert_part(&mut self, name: &str, data: Vec<u8>) {
        match self.entries.iter_mut().find(|e| !e.is_dir && e.name == name) {
            Some(entry) => entry.data = data,
            None => self.entries.push(PackageEntry {
                name: name.to_string(),
                data,
                compression: CompressionMethod::Deflated,
                is_dir: false,
            }),
        }
    }

    /// Write the package back to ZIP bytes
    pub fn save(&self) -> Result<Vec<u8>, EngineError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for entry in &self.entries {
            if entry.is_dir {
                writer
                    .add_directory(entry.name.clone(), SimpleFileOptions::default())
                    .map_err(|e| EngineError::Serialize(e.to_string()))?;
                continue;
            }

            // Stored entries stay stored; everything else is re-deflated
            let method = match entry.compression {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let options = SimpleFileOptions::default().compression_method(method);

            writer
                .start_file(entry.name.clone(), options)
                .map_err(|e| EngineError::Serialize(e.to_string()))?;
            writer
                .write_all(&entry.data)
                .map_err(|e| EngineError::Serialize(e.to_string()))?;
        }

        let cursor = writer
            .finish()
            .map_err(|e| EngineError::Serialize(e.to_string()))?;
        Ok(cursor.into_inner())
    }
}

/// Parts rendered by the engine: main document, headers, footers, notes
fn is_templated_part(name: &str) -> bool {
    let Some(file) = name.strip_prefix("word/") else {
        return false;
    };
    if file.contains('/') || !file.ends_with(".xml") {
        return false;
    }
    file == "document.xml"
        || file == "footnotes.xml"
        || file == "endnotes.xml"
        || file.starts_with("header")
        || file.starts_with("footer")
}
