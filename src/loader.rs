//! Desired-state document loading and saving.
//!
//! Documents are YAML files with one top-level section per resource kind:
//! a sequence of mappings for collection kinds, a single mapping for
//! singleton kinds. `load` and `save` are inverses, section order included.

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::document::DesiredDocument;
use crate::error::{ConfigError, Result, SyncError};
use crate::registry::spec_of;

/// Loads a desired-state document from a YAML file.
///
/// # Errors
///
/// Returns [`ConfigError::DocumentNotFound`] if the file does not exist,
/// [`ConfigError::ParseError`] if it is not valid YAML or not a top-level
/// mapping, and a validation error if a section names an unknown kind or
/// contains a malformed record.
pub fn load(path: &Path) -> Result<DesiredDocument> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            SyncError::Config(ConfigError::DocumentNotFound {
                path: path.to_path_buf(),
            })
        } else {
            SyncError::Io(e)
        }
    })?;

    let sections: serde_yaml::Mapping =
        serde_yaml::from_str(&raw).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
            location: e
                .location()
                .map(|l| format!("line {}, column {}", l.line(), l.column())),
        })?;

    let mut pairs = Vec::with_capacity(sections.len());
    for (key, value) in sections {
        let name = key
            .as_str()
            .ok_or_else(|| ConfigError::ParseError {
                message: String::from("section names must be strings"),
                location: None,
            })?
            .to_string();
        let value: Value = serde_json::to_value(value)
            .map_err(|e| SyncError::internal(format!("YAML section not representable: {e}")))?;
        pairs.push((name, value));
    }

    let document = DesiredDocument::from_sections(pairs)?;
    debug!("Loaded document from {}", path.display());
    Ok(document)
}

/// Saves a desired-state document as YAML.
///
/// Singleton kinds are written as a single mapping, collection kinds as a
/// sequence, in the document's declaration order.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn save(document: &DesiredDocument, path: &Path) -> Result<()> {
    std::fs::write(path, render(document)?)?;
    debug!("Saved document to {}", path.display());
    Ok(())
}

/// Checks that a save target may be written.
///
/// # Errors
///
/// Returns [`ConfigError::OutputExists`] if the path already exists and
/// `force` is false.
pub fn ensure_writable(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(ConfigError::OutputExists {
            path: path.to_path_buf(),
        }
        .into());
    }
    Ok(())
}

/// Renders a document to its YAML text form.
///
/// # Errors
///
/// Returns an error if a record cannot be serialized.
pub fn render(document: &DesiredDocument) -> Result<String> {
    let mut sections = serde_yaml::Mapping::new();

    for kind in document.kinds() {
        let records = document.records(kind);
        let value = if spec_of(kind).singleton {
            match records.first() {
                Some(record) => to_yaml(record.as_value())?,
                None => continue,
            }
        } else {
            serde_yaml::Value::Sequence(
                records
                    .iter()
                    .map(|r| to_yaml(r.as_value()))
                    .collect::<Result<_>>()?,
            )
        };
        sections.insert(serde_yaml::Value::String(kind.to_string()), value);
    }

    serde_yaml::to_string(&sections)
        .map_err(|e| SyncError::internal(format!("Failed to render document: {e}")))
}

fn to_yaml(value: &Value) -> Result<serde_yaml::Value> {
    serde_yaml::to_value(value)
        .map_err(|e| SyncError::internal(format!("Failed to serialize record: {e}")))
}
