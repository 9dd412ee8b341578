//! Core data model: resource kinds, records, and state documents.
//!
//! These types are the engine's view of both sides of a synchronization run:
//! the desired state authored by the operator and the current state fetched
//! from the remote management API. Record payloads are opaque to the engine;
//! only identity and reference fields are inspected generically.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::{Result, ValidationError};

/// A category of configuration resource managed by the engine.
///
/// The set of kinds is closed; handlers for each are registered once at
/// process start.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// Tenant-wide settings (singleton).
    TenantSettings,
    /// Migration toggles (singleton).
    Migrations,
    /// Application clients.
    Clients,
    /// Resource servers (APIs).
    ResourceServers,
    /// Identity connections.
    Connections,
    /// Grants from clients to resource servers.
    ClientGrants,
    /// Ordered rule chain.
    Rules,
    /// Extensibility hooks.
    Hooks,
    /// Hosted page customizations.
    Pages,
}

impl ResourceKind {
    /// All kinds in registry declaration order.
    pub const ALL: [Self; 9] = [
        Self::TenantSettings,
        Self::Migrations,
        Self::Clients,
        Self::ResourceServers,
        Self::Connections,
        Self::ClientGrants,
        Self::Rules,
        Self::Hooks,
        Self::Pages,
    ];

    /// Returns the kebab-case tag used in documents and API paths.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TenantSettings => "tenant-settings",
            Self::Migrations => "migrations",
            Self::Clients => "clients",
            Self::ResourceServers => "resource-servers",
            Self::Connections => "connections",
            Self::ClientGrants => "client-grants",
            Self::Rules => "rules",
            Self::Hooks => "hooks",
            Self::Pages => "pages",
        }
    }
}

impl FromStr for ResourceKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownKind {
                kind: s.to_string(),
            })
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The stable key used to match a desired record to a current record of the
/// same kind.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Creates an identity from a string key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the identity for a singleton kind, which has exactly one
    /// logical record and no identity field of its own.
    #[must_use]
    pub fn singleton(kind: ResourceKind) -> Self {
        Self(kind.as_str().to_string())
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single resource record, opaque to the engine apart from its identity
/// and reference fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(pub Value);

impl Record {
    /// Wraps a JSON value as a record.
    #[must_use]
    pub const fn new(value: Value) -> Self {
        Self(value)
    }

    /// Returns the underlying payload.
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.0
    }

    /// Reads a top-level string field, if present.
    #[must_use]
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// Returns a copy of this record with one top-level field set.
    ///
    /// Non-object payloads are returned unchanged.
    #[must_use]
    pub fn with_field(&self, name: &str, value: Value) -> Self {
        let mut payload = self.0.clone();
        if let Some(map) = payload.as_object_mut() {
            map.insert(name.to_string(), value);
        }
        Self(payload)
    }
}

/// The desired-state document: an ordered sequence of records per kind.
///
/// Built once per run and immutable thereafter. Sections keep the order
/// they were declared in, which breaks scheduling ties between unrelated
/// kinds. A missing kind means "no desired records for that kind", which
/// for unmanaged kinds leaves the remote untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesiredDocument {
    sections: Vec<(ResourceKind, Vec<Record>)>,
}

impl Serialize for DesiredDocument {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.sections.len()))?;
        for (kind, records) in &self.sections {
            map.serialize_entry(kind, records)?;
        }
        map.end()
    }
}

impl DesiredDocument {
    /// Creates an empty document.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sections: Vec::new(),
        }
    }

    /// Builds a document from raw named sections, rejecting unknown kind
    /// tags and malformed sections.
    ///
    /// A section may be a sequence of objects (collection kinds) or a single
    /// object (singleton kinds). A null section is treated as an empty
    /// sequence.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownKind`] for an unrecognized section
    /// name and [`ValidationError::InvalidRecord`] for a section element
    /// that is not an object.
    pub fn from_sections(sections: impl IntoIterator<Item = (String, Value)>) -> Result<Self> {
        let mut document = Self::new();

        for (name, value) in sections {
            let kind: ResourceKind = name.parse()?;

            let records = match value {
                Value::Array(items) => {
                    let mut records = Vec::with_capacity(items.len());
                    for (index, item) in items.into_iter().enumerate() {
                        if !item.is_object() {
                            return Err(ValidationError::invalid_record(
                                kind,
                                format!("#{index}"),
                                "record must be a mapping",
                            )
                            .into());
                        }
                        records.push(Record::new(item));
                    }
                    records
                }
                Value::Object(_) => vec![Record::new(value)],
                Value::Null => vec![],
                _ => {
                    return Err(ValidationError::invalid_record(
                        kind,
                        "<section>",
                        "section must be a sequence or a mapping",
                    )
                    .into());
                }
            };

            document.insert(kind, records);
        }

        Ok(document)
    }

    /// Sets the records for a kind, appending the section if it is new.
    pub fn insert(&mut self, kind: ResourceKind, records: Vec<Record>) {
        if let Some(section) = self.sections.iter_mut().find(|(k, _)| *k == kind) {
            section.1 = records;
        } else {
            self.sections.push((kind, records));
        }
    }

    /// Returns the desired records for a kind, or an empty slice if the
    /// kind is absent from the document.
    #[must_use]
    pub fn records(&self, kind: ResourceKind) -> &[Record] {
        self.sections
            .iter()
            .find(|(k, _)| *k == kind)
            .map_or(&[], |(_, records)| records.as_slice())
    }

    /// Returns true if the document declares the given kind at all.
    #[must_use]
    pub fn contains(&self, kind: ResourceKind) -> bool {
        self.sections.iter().any(|(k, _)| *k == kind)
    }

    /// Iterates over the kinds in the order they were declared.
    pub fn kinds(&self) -> impl Iterator<Item = ResourceKind> + '_ {
        self.sections.iter().map(|(kind, _)| *kind)
    }

    /// Returns true if no kind is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// A point-in-time read of the remote system's current state, per kind.
///
/// Treated as a consistent read for the duration of one run and never
/// mutated; all remote effects are observed indirectly via the run result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteSnapshot {
    kinds: BTreeMap<ResourceKind, Vec<Record>>,
}

impl RemoteSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            kinds: BTreeMap::new(),
        }
    }

    /// Sets the fetched records for a kind.
    pub fn insert(&mut self, kind: ResourceKind, records: Vec<Record>) {
        self.kinds.insert(kind, records);
    }

    /// Returns the current records for a kind, or an empty slice if the
    /// kind was not fetched.
    #[must_use]
    pub fn records(&self, kind: ResourceKind) -> &[Record] {
        self.kinds.get(&kind).map_or(&[], Vec::as_slice)
    }

    /// Returns the total number of records across all kinds.
    #[must_use]
    pub fn total_records(&self) -> usize {
        self.kinds.values().map(Vec::len).sum()
    }
}

/// Produces a normalized copy of a payload for order-insensitive comparison.
///
/// Top-level fields named in `ignore` are dropped (remote-generated fields
/// like server-side ids and timestamps), object key order is canonical, and
/// arrays are sorted by their serialized form so that collection ordering
/// does not register as a change. Kinds where ordering is semantic carry an
/// explicit order field instead.
#[must_use]
pub fn normalized(payload: &Value, ignore: &[&str]) -> Value {
    fn walk(value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), walk(v)))
                    .collect(),
            ),
            Value::Array(items) => {
                let mut normalized: Vec<Value> = items.iter().map(walk).collect();
                normalized.sort_by_key(|v| v.to_string());
                Value::Array(normalized)
            }
            other => other.clone(),
        }
    }

    match payload {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| !ignore.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), walk(v)))
                .collect(),
        ),
        other => walk(other),
    }
}

/// Computes a deterministic hex fingerprint of a payload.
#[must_use]
pub fn fingerprint(payload: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Computes a short fingerprint (first 8 characters) for display purposes.
#[must_use]
pub fn short_fingerprint(payload: &Value) -> String {
    fingerprint(payload).chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_round_trip() {
        for kind in ResourceKind::ALL {
            let parsed: ResourceKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let result = DesiredDocument::from_sections([(
            String::from("gadgets"),
            json!([{ "name": "g1" }]),
        )]);
        assert!(matches!(
            result,
            Err(crate::error::SyncError::Validation(
                ValidationError::UnknownKind { .. }
            ))
        ));
    }

    #[test]
    fn test_missing_kind_is_empty_sequence() {
        let document = DesiredDocument::new();
        assert!(document.records(ResourceKind::Rules).is_empty());
        assert!(!document.contains(ResourceKind::Rules));
    }

    #[test]
    fn test_section_declaration_order_preserved() {
        let document = DesiredDocument::from_sections([
            (String::from("rules"), json!([{ "name": "r1" }])),
            (String::from("clients"), json!([{ "name": "web" }])),
        ])
        .unwrap();

        let kinds: Vec<_> = document.kinds().collect();
        assert_eq!(kinds, vec![ResourceKind::Rules, ResourceKind::Clients]);
    }

    #[test]
    fn test_singleton_section_becomes_one_record() {
        let document = DesiredDocument::from_sections([(
            String::from("tenant-settings"),
            json!({ "friendly_name": "Acme" }),
        )])
        .unwrap();
        assert_eq!(document.records(ResourceKind::TenantSettings).len(), 1);
    }

    #[test]
    fn test_non_object_record_rejected() {
        let result = DesiredDocument::from_sections([(
            String::from("rules"),
            json!(["not-a-mapping"]),
        )]);
        assert!(matches!(
            result,
            Err(crate::error::SyncError::Validation(
                ValidationError::InvalidRecord { .. }
            ))
        ));
    }

    #[test]
    fn test_normalized_ignores_generated_fields() {
        let a = json!({ "name": "r1", "id": "abc", "updated_at": "now" });
        let b = json!({ "name": "r1" });
        assert_eq!(
            normalized(&a, &["id", "updated_at"]),
            normalized(&b, &["id", "updated_at"])
        );
    }

    #[test]
    fn test_normalized_is_array_order_insensitive() {
        let a = json!({ "enabled_clients": ["web", "cli"] });
        let b = json!({ "enabled_clients": ["cli", "web"] });
        assert_eq!(normalized(&a, &[]), normalized(&b, &[]));
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let payload = json!({ "name": "r1", "order": 1 });
        assert_eq!(fingerprint(&payload), fingerprint(&payload));
        assert_eq!(short_fingerprint(&payload).len(), 8);
    }
}
