//! Per-kind handler definitions.
//!
//! Each resource kind declares its natural identity, whether it supports
//! delete, whether it is singleton or collection-valued, whether its
//! ordering is semantic, whether it is fully managed, and its dependency
//! edges to other kinds. The built-in handler is data-driven over these
//! declarations.

use serde_json::Value;

use crate::document::{
    DesiredDocument, Identity, Record, RemoteSnapshot, ResourceKind, normalized,
};
use crate::error::{Result, ValidationError};

/// Fields generated by the remote and ignored when comparing payloads.
const REMOTE_GENERATED: &[&str] = &["id", "created_at", "updated_at"];

/// Static declaration of one resource kind's behavior.
#[derive(Debug)]
pub struct KindSpec {
    /// The kind this spec describes.
    pub kind: ResourceKind,
    /// Top-level field holding the natural identity; `None` for singletons.
    pub identity_field: Option<&'static str>,
    /// True if exactly one logical record exists (update-or-noop diff).
    pub singleton: bool,
    /// True if the remote supports deleting records of this kind.
    pub supports_delete: bool,
    /// True if absence from the desired document implies delete-all.
    ///
    /// Defaults to false across the kind set: unmanaged remote extras are
    /// left untouched unless a kind opts in.
    pub fully_managed: bool,
    /// True if record ordering is semantic (explicit order field).
    pub positional: bool,
    /// Kinds that must exist before records of this kind can reference them.
    pub depends_on: &'static [ResourceKind],
    /// Remote-generated fields stripped before payload comparison.
    pub remote_only_fields: &'static [&'static str],
    /// Path segment on the management API.
    pub api_path: &'static str,
}

/// Specs for every kind, in registry declaration order.
static KIND_SPECS: [KindSpec; 9] = [
    KindSpec {
        kind: ResourceKind::TenantSettings,
        identity_field: None,
        singleton: true,
        supports_delete: false,
        fully_managed: false,
        positional: false,
        depends_on: &[],
        remote_only_fields: REMOTE_GENERATED,
        api_path: "tenant/settings",
    },
    KindSpec {
        kind: ResourceKind::Migrations,
        identity_field: None,
        singleton: true,
        supports_delete: false,
        fully_managed: false,
        positional: false,
        depends_on: &[],
        remote_only_fields: REMOTE_GENERATED,
        api_path: "migrations",
    },
    KindSpec {
        kind: ResourceKind::Clients,
        identity_field: Some("name"),
        singleton: false,
        supports_delete: true,
        fully_managed: false,
        positional: false,
        depends_on: &[],
        remote_only_fields: REMOTE_GENERATED,
        api_path: "clients",
    },
    KindSpec {
        kind: ResourceKind::ResourceServers,
        identity_field: Some("name"),
        singleton: false,
        supports_delete: true,
        fully_managed: false,
        positional: false,
        depends_on: &[],
        remote_only_fields: REMOTE_GENERATED,
        api_path: "resource-servers",
    },
    KindSpec {
        kind: ResourceKind::Connections,
        identity_field: Some("name"),
        singleton: false,
        supports_delete: true,
        fully_managed: false,
        positional: false,
        depends_on: &[ResourceKind::Clients],
        remote_only_fields: REMOTE_GENERATED,
        api_path: "connections",
    },
    KindSpec {
        kind: ResourceKind::ClientGrants,
        identity_field: Some("audience"),
        singleton: false,
        supports_delete: true,
        fully_managed: true,
        positional: false,
        depends_on: &[ResourceKind::Clients, ResourceKind::ResourceServers],
        remote_only_fields: REMOTE_GENERATED,
        api_path: "client-grants",
    },
    KindSpec {
        kind: ResourceKind::Rules,
        identity_field: Some("name"),
        singleton: false,
        supports_delete: true,
        fully_managed: true,
        positional: true,
        depends_on: &[ResourceKind::Connections],
        remote_only_fields: REMOTE_GENERATED,
        api_path: "rules",
    },
    KindSpec {
        kind: ResourceKind::Hooks,
        identity_field: Some("name"),
        singleton: false,
        supports_delete: true,
        fully_managed: false,
        positional: false,
        depends_on: &[],
        remote_only_fields: REMOTE_GENERATED,
        api_path: "hooks",
    },
    KindSpec {
        kind: ResourceKind::Pages,
        identity_field: Some("name"),
        singleton: false,
        supports_delete: false,
        fully_managed: false,
        positional: false,
        depends_on: &[],
        remote_only_fields: REMOTE_GENERATED,
        api_path: "pages",
    },
];

/// Returns the static spec for a kind.
#[must_use]
pub const fn spec_of(kind: ResourceKind) -> &'static KindSpec {
    match kind {
        ResourceKind::TenantSettings => &KIND_SPECS[0],
        ResourceKind::Migrations => &KIND_SPECS[1],
        ResourceKind::Clients => &KIND_SPECS[2],
        ResourceKind::ResourceServers => &KIND_SPECS[3],
        ResourceKind::Connections => &KIND_SPECS[4],
        ResourceKind::ClientGrants => &KIND_SPECS[5],
        ResourceKind::Rules => &KIND_SPECS[6],
        ResourceKind::Hooks => &KIND_SPECS[7],
        ResourceKind::Pages => &KIND_SPECS[8],
    }
}

/// Per-kind handler contract: slice extraction, identity, and payload
/// normalization for one resource kind.
pub trait ResourceHandler: Send + Sync {
    /// Returns the static declaration for this handler's kind.
    fn spec(&self) -> &KindSpec;

    /// Returns the kind this handler is responsible for.
    fn kind(&self) -> ResourceKind {
        self.spec().kind
    }

    /// Extracts this kind's desired records from the document.
    ///
    /// A missing kind yields an empty slice, not an error.
    fn extract_desired<'a>(&self, document: &'a DesiredDocument) -> &'a [Record];

    /// Extracts this kind's current records from the snapshot.
    fn extract_current<'a>(&self, snapshot: &'a RemoteSnapshot) -> &'a [Record];

    /// Computes the natural identity of a record.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidRecord`] if the identity field is
    /// missing or not a string.
    fn identity_of(&self, record: &Record) -> Result<Identity>;

    /// Produces the normalized payload used for change comparison,
    /// with remote-generated fields stripped.
    fn normalize(&self, record: &Record) -> Value;
}

/// The built-in, declaration-driven handler.
#[derive(Debug)]
pub struct KindHandler {
    spec: &'static KindSpec,
}

impl KindHandler {
    /// Creates a handler for the given kind spec.
    #[must_use]
    pub const fn new(spec: &'static KindSpec) -> Self {
        Self { spec }
    }
}

impl ResourceHandler for KindHandler {
    fn spec(&self) -> &KindSpec {
        self.spec
    }

    fn extract_desired<'a>(&self, document: &'a DesiredDocument) -> &'a [Record] {
        document.records(self.spec.kind)
    }

    fn extract_current<'a>(&self, snapshot: &'a RemoteSnapshot) -> &'a [Record] {
        snapshot.records(self.spec.kind)
    }

    fn identity_of(&self, record: &Record) -> Result<Identity> {
        let Some(field) = self.spec.identity_field else {
            return Ok(Identity::singleton(self.spec.kind));
        };

        record.field_str(field).map(Identity::new).ok_or_else(|| {
            ValidationError::invalid_record(
                self.spec.kind,
                "<unidentified>",
                format!("missing required identity field '{field}'"),
            )
            .into()
        })
    }

    fn normalize(&self, record: &Record) -> Value {
        normalized(record.as_value(), self.spec.remote_only_fields)
    }
}
