//! Resource handler registry.
//!
//! One handler per resource kind, registered once at process start. The
//! registry is immutable afterward, so there are no runtime registration
//! races to guard.

mod handler;

pub use handler::{KindHandler, KindSpec, ResourceHandler, spec_of};

use crate::document::ResourceKind;

/// The immutable set of resource handlers for one process.
pub struct Registry {
    handlers: Vec<Box<dyn ResourceHandler>>,
}

impl Registry {
    /// Creates the registry with the built-in handler for every kind, in
    /// declaration order.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            handlers: ResourceKind::ALL
                .into_iter()
                .map(|kind| Box::new(KindHandler::new(spec_of(kind))) as Box<dyn ResourceHandler>)
                .collect(),
        }
    }

    /// Returns the handler for a kind.
    #[must_use]
    pub fn handler(&self, kind: ResourceKind) -> Option<&dyn ResourceHandler> {
        self.handlers
            .iter()
            .find(|h| h.kind() == kind)
            .map(AsRef::as_ref)
    }

    /// Iterates over all handlers in declaration order.
    pub fn handlers(&self) -> impl Iterator<Item = &dyn ResourceHandler> {
        self.handlers.iter().map(AsRef::as_ref)
    }

    /// Iterates over all kinds in declaration order.
    pub fn kinds(&self) -> impl Iterator<Item = ResourceKind> + '_ {
        self.handlers.iter().map(|h| h.kind())
    }

    /// Returns the number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("kinds", &self.kinds().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_covers_every_kind() {
        let registry = Registry::builtin();
        assert_eq!(registry.len(), ResourceKind::ALL.len());
        for kind in ResourceKind::ALL {
            assert!(registry.handler(kind).is_some());
        }
    }

    #[test]
    fn test_declaration_order_is_stable() {
        let registry = Registry::builtin();
        let kinds: Vec<_> = registry.kinds().collect();
        assert_eq!(kinds, ResourceKind::ALL.to_vec());
    }

    #[test]
    fn test_dependency_edges_reference_known_kinds() {
        let registry = Registry::builtin();
        for handler in registry.handlers() {
            for dep in handler.spec().depends_on {
                assert!(registry.handler(*dep).is_some());
            }
        }
    }
}
