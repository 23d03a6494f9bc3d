use serde::{Deserialize, Serialize};

use docvault_core::{DomainError, DomainResult, EntityId, Scope, ScopedEntity};

/// A named container for documents. Folder names are unique per tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    scope: Scope,
    pub name: String,
    /// Parent folder in the same tenant, if nested.
    pub parent_id: Option<EntityId>,
}

impl Folder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            scope: Scope::draft(),
            name: name.into(),
            parent_id: None,
        }
    }

    pub fn within(mut self, parent_id: EntityId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

impl ScopedEntity for Folder {
    const KIND: &'static str = "folder";

    fn scope(&self) -> &Scope {
        &self.scope
    }

    fn scope_mut(&mut self) -> &mut Scope {
        &mut self.scope
    }

    fn unique_key(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn sort_name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> DomainResult<()> {
        if self.parent_id == Some(self.id()) {
            return Err(DomainError::validation("folder cannot be its own parent"));
        }
        Ok(())
    }
}
