use serde::{Deserialize, Serialize};

use docvault_core::{DomainError, DomainResult, Scope, ScopedEntity};

/// Maximum length of a category description.
pub const MAX_DESCRIPTION_LEN: usize = 1000;

/// A tenant-defined bucket for documents (e.g. "Invoices").
///
/// Names are unique per tenant. System categories are seeded for every new
/// tenant and cannot be deleted or renamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    scope: Scope,
    pub name: String,
    pub description: Option<String>,
    pub sort_order: Option<i32>,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            scope: Scope::draft(),
            name: name.into(),
            description: None,
            sort_order: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = Some(sort_order);
        self
    }
}

impl ScopedEntity for Category {
    const KIND: &'static str = "category";

    fn scope(&self) -> &Scope {
        &self.scope
    }

    fn scope_mut(&mut self) -> &mut Scope {
        &mut self.scope
    }

    fn unique_key(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn sort_order(&self) -> Option<i32> {
        self.sort_order
    }

    fn sort_name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> DomainResult<()> {
        if let Some(description) = &self.description {
            if description.chars().count() > MAX_DESCRIPTION_LEN {
                return Err(DomainError::validation(format!(
                    "category description exceeds {MAX_DESCRIPTION_LEN} characters"
                )));
            }
        }
        Ok(())
    }
}
