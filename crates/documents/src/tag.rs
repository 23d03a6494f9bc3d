use serde::{Deserialize, Serialize};

use docvault_core::{DomainError, DomainResult, Scope, ScopedEntity};

/// A free-form label attached to documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    scope: Scope,
    pub name: String,
    /// `#rrggbb`
    pub colour: Option<String>,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            scope: Scope::draft(),
            name: name.into(),
            colour: None,
        }
    }

    pub fn with_colour(mut self, colour: impl Into<String>) -> Self {
        self.colour = Some(colour.into());
        self
    }
}

impl ScopedEntity for Tag {
    const KIND: &'static str = "tag";

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
        match &self.colour {
            Some(colour) if !is_hex_colour(colour) => Err(DomainError::validation(format!(
                "tag colour must look like #rrggbb, got '{colour}'"
            ))),
            _ => Ok(()),
        }
    }
}

fn is_hex_colour(value: &str) -> bool {
    value
        .strip_prefix('#')
        .is_some_and(|hex| hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colour_must_be_hex() {
        assert!(Tag::new("urgent").with_colour("#ff0000").validate().is_ok());
        assert!(Tag::new("urgent").with_colour("#FFAA00").validate().is_ok());
        assert!(Tag::new("urgent").with_colour("red").validate().is_err());
        assert!(Tag::new("urgent").with_colour("#ff00").validate().is_err());
        assert!(Tag::new("urgent").validate().is_ok());
    }
}
