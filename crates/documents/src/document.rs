use serde::{Deserialize, Serialize};

use docvault_core::{DomainError, DomainResult, EntityId, MAX_KEY_LEN, Scope, ScopedEntity};

/// Metadata for one stored file. Titles are not unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    scope: Scope,
    pub title: String,
    pub folder_id: Option<EntityId>,
    pub mime_type: String,
    pub size_bytes: u64,
}

impl Document {
    pub fn new(title: impl Into<String>, mime_type: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            scope: Scope::draft(),
            title: title.into(),
            folder_id: None,
            mime_type: mime_type.into(),
            size_bytes,
        }
    }

    pub fn in_folder(mut self, folder_id: EntityId) -> Self {
        self.folder_id = Some(folder_id);
        self
    }
}

impl ScopedEntity for Document {
    const KIND: &'static str = "document";

    fn scope(&self) -> &Scope {
        &self.scope
    }

    fn scope_mut(&mut self) -> &mut Scope {
        &mut self.scope
    }

    fn sort_name(&self) -> &str {
        &self.title
    }

    fn validate(&self) -> DomainResult<()> {
        if self.title.trim().is_empty() {
            return Err(DomainError::validation("document title cannot be empty"));
        }
        if self.title.chars().count() > MAX_KEY_LEN {
            return Err(DomainError::validation(format!(
                "document title exceeds {MAX_KEY_LEN} characters"
            )));
        }
        if !self.mime_type.contains('/') {
            return Err(DomainError::validation(format!(
                "invalid mime type '{}'",
                self.mime_type
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_have_no_unique_key() {
        let doc = Document::new("Q3 report", "application/pdf", 1024);
        assert_eq!(doc.unique_key(), None);
        assert_eq!(doc.sort_name(), "Q3 report");
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn blank_title_or_bad_mime_is_rejected() {
        assert!(Document::new(" ", "application/pdf", 0).validate().is_err());
        assert!(Document::new("scan", "pdf", 0).validate().is_err());
    }
}
