use serde::{Deserialize, Serialize};

use docvault_core::ScopedEntity;
use docvault_documents::Category;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub description: Option<String>,
    pub sort_order: Option<i32>,
}

impl CreateCategoryRequest {
    pub fn into_category(self) -> Category {
        let mut category = Category::new(self.name);
        category.description = self.description;
        category.sort_order = self.sort_order;
        category
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub order: docvault_core::ListOrder,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub sort_order: Option<i32>,
    pub is_system: bool,
    pub document_count: Option<u64>,
    pub created_at: String,
    pub updated_at: String,
}

impl CategoryResponse {
    pub fn from_category(category: &Category, document_count: Option<u64>) -> Self {
        Self {
            id: category.id().to_string(),
            name: category.name.clone(),
            description: category.description.clone(),
            sort_order: category.sort_order,
            is_system: category.is_system(),
            document_count,
            created_at: category.scope().created_at.to_rfc3339(),
            updated_at: category.scope().updated_at.to_rfc3339(),
        }
    }
}
