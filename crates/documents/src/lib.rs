//! Document-management entities and the catalog service built on the
//! tenant guard.
//!
//! Every entity here implements [`docvault_core::ScopedEntity`]; none of them
//! carries its own repository code.

pub mod catalog;
pub mod category;
pub mod document;
pub mod folder;
pub mod schema;
pub mod tables;
pub mod tag;

pub use catalog::{DEFAULT_CATEGORIES, DocumentCatalog, Guard};
pub use category::Category;
pub use document::Document;
pub use folder::Folder;
pub use tables::{
    CATEGORY_TABLE, DOCUMENT_CATEGORIES, DOCUMENT_TABLE, DOCUMENT_TAGS, FOLDER_TABLE, TAG_TABLE,
};
pub use tag::Tag;
