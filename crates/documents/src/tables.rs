//! Relational layout of the document entities.

use docvault_infra::{AssociationTable, Endpoint, TableSpec};

const DOCUMENT: Endpoint = Endpoint {
    kind: "document",
    table: "documents",
    column: "document_id",
};

pub const DOCUMENT_CATEGORIES: AssociationTable = AssociationTable {
    name: "document_categories",
    left: DOCUMENT,
    right: Endpoint {
        kind: "category",
        table: "categories",
        column: "category_id",
    },
};

pub const DOCUMENT_TAGS: AssociationTable = AssociationTable {
    name: "document_tags",
    left: DOCUMENT,
    right: Endpoint {
        kind: "tag",
        table: "tags",
        column: "tag_id",
    },
};

pub const CATEGORY_TABLE: TableSpec = TableSpec {
    table: "categories",
    associations: &[DOCUMENT_CATEGORIES],
};

pub const TAG_TABLE: TableSpec = TableSpec {
    table: "tags",
    associations: &[DOCUMENT_TAGS],
};

pub const FOLDER_TABLE: TableSpec = TableSpec {
    table: "folders",
    associations: &[],
};

pub const DOCUMENT_TABLE: TableSpec = TableSpec {
    table: "documents",
    associations: &[DOCUMENT_CATEGORIES, DOCUMENT_TAGS],
};

#[cfg(test)]
mod tests {
    use docvault_core::ScopedEntity;

    use super::*;
    use crate::{Category, Document, Tag};

    #[test]
    fn endpoint_kinds_match_entity_kinds() {
        assert_eq!(DOCUMENT_CATEGORIES.left.kind, Document::KIND);
        assert_eq!(DOCUMENT_CATEGORIES.right.kind, Category::KIND);
        assert_eq!(DOCUMENT_TAGS.right.kind, Tag::KIND);
        assert_eq!(DOCUMENT_CATEGORIES.right.table, CATEGORY_TABLE.table);
        assert_eq!(DOCUMENT_TAGS.right.table, TAG_TABLE.table);
        assert_eq!(DOCUMENT.table, DOCUMENT_TABLE.table);
        assert!(FOLDER_TABLE.associations.is_empty());
    }

    #[test]
    fn every_join_table_touching_an_entity_is_listed() {
        for spec in [CATEGORY_TABLE, TAG_TABLE, DOCUMENT_TABLE] {
            for table in spec.associations {
                assert!(
                    table.left.table == spec.table || table.right.table == spec.table,
                    "{} does not reference {}",
                    table.name,
                    spec.table
                );
            }
        }
    }
}
