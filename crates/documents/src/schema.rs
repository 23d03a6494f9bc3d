//! Postgres DDL for the document tables.
//!
//! Statements are idempotent; apply them with
//! [`docvault_infra::PostgresDatabase::apply_schema`] on startup.

/// Every entity table shares the generic scoped-row layout.
macro_rules! scoped_table {
    ($name:literal) => {
        concat!(
            "CREATE TABLE IF NOT EXISTS ",
            $name,
            " (
                id          UUID PRIMARY KEY,
                tenant_id   UUID NOT NULL,
                unique_key  VARCHAR(255) NULL,
                is_system   BOOLEAN NOT NULL DEFAULT FALSE,
                sort_order  INTEGER NULL,
                sort_name   TEXT NOT NULL,
                created_at  TIMESTAMPTZ NOT NULL,
                updated_at  TIMESTAMPTZ NOT NULL,
                body        JSONB NOT NULL,
                UNIQUE (tenant_id, unique_key)
            )"
        )
    };
}

pub const SCHEMA: &[&str] = &[
    scoped_table!("categories"),
    scoped_table!("tags"),
    scoped_table!("folders"),
    scoped_table!("documents"),
    r#"
    CREATE TABLE IF NOT EXISTS document_categories (
        tenant_id    UUID NOT NULL,
        document_id  UUID NOT NULL REFERENCES documents (id),
        category_id  UUID NOT NULL REFERENCES categories (id),
        PRIMARY KEY (document_id, category_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS document_tags (
        tenant_id    UUID NOT NULL,
        document_id  UUID NOT NULL REFERENCES documents (id),
        tag_id       UUID NOT NULL REFERENCES tags (id),
        PRIMARY KEY (document_id, tag_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS document_categories_category_idx ON document_categories (tenant_id, category_id)",
    "CREATE INDEX IF NOT EXISTS document_tags_tag_idx ON document_tags (tenant_id, tag_id)",
];
