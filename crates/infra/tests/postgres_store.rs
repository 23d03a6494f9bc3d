//! Postgres store behaviour against a live database.
//!
//! Runs only when `DATABASE_URL` points at a Postgres instance; otherwise
//! every test returns early. Each test works under fresh tenant ids, so runs
//! can share one database.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use docvault_core::{EntityId, ListOrder, Scope, ScopedEntity, TenantId};
use docvault_infra::{
    AssociationStore, AssociationTable, Endpoint, GuardError, LinkOutcome, PostgresDatabase,
    PostgresScopedStore, TableSpec, TenantGuard,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Label {
    scope: Scope,
    name: String,
    sort_order: Option<i32>,
}

impl ScopedEntity for Label {
    const KIND: &'static str = "label";

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
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Item {
    scope: Scope,
    title: String,
}

impl ScopedEntity for Item {
    const KIND: &'static str = "item";

    fn scope(&self) -> &Scope {
        &self.scope
    }

    fn scope_mut(&mut self) -> &mut Scope {
        &mut self.scope
    }

    fn sort_name(&self) -> &str {
        &self.title
    }
}

const ITEM_LABELS: AssociationTable = AssociationTable {
    name: "it_item_labels",
    left: Endpoint { kind: "item", table: "it_items", column: "item_id" },
    right: Endpoint { kind: "label", table: "it_labels", column: "label_id" },
};

const LABEL_TABLE: TableSpec = TableSpec {
    table: "it_labels",
    associations: &[ITEM_LABELS],
};

const ITEM_TABLE: TableSpec = TableSpec {
    table: "it_items",
    associations: &[ITEM_LABELS],
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS it_labels (
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
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS it_items (
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
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS it_item_labels (
        tenant_id  UUID NOT NULL,
        item_id    UUID NOT NULL REFERENCES it_items (id),
        label_id   UUID NOT NULL REFERENCES it_labels (id),
        PRIMARY KEY (item_id, label_id)
    )
    "#,
];

static SCHEMA_APPLIED: OnceCell<()> = OnceCell::const_new();

async fn database() -> Option<PostgresDatabase> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping Postgres store test");
        return None;
    };
    let db = PostgresDatabase::connect(&url).await.expect("failed to connect to DATABASE_URL");
    SCHEMA_APPLIED
        .get_or_init(|| async {
            db.apply_schema(SCHEMA).await.expect("failed to apply test schema");
        })
        .await;
    Some(db)
}

type LabelGuard = TenantGuard<Label, PostgresScopedStore<Label>>;
type ItemGuard = TenantGuard<Item, PostgresScopedStore<Item>>;

fn guards(db: &PostgresDatabase) -> (LabelGuard, ItemGuard) {
    (
        TenantGuard::new(db.store::<Label>(LABEL_TABLE)),
        TenantGuard::new(db.store::<Item>(ITEM_TABLE)),
    )
}

fn label(name: &str) -> Label {
    Label {
        scope: Scope::draft(),
        name: name.to_string(),
        sort_order: None,
    }
}

fn item(title: &str) -> Item {
    Item {
        scope: Scope::draft(),
        title: title.to_string(),
    }
}

#[tokio::test]
async fn duplicate_key_maps_to_already_exists() {
    let Some(db) = database().await else { return };
    let (labels, _) = guards(&db);
    let (t1, t2) = (TenantId::new(), TenantId::new());

    labels.create(t1, label("Invoices")).await.unwrap();
    let err = labels.create(t1, label("Invoices")).await.unwrap_err();
    assert_eq!(
        err,
        GuardError::AlreadyExists { entity: "label", key: "Invoices".to_string() }
    );

    // Same name under another tenant is a different row.
    let other = labels.create(t2, label("Invoices")).await.unwrap();
    assert_eq!(labels.get_by_key(t2, "Invoices").await.unwrap().id(), other.id());

    // Renaming onto a taken key conflicts too.
    let receipts = labels.create(t1, label("Receipts")).await.unwrap();
    let mut renamed = receipts.clone();
    renamed.name = "Invoices".to_string();
    assert!(matches!(
        labels.update(t1, renamed).await,
        Err(GuardError::AlreadyExists { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_of_one_key_yield_one_row() {
    let Some(db) = database().await else { return };
    let (labels, _) = guards(&db);
    let labels = Arc::new(labels);
    let tenant = TenantId::new();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let labels = labels.clone();
            tokio::spawn(async move { labels.create(tenant, label("Contracts")).await })
        })
        .collect();

    let mut created = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => created += 1,
            Err(GuardError::AlreadyExists { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(labels.list(tenant, ListOrder::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn foreign_rows_read_as_not_found() {
    let Some(db) = database().await else { return };
    let (labels, _) = guards(&db);
    let (owner, intruder) = (TenantId::new(), TenantId::new());
    let row = labels.create(owner, label("Payroll")).await.unwrap();
    let not_found = GuardError::NotFound { entity: "label" };

    assert_eq!(labels.get_by_id(intruder, row.id()).await.unwrap_err(), not_found);
    assert_eq!(labels.get_by_key(intruder, "Payroll").await.unwrap_err(), not_found);
    assert_eq!(labels.update(intruder, row.clone()).await.unwrap_err(), not_found);
    assert_eq!(labels.delete(intruder, row.id()).await.unwrap_err(), not_found);
    assert_eq!(labels.get_by_id(intruder, EntityId::new()).await.unwrap_err(), not_found);
    assert!(labels.list(intruder, ListOrder::default()).await.unwrap().is_empty());

    assert_eq!(labels.get_by_id(owner, row.id()).await.unwrap(), row);
}

#[tokio::test]
async fn delete_cascades_join_rows_and_reports_count() {
    let Some(db) = database().await else { return };
    let (labels, items) = guards(&db);
    let tenant = TenantId::new();

    let urgent = labels.create(tenant, label("urgent")).await.unwrap();
    let first = items.create(tenant, item("lease")).await.unwrap();
    let second = items.create(tenant, item("nda")).await.unwrap();

    for row in [&first, &second] {
        assert_eq!(
            db.link(&ITEM_LABELS, tenant, row.id(), urgent.id()).await.unwrap(),
            LinkOutcome::Linked
        );
    }
    assert_eq!(
        db.link(&ITEM_LABELS, tenant, first.id(), urgent.id()).await.unwrap(),
        LinkOutcome::AlreadyLinked
    );
    assert_eq!(labels.count_related(&urgent).await.unwrap(), 2);
    assert_eq!(db.linked(&ITEM_LABELS, tenant, first.id()).await.unwrap(), vec![urgent.id()]);

    assert_eq!(labels.delete(tenant, urgent.id()).await.unwrap(), 2);
    assert_eq!(labels.count_related(&urgent).await.unwrap(), 0);
    assert!(db.linked(&ITEM_LABELS, tenant, first.id()).await.unwrap().is_empty());
    assert!(matches!(
        labels.get_by_id(tenant, urgent.id()).await,
        Err(GuardError::NotFound { .. })
    ));

    // Unreferenced rows delete with a zero count.
    assert_eq!(items.delete(tenant, second.id()).await.unwrap(), 0);
}

#[tokio::test]
async fn link_checks_both_endpoints_in_tenant() {
    let Some(db) = database().await else { return };
    let (labels, items) = guards(&db);
    let (t1, t2) = (TenantId::new(), TenantId::new());

    let own_item = items.create(t1, item("scan")).await.unwrap();
    let foreign_label = labels.create(t2, label("secret")).await.unwrap();

    assert_eq!(
        db.link(&ITEM_LABELS, t1, own_item.id(), foreign_label.id()).await.unwrap(),
        LinkOutcome::MissingEndpoint
    );
    assert_eq!(
        db.link(&ITEM_LABELS, t2, own_item.id(), foreign_label.id()).await.unwrap(),
        LinkOutcome::MissingEndpoint
    );
    assert_eq!(labels.count_related(&foreign_label).await.unwrap(), 0);
    assert!(!db.unlink(&ITEM_LABELS, t1, own_item.id(), foreign_label.id()).await.unwrap());
}

#[tokio::test]
async fn system_rows_survive_delete_and_rename() {
    let Some(db) = database().await else { return };
    let (labels, items) = guards(&db);
    let tenant = TenantId::new();

    let general = labels.seed_system(tenant, label("General")).await.unwrap();
    assert!(general.is_system());
    let doc = items.create(tenant, item("memo")).await.unwrap();
    db.link(&ITEM_LABELS, tenant, doc.id(), general.id()).await.unwrap();

    assert_eq!(
        labels.delete(tenant, general.id()).await.unwrap_err(),
        GuardError::SystemEntityProtected { entity: "label" }
    );
    // The rolled-back delete left the join row in place.
    assert_eq!(labels.count_related(&general).await.unwrap(), 1);

    let mut renamed = general.clone();
    renamed.name = "Misc".to_string();
    assert_eq!(
        labels.update(tenant, renamed).await.unwrap_err(),
        GuardError::SystemEntityProtected { entity: "label" }
    );

    let mut reordered = general.clone();
    reordered.sort_order = Some(5);
    let updated = labels.update(tenant, reordered).await.unwrap();
    assert!(updated.is_system());
    assert_eq!(updated.sort_order, Some(5));
    assert_eq!(labels.get_by_key(tenant, "General").await.unwrap().sort_order, Some(5));
}
