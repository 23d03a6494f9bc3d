//! Catalog service: one guard per entity plus the association operations
//! that span two of them.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use docvault_core::{DomainError, EntityId, ListOrder, ScopedEntity, TenantId};
use docvault_infra::{
    AssociationStore, AssociationTable, GuardError, GuardResult, InMemoryDatabase, LinkOutcome,
    PostgresDatabase, ScopedStore, StoreError, TenantGuard,
};

use crate::tables::{CATEGORY_TABLE, DOCUMENT_CATEGORIES, DOCUMENT_TABLE, DOCUMENT_TAGS, FOLDER_TABLE, TAG_TABLE};
use crate::{Category, Document, Folder, Tag};

/// System categories every tenant starts with: `(name, sort_order)`.
pub const DEFAULT_CATEGORIES: &[(&str, i32)] = &[
    ("General", 0),
    ("Invoices", 10),
    ("Contracts", 20),
    ("Receipts", 30),
];

/// Guard over a type-erased store, so one catalog type serves every backend.
pub type Guard<E> = TenantGuard<E, Arc<dyn ScopedStore<E>>>;

fn guard<E: ScopedEntity>(store: impl ScopedStore<E> + 'static) -> Guard<E> {
    let store: Arc<dyn ScopedStore<E>> = Arc::new(store);
    TenantGuard::new(store)
}

/// Tenant-scoped access to every document entity, backed by one database.
///
/// Categories and tags are reachable through their guards. Folders and
/// documents reference other folders, so every write to them goes through
/// the catalog, which checks those references under `tree_lock`. The lock is
/// per catalog: it serializes folder-tree writes within one process only.
#[derive(Clone)]
pub struct DocumentCatalog {
    categories: Guard<Category>,
    folders: Guard<Folder>,
    tags: Guard<Tag>,
    documents: Guard<Document>,
    associations: Arc<dyn AssociationStore>,
    tree_lock: Arc<Mutex<()>>,
}

impl core::fmt::Debug for DocumentCatalog {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DocumentCatalog").finish_non_exhaustive()
    }
}

impl DocumentCatalog {
    pub fn in_memory(db: InMemoryDatabase) -> Self {
        Self {
            categories: guard(db.store::<Category>()),
            folders: guard(db.store::<Folder>()),
            tags: guard(db.store::<Tag>()),
            documents: guard(db.store::<Document>()),
            associations: Arc::new(db),
            tree_lock: Arc::default(),
        }
    }

    /// Build a catalog over Postgres. Call
    /// [`PostgresDatabase::apply_schema`] with [`crate::schema::SCHEMA`] first.
    pub fn postgres(db: PostgresDatabase) -> Self {
        Self {
            categories: guard(db.store::<Category>(CATEGORY_TABLE)),
            folders: guard(db.store::<Folder>(FOLDER_TABLE)),
            tags: guard(db.store::<Tag>(TAG_TABLE)),
            documents: guard(db.store::<Document>(DOCUMENT_TABLE)),
            associations: Arc::new(db),
            tree_lock: Arc::default(),
        }
    }

    pub fn categories(&self) -> &Guard<Category> {
        &self.categories
    }

    pub fn tags(&self) -> &Guard<Tag> {
        &self.tags
    }

    /// Seed [`DEFAULT_CATEGORIES`] as system categories for a tenant.
    ///
    /// Idempotent: categories that already exist under the same name are
    /// returned as they are, whether or not they are system rows.
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub async fn seed_default_categories(&self, tenant_id: TenantId) -> GuardResult<Vec<Category>> {
        let mut seeded = Vec::with_capacity(DEFAULT_CATEGORIES.len());
        for (name, sort_order) in DEFAULT_CATEGORIES {
            let category = Category::new(*name).with_sort_order(*sort_order);
            let row = match self.categories.seed_system(tenant_id, category).await {
                Ok(row) => row,
                Err(GuardError::AlreadyExists { .. }) => self.categories.get_by_key(tenant_id, name).await?,
                Err(other) => return Err(other),
            };
            seeded.push(row);
        }
        info!(count = seeded.len(), "default categories ready");
        Ok(seeded)
    }

    pub async fn folder(&self, tenant_id: TenantId, folder_id: EntityId) -> GuardResult<Folder> {
        self.folders.get_by_id(tenant_id, folder_id).await
    }

    pub async fn list_folders(&self, tenant_id: TenantId, order: ListOrder) -> GuardResult<Vec<Folder>> {
        self.folders.list(tenant_id, order).await
    }

    /// Create a folder, checking that its parent lives in the same tenant.
    pub async fn create_folder(&self, tenant_id: TenantId, folder: Folder) -> GuardResult<Folder> {
        let _tree = self.tree_lock.lock().await;
        if let Some(parent_id) = folder.parent_id {
            self.folders.get_by_id(tenant_id, parent_id).await?;
        }
        self.folders.create(tenant_id, folder).await
    }

    /// Rename or move a folder. The new parent must live in the same tenant
    /// and must not be the folder itself or one of its descendants.
    #[instrument(skip(self, folder), fields(tenant_id = %tenant_id, id = %folder.id()), err)]
    pub async fn update_folder(&self, tenant_id: TenantId, folder: Folder) -> GuardResult<Folder> {
        let _tree = self.tree_lock.lock().await;
        if let Some(parent_id) = folder.parent_id {
            self.check_no_cycle(tenant_id, folder.id(), parent_id).await?;
        }
        self.folders.update(tenant_id, folder).await
    }

    /// Delete an empty folder. Folders holding documents or subfolders are
    /// refused with a validation error.
    #[instrument(skip(self), err)]
    pub async fn delete_folder(&self, tenant_id: TenantId, folder_id: EntityId) -> GuardResult<()> {
        let _tree = self.tree_lock.lock().await;
        let folder = self.folders.get_by_id(tenant_id, folder_id).await?;

        let has_children = self
            .folders
            .list(tenant_id, ListOrder::NameThenId)
            .await?
            .iter()
            .any(|f| f.parent_id == Some(folder.id()));
        let has_documents = self
            .documents
            .list(tenant_id, ListOrder::NameThenId)
            .await?
            .iter()
            .any(|d| d.folder_id == Some(folder.id()));
        if has_children || has_documents {
            return Err(DomainError::validation(format!("folder '{}' is not empty", folder.name)).into());
        }

        self.folders.delete(tenant_id, folder_id).await?;
        Ok(())
    }

    pub async fn document(&self, tenant_id: TenantId, document_id: EntityId) -> GuardResult<Document> {
        self.documents.get_by_id(tenant_id, document_id).await
    }

    pub async fn list_documents(&self, tenant_id: TenantId, order: ListOrder) -> GuardResult<Vec<Document>> {
        self.documents.list(tenant_id, order).await
    }

    /// Create a document, checking that its folder lives in the same tenant.
    pub async fn create_document(&self, tenant_id: TenantId, document: Document) -> GuardResult<Document> {
        let _tree = self.tree_lock.lock().await;
        if let Some(folder_id) = document.folder_id {
            self.folders.get_by_id(tenant_id, folder_id).await?;
        }
        self.documents.create(tenant_id, document).await
    }

    /// Update a document, re-checking that its folder lives in the same tenant.
    pub async fn update_document(&self, tenant_id: TenantId, document: Document) -> GuardResult<Document> {
        let _tree = self.tree_lock.lock().await;
        if let Some(folder_id) = document.folder_id {
            self.folders.get_by_id(tenant_id, folder_id).await?;
        }
        self.documents.update(tenant_id, document).await
    }

    /// Delete a document with its category and tag links. Returns how many
    /// links were removed.
    pub async fn delete_document(&self, tenant_id: TenantId, document_id: EntityId) -> GuardResult<u64> {
        self.documents.delete(tenant_id, document_id).await
    }

    /// Walk up from `parent_id` and fail if the chain reaches `folder_id`.
    /// Every folder on the chain must belong to `tenant_id`.
    async fn check_no_cycle(&self, tenant_id: TenantId, folder_id: EntityId, parent_id: EntityId) -> GuardResult<()> {
        let mut seen = HashSet::new();
        let mut next = Some(parent_id);
        while let Some(current) = next {
            if current == folder_id {
                warn!("rejected folder move into its own subtree");
                return Err(DomainError::validation("folder cannot be moved inside itself").into());
            }
            if !seen.insert(current) {
                // Already looping above us; the moved folder is not on it.
                break;
            }
            next = self.folders.get_by_id(tenant_id, current).await?.parent_id;
        }
        Ok(())
    }

    /// Returns `true` if the association is new.
    pub async fn attach_category(
        &self,
        tenant_id: TenantId,
        document_id: EntityId,
        category_id: EntityId,
    ) -> GuardResult<bool> {
        self.documents.get_by_id(tenant_id, document_id).await?;
        self.categories.get_by_id(tenant_id, category_id).await?;
        self.link(&DOCUMENT_CATEGORIES, tenant_id, document_id, category_id)
            .await
    }

    pub async fn detach_category(
        &self,
        tenant_id: TenantId,
        document_id: EntityId,
        category_id: EntityId,
    ) -> GuardResult<bool> {
        self.associations
            .unlink(&DOCUMENT_CATEGORIES, tenant_id, document_id, category_id)
            .await
            .map_err(store_error)
    }

    /// Returns `true` if the association is new.
    pub async fn attach_tag(&self, tenant_id: TenantId, document_id: EntityId, tag_id: EntityId) -> GuardResult<bool> {
        self.documents.get_by_id(tenant_id, document_id).await?;
        self.tags.get_by_id(tenant_id, tag_id).await?;
        self.link(&DOCUMENT_TAGS, tenant_id, document_id, tag_id).await
    }

    pub async fn detach_tag(&self, tenant_id: TenantId, document_id: EntityId, tag_id: EntityId) -> GuardResult<bool> {
        self.associations
            .unlink(&DOCUMENT_TAGS, tenant_id, document_id, tag_id)
            .await
            .map_err(store_error)
    }

    pub async fn document_categories(&self, tenant_id: TenantId, document_id: EntityId) -> GuardResult<Vec<Category>> {
        self.related(&self.categories, &DOCUMENT_CATEGORIES, tenant_id, document_id)
            .await
    }

    pub async fn document_tags(&self, tenant_id: TenantId, document_id: EntityId) -> GuardResult<Vec<Tag>> {
        self.related(&self.tags, &DOCUMENT_TAGS, tenant_id, document_id)
            .await
    }

    #[instrument(skip(self, table), fields(join_table = table.name), err)]
    async fn link(
        &self,
        table: &AssociationTable,
        tenant_id: TenantId,
        document_id: EntityId,
        related_id: EntityId,
    ) -> GuardResult<bool> {
        match self
            .associations
            .link(table, tenant_id, document_id, related_id)
            .await
            .map_err(store_error)?
        {
            LinkOutcome::Linked => {
                debug!("linked");
                Ok(true)
            }
            LinkOutcome::AlreadyLinked => Ok(false),
            // One side was deleted after the ownership checks above.
            LinkOutcome::MissingEndpoint => Err(GuardError::NotFound {
                entity: table.right.kind,
            }),
        }
    }

    async fn related<E: ScopedEntity>(
        &self,
        guard: &Guard<E>,
        table: &AssociationTable,
        tenant_id: TenantId,
        document_id: EntityId,
    ) -> GuardResult<Vec<E>> {
        self.documents.get_by_id(tenant_id, document_id).await?;
        let ids = self
            .associations
            .linked(table, tenant_id, document_id)
            .await
            .map_err(store_error)?;

        let mut rows = Vec::with_capacity(ids.len());
        for id in ids {
            match guard.get_by_id(tenant_id, id).await {
                Ok(row) => rows.push(row),
                // Removed between the two reads.
                Err(GuardError::NotFound { .. }) => {}
                Err(other) => return Err(other),
            }
        }
        ListOrder::default().sort(&mut rows);
        Ok(rows)
    }
}

fn store_error(err: StoreError) -> GuardError {
    GuardError::Store(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> DocumentCatalog {
        DocumentCatalog::in_memory(InMemoryDatabase::new())
    }

    #[tokio::test]
    async fn seeding_is_idempotent_and_marks_system_rows() {
        let catalog = catalog();
        let tenant = TenantId::new();

        let first = catalog.seed_default_categories(tenant).await.unwrap();
        let second = catalog.seed_default_categories(tenant).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), DEFAULT_CATEGORIES.len());
        assert!(first.iter().all(|c| c.is_system()));

        let names: Vec<_> = catalog
            .categories()
            .list(tenant, ListOrder::default())
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, ["General", "Invoices", "Contracts", "Receipts"]);
    }

    #[tokio::test]
    async fn attach_rejects_rows_from_other_tenants() {
        let catalog = catalog();
        let (t1, t2) = (TenantId::new(), TenantId::new());
        let doc = catalog
            .create_document(t1, Document::new("scan", "image/png", 10))
            .await
            .unwrap();
        let foreign = catalog.categories().create(t2, Category::new("Taxes")).await.unwrap();

        let err = catalog.attach_category(t1, doc.id(), foreign.id()).await.unwrap_err();
        assert_eq!(err, GuardError::NotFound { entity: "category" });

        let err = catalog.attach_category(t2, doc.id(), foreign.id()).await.unwrap_err();
        assert_eq!(err, GuardError::NotFound { entity: "document" });
    }

    #[tokio::test]
    async fn attach_is_idempotent() {
        let catalog = catalog();
        let tenant = TenantId::new();
        let doc = catalog
            .create_document(tenant, Document::new("scan", "image/png", 10))
            .await
            .unwrap();
        let tag = catalog.tags().create(tenant, Tag::new("urgent")).await.unwrap();

        assert!(catalog.attach_tag(tenant, doc.id(), tag.id()).await.unwrap());
        assert!(!catalog.attach_tag(tenant, doc.id(), tag.id()).await.unwrap());
        assert_eq!(catalog.document_tags(tenant, doc.id()).await.unwrap(), vec![tag.clone()]);

        assert!(catalog.detach_tag(tenant, doc.id(), tag.id()).await.unwrap());
        assert!(catalog.document_tags(tenant, doc.id()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn folders_must_share_the_tenant() {
        let catalog = catalog();
        let (t1, t2) = (TenantId::new(), TenantId::new());
        let parent = catalog.create_folder(t1, Folder::new("2024")).await.unwrap();

        let err = catalog
            .create_folder(t2, Folder::new("Q1").within(parent.id()))
            .await
            .unwrap_err();
        assert_eq!(err, GuardError::NotFound { entity: "folder" });

        let err = catalog
            .create_document(t2, Document::new("scan", "image/png", 1).in_folder(parent.id()))
            .await
            .unwrap_err();
        assert_eq!(err, GuardError::NotFound { entity: "folder" });
    }

    #[tokio::test]
    async fn non_empty_folders_are_kept() {
        let catalog = catalog();
        let tenant = TenantId::new();
        let folder = catalog.create_folder(tenant, Folder::new("2024")).await.unwrap();
        let doc = catalog
            .create_document(tenant, Document::new("scan", "image/png", 1).in_folder(folder.id()))
            .await
            .unwrap();

        assert!(matches!(
            catalog.delete_folder(tenant, folder.id()).await,
            Err(GuardError::Validation(_))
        ));

        catalog.delete_document(tenant, doc.id()).await.unwrap();
        catalog.delete_folder(tenant, folder.id()).await.unwrap();
        assert!(catalog.folder(tenant, folder.id()).await.is_err());
    }

    #[tokio::test]
    async fn documents_cannot_move_into_foreign_folders() {
        let catalog = catalog();
        let (t1, t2) = (TenantId::new(), TenantId::new());
        let own = catalog.create_folder(t1, Folder::new("2024")).await.unwrap();
        let foreign = catalog.create_folder(t2, Folder::new("secret")).await.unwrap();
        let doc = catalog
            .create_document(t1, Document::new("scan", "image/png", 1))
            .await
            .unwrap();

        let mut moved = doc.clone();
        moved.folder_id = Some(foreign.id());
        let err = catalog.update_document(t1, moved).await.unwrap_err();
        assert_eq!(err, GuardError::NotFound { entity: "folder" });
        assert_eq!(catalog.document(t1, doc.id()).await.unwrap().folder_id, None);

        let mut moved = doc.clone();
        moved.folder_id = Some(own.id());
        let updated = catalog.update_document(t1, moved).await.unwrap();
        assert_eq!(updated.folder_id, Some(own.id()));
    }

    #[tokio::test]
    async fn folder_moves_cannot_form_cycles() {
        let catalog = catalog();
        let tenant = TenantId::new();
        let a = catalog.create_folder(tenant, Folder::new("A")).await.unwrap();
        let b = catalog.create_folder(tenant, Folder::new("B").within(a.id())).await.unwrap();
        let c = catalog.create_folder(tenant, Folder::new("C").within(b.id())).await.unwrap();

        for parent in [b.id(), c.id(), a.id()] {
            let err = catalog
                .update_folder(tenant, a.clone().within(parent))
                .await
                .unwrap_err();
            assert!(matches!(err, GuardError::Validation(_)), "{err:?}");
        }
        assert_eq!(catalog.folder(tenant, a.id()).await.unwrap().parent_id, None);

        // Moving a leaf under a sibling branch is fine.
        let d = catalog.create_folder(tenant, Folder::new("D")).await.unwrap();
        let moved = catalog.update_folder(tenant, c.clone().within(d.id())).await.unwrap();
        assert_eq!(moved.parent_id, Some(d.id()));
    }

    #[tokio::test]
    async fn folder_moves_stay_in_tenant() {
        let catalog = catalog();
        let (t1, t2) = (TenantId::new(), TenantId::new());
        let a = catalog.create_folder(t1, Folder::new("A")).await.unwrap();
        let foreign = catalog.create_folder(t2, Folder::new("B")).await.unwrap();

        let err = catalog
            .update_folder(t1, a.clone().within(foreign.id()))
            .await
            .unwrap_err();
        assert_eq!(err, GuardError::NotFound { entity: "folder" });
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn folder_delete_and_document_create_do_not_interleave() {
        let catalog = catalog();
        let tenant = TenantId::new();

        for round in 0..32 {
            let folder = catalog
                .create_folder(tenant, Folder::new(format!("inbox-{round}")))
                .await
                .unwrap();

            let deleter = {
                let catalog = catalog.clone();
                let folder = folder.clone();
                tokio::spawn(async move { catalog.delete_folder(tenant, folder.id()).await })
            };
            let creator = {
                let catalog = catalog.clone();
                let doc = Document::new("scan", "image/png", 1).in_folder(folder.id());
                tokio::spawn(async move { catalog.create_document(tenant, doc).await })
            };
            let deleted = deleter.await.unwrap();
            let created = creator.await.unwrap();

            match (deleted, created) {
                (Ok(()), Err(GuardError::NotFound { entity: "folder" })) => {}
                (Err(GuardError::Validation(_)), Ok(doc)) => {
                    assert!(catalog.folder(tenant, folder.id()).await.is_ok());
                    catalog.delete_document(tenant, doc.id()).await.unwrap();
                }
                other => panic!("round {round}: folder delete raced a document insert: {other:?}"),
            }
        }
    }
}
