//! Generic list/paginate/detail/delete/restore service.
//!
//! # Responsibility
//! - Resolve at construction whether content is tree-shaped or flat
//!   ([`TreeBackend`] or [`FlatBackend`]).
//! - Offer one CRUD surface over either backend.
//!
//! # Invariants
//! - Tree pages are sliced from the fully flattened forest.
//! - Surviving children of a deleted node are moved to its nearest surviving
//!   ancestor before the node is removed.
//! - Services with trash disabled only ever see live rows.

use super::pagination::{tree_paginate, PaginateOptions, Pagination};
use super::{ServiceError, ServiceResult};
use crate::model::{Entity, EntityId, FlatNode, SelectTrashMode, TrashFilter, TreeEntity};
use crate::repo::{
    EntityRepository, FindTreesOptions, FlatRepository, ListQuery, ParentMove, SqlFilter,
    TreeRepository,
};
use log::info;
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryKind {
    Tree,
    Flat,
}

/// Node predicate applied at every tree level; `None` keeps every node.
pub type NodeFilter<E> = Option<Rc<dyn Fn(&E) -> bool>>;

/// Storage shape a [`BaseService`] runs on.
pub trait Backend {
    type Entity: Entity;
    /// Element of list and page results.
    type Item;
    /// Caller-supplied refinement of list queries.
    type Scope: Default;

    fn kind(&self) -> RepositoryKind;

    fn repository(&self) -> &dyn EntityRepository<Self::Entity>;

    fn list(&self, trash: TrashFilter, scope: &Self::Scope) -> ServiceResult<Vec<Self::Item>>;

    fn paginate(
        &self,
        trash: TrashFilter,
        scope: &Self::Scope,
        options: PaginateOptions,
    ) -> ServiceResult<Pagination<Self::Item>>;

    /// Runs before `items` are removed and returns how many rows moved.
    fn detach_children(&self, _items: &[Self::Entity]) -> ServiceResult<usize> {
        Ok(0)
    }
}

pub struct TreeBackend<E, R> {
    repo: R,
    _entity: PhantomData<E>,
}

impl<E: TreeEntity, R: TreeRepository<E>> TreeBackend<E, R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            _entity: PhantomData,
        }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }
}

impl<E: TreeEntity, R: TreeRepository<E>> Backend for TreeBackend<E, R> {
    type Entity = E;
    type Item = FlatNode<E>;
    type Scope = NodeFilter<E>;

    fn kind(&self) -> RepositoryKind {
        RepositoryKind::Tree
    }

    fn repository(&self) -> &dyn EntityRepository<E> {
        &self.repo
    }

    fn list(&self, trash: TrashFilter, scope: &Self::Scope) -> ServiceResult<Vec<FlatNode<E>>> {
        let mut options = FindTreesOptions::new(trash);
        if let Some(filter) = scope {
            options = options.with_filter(&**filter);
        }
        let trees = self.repo.find_trees(options)?;
        Ok(self.repo.to_flat_trees(trees))
    }

    fn paginate(
        &self,
        trash: TrashFilter,
        scope: &Self::Scope,
        options: PaginateOptions,
    ) -> ServiceResult<Pagination<FlatNode<E>>> {
        let data = self.list(trash, scope)?;
        Ok(tree_paginate(options, data))
    }

    fn detach_children(&self, items: &[E]) -> ServiceResult<usize> {
        let removed: HashMap<EntityId, Option<EntityId>> = items
            .iter()
            .map(|item| (item.id(), item.parent_id()))
            .collect();

        let mut moves = Vec::new();
        for item in items {
            let children = self.repo.find_children(item.id(), true)?;
            if children.is_empty() {
                continue;
            }
            let parent = surviving_parent(item.parent_id(), &removed);
            moves.extend(
                children
                    .iter()
                    .filter(|child| !removed.contains_key(&child.id()))
                    .map(|child| ParentMove {
                        node: child.id(),
                        parent,
                    }),
            );
        }
        Ok(self.repo.reattach_children(&moves)?)
    }
}

/// Walks up from `start` past every node that is being removed.
fn surviving_parent(
    start: Option<EntityId>,
    removed: &HashMap<EntityId, Option<EntityId>>,
) -> Option<EntityId> {
    let mut current = start;
    let mut seen = HashSet::new();
    while let Some(id) = current {
        match removed.get(&id) {
            None => return Some(id),
            Some(parent) if seen.insert(id) => current = *parent,
            Some(_) => return None,
        }
    }
    None
}

pub struct FlatBackend<E, R> {
    repo: R,
    _entity: PhantomData<E>,
}

impl<E: Entity, R: FlatRepository<E>> FlatBackend<E, R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            _entity: PhantomData,
        }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }
}

impl<E: Entity, R: FlatRepository<E>> Backend for FlatBackend<E, R> {
    type Entity = E;
    type Item = E;
    type Scope = SqlFilter;

    fn kind(&self) -> RepositoryKind {
        RepositoryKind::Flat
    }

    fn repository(&self) -> &dyn EntityRepository<E> {
        &self.repo
    }

    fn list(&self, trash: TrashFilter, scope: &SqlFilter) -> ServiceResult<Vec<E>> {
        let query = ListQuery::new(trash).with_filter(scope.clone());
        Ok(self.repo.list(&query)?)
    }

    fn paginate(
        &self,
        trash: TrashFilter,
        scope: &SqlFilter,
        options: PaginateOptions,
    ) -> ServiceResult<Pagination<E>> {
        let query = ListQuery::new(trash).with_filter(scope.clone());
        let (items, total) = self
            .repo
            .paginate(&query, options.offset(), u64::from(options.limit))?;
        Ok(Pagination::from_page(items, total, options))
    }
}

/// Trash selection plus backend scope for list and page queries.
#[derive(Clone, Default)]
pub struct QueryOptions<S> {
    pub trashed: SelectTrashMode,
    pub scope: S,
}

impl<S: Default> QueryOptions<S> {
    pub fn new(trashed: SelectTrashMode) -> Self {
        Self {
            trashed,
            scope: S::default(),
        }
    }

    pub fn with_scope(mut self, scope: S) -> Self {
        self.scope = scope;
        self
    }
}

/// CRUD surface shared by every content service.
pub struct BaseService<B> {
    backend: B,
    enable_trash: bool,
}

impl<B: Backend> BaseService<B> {
    pub fn new(backend: B, enable_trash: bool) -> Self {
        Self {
            backend,
            enable_trash,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn kind(&self) -> RepositoryKind {
        self.backend.kind()
    }

    pub fn enable_trash(&self) -> bool {
        self.enable_trash
    }

    fn label(&self) -> &'static str {
        <B::Entity as Entity>::LABEL
    }

    fn trash_filter(&self, mode: SelectTrashMode) -> TrashFilter {
        TrashFilter::from_mode(mode, self.enable_trash)
    }

    pub fn list(&self, options: &QueryOptions<B::Scope>) -> ServiceResult<Vec<B::Item>> {
        self.backend
            .list(self.trash_filter(options.trashed), &options.scope)
    }

    pub fn paginate(
        &self,
        options: &QueryOptions<B::Scope>,
        page: PaginateOptions,
    ) -> ServiceResult<Pagination<B::Item>> {
        self.backend
            .paginate(self.trash_filter(options.trashed), &options.scope, page)
    }

    /// Live row by id.
    pub fn detail(&self, id: EntityId) -> ServiceResult<B::Entity> {
        self.backend
            .repository()
            .find_one(id, TrashFilter::LIVE)?
            .ok_or(ServiceError::NotFound {
                entity: self.label(),
                id,
            })
    }

    /// Removes `ids` and returns the affected rows.
    ///
    /// With `trash` on a trash-enabled service, live rows are soft-deleted and
    /// rows already in the trash are deleted for good. Every requested id must
    /// exist; nothing is changed otherwise.
    pub fn delete(&self, ids: &[EntityId], trash: bool) -> ServiceResult<Vec<B::Entity>> {
        let repo = self.backend.repository();
        let items = repo.find_by_ids(ids, self.enable_trash)?;
        if let Some(missing) = ids
            .iter()
            .find(|id| !items.iter().any(|item| item.id() == **id))
        {
            return Err(ServiceError::NotFound {
                entity: self.label(),
                id: *missing,
            });
        }

        let moved = self.backend.detach_children(&items)?;
        let soft = self.enable_trash && trash;
        let removed = if soft {
            let (trashed, live): (Vec<_>, Vec<_>) =
                items.into_iter().partition(|item| item.is_trashed());
            repo.remove(&trashed)?;
            let mut removed = trashed;
            removed.extend(repo.soft_remove(&live)?);
            removed
        } else {
            repo.remove(&items)?;
            items
        };

        info!(
            "event=content_delete module=service status=ok entity={} count={} trash={} moved={}",
            self.label(),
            removed.len(),
            soft,
            moved
        );
        Ok(removed)
    }

    /// Restores the trashed rows among `ids`; live or unknown ids are skipped.
    pub fn restore(&self, ids: &[EntityId]) -> ServiceResult<Vec<B::Entity>> {
        if !self.enable_trash {
            return Err(ServiceError::TrashDisabled {
                entity: self.label(),
            });
        }
        let repo = self.backend.repository();
        let trashed: Vec<EntityId> = repo
            .find_by_ids(ids, true)?
            .into_iter()
            .filter(|item| item.is_trashed())
            .map(|item| item.id())
            .collect();
        if trashed.is_empty() {
            return Ok(Vec::new());
        }
        repo.restore(&trashed)?;

        info!(
            "event=content_restore module=service status=ok entity={} count={}",
            self.label(),
            trashed.len()
        );
        Ok(repo.find_by_ids(&trashed, false)?)
    }
}

pub type EntityOf<S> = <<S as DataService>::Backend as Backend>::Entity;
pub type ItemOf<S> = <<S as DataService>::Backend as Backend>::Item;
pub type ScopeOf<S> = <<S as DataService>::Backend as Backend>::Scope;

/// Content service contract; every operation delegates to [`BaseService`]
/// unless the concrete service overrides it. `create` and `update` are
/// refused by default.
pub trait DataService {
    type Backend: Backend;
    type Create;
    type Update;

    fn base(&self) -> &BaseService<Self::Backend>;

    fn list(&self, options: &QueryOptions<ScopeOf<Self>>) -> ServiceResult<Vec<ItemOf<Self>>> {
        self.base().list(options)
    }

    fn paginate(
        &self,
        options: &QueryOptions<ScopeOf<Self>>,
        page: PaginateOptions,
    ) -> ServiceResult<Pagination<ItemOf<Self>>> {
        self.base().paginate(options, page)
    }

    fn detail(&self, id: EntityId) -> ServiceResult<EntityOf<Self>> {
        self.base().detail(id)
    }

    fn delete(&self, ids: &[EntityId], trash: bool) -> ServiceResult<Vec<EntityOf<Self>>> {
        self.base().delete(ids, trash)
    }

    fn restore(&self, ids: &[EntityId]) -> ServiceResult<Vec<EntityOf<Self>>> {
        self.base().restore(ids)
    }

    fn create(&self, _input: Self::Create) -> ServiceResult<EntityOf<Self>> {
        Err(ServiceError::OperationNotSupported {
            operation: "create",
            entity: <EntityOf<Self> as Entity>::LABEL,
        })
    }

    fn update(&self, _input: Self::Update) -> ServiceResult<EntityOf<Self>> {
        Err(ServiceError::OperationNotSupported {
            operation: "update",
            entity: <EntityOf<Self> as Entity>::LABEL,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{surviving_parent, BaseService, DataService, FlatBackend, RepositoryKind};
    use crate::db::open_db_in_memory;
    use crate::model::{CreateTag, Tag};
    use crate::repo::TagRepository;
    use crate::service::ServiceError;
    use std::collections::HashMap;
    use uuid::Uuid;

    struct ReadOnlyTags<'conn> {
        base: BaseService<FlatBackend<Tag, TagRepository<'conn>>>,
    }

    impl<'conn> DataService for ReadOnlyTags<'conn> {
        type Backend = FlatBackend<Tag, TagRepository<'conn>>;
        type Create = CreateTag;
        type Update = CreateTag;

        fn base(&self) -> &BaseService<Self::Backend> {
            &self.base
        }
    }

    #[test]
    fn unimplemented_writes_are_refused() {
        let conn = open_db_in_memory().unwrap();
        let service = ReadOnlyTags {
            base: BaseService::new(FlatBackend::new(TagRepository::new(&conn)), false),
        };
        assert_eq!(service.base().kind(), RepositoryKind::Flat);

        let err = service.create(CreateTag::new("rust")).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::OperationNotSupported {
                operation: "create",
                entity: "tag"
            }
        ));
        assert!(matches!(
            service.restore(&[Uuid::new_v4()]).unwrap_err(),
            ServiceError::TrashDisabled { entity: "tag" }
        ));
    }

    #[test]
    fn surviving_parent_skips_removed_chain() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let removed = HashMap::from([(c, Some(b)), (b, Some(a))]);
        assert_eq!(surviving_parent(Some(c), &removed), Some(a));
        assert_eq!(surviving_parent(Some(a), &removed), Some(a));

        let looped = HashMap::from([(a, Some(b)), (b, Some(a))]);
        assert_eq!(surviving_parent(Some(a), &looped), None);
    }
}
