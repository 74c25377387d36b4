//! Category tree use-case service.
//!
//! # Invariants
//! - A parent must exist and be live when referenced.
//! - Live siblings never share a name (case-insensitive).
//! - A category never moves below itself or one of its descendants.

use super::base_service::{BaseService, DataService, TreeBackend};
use super::{ServiceError, ServiceResult};
use crate::model::{
    Category, CategoryView, CreateCategory, Entity, EntityId, ParentChange, SelectTrashMode,
    TrashFilter, Tree, UpdateCategory,
};
use crate::repo::{CategoryRepository, EntityRepository, FindTreesOptions, TreeRepository};
use log::info;
use rusqlite::Connection;

pub struct CategoryService<'conn> {
    base: BaseService<TreeBackend<Category, CategoryRepository<'conn>>>,
}

impl<'conn> CategoryService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            base: BaseService::new(TreeBackend::new(CategoryRepository::new(conn)), true),
        }
    }

    fn repo(&self) -> &CategoryRepository<'conn> {
        self.base.backend().repo()
    }

    pub fn find_trees(&self, trashed: SelectTrashMode) -> ServiceResult<Vec<Tree<Category>>> {
        let trash = TrashFilter::from_mode(trashed, self.base.enable_trash());
        Ok(self.repo().find_trees(FindTreesOptions::new(trash))?)
    }

    /// Detail projection carrying the parent reference.
    pub fn detail_view(&self, id: EntityId) -> ServiceResult<CategoryView> {
        let category = self.detail(id)?;
        let parent = match category.parent_id {
            Some(parent_id) => self.repo().find_one(parent_id, TrashFilter::ALL)?,
            None => None,
        };
        Ok(CategoryView::detail(&category, parent.as_ref()))
    }

    fn live_parent(&self, id: EntityId) -> ServiceResult<Category> {
        self.repo()
            .find_one(id, TrashFilter::LIVE)?
            .ok_or(ServiceError::ParentNotFound {
                entity: Category::LABEL,
                id,
            })
    }

    fn ensure_unique_name(
        &self,
        parent: Option<EntityId>,
        name: &str,
        exclude: Option<EntityId>,
    ) -> ServiceResult<()> {
        if self.repo().sibling_name_exists(parent, name, exclude)? {
            return Err(ServiceError::Conflict(format!(
                "category name `{}` already exists at this level",
                name.trim()
            )));
        }
        Ok(())
    }

    /// Resolves the requested parent change against the current parent.
    ///
    /// Returns `None` when nothing has to move.
    fn resolve_parent(
        &self,
        current: &Category,
        change: ParentChange,
    ) -> ServiceResult<Option<Option<EntityId>>> {
        match change {
            ParentChange::Keep => Ok(None),
            ParentChange::Detach if current.parent_id.is_none() => Ok(None),
            ParentChange::Detach => Ok(Some(None)),
            ParentChange::Set(id) if current.parent_id == Some(id) => Ok(None),
            ParentChange::Set(id) => {
                let parent = self.live_parent(id)?;
                if parent.id == current.id || parent.mpath.starts_with(&current.mpath) {
                    return Err(ServiceError::Conflict(format!(
                        "can not move category {} below itself or its descendant {id}",
                        current.id
                    )));
                }
                Ok(Some(Some(id)))
            }
        }
    }
}

impl<'conn> DataService for CategoryService<'conn> {
    type Backend = TreeBackend<Category, CategoryRepository<'conn>>;
    type Create = CreateCategory;
    type Update = UpdateCategory;

    fn base(&self) -> &BaseService<Self::Backend> {
        &self.base
    }

    fn create(&self, input: CreateCategory) -> ServiceResult<Category> {
        input.validate()?;
        if let Some(parent) = input.parent {
            self.live_parent(parent)?;
        }
        self.ensure_unique_name(input.parent, &input.name, None)?;

        let category = self.repo().insert(&input)?;
        info!(
            "event=category_create module=service status=ok has_parent={}",
            category.parent_id.is_some()
        );
        self.detail(category.id)
    }

    fn update(&self, input: UpdateCategory) -> ServiceResult<Category> {
        input.validate()?;
        let current = self.detail(input.id)?;
        let target_parent = self.resolve_parent(&current, input.parent)?;

        let name_changed = input.name.is_some();
        if name_changed || target_parent.is_some() {
            let parent = target_parent.unwrap_or(current.parent_id);
            let name = input.name.as_deref().unwrap_or(&current.name);
            self.ensure_unique_name(parent, name, Some(current.id))?;
        }

        self.repo().update_fields(
            current.id,
            input.name.as_deref(),
            input.custom_order,
            target_parent,
        )?;

        info!(
            "event=category_update module=service status=ok moved={}",
            target_parent.is_some()
        );
        self.detail(current.id)
    }
}
