//! Tag use-case service. Tag names are unique across live and trashed tags.

use super::base_service::{BaseService, DataService, FlatBackend};
use super::{ServiceError, ServiceResult};
use crate::model::{CreateTag, EntityId, Tag, UpdateTag};
use crate::repo::TagRepository;
use log::info;
use rusqlite::Connection;

pub struct TagService<'conn> {
    base: BaseService<FlatBackend<Tag, TagRepository<'conn>>>,
}

impl<'conn> TagService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            base: BaseService::new(FlatBackend::new(TagRepository::new(conn)), true),
        }
    }

    fn repo(&self) -> &TagRepository<'conn> {
        self.base.backend().repo()
    }

    fn ensure_unique_name(&self, name: &str, exclude: Option<EntityId>) -> ServiceResult<()> {
        if self.repo().name_exists(name, exclude)? {
            return Err(ServiceError::Conflict(format!(
                "tag name `{}` already exists",
                name.trim()
            )));
        }
        Ok(())
    }
}

impl<'conn> DataService for TagService<'conn> {
    type Backend = FlatBackend<Tag, TagRepository<'conn>>;
    type Create = CreateTag;
    type Update = UpdateTag;

    fn base(&self) -> &BaseService<Self::Backend> {
        &self.base
    }

    fn create(&self, input: CreateTag) -> ServiceResult<Tag> {
        input.validate()?;
        self.ensure_unique_name(&input.name, None)?;
        let tag = self.repo().insert(&input)?;
        info!("event=tag_create module=service status=ok");
        self.detail(tag.id)
    }

    fn update(&self, input: UpdateTag) -> ServiceResult<Tag> {
        input.validate()?;
        let current = self.detail(input.id)?;
        if let Some(name) = &input.name {
            self.ensure_unique_name(name, Some(current.id))?;
        }
        self.repo().update_fields(
            current.id,
            input.name.as_deref(),
            input.description.as_ref().map(Option::as_deref),
        )?;
        info!("event=tag_update module=service status=ok");
        self.detail(current.id)
    }
}
