//! Comment tree use-case service.
//!
//! Comments have no trash: deletes are permanent and replies of a deleted
//! comment move up one level. Edits are refused.

use super::base_service::{BaseService, DataService, NodeFilter, QueryOptions, TreeBackend};
use super::pagination::{PaginateOptions, Pagination};
use super::{ServiceError, ServiceResult};
use crate::model::{
    Comment, CreateComment, Entity, EntityId, FlatNode, Post, SelectTrashMode, TrashFilter, Tree,
    UpdateComment,
};
use crate::repo::{CommentRepository, EntityRepository, FindTreesOptions, PostRepository, TreeRepository};
use log::info;
use rusqlite::Connection;
use std::rc::Rc;

pub struct CommentService<'conn> {
    base: BaseService<TreeBackend<Comment, CommentRepository<'conn>>>,
    posts: PostRepository<'conn>,
}

impl<'conn> CommentService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            base: BaseService::new(TreeBackend::new(CommentRepository::new(conn)), false),
            posts: PostRepository::new(conn),
        }
    }

    fn repo(&self) -> &CommentRepository<'conn> {
        self.base.backend().repo()
    }

    /// Scope restricting trees and pages to one post.
    pub fn post_scope(post: Option<EntityId>) -> QueryOptions<NodeFilter<Comment>> {
        let filter: NodeFilter<Comment> = post.map(|post_id| {
            Rc::new(move |comment: &Comment| comment.post_id == post_id) as Rc<dyn Fn(&Comment) -> bool>
        });
        QueryOptions::new(SelectTrashMode::None).with_scope(filter)
    }

    pub fn find_trees(&self, post: Option<EntityId>) -> ServiceResult<Vec<Tree<Comment>>> {
        let scope = Self::post_scope(post).scope;
        let mut options = FindTreesOptions::new(TrashFilter::LIVE);
        if let Some(filter) = &scope {
            options = options.with_filter(&**filter);
        }
        Ok(self.repo().find_trees(options)?)
    }

    /// Flattened comment page of one post, or of every post.
    pub fn paginate_post(
        &self,
        post: Option<EntityId>,
        page: PaginateOptions,
    ) -> ServiceResult<Pagination<FlatNode<Comment>>> {
        self.paginate(&Self::post_scope(post), page)
    }
}

impl<'conn> DataService for CommentService<'conn> {
    type Backend = TreeBackend<Comment, CommentRepository<'conn>>;
    type Create = CreateComment;
    type Update = UpdateComment;

    fn base(&self) -> &BaseService<Self::Backend> {
        &self.base
    }

    fn create(&self, input: CreateComment) -> ServiceResult<Comment> {
        input.validate()?;
        self.posts
            .find_one(input.post_id, TrashFilter::LIVE)?
            .ok_or(ServiceError::NotFound {
                entity: Post::LABEL,
                id: input.post_id,
            })?;

        if let Some(parent_id) = input.parent {
            let parent = self
                .repo()
                .find_one(parent_id, TrashFilter::LIVE)?
                .ok_or(ServiceError::ParentNotFound {
                    entity: Comment::LABEL,
                    id: parent_id,
                })?;
            if parent.post_id != input.post_id {
                return Err(ServiceError::Conflict(
                    "Parent comment and child comment must belong same post!".to_string(),
                ));
            }
        }

        let comment = self.repo().insert(&input)?;
        info!(
            "event=comment_create module=service status=ok is_reply={}",
            comment.parent_id.is_some()
        );
        Ok(comment)
    }
}
