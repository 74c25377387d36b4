//! Serializable projections per use case.
//!
//! A tree view nests children, a list view carries depth and parent for
//! flattened pages, a detail view carries the full parent reference.

use super::category::Category;
use super::comment::Comment;
use super::entity::{EntityId, Timestamp};
use super::tree::{FlatNode, Tree};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryParentView {
    pub id: EntityId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryView {
    pub id: EntityId,
    pub name: String,
    pub custom_order: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<CategoryParentView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<CategoryView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<Timestamp>,
}

impl CategoryView {
    fn base(category: &Category) -> Self {
        Self {
            id: category.id,
            name: category.name.clone(),
            custom_order: category.custom_order,
            depth: None,
            parent: None,
            children: None,
            deleted_at: category.deleted_at,
        }
    }

    pub fn tree(tree: &Tree<Category>) -> Self {
        Self {
            children: Some(tree.children.iter().map(Self::tree).collect()),
            ..Self::base(&tree.node)
        }
    }

    pub fn list(item: &FlatNode<Category>) -> Self {
        Self {
            depth: Some(item.depth),
            parent: item.parent.map(|id| CategoryParentView {
                id,
                name: String::new(),
            }),
            ..Self::base(&item.node)
        }
    }

    pub fn detail(category: &Category, parent: Option<&Category>) -> Self {
        Self {
            parent: parent.map(|parent| CategoryParentView {
                id: parent.id,
                name: parent.name.clone(),
            }),
            ..Self::base(category)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentView {
    pub id: EntityId,
    pub body: String,
    pub post_id: EntityId,
    pub created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<CommentView>>,
}

impl CommentView {
    fn base(comment: &Comment) -> Self {
        Self {
            id: comment.id,
            body: comment.body.clone(),
            post_id: comment.post_id,
            created_at: comment.created_at,
            depth: None,
            parent_id: None,
            children: None,
        }
    }

    pub fn tree(tree: &Tree<Comment>) -> Self {
        Self {
            children: Some(tree.children.iter().map(Self::tree).collect()),
            ..Self::base(&tree.node)
        }
    }

    pub fn list(item: &FlatNode<Comment>) -> Self {
        Self {
            depth: Some(item.depth),
            parent_id: item.parent,
            ..Self::base(&item.node)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CategoryView;
    use crate::model::category::Category;
    use crate::model::tree::{to_flat_trees, Tree};
    use uuid::Uuid;

    fn category(name: &str, parent: Option<&Category>) -> Category {
        let id = Uuid::new_v4();
        Category {
            id,
            name: name.to_string(),
            custom_order: 0,
            parent_id: parent.map(|parent| parent.id),
            mpath: format!("{}{id}.", parent.map_or("", |parent| parent.mpath.as_str())),
            deleted_at: None,
        }
    }

    #[test]
    fn tree_view_nests_and_list_view_flattens() {
        let root = category("root", None);
        let child = category("child", Some(&root));
        let tree = Tree {
            node: root.clone(),
            children: vec![Tree::leaf(child.clone())],
        };

        let nested = serde_json::to_value(CategoryView::tree(&tree)).unwrap();
        assert_eq!(nested["children"][0]["name"], "child");
        assert!(nested.get("depth").is_none());

        let flat = to_flat_trees(vec![tree]);
        let listed = serde_json::to_value(CategoryView::list(&flat[1])).unwrap();
        assert_eq!(listed["depth"], 1);
        assert_eq!(listed["parent"]["id"], root.id.to_string());
        assert!(listed.get("children").is_none());
    }
}
