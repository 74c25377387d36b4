use quillpress_core::db::open_db_in_memory;
use quillpress_core::model::{
    Comment, CommentView, CreateComment, CreatePost, Post, Tree, UpdateComment,
};
use quillpress_core::service::{
    CommentService, PaginateOptions, PostService, PostServiceOptions, QueryOptions,
};
use quillpress_core::{DataService, ServiceError};
use rusqlite::Connection;
use uuid::Uuid;

fn post(conn: &Connection, title: &str) -> Post {
    PostService::new(conn, PostServiceOptions::default())
        .create(CreatePost::new(title, format!("{title} body")))
        .unwrap()
}

fn bodies(trees: &[Tree<Comment>]) -> Vec<String> {
    trees.iter().map(|tree| tree.node.body.clone()).collect()
}

#[test]
fn replies_nest_below_their_parent() {
    let conn = open_db_in_memory().unwrap();
    let post = post(&conn, "First");
    let service = CommentService::new(&conn);

    let root = service.create(CreateComment::new(post.id, "root")).unwrap();
    let reply = service
        .create(CreateComment::new(post.id, "reply").reply_to(root.id))
        .unwrap();
    service
        .create(CreateComment::new(post.id, "nested").reply_to(reply.id))
        .unwrap();

    let trees = service.find_trees(Some(post.id)).unwrap();
    assert_eq!(bodies(&trees), vec!["root"]);
    assert_eq!(bodies(&trees[0].children), vec!["reply"]);
    assert_eq!(bodies(&trees[0].children[0].children), vec!["nested"]);
    assert_eq!(reply.mpath, format!("{}{}.", root.mpath, reply.id));
}

#[test]
fn trees_are_scoped_to_one_post() {
    let conn = open_db_in_memory().unwrap();
    let first = post(&conn, "First");
    let second = post(&conn, "Second");
    let service = CommentService::new(&conn);

    service.create(CreateComment::new(first.id, "on first")).unwrap();
    service.create(CreateComment::new(second.id, "on second")).unwrap();

    assert_eq!(bodies(&service.find_trees(Some(first.id)).unwrap()), vec!["on first"]);
    assert_eq!(service.find_trees(None).unwrap().len(), 2);

    let page = service
        .paginate_post(Some(second.id), PaginateOptions::default())
        .unwrap();
    assert_eq!(page.meta.total_items, 1);
    assert_eq!(page.items[0].node.body, "on second");
}

#[test]
fn parent_from_another_post_is_a_conflict() {
    let conn = open_db_in_memory().unwrap();
    let first = post(&conn, "First");
    let second = post(&conn, "Second");
    let service = CommentService::new(&conn);

    let parent = service.create(CreateComment::new(first.id, "parent")).unwrap();
    let result = service.create(CreateComment::new(second.id, "child").reply_to(parent.id));

    match result {
        Err(ServiceError::Conflict(message)) => {
            assert_eq!(message, "Parent comment and child comment must belong same post!")
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn unknown_post_or_parent_is_reported() {
    let conn = open_db_in_memory().unwrap();
    let post = post(&conn, "First");
    let service = CommentService::new(&conn);

    assert!(matches!(
        service.create(CreateComment::new(Uuid::new_v4(), "lost")),
        Err(ServiceError::NotFound { .. })
    ));
    assert!(matches!(
        service.create(CreateComment::new(post.id, "lost").reply_to(Uuid::new_v4())),
        Err(ServiceError::ParentNotFound { .. })
    ));
}

#[test]
fn deleting_comment_moves_replies_up() {
    let conn = open_db_in_memory().unwrap();
    let post = post(&conn, "First");
    let service = CommentService::new(&conn);

    let root = service.create(CreateComment::new(post.id, "root")).unwrap();
    let middle = service
        .create(CreateComment::new(post.id, "middle").reply_to(root.id))
        .unwrap();
    let leaf = service
        .create(CreateComment::new(post.id, "leaf").reply_to(middle.id))
        .unwrap();

    // Comments have no trash; the flag does not keep the row.
    service.delete(&[middle.id], true).unwrap();

    let trees = service.find_trees(Some(post.id)).unwrap();
    assert_eq!(bodies(&trees), vec!["root"]);
    assert_eq!(bodies(&trees[0].children), vec!["leaf"]);
    assert_eq!(service.detail(leaf.id).unwrap().parent_id, Some(root.id));

    let all = service.list(&QueryOptions::default()).unwrap();
    assert_eq!(all.len(), 2);
}

#[test]
fn edits_and_restore_are_refused() {
    let conn = open_db_in_memory().unwrap();
    let post = post(&conn, "First");
    let service = CommentService::new(&conn);
    let comment = service.create(CreateComment::new(post.id, "fixed")).unwrap();

    assert!(matches!(
        service.update(UpdateComment::new(comment.id, "changed")),
        Err(ServiceError::OperationNotSupported { .. })
    ));
    assert!(matches!(
        service.restore(&[comment.id]),
        Err(ServiceError::TrashDisabled { .. })
    ));
    assert_eq!(service.detail(comment.id).unwrap().body, "fixed");
}

#[test]
fn blank_body_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let post = post(&conn, "First");
    let service = CommentService::new(&conn);

    assert!(matches!(
        service.create(CreateComment::new(post.id, "  ")),
        Err(ServiceError::Validation(_))
    ));
}

#[test]
fn views_nest_trees_and_annotate_pages() {
    let conn = open_db_in_memory().unwrap();
    let post = post(&conn, "First");
    let service = CommentService::new(&conn);

    let root = service.create(CreateComment::new(post.id, "root")).unwrap();
    service
        .create(CreateComment::new(post.id, "reply").reply_to(root.id))
        .unwrap();

    let trees = service.find_trees(Some(post.id)).unwrap();
    let tree = serde_json::to_value(CommentView::tree(&trees[0])).unwrap();
    assert_eq!(tree["body"], "root");
    assert_eq!(tree["children"][0]["body"], "reply");
    assert!(tree.get("depth").is_none());

    let page = service
        .paginate_post(Some(post.id), PaginateOptions::default())
        .unwrap();
    let list: Vec<serde_json::Value> = page
        .items
        .iter()
        .map(|item| serde_json::to_value(CommentView::list(item)).unwrap())
        .collect();
    assert_eq!(list[0]["depth"], 0);
    assert!(list[0].get("parent_id").is_none());
    assert_eq!(list[1]["depth"], 1);
    assert_eq!(list[1]["parent_id"], root.id.to_string());
    assert!(list[1].get("children").is_none());
}
