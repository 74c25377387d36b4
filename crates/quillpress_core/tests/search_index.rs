use quillpress_core::db::open_db_in_memory;
use quillpress_core::model::{
    CreateCategory, CreateComment, CreatePost, CreateTag, Post, SelectTrashMode, TrashFilter,
    UpdatePost,
};
use quillpress_core::search::{
    DocumentFilter, DocumentIndex, PostDocument, SearchParams, SqliteDocumentIndex,
};
use quillpress_core::service::{
    CategoryService, CommentService, PaginateOptions, PostListOptions, PostService,
    PostServiceOptions, SearchOptions, TagService,
};
use quillpress_core::DataService;
use rusqlite::Connection;
use uuid::Uuid;

fn document(title: &str, body: &str, updated_at: i64) -> PostDocument {
    PostDocument {
        id: Uuid::new_v4(),
        title: title.to_string(),
        body: body.to_string(),
        summary: String::new(),
        keywords: Vec::new(),
        categories: Vec::new(),
        tags: Vec::new(),
        comments: Vec::new(),
        comment_count: 0,
        published_at: None,
        created_at: updated_at,
        updated_at,
        deleted_at: None,
    }
}

fn hit_titles(index: &SqliteDocumentIndex<'_>, text: &str, params: &SearchParams) -> Vec<String> {
    index
        .search(text, params)
        .unwrap()
        .hits
        .into_iter()
        .map(|hit| hit.title)
        .collect()
}

#[test]
fn documents_are_found_by_terms() {
    let conn = open_db_in_memory().unwrap();
    let index = SqliteDocumentIndex::new(&conn, "content");
    index
        .add_documents(&[
            document("Ownership in Rust", "borrowing rules", 1),
            document("SQLite tips", "full text search", 2),
            document("Rust and SQLite", "bundled builds", 3),
        ])
        .unwrap();

    let params = SearchParams::default();
    assert_eq!(
        hit_titles(&index, "rust", &params),
        vec!["Rust and SQLite", "Ownership in Rust"]
    );
    assert_eq!(hit_titles(&index, "rust sqlite", &params), vec!["Rust and SQLite"]);
    assert!(hit_titles(&index, "python", &params).is_empty());

    let everything = index.search("  ", &params).unwrap();
    assert_eq!(everything.estimated_total_hits, 3);
    assert_eq!(everything.hits[0].title, "Rust and SQLite");
}

#[test]
fn hits_are_paged() {
    let conn = open_db_in_memory().unwrap();
    let index = SqliteDocumentIndex::new(&conn, "content");
    let documents: Vec<PostDocument> = (0..5)
        .map(|n| document(&format!("note {n}"), "shared", n))
        .collect();
    index.add_documents(&documents).unwrap();

    let params = SearchParams {
        page: 2,
        limit: 2,
        ..SearchParams::default()
    };
    let result = index.search("shared", &params).unwrap();
    assert_eq!(result.estimated_total_hits, 5);
    assert_eq!(result.page, 2);
    assert_eq!(result.hits_per_page, 2);
    let titles: Vec<&str> = result.hits.iter().map(|hit| hit.title.as_str()).collect();
    assert_eq!(titles, vec!["note 2", "note 1"]);
}

#[test]
fn trash_and_publish_filters_apply() {
    let conn = open_db_in_memory().unwrap();
    let index = SqliteDocumentIndex::new(&conn, "content");
    let live = document("live draft", "rust", 1);
    let mut published = document("live published", "rust", 2);
    published.published_at = Some(2);
    let mut trashed = document("trashed", "rust", 3);
    trashed.deleted_at = Some(3);
    index.add_documents(&[live, published, trashed]).unwrap();

    let with = |trash: TrashFilter, published: Option<bool>| SearchParams {
        filter: DocumentFilter { trash, published },
        ..SearchParams::default()
    };
    assert_eq!(
        hit_titles(&index, "rust", &with(TrashFilter::LIVE, None)),
        vec!["live published", "live draft"]
    );
    assert_eq!(hit_titles(&index, "rust", &with(TrashFilter::ONLY, None)), vec!["trashed"]);
    assert_eq!(hit_titles(&index, "rust", &with(TrashFilter::ALL, None)).len(), 3);
    assert_eq!(
        hit_titles(&index, "rust", &with(TrashFilter::LIVE, Some(true))),
        vec!["live published"]
    );
    assert_eq!(
        hit_titles(&index, "rust", &with(TrashFilter::LIVE, Some(false))),
        vec!["live draft"]
    );
}

#[test]
fn update_replaces_text_and_delete_removes() {
    let conn = open_db_in_memory().unwrap();
    let index = SqliteDocumentIndex::new(&conn, "content");
    let mut doc = document("before", "old words", 1);
    index.add_documents(std::slice::from_ref(&doc)).unwrap();

    doc.title = "after".to_string();
    doc.body = "new words".to_string();
    assert_eq!(index.update_documents(std::slice::from_ref(&doc)).unwrap(), 1);

    let params = SearchParams::default();
    assert!(hit_titles(&index, "old", &params).is_empty());
    assert_eq!(hit_titles(&index, "new", &params), vec!["after"]);
    assert_eq!(index.search("", &params).unwrap().estimated_total_hits, 1);

    assert_eq!(index.delete_documents(&[doc.id, Uuid::new_v4()]).unwrap(), 1);
    assert!(hit_titles(&index, "new", &params).is_empty());
}

#[test]
fn indexes_are_isolated_by_name() {
    let conn = open_db_in_memory().unwrap();
    let first = SqliteDocumentIndex::new(&conn, "first");
    let second = SqliteDocumentIndex::new(&conn, "second");
    first.add_documents(&[document("only here", "rust", 1)]).unwrap();

    let params = SearchParams::default();
    assert_eq!(hit_titles(&first, "rust", &params), vec!["only here"]);
    assert!(hit_titles(&second, "rust", &params).is_empty());
}

#[test]
fn quotes_in_queries_are_literal() {
    let conn = open_db_in_memory().unwrap();
    let index = SqliteDocumentIndex::new(&conn, "content");
    index.add_documents(&[document("operators", "AND OR NOT", 1)]).unwrap();

    // FTS operators and stray quotes are matched as plain terms.
    let params = SearchParams::default();
    assert_eq!(hit_titles(&index, "NOT", &params), vec!["operators"]);
    assert!(index.search("\"unterminated", &params).is_ok());
}

fn indexed_posts(conn: &Connection) -> PostService<'_> {
    PostService::new(conn, PostServiceOptions::default())
}

fn search_titles(posts: &PostService<'_>, text: &str, trashed: SelectTrashMode) -> Vec<String> {
    posts
        .search_service()
        .unwrap()
        .search(
            text,
            &SearchOptions {
                trashed,
                ..SearchOptions::default()
            },
        )
        .unwrap()
        .items
        .into_iter()
        .map(|document| document.title)
        .collect()
}

#[test]
fn post_documents_carry_category_chain_and_tags() {
    let conn = open_db_in_memory().unwrap();
    let categories = CategoryService::new(&conn);
    let tags = TagService::new(&conn);
    let posts = indexed_posts(&conn);

    let tech = categories.create(CreateCategory::new("Technology")).unwrap();
    let langs = categories.create(CreateCategory::new("Languages").under(tech.id)).unwrap();
    let tag = tags.create(CreateTag::new("ferris")).unwrap();

    let mut input = CreatePost::new("Traits", "generic code");
    input.category = Some(langs.id);
    input.tags = vec![tag.id];
    let post = posts.create(input).unwrap();

    let document = posts.search_service().unwrap().build_document(&post).unwrap();
    let chain: Vec<&str> = document.categories.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(chain, vec!["Technology", "Languages"]);
    assert_eq!(document.tags[0].name, "ferris");

    let live = SelectTrashMode::None;
    assert_eq!(search_titles(&posts, "technology", live), vec!["Traits"]);
    assert_eq!(search_titles(&posts, "ferris", live), vec!["Traits"]);
}

#[test]
fn post_writes_keep_index_in_step() {
    let conn = open_db_in_memory().unwrap();
    let posts = indexed_posts(&conn);
    let live = SelectTrashMode::None;

    let post = posts.create(CreatePost::new("Lifetimes", "elision rules")).unwrap();
    assert_eq!(search_titles(&posts, "elision", live), vec!["Lifetimes"]);

    let mut update = UpdatePost::new(post.id);
    update.title = Some("Borrowing".to_string());
    posts.update(update).unwrap();
    assert!(search_titles(&posts, "lifetimes", live).is_empty());
    assert_eq!(search_titles(&posts, "borrowing", live), vec!["Borrowing"]);

    posts.delete(&[post.id], true).unwrap();
    assert!(search_titles(&posts, "borrowing", live).is_empty());
    assert_eq!(
        search_titles(&posts, "borrowing", SelectTrashMode::Only),
        vec!["Borrowing"]
    );

    posts.restore(&[post.id]).unwrap();
    assert_eq!(search_titles(&posts, "borrowing", live), vec!["Borrowing"]);

    posts.delete(&[post.id], false).unwrap();
    assert!(search_titles(&posts, "borrowing", SelectTrashMode::All).is_empty());
}

#[test]
fn reindex_picks_up_comments() {
    let conn = open_db_in_memory().unwrap();
    let posts = indexed_posts(&conn);
    let comments = CommentService::new(&conn);
    let post = posts.create(CreatePost::new("Macros", "declarative")).unwrap();

    comments
        .create(CreateComment::new(post.id, "hygiene matters"))
        .unwrap();
    assert!(search_titles(&posts, "hygiene", SelectTrashMode::None).is_empty());

    assert_eq!(posts.reindex(&[post.id]).unwrap(), 1);
    assert_eq!(search_titles(&posts, "hygiene", SelectTrashMode::None), vec!["Macros"]);

    let document = posts
        .search_service()
        .unwrap()
        .search("hygiene", &SearchOptions::default())
        .unwrap()
        .items
        .remove(0);
    assert_eq!(document.comments.len(), 1);
    assert_eq!(document.comment_count, 1);
}

#[test]
fn post_pages_use_index_hits() {
    let conn = open_db_in_memory().unwrap();
    let posts = indexed_posts(&conn);
    posts.create(CreatePost::new("Async runtimes", "executors")).unwrap();
    posts.create(CreatePost::new("Sync code", "threads")).unwrap();
    posts.create(CreatePost::new("Async traits", "futures")).unwrap();

    let options = PostListOptions {
        search: Some("async".to_string()),
        ..PostListOptions::default()
    };
    let page = posts
        .paginate_posts(&options, PaginateOptions::new(1, 10))
        .unwrap();
    let titles: Vec<&str> = page.items.iter().map(|post: &Post| post.title.as_str()).collect();
    assert_eq!(titles, vec!["Async runtimes", "Async traits"]);
    assert_eq!(page.meta.total_items, 2);
    assert_eq!(page.meta.item_count, 2);
}
