use quillpress_core::config::factories::{ContentConfig, SearchType};
use quillpress_core::db::open_db_in_memory;
use quillpress_core::model::{
    CreateCategory, CreatePost, CreateTag, EntityId, Post, PostOrderType, SelectTrashMode,
    UpdatePost, UpdateTag,
};
use quillpress_core::service::{
    CategoryService, PaginateOptions, PostListOptions, PostService, PostServiceOptions, TagService,
};
use quillpress_core::{DataService, ServiceError};
use rusqlite::Connection;
use uuid::Uuid;

fn like_posts(conn: &Connection) -> PostService<'_> {
    PostService::new(
        conn,
        PostServiceOptions {
            content: ContentConfig {
                search_type: SearchType::Like,
                html_enabled: false,
            },
            ..PostServiceOptions::default()
        },
    )
}

fn titles(posts: &[Post]) -> Vec<&str> {
    posts.iter().map(|post| post.title.as_str()).collect()
}

fn page_of(service: &PostService<'_>, options: &PostListOptions) -> Vec<Post> {
    service
        .paginate_posts(options, PaginateOptions::new(1, 50))
        .unwrap()
        .items
}

#[test]
fn tag_names_are_unique() {
    let conn = open_db_in_memory().unwrap();
    let tags = TagService::new(&conn);

    let rust = tags.create(CreateTag::new("rust")).unwrap();
    assert!(matches!(
        tags.create(CreateTag::new("Rust")),
        Err(ServiceError::Conflict(_))
    ));

    let other = tags.create(CreateTag::new("sqlite")).unwrap();
    let mut rename = UpdateTag::new(other.id);
    rename.name = Some("rust".to_string());
    assert!(matches!(tags.update(rename), Err(ServiceError::Conflict(_))));

    // Renaming to its own name is not a conflict.
    let mut same = UpdateTag::new(rust.id);
    same.name = Some("rust".to_string());
    same.description = Some(Some("systems language".to_string()));
    let updated = tags.update(same).unwrap();
    assert_eq!(updated.description.as_deref(), Some("systems language"));

    let mut clear = UpdateTag::new(rust.id);
    clear.description = Some(None);
    assert_eq!(tags.update(clear).unwrap().description, None);
}

#[test]
fn tag_post_count_tracks_live_posts() {
    let conn = open_db_in_memory().unwrap();
    let tags = TagService::new(&conn);
    let posts = like_posts(&conn);
    let tag = tags.create(CreateTag::new("rust")).unwrap();

    let mut first = CreatePost::new("First", "one");
    first.tags = vec![tag.id];
    let first = posts.create(first).unwrap();
    let mut second = CreatePost::new("Second", "two");
    second.tags = vec![tag.id];
    posts.create(second).unwrap();

    assert_eq!(tags.detail(tag.id).unwrap().post_count, 2);
    assert_eq!(first.tags.len(), 1);
    assert_eq!(first.tags[0].name, "rust");

    posts.delete(&[first.id], true).unwrap();
    assert_eq!(tags.detail(tag.id).unwrap().post_count, 1);
}

#[test]
fn unknown_tag_or_category_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let posts = like_posts(&conn);

    let mut input = CreatePost::new("Lost", "body");
    input.tags = vec![Uuid::new_v4()];
    assert!(matches!(posts.create(input), Err(ServiceError::NotFound { .. })));

    let mut input = CreatePost::new("Lost", "body");
    input.category = Some(Uuid::new_v4());
    assert!(matches!(posts.create(input), Err(ServiceError::NotFound { .. })));
}

#[test]
fn summary_is_derived_from_body_when_missing() {
    let conn = open_db_in_memory().unwrap();
    let posts = like_posts(&conn);

    let post = posts
        .create(CreatePost::new(
            "Markdown",
            "# Hello *world*\n\n![cover](cover.png) See [the docs](https://example.com).",
        ))
        .unwrap();
    assert_eq!(post.summary, "Hello world See the docs.");

    let mut explicit = CreatePost::new("Explicit", "body text");
    explicit.summary = Some("  hand written  ".to_string());
    assert_eq!(posts.create(explicit).unwrap().summary, "hand written");

    let mut rederive = UpdatePost::new(post.id);
    rederive.body = Some("**New** body".to_string());
    rederive.summary = Some(None);
    assert_eq!(posts.update(rederive).unwrap().summary, "New body");

    let long_body = "word ".repeat(100);
    let long = posts.create(CreatePost::new("Long", long_body)).unwrap();
    assert_eq!(long.summary.chars().count(), 120);
}

#[test]
fn category_filter_includes_descendants() {
    let conn = open_db_in_memory().unwrap();
    let categories = CategoryService::new(&conn);
    let posts = like_posts(&conn);

    let tech = categories.create(CreateCategory::new("Tech")).unwrap();
    let rust = categories.create(CreateCategory::new("Rust").under(tech.id)).unwrap();
    let life = categories.create(CreateCategory::new("Life")).unwrap();

    let in_category = |title: &str, category: EntityId| {
        let mut input = CreatePost::new(title, "body");
        input.category = Some(category);
        posts.create(input).unwrap()
    };
    let tech_post = in_category("tech post", tech.id);
    in_category("rust post", rust.id);
    in_category("life post", life.id);

    let options = PostListOptions {
        category: Some(tech.id),
        order_by: Some(PostOrderType::Created),
        ..PostListOptions::default()
    };
    assert_eq!(titles(&page_of(&posts, &options)), vec!["rust post", "tech post"]);
    assert_eq!(tech_post.category.as_ref().map(|c| c.id), Some(tech.id));

    let options = PostListOptions {
        category: Some(rust.id),
        ..PostListOptions::default()
    };
    assert_eq!(titles(&page_of(&posts, &options)), vec!["rust post"]);
}

#[test]
fn tag_and_publish_filters_combine() {
    let conn = open_db_in_memory().unwrap();
    let tags = TagService::new(&conn);
    let posts = like_posts(&conn);
    let tag = tags.create(CreateTag::new("rust")).unwrap();

    let mut published = CreatePost::new("published tagged", "body");
    published.tags = vec![tag.id];
    published.publish = true;
    posts.create(published).unwrap();

    let mut draft = CreatePost::new("draft tagged", "body");
    draft.tags = vec![tag.id];
    posts.create(draft).unwrap();

    posts.create(CreatePost::new("untagged", "body")).unwrap();

    let tagged = PostListOptions {
        tag: Some(tag.id),
        order_by: Some(PostOrderType::Created),
        ..PostListOptions::default()
    };
    assert_eq!(titles(&page_of(&posts, &tagged)), vec!["draft tagged", "published tagged"]);

    let published_only = PostListOptions {
        is_published: Some(true),
        ..tagged.clone()
    };
    assert_eq!(titles(&page_of(&posts, &published_only)), vec!["published tagged"]);

    let drafts = PostListOptions {
        is_published: Some(false),
        ..PostListOptions::default()
    };
    assert_eq!(page_of(&posts, &drafts).len(), 2);
}

#[test]
fn custom_order_sorts_descending() {
    let conn = open_db_in_memory().unwrap();
    let posts = like_posts(&conn);
    for (title, order) in [("low", 1), ("high", 3), ("mid", 2)] {
        let mut input = CreatePost::new(title, "body");
        input.custom_order = order;
        posts.create(input).unwrap();
    }

    let options = PostListOptions {
        order_by: Some(PostOrderType::Custom),
        ..PostListOptions::default()
    };
    assert_eq!(titles(&page_of(&posts, &options)), vec!["high", "mid", "low"]);
}

#[test]
fn like_search_matches_columns_and_escapes_wildcards() {
    let conn = open_db_in_memory().unwrap();
    let posts = like_posts(&conn);

    posts.create(CreatePost::new("Borrow checker", "lifetimes")).unwrap();
    let mut keyword = CreatePost::new("Unrelated", "nothing");
    keyword.keywords = vec!["borrow".to_string()];
    posts.create(keyword).unwrap();
    posts.create(CreatePost::new("Discount", "50% off")).unwrap();
    posts.create(CreatePost::new("Plain", "5000 off")).unwrap();

    let search = |text: &str| {
        let options = PostListOptions {
            search: Some(text.to_string()),
            order_by: Some(PostOrderType::Created),
            ..PostListOptions::default()
        };
        page_of(&posts, &options)
    };

    assert_eq!(titles(&search("borrow")), vec!["Unrelated", "Borrow checker"]);
    assert_eq!(titles(&search("50%")), vec!["Discount"]);
    assert_eq!(search("   ").len(), 4);
}

#[test]
fn trashed_posts_are_listed_on_request() {
    let conn = open_db_in_memory().unwrap();
    let posts = like_posts(&conn);
    let kept = posts.create(CreatePost::new("kept", "body")).unwrap();
    let trashed = posts.create(CreatePost::new("trashed", "body")).unwrap();
    posts.delete(&[trashed.id], true).unwrap();

    let live = page_of(&posts, &PostListOptions::default());
    assert_eq!(titles(&live), vec!["kept"]);

    let only = PostListOptions {
        trashed: SelectTrashMode::Only,
        ..PostListOptions::default()
    };
    assert_eq!(titles(&page_of(&posts, &only)), vec!["trashed"]);

    let restored = posts.restore(&[trashed.id, kept.id]).unwrap();
    assert_eq!(restored.len(), 1);
    assert_eq!(page_of(&posts, &PostListOptions::default()).len(), 2);
}

#[test]
fn post_pages_report_totals() {
    let conn = open_db_in_memory().unwrap();
    let posts = like_posts(&conn);
    for index in 0..5 {
        posts.create(CreatePost::new(format!("post {index}"), "body")).unwrap();
    }

    let page = posts
        .paginate_posts(&PostListOptions::default(), PaginateOptions::new(2, 2))
        .unwrap();
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.meta.total_items, 5);
    assert_eq!(page.meta.total_pages, 3);
    assert_eq!(page.meta.current_page, 2);
}
