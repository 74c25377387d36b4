//! Post model and summary derivation.
//!
//! # Invariants
//! - `published_at` set means the post is publicly visible once live.
//! - `summary` is always present on stored posts; it is derived from the body
//!   when the author leaves it empty.

use super::category::Category;
use super::entity::{Entity, EntityId, Timestamp};
use super::tag::Tag;
use super::validation::{ValidationResult, Validator};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const POST_TITLE_MAX_CHARS: usize = 255;
pub const POST_SUMMARY_MAX_CHARS: usize = 500;
pub const POST_KEYWORD_MAX_CHARS: usize = 20;
/// Length of summaries derived from the body.
pub const DERIVED_SUMMARY_CHARS: usize = 120;

static MARKDOWN_IMAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[[^\]]*]\(([^)]+)\)").expect("valid image regex"));
static MARKDOWN_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("valid link regex"));
static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid html regex"));
static MARKDOWN_SYMBOL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\*_`#>~\-\[\]\(\)!|]+"#).expect("valid markdown symbol regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: EntityId,
    pub title: String,
    /// Markdown (or HTML when `content.html_enabled`).
    pub body: String,
    pub summary: String,
    pub keywords: Vec<String>,
    pub custom_order: i64,
    pub category_id: Option<EntityId>,
    pub category: Option<Category>,
    pub tags: Vec<Tag>,
    /// Live comments on this post.
    pub comment_count: i64,
    pub published_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl Entity for Post {
    const LABEL: &'static str = "post";

    fn id(&self) -> EntityId {
        self.id
    }

    fn deleted_at(&self) -> Option<Timestamp> {
        self.deleted_at
    }
}

impl Post {
    pub fn is_published(&self) -> bool {
        self.published_at.is_some()
    }
}

/// Sort order for post listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostOrderType {
    #[default]
    Created,
    Updated,
    Published,
    CommentCount,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePost {
    pub title: String,
    pub body: String,
    pub summary: Option<String>,
    pub keywords: Vec<String>,
    pub custom_order: i64,
    pub category: Option<EntityId>,
    pub tags: Vec<EntityId>,
    pub publish: bool,
}

impl CreatePost {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            summary: None,
            keywords: Vec::new(),
            custom_order: 0,
            category: None,
            tags: Vec::new(),
            publish: false,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        let mut validator = Validator::new();
        validator
            .not_blank("title", &self.title)
            .max_chars("title", &self.title, POST_TITLE_MAX_CHARS)
            .not_blank("body", &self.body)
            .each_max_chars("keywords", &self.keywords, POST_KEYWORD_MAX_CHARS)
            .min_value("custom_order", self.custom_order, 0);
        if let Some(summary) = &self.summary {
            validator.max_chars("summary", summary, POST_SUMMARY_MAX_CHARS);
        }
        validator.finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePost {
    pub id: EntityId,
    pub title: Option<String>,
    pub body: Option<String>,
    /// `Some(None)` re-derives the summary from the body.
    pub summary: Option<Option<String>>,
    pub keywords: Option<Vec<String>>,
    pub custom_order: Option<i64>,
    /// `Some(None)` detaches the post from its category.
    pub category: Option<Option<EntityId>>,
    /// Replaces the whole tag set.
    pub tags: Option<Vec<EntityId>>,
    /// `Some(true)` publishes now unless already published, `Some(false)`
    /// unpublishes.
    pub publish: Option<bool>,
}

impl UpdatePost {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            title: None,
            body: None,
            summary: None,
            keywords: None,
            custom_order: None,
            category: None,
            tags: None,
            publish: None,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        let mut validator = Validator::new();
        if let Some(title) = &self.title {
            validator
                .not_blank("title", title)
                .max_chars("title", title, POST_TITLE_MAX_CHARS);
        }
        if let Some(body) = &self.body {
            validator.not_blank("body", body);
        }
        if let Some(Some(summary)) = &self.summary {
            validator.max_chars("summary", summary, POST_SUMMARY_MAX_CHARS);
        }
        if let Some(keywords) = &self.keywords {
            validator.each_max_chars("keywords", keywords, POST_KEYWORD_MAX_CHARS);
        }
        if let Some(custom_order) = self.custom_order {
            validator.min_value("custom_order", custom_order, 0);
        }
        validator.finish()
    }
}

/// Plain-text summary of a markdown or HTML body.
///
/// Images and tags are dropped, links keep their label, markdown symbols and
/// repeated whitespace collapse to single spaces.
pub fn derive_summary(body: &str, max_chars: usize) -> String {
    let without_images = MARKDOWN_IMAGE_RE.replace_all(body, " ");
    let without_links = MARKDOWN_LINK_RE.replace_all(&without_images, "$1");
    let without_tags = HTML_TAG_RE.replace_all(&without_links, " ");
    let without_symbols = MARKDOWN_SYMBOL_RE.replace_all(&without_tags, " ");
    let normalized = WHITESPACE_RE.replace_all(&without_symbols, " ");
    normalized.trim().chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::{derive_summary, CreatePost};

    #[test]
    fn summary_strips_markdown_and_html() {
        let summary = derive_summary(
            "# Title\n\n![cover](a.png) see [docs](https://example.com) <b>now</b>",
            120,
        );
        assert_eq!(summary, "Title see docs now");
    }

    #[test]
    fn summary_is_truncated_by_chars() {
        assert_eq!(derive_summary("abcdef", 3), "abc");
    }

    #[test]
    fn long_keyword_is_rejected() {
        let mut input = CreatePost::new("title", "body");
        input.keywords = vec!["k".repeat(21)];
        let err = input.validate().unwrap_err();
        assert!(err.has_field("keywords"));
    }
}
