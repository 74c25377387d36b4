//! Shared entity contracts and soft-delete selection.
//!
//! # Invariants
//! - `deleted_at` set means the row is in the trash.
//! - `TrashFilter::only_trashed` implies `with_trashed`.

use uuid::Uuid;

/// Stable identifier of every content row.
pub type EntityId = Uuid;

/// Unix epoch milliseconds.
pub type Timestamp = i64;

pub trait Entity: Clone {
    /// Human-readable entity name used in errors and log events.
    const LABEL: &'static str;

    fn id(&self) -> EntityId;

    fn deleted_at(&self) -> Option<Timestamp>;

    fn is_trashed(&self) -> bool {
        self.deleted_at().is_some()
    }
}

/// Entity stored in a materialized-path tree.
pub trait TreeEntity: Entity {
    fn parent_id(&self) -> Option<EntityId>;

    fn set_parent_id(&mut self, parent_id: Option<EntityId>);

    /// Dot-joined ancestor chain ending with the node id and a trailing dot.
    fn mpath(&self) -> &str;
}

/// Trash selection accepted by list/paginate queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectTrashMode {
    /// Live rows only.
    #[default]
    None,
    /// Live and trashed rows.
    All,
    /// Trashed rows only.
    Only,
}

/// Normalized row filter derived from [`SelectTrashMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrashFilter {
    pub with_trashed: bool,
    pub only_trashed: bool,
}

impl TrashFilter {
    pub const LIVE: Self = Self {
        with_trashed: false,
        only_trashed: false,
    };
    pub const ALL: Self = Self {
        with_trashed: true,
        only_trashed: false,
    };
    pub const ONLY: Self = Self {
        with_trashed: true,
        only_trashed: true,
    };

    /// Builds a filter; `only_trashed` forces `with_trashed`.
    pub fn new(with_trashed: bool, only_trashed: bool) -> Self {
        Self {
            with_trashed: with_trashed || only_trashed,
            only_trashed,
        }
    }

    /// Maps a query mode; services without trash support always see live rows.
    pub fn from_mode(mode: SelectTrashMode, enable_trash: bool) -> Self {
        if !enable_trash {
            return Self::LIVE;
        }
        match mode {
            SelectTrashMode::None => Self::LIVE,
            SelectTrashMode::All => Self::ALL,
            SelectTrashMode::Only => Self::ONLY,
        }
    }

    /// SQL predicate for a `deleted_at` column.
    pub fn sql(self, column: &str) -> Option<String> {
        let normalized = Self::new(self.with_trashed, self.only_trashed);
        if normalized.only_trashed {
            Some(format!("{column} IS NOT NULL"))
        } else if normalized.with_trashed {
            None
        } else {
            Some(format!("{column} IS NULL"))
        }
    }

    pub fn accepts(self, deleted_at: Option<Timestamp>) -> bool {
        let normalized = Self::new(self.with_trashed, self.only_trashed);
        match deleted_at {
            Some(_) => normalized.with_trashed,
            None => !normalized.only_trashed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SelectTrashMode, TrashFilter};

    #[test]
    fn only_trashed_implies_with_trashed() {
        let filter = TrashFilter {
            with_trashed: false,
            only_trashed: true,
        };
        assert_eq!(filter.sql("t.deleted_at").as_deref(), Some("t.deleted_at IS NOT NULL"));
        assert!(filter.accepts(Some(1)));
        assert!(!filter.accepts(None));
        assert_eq!(TrashFilter::new(false, true), TrashFilter::ONLY);
    }

    #[test]
    fn disabled_trash_always_selects_live_rows() {
        assert_eq!(
            TrashFilter::from_mode(SelectTrashMode::Only, false),
            TrashFilter::LIVE
        );
        assert_eq!(
            TrashFilter::from_mode(SelectTrashMode::None, true),
            TrashFilter::LIVE
        );
        assert_eq!(TrashFilter::from_mode(SelectTrashMode::All, true).sql("d"), None);
    }
}
