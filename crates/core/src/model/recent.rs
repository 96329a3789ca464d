use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Local-store key holding the recently-viewed list as a JSON array.
pub const RECENTLY_VIEWED_KEY: &str = "bizzy-recently-viewed";

/// Maximum number of entries kept in the recently-viewed list.
pub const RECENTLY_VIEWED_CAP: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewedKind {
    Document,
    Template,
    Section,
    Step,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentlyViewedItem {
    pub id: String,
    pub kind: ViewedKind,
    pub title: String,
    pub path: String,
    pub viewed_at: DateTime<Utc>,
}

/// Most-recent-first list of viewed items, capped at [`RECENTLY_VIEWED_CAP`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecentlyViewed {
    items: VecDeque<RecentlyViewedItem>,
}

impl RecentlyViewed {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts `item` at the front, replacing any entry with the same kind and id.
    pub fn push(&mut self, item: RecentlyViewedItem) {
        self.items
            .retain(|existing| !(existing.kind == item.kind && existing.id == item.id));
        self.items.push_front(item);
        self.items.truncate(RECENTLY_VIEWED_CAP);
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecentlyViewedItem> {
        self.items.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<RecentlyViewedItem> {
        self.items.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn item(id: &str, kind: ViewedKind) -> RecentlyViewedItem {
        RecentlyViewedItem {
            id: id.to_owned(),
            kind,
            title: format!("Item {id}"),
            path: format!("/dashboard/documents/customize/{id}"),
            viewed_at: fixed_now(),
        }
    }

    #[test]
    fn push_moves_repeat_to_front() {
        let mut list = RecentlyViewed::new();
        list.push(item("a", ViewedKind::Document));
        list.push(item("b", ViewedKind::Document));
        list.push(item("a", ViewedKind::Document));

        let ids: Vec<_> = list.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn same_id_different_kind_is_distinct() {
        let mut list = RecentlyViewed::new();
        list.push(item("7", ViewedKind::Section));
        list.push(item("7", ViewedKind::Step));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn list_is_capped() {
        let mut list = RecentlyViewed::new();
        for i in 0..60 {
            list.push(item(&i.to_string(), ViewedKind::Template));
        }
        assert_eq!(list.len(), RECENTLY_VIEWED_CAP);
        assert_eq!(list.iter().next().map(|i| i.id.as_str()), Some("59"));
        assert!(list.iter().all(|i| i.id != "9"));
    }

    #[test]
    fn serializes_as_plain_array() {
        let mut list = RecentlyViewed::new();
        list.push(item("a", ViewedKind::Document));
        let json = serde_json::to_value(&list).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["kind"], "document");
        assert!(json[0].get("viewedAt").is_some());
    }
}
