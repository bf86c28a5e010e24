use std::collections::{HashSet, VecDeque};

/// Ordered set of fresh queries awaiting a fetch.
///
/// Iteration order is insertion order, so the backend's "next retrieval due"
/// ordering is preserved. Duplicates are ignored on insert.
#[derive(Debug, Default)]
pub struct QueryBacklog {
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl QueryBacklog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns `true` if the query was not already queued.
    pub fn insert(&mut self, query: String) -> bool {
        if !self.members.insert(query.clone()) {
            return false;
        }
        self.order.push_back(query);
        true
    }

    /// Inserts every query, returning how many were new.
    pub fn extend<I>(&mut self, queries: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut added = 0;
        for q in queries {
            if self.insert(q) {
                added += 1;
            }
        }
        added
    }

    /// Removes and returns the first query in iteration order.
    pub fn pop_first(&mut self) -> Option<String> {
        let q = self.order.pop_front()?;
        self.members.remove(&q);
        Some(q)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order_and_ignores_duplicates() {
        let mut b = QueryBacklog::new();
        let added = b.extend(["b", "a", "b", "c"].map(String::from));

        assert_eq!(added, 3);
        assert_eq!(b.iter().collect::<Vec<_>>(), vec!["b", "a", "c"]);
    }

    #[test]
    fn pop_first_drains_in_order() {
        let mut b = QueryBacklog::new();
        b.extend(["x", "y"].map(String::from));

        assert_eq!(b.pop_first().as_deref(), Some("x"));
        assert_eq!(b.pop_first().as_deref(), Some("y"));
        assert_eq!(b.pop_first(), None);
        assert!(b.is_empty());
    }

    #[test]
    fn popped_query_can_be_requeued() {
        let mut b = QueryBacklog::new();
        b.insert("q".into());

        assert_eq!(b.pop_first().as_deref(), Some("q"));
        assert_eq!(b.len(), 0);
        assert!(b.insert("q".into()));
    }
}
