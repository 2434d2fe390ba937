//! Place identity tracking within a job or brand scope.

use std::collections::HashSet;

use gridscout_core::DedupScope;

/// Remembers which `place_id`s have been accepted in the active scope.
///
/// With [`DedupScope::Brand`] the memory is wiped by [`Deduplicator::begin_brand`];
/// with [`DedupScope::Job`] it lives for the whole run.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    scope: DedupScope,
    seen: HashSet<String>,
}

impl Deduplicator {
    #[must_use]
    pub fn new(scope: DedupScope) -> Self {
        Self {
            scope,
            seen: HashSet::new(),
        }
    }

    #[must_use]
    pub fn scope(&self) -> DedupScope {
        self.scope
    }

    /// Marks the start of a new brand's search.
    pub fn begin_brand(&mut self) {
        if self.scope == DedupScope::Brand {
            self.seen.clear();
        }
    }

    /// Returns `true` the first time `place_id` is offered in this scope.
    ///
    /// Blank ids are never accepted.
    pub fn accept(&mut self, place_id: &str) -> bool {
        let id = place_id.trim();
        if id.is_empty() {
            return false;
        }
        self.seen.insert(id.to_owned())
    }

    #[must_use]
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_scope_accepts_each_id_once_in_first_seen_order() {
        let mut dedup = Deduplicator::new(DedupScope::Job);
        let ids = ["a", "b", "a", "c", "b", "a", "d"];
        let accepted: Vec<&str> = ids.iter().copied().filter(|id| dedup.accept(id)).collect();
        assert_eq!(accepted, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn job_scope_survives_brand_boundaries() {
        let mut dedup = Deduplicator::new(DedupScope::Job);
        dedup.begin_brand();
        assert!(dedup.accept("place-1"));
        dedup.begin_brand();
        assert!(!dedup.accept("place-1"));
    }

    #[test]
    fn brand_scope_allows_one_acceptance_per_brand() {
        let mut dedup = Deduplicator::new(DedupScope::Brand);
        dedup.begin_brand();
        assert!(dedup.accept("place-1"));
        assert!(!dedup.accept("place-1"));
        dedup.begin_brand();
        assert!(dedup.accept("place-1"));
        assert!(!dedup.accept("place-1"));
    }

    #[test]
    fn blank_ids_are_never_accepted() {
        let mut dedup = Deduplicator::new(DedupScope::Job);
        assert!(!dedup.accept(""));
        assert!(!dedup.accept("   "));
        assert_eq!(dedup.seen_count(), 0);
    }

    #[test]
    fn surrounding_whitespace_does_not_create_new_identity() {
        let mut dedup = Deduplicator::new(DedupScope::Job);
        assert!(dedup.accept("abc"));
        assert!(!dedup.accept(" abc "));
    }
}
