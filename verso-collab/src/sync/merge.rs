use std::collections::HashMap;

use crate::{RehearsalData, SetlistData, SongData};

/// An entity that flows through live collection sync
pub trait SyncEntity: Clone {
    fn entity_id(&self) -> &str;
    fn revision(&self) -> u64;
    /// The client-side order snapshots are delivered in
    fn sort_snapshot(items: &mut Vec<Self>);
}

impl SyncEntity for SongData {
    fn entity_id(&self) -> &str {
        &self.id
    }

    fn revision(&self) -> u64 {
        self.revision
    }

    fn sort_snapshot(items: &mut Vec<Self>) {
        items.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
    }
}

impl SyncEntity for SetlistData {
    fn entity_id(&self) -> &str {
        &self.id
    }

    fn revision(&self) -> u64 {
        self.revision
    }

    fn sort_snapshot(items: &mut Vec<Self>) {
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    }
}

impl SyncEntity for RehearsalData {
    fn entity_id(&self) -> &str {
        &self.id
    }

    fn revision(&self) -> u64 {
        self.revision
    }

    fn sort_snapshot(items: &mut Vec<Self>) {
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    }
}

/// Which of the two scoping predicates a snapshot came from.
///
/// Entities created before shared workspaces existed carry only an owner
/// id; newer ones carry a workspace id. The store's query language can't
/// OR the two reliably, so each predicate runs as its own subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPredicate {
    ByOwner,
    ByWorkspace,
}

struct Overlay<T> {
    /// The optimistic state, or None for an optimistic delete
    entity: Option<T>,
    /// The revision the store assigned once the write committed
    committed_revision: Option<u64>,
}

/// Unions the two predicate subscriptions into one consistent snapshot.
///
/// When both predicates hold the same entity, the higher revision wins, so
/// a stale snapshot arriving late on one stream can never revert a field
/// to an older value. Optimistic writes sit in an overlay on top of the
/// union until the store's own snapshots catch up, and roll back cleanly
/// when a write fails.
pub struct DualQueryMerge<T> {
    by_owner: HashMap<String, T>,
    by_workspace: HashMap<String, T>,
    overlay: HashMap<String, Overlay<T>>,
}

impl<T: SyncEntity> DualQueryMerge<T> {
    pub fn new() -> Self {
        Self {
            by_owner: HashMap::new(),
            by_workspace: HashMap::new(),
            overlay: HashMap::new(),
        }
    }

    /// Replaces one predicate's full result set and returns the new merged
    /// snapshot
    pub fn apply_snapshot(&mut self, predicate: QueryPredicate, items: Vec<T>) -> Vec<T> {
        let map = match predicate {
            QueryPredicate::ByOwner => &mut self.by_owner,
            QueryPredicate::ByWorkspace => &mut self.by_workspace,
        };

        *map = items
            .into_iter()
            .map(|e| (e.entity_id().to_string(), e))
            .collect();

        self.merged()
    }

    /// Applies an optimistic save ahead of store acknowledgement
    pub fn apply_local(&mut self, entity: T) -> Vec<T> {
        self.overlay.insert(
            entity.entity_id().to_string(),
            Overlay {
                entity: Some(entity),
                committed_revision: None,
            },
        );

        self.merged()
    }

    /// Applies an optimistic delete ahead of store acknowledgement
    pub fn apply_local_delete(&mut self, entity_id: &str) -> Vec<T> {
        self.overlay.insert(
            entity_id.to_string(),
            Overlay {
                entity: None,
                committed_revision: None,
            },
        );

        self.merged()
    }

    /// Records the revision the store assigned to a committed write. The
    /// overlay entry is dropped once a query snapshot reaches it.
    pub fn mark_committed(&mut self, entity_id: &str, revision: u64) -> Vec<T> {
        if let Some(overlay) = self.overlay.get_mut(entity_id) {
            overlay.committed_revision = Some(revision);
        }

        self.merged()
    }

    /// Rolls a failed optimistic write back to the last store state
    pub fn rollback(&mut self, entity_id: &str) -> Vec<T> {
        self.overlay.remove(entity_id);
        self.merged()
    }

    fn union(&self) -> HashMap<String, T> {
        let mut union: HashMap<String, T> = self.by_owner.clone();

        for (id, entity) in &self.by_workspace {
            match union.get(id) {
                Some(existing) if existing.revision() >= entity.revision() => {}
                _ => {
                    union.insert(id.clone(), entity.clone());
                }
            }
        }

        union
    }

    fn merged(&mut self) -> Vec<T> {
        let union = self.union();

        // Drop overlay entries the store snapshots have caught up with
        self.overlay.retain(|id, overlay| match &overlay.entity {
            Some(optimistic) => {
                let threshold = overlay
                    .committed_revision
                    .unwrap_or_else(|| optimistic.revision() + 1);

                union.get(id).map_or(true, |u| u.revision() < threshold)
            }
            None => union.contains_key(id),
        });

        let mut union = union;

        for (id, overlay) in &self.overlay {
            match &overlay.entity {
                Some(entity) => {
                    union.insert(id.clone(), entity.clone());
                }
                None => {
                    union.remove(id);
                }
            }
        }

        let mut items: Vec<T> = union.into_values().collect();
        T::sort_snapshot(&mut items);

        items
    }
}

impl<T: SyncEntity> Default for DualQueryMerge<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn song(id: &str, title: &str, revision: u64) -> SongData {
        SongData {
            id: id.to_string(),
            title: title.to_string(),
            artist: String::new(),
            content: String::new(),
            key: None,
            owner_id: None,
            workspace_id: None,
            revision,
        }
    }

    #[test]
    fn test_union_of_both_predicates() {
        let mut merge = DualQueryMerge::new();

        merge.apply_snapshot(QueryPredicate::ByOwner, vec![song("a", "Alive", 1)]);
        let merged = merge.apply_snapshot(QueryPredicate::ByWorkspace, vec![song("b", "Black", 2)]);

        let ids: Vec<_> = merged.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_higher_revision_wins_across_streams() {
        let mut merge = DualQueryMerge::new();

        merge.apply_snapshot(QueryPredicate::ByWorkspace, vec![song("a", "New title", 5)]);
        // A stale snapshot arrives late on the other stream
        let merged = merge.apply_snapshot(QueryPredicate::ByOwner, vec![song("a", "Old title", 3)]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].title, "New title");
    }

    #[test]
    fn test_snapshots_are_sorted() {
        let mut merge = DualQueryMerge::new();

        let merged = merge.apply_snapshot(
            QueryPredicate::ByOwner,
            vec![song("a", "Creep", 1), song("b", "Alive", 2)],
        );

        let titles: Vec<_> = merged.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Alive", "Creep"]);
    }

    #[test]
    fn test_optimistic_save_shows_immediately() {
        let mut merge = DualQueryMerge::new();
        merge.apply_snapshot(QueryPredicate::ByOwner, vec![song("a", "Old title", 3)]);

        let merged = merge.apply_local(song("a", "New title", 3));
        assert_eq!(merged[0].title, "New title");
    }

    #[test]
    fn test_rollback_restores_store_state() {
        let mut merge = DualQueryMerge::new();
        merge.apply_snapshot(QueryPredicate::ByOwner, vec![song("a", "Old title", 3)]);

        merge.apply_local(song("a", "New title", 3));
        let merged = merge.rollback("a");

        assert_eq!(merged[0].title, "Old title");
    }

    #[test]
    fn test_committed_overlay_survives_stale_snapshots() {
        let mut merge = DualQueryMerge::new();
        merge.apply_snapshot(QueryPredicate::ByOwner, vec![song("a", "Old title", 3)]);

        merge.apply_local(song("a", "New title", 3));
        merge.mark_committed("a", 7);

        // A refresh that hasn't seen the write yet must not revert it
        let merged = merge.apply_snapshot(QueryPredicate::ByOwner, vec![song("a", "Old title", 3)]);
        assert_eq!(merged[0].title, "New title");

        // Once the store snapshot reaches the committed revision it takes over
        let merged =
            merge.apply_snapshot(QueryPredicate::ByOwner, vec![song("a", "New title", 7)]);
        assert_eq!(merged[0].title, "New title");
        assert_eq!(merged[0].revision, 7);
    }

    #[test]
    fn test_optimistic_delete_hides_entity() {
        let mut merge = DualQueryMerge::new();
        merge.apply_snapshot(QueryPredicate::ByOwner, vec![song("a", "Alive", 3)]);

        let merged = merge.apply_local_delete("a");
        assert!(merged.is_empty());

        // The overlay clears once the entity is gone from the snapshots too
        let merged = merge.apply_snapshot(QueryPredicate::ByOwner, vec![]);
        assert!(merged.is_empty());
    }
}
