//! Bulk Collection Tests
//!
//! Tests for full and range collection: truncation, degree cutoff, bad link
//! pruning and fetch deduplication.

#[cfg(test)]
mod graph_collector_tests {
    use anyhow::Result;
    use notegraph_core::config::SyncConfig;
    use notegraph_core::db::InMemoryNoteStore;
    use notegraph_core::models::{Note, RawNote};
    use notegraph_core::services::{GraphCollector, NoteClient};
    use std::sync::Arc;

    fn collector(store: &Arc<InMemoryNoteStore>) -> GraphCollector {
        let client = Arc::new(NoteClient::new(store.clone()).with_page_size(2));
        GraphCollector::new(client, &SyncConfig::default())
    }

    /// Body linking to every id in `targets`
    fn links_to(targets: &[&str]) -> String {
        targets
            .iter()
            .map(|id| format!("[{id}](:/{id})"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn targets(note: &Note) -> Vec<&str> {
        note.links.iter().map(|l| l.note_id.as_str()).collect()
    }

    /// Five notes, each linking to all the others
    fn fully_linked_store() -> Arc<InMemoryNoteStore> {
        let store = Arc::new(InMemoryNoteStore::new());
        let ids = ["n1", "n2", "n3", "n4", "n5"];
        for id in ids {
            let others: Vec<&str> = ids.iter().copied().filter(|o| *o != id).collect();
            store.insert_note(RawNote::new(id, id.to_uppercase(), links_to(&others)));
        }
        store
    }

    #[tokio::test]
    async fn test_full_collection_truncates_at_max_notes() -> Result<()> {
        let store = fully_linked_store();

        let cut = collector(&store).collect_all_notes(Some(4)).await?;
        assert!(cut.truncated);
        assert_eq!(cut.notes.len(), 4);
        // pruning is skipped when truncated: links to the uncollected note stay
        assert!(cut.notes.iter().all(|n| n.links.len() == 4));

        let all = collector(&store).collect_all_notes(Some(10)).await?;
        assert!(!all.truncated);
        assert_eq!(all.notes.len(), 5);
        assert!(all.notes.iter().all(|n| n.links.len() == 4));

        Ok(())
    }

    #[tokio::test]
    async fn test_full_collection_prunes_links_to_missing_notes() -> Result<()> {
        let store = Arc::new(InMemoryNoteStore::new());
        store.insert_note(RawNote::new("a", "A", links_to(&["b", "ghost", "a"])));
        store.insert_note(RawNote::new("b", "B", ""));

        let collected = collector(&store).collect_all_notes(None).await?;
        let a = collected.notes.iter().find(|n| n.id == "a").unwrap();
        assert_eq!(targets(a), vec!["b", "a"]);

        Ok(())
    }

    #[tokio::test]
    async fn test_range_collection_stops_at_max_degree() -> Result<()> {
        let store = Arc::new(InMemoryNoteStore::new());
        store.insert_note(RawNote::new("a", "A", links_to(&["b"])));
        store.insert_note(RawNote::new("b", "B", links_to(&["c"])));
        store.insert_note(RawNote::new("c", "C", ""));

        let collected = collector(&store)
            .collect_notes_in_range("a", 1, None)
            .await?;

        let ids: Vec<&str> = collected.notes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(collected.notes[0].degree, Some(0));
        assert_eq!(collected.notes[1].degree, Some(1));
        assert!(collected.notes[0].visit_links);
        assert!(!collected.notes[1].visit_links);
        // out-of-scope links are kept, never pruned
        assert_eq!(targets(&collected.notes[1]), vec!["c"]);
        assert!(!store.fetched_note_ids().contains(&"c".to_string()));
        assert!(!collected.truncated);

        Ok(())
    }

    #[tokio::test]
    async fn test_range_collection_reports_missing_notes() -> Result<()> {
        let store = Arc::new(InMemoryNoteStore::new());
        store.insert_note(RawNote::new("a", "A", links_to(&["ghost", "b"])));
        store.insert_note(RawNote::new("b", "B", ""));

        let collected = collector(&store)
            .collect_notes_in_range("a", 3, None)
            .await?;

        assert_eq!(collected.missing_notes, vec!["ghost".to_string()]);
        assert_eq!(targets(&collected.notes[0]), vec!["b"]);

        Ok(())
    }

    #[tokio::test]
    async fn test_range_collection_fetches_each_note_once() -> Result<()> {
        let store = Arc::new(InMemoryNoteStore::new());
        store.insert_note(RawNote::new("a", "A", links_to(&["b", "c", "b"])));
        store.insert_note(RawNote::new("b", "B", links_to(&["a", "c"])));
        store.insert_note(RawNote::new("c", "C", links_to(&["b", "a"])));

        let collected = collector(&store)
            .collect_notes_in_range("a", 5, None)
            .await?;

        assert_eq!(collected.notes.len(), 3);
        let mut fetched = store.fetched_note_ids();
        fetched.sort();
        assert_eq!(fetched, vec!["a", "b", "c"]);

        Ok(())
    }

    #[tokio::test]
    async fn test_range_collection_truncates_at_max_notes() -> Result<()> {
        let store = Arc::new(InMemoryNoteStore::new());
        store.insert_note(RawNote::new("hub", "Hub", links_to(&["s1", "s2", "s3"])));
        for id in ["s1", "s2", "s3"] {
            store.insert_note(RawNote::new(id, id, ""));
        }

        let collected = collector(&store)
            .collect_notes_in_range("hub", 2, Some(2))
            .await?;

        assert!(collected.truncated);
        assert_eq!(collected.notes.len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_transient_failure_fails_collection() {
        let store = Arc::new(InMemoryNoteStore::new());
        store.insert_note(RawNote::new("a", "A", links_to(&["b"])));
        store.insert_note(RawNote::new("b", "B", ""));
        store.fail_note("b");

        let err = collector(&store)
            .collect_notes_in_range("a", 2, None)
            .await
            .unwrap_err();
        assert!(!err.is_not_found(), "a transient error is not a missing note");
    }

    #[tokio::test]
    async fn test_get_node_maps_note() -> Result<()> {
        let store = Arc::new(InMemoryNoteStore::new());
        store.insert_note(RawNote::new("a", "Alpha", links_to(&["b"])));

        let node = collector(&store).get_node("a").await?;
        assert_eq!(node.label, "Alpha");
        assert_eq!(node.graph_id, "local");
        assert_eq!(node.targets().collect::<Vec<_>>(), vec!["b"]);

        Ok(())
    }
}
