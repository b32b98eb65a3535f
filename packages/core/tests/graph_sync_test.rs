//! Incremental Sync Tests
//!
//! Tests for the polling sync engine: diff publication, cursor rollback on
//! failure, empty cycles, open-note update suppression and relinking.

#[cfg(test)]
mod graph_sync_tests {
    use anyhow::Result;
    use notegraph_core::config::SyncConfig;
    use notegraph_core::db::InMemoryNoteStore;
    use notegraph_core::models::{Graph, GraphUpdate, PluginMessage, RawNote};
    use notegraph_core::services::{GraphSyncService, NoteClient, NotificationChannel};
    use std::sync::Arc;
    use tokio::sync::RwLock;
    use tokio::time::{timeout, Duration};

    struct Harness {
        store: Arc<InMemoryNoteStore>,
        graph: Arc<RwLock<Graph>>,
        channel: Arc<NotificationChannel<PluginMessage>>,
        sync: Arc<GraphSyncService>,
    }

    /// Sync engine without tag tracking, cursor already at the feed head
    async fn harness(config: SyncConfig) -> Result<Harness> {
        let store = Arc::new(InMemoryNoteStore::new());
        let graph = Arc::new(RwLock::new(Graph::new(&config.graph_id)));
        let channel = Arc::new(NotificationChannel::new());
        let sync = Arc::new(GraphSyncService::new(
            Arc::new(NoteClient::new(store.clone())),
            graph.clone(),
            channel.clone(),
            &SyncConfig {
                track_tags: false,
                ..config
            },
        ));
        assert_eq!(sync.poll_once().await?, None);
        Ok(Harness {
            store,
            graph,
            channel,
            sync,
        })
    }

    async fn next_update(channel: &NotificationChannel<PluginMessage>) -> Result<GraphUpdate> {
        let message = timeout(Duration::from_secs(1), channel.accept())
            .await
            .expect("Update should be published within 1 second")?;
        match message {
            PluginMessage::PartialUpdate(update) => Ok(update),
            other => panic!("Expected PartialUpdate, got {:?}", other),
        }
    }

    fn ids(nodes: &[notegraph_core::models::Node]) -> Vec<&str> {
        nodes.iter().map(|n| n.id.as_str()).collect()
    }

    async fn until_reads_held(store: &InMemoryNoteStore, count: usize) {
        timeout(Duration::from_secs(1), async {
            while store.held_reads() < count {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("Note reads should be held within 1 second");
    }

    #[tokio::test]
    async fn test_changes_are_published_as_partial_updates() -> Result<()> {
        let h = harness(SyncConfig::default()).await?;

        h.store.insert_note(RawNote::new("a", "A", "[b](:/b)"));
        h.store.insert_note(RawNote::new("b", "B", ""));
        let added = h.sync.poll_once().await?.expect("additions should publish");
        assert_eq!(ids(&added.add), vec!["a", "b"]);
        assert_eq!(added.add[0].targets().collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(next_update(&h.channel).await?, added);

        h.store.update_note(RawNote::new("a", "A2", ""));
        let updated = h.sync.poll_once().await?.expect("update should publish");
        assert_eq!(ids(&updated.update), vec!["a"]);
        assert_eq!(updated.update[0].label, "A2");
        assert!(updated.update[0].rel.is_empty());

        h.store.delete_note("b");
        let deleted = h.sync.poll_once().await?.expect("delete should publish");
        assert_eq!(deleted.delete, vec!["b".to_string()]);
        assert!(!h.graph.read().await.contains("b"));

        Ok(())
    }

    #[tokio::test]
    async fn test_failed_change_fetch_keeps_cursor() -> Result<()> {
        let h = harness(SyncConfig::default()).await?;
        let before = h.sync.cursor().await;

        h.store.insert_note(RawNote::new("a", "A", ""));
        h.store.fail_next_change_fetches(1);
        assert!(h.sync.poll_once().await.is_err());
        assert_eq!(h.sync.cursor().await, before);
        assert_eq!(h.channel.pending_len(), 0);

        let retried = h.sync.poll_once().await?.expect("retry should publish");
        assert_eq!(ids(&retried.add), vec!["a"]);

        Ok(())
    }

    #[tokio::test]
    async fn test_failed_note_fetch_rolls_back_whole_cycle() -> Result<()> {
        let h = harness(SyncConfig::default()).await?;
        let before = h.sync.cursor().await;

        h.store.insert_note(RawNote::new("a", "A", ""));
        h.store.insert_note(RawNote::new("b", "B", ""));
        h.store.fail_note("b");

        assert!(h.sync.poll_once().await.is_err());
        assert_eq!(h.sync.cursor().await, before, "cursor restored");
        assert!(h.graph.read().await.is_empty(), "nothing committed");
        assert_eq!(h.channel.pending_len(), 0, "nothing published");

        h.store.restore_note("b");
        let retried = h.sync.poll_once().await?.expect("retry should publish");
        assert_eq!(ids(&retried.add), vec!["a", "b"]);
        assert_eq!(h.sync.cursor().await, Some(h.store.head()));

        Ok(())
    }

    #[tokio::test]
    async fn test_empty_cycle_publishes_nothing() -> Result<()> {
        let h = harness(SyncConfig::default()).await?;

        assert_eq!(h.sync.poll_once().await?, None);
        assert_eq!(h.sync.poll_once().await?, None);
        assert_eq!(h.channel.pending_len(), 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_unchanged_update_of_open_note_is_suppressed() -> Result<()> {
        let h = harness(SyncConfig::default()).await?;
        h.store.insert_note(RawNote::new("a", "A", "[b](:/b) [x](:/missing)"));
        h.store.insert_note(RawNote::new("b", "B", ""));
        h.sync.poll_once().await?;

        h.sync.set_open_note(Some("a".to_string()));
        h.store.touch_note("a");
        assert_eq!(h.sync.poll_once().await?, None);

        h.store.update_note(RawNote::new("a", "A edited", "[b](:/b)"));
        let edited = h.sync.poll_once().await?.expect("real edit should publish");
        assert_eq!(ids(&edited.update), vec!["a"]);

        // only the open note is compared; other notes always publish
        h.store.touch_note("b");
        let touched = h.sync.poll_once().await?.expect("non-open note should publish");
        assert_eq!(ids(&touched.update), vec!["b"]);

        Ok(())
    }

    #[tokio::test]
    async fn test_edit_above_a_link_of_open_note_is_published() -> Result<()> {
        let h = harness(SyncConfig::default()).await?;
        h.store.insert_note(RawNote::new("a", "A", "[b](:/b)"));
        h.store.insert_note(RawNote::new("b", "B", ""));
        h.sync.poll_once().await?;
        h.sync.set_open_note(Some("a".to_string()));

        // same title and targets, but the link moved down by 7 bytes
        h.store.update_note(RawNote::new("a", "A", "Intro\n\n[b](:/b)"));
        let shifted = h
            .sync
            .poll_once()
            .await?
            .expect("a moved link span is a change to the node");
        assert_eq!(ids(&shifted.update), vec!["a"]);
        let position = shifted.update[0].rel[0].position.expect("note links carry a span");
        assert_eq!(position.start, 7);

        Ok(())
    }

    #[tokio::test]
    async fn test_vanished_note_becomes_delete_or_is_skipped() -> Result<()> {
        let h = harness(SyncConfig::default()).await?;

        h.store.insert_note(RawNote::new("gone", "Gone", ""));
        h.store.delete_note_silently("gone");
        assert_eq!(h.sync.poll_once().await?, None, "never-seen note is skipped");

        h.store.insert_note(RawNote::new("a", "A", ""));
        h.sync.poll_once().await?;
        h.store.touch_note("a");
        h.store.delete_note_silently("a");
        let update = h.sync.poll_once().await?.expect("known note should be deleted");
        assert_eq!(update.delete, vec!["a".to_string()]);
        assert!(h.graph.read().await.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_removed_target_relinks_source() -> Result<()> {
        let h = harness(SyncConfig::default()).await?;
        h.store.insert_note(RawNote::new("a", "A", "[b](:/b)"));
        h.store.insert_note(RawNote::new("b", "B", ""));
        h.sync.poll_once().await?;

        h.store.delete_note("b");
        let removed = h.sync.poll_once().await?.expect("delete should publish");
        assert_eq!(removed.delete, vec!["b".to_string()]);
        assert_eq!(ids(&removed.update), vec!["a"]);
        assert!(removed.update[0].rel.is_empty());

        h.store.insert_note(RawNote::new("b", "B", ""));
        let restored = h.sync.poll_once().await?.expect("re-add should publish");
        assert_eq!(ids(&restored.add), vec!["b"]);
        assert_eq!(ids(&restored.update), vec!["a"]);
        assert_eq!(restored.update[0].targets().collect::<Vec<_>>(), vec!["b"]);

        Ok(())
    }

    #[tokio::test]
    async fn test_timer_polls_until_paused() -> Result<()> {
        let h = harness(SyncConfig {
            poll_interval_ms: 20,
            ..SyncConfig::default()
        })
        .await?;

        h.sync.resume();
        h.store.insert_note(RawNote::new("a", "A", ""));
        let update = next_update(&h.channel).await?;
        assert_eq!(ids(&update.add), vec!["a"]);

        h.sync.pause();
        assert!(!h.sync.is_active());

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_tick_runs_after_pause() -> Result<()> {
        let h = harness(SyncConfig {
            poll_interval_ms: 20,
            ..SyncConfig::default()
        })
        .await?;
        let before = h.store.change_fetch_count();

        h.sync.resume();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.store.change_fetch_count(), before + 2, "ticks at 20ms and 40ms");

        h.sync.pause();
        let paused_at = h.store.change_fetch_count();
        h.store.insert_note(RawNote::new("a", "A", ""));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(h.store.change_fetch_count(), paused_at);
        assert_eq!(h.channel.pending_len(), 0);

        // the record waits for the next cycle
        let update = h.sync.poll_once().await?.expect("record still pending");
        assert_eq!(ids(&update.add), vec!["a"]);

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_twice_runs_one_timer() -> Result<()> {
        let h = harness(SyncConfig {
            poll_interval_ms: 20,
            ..SyncConfig::default()
        })
        .await?;
        let before = h.store.change_fetch_count();

        h.sync.resume();
        h.sync.resume();
        tokio::time::sleep(Duration::from_millis(110)).await;
        assert_eq!(
            h.store.change_fetch_count() - before,
            5,
            "one tick every 20ms from a single timer"
        );

        h.sync.pause();
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_cycles_are_serialized() -> Result<()> {
        let h = harness(SyncConfig::default()).await?;
        h.store.insert_note(RawNote::new("a", "A", ""));
        h.store.clear_fetch_log();
        let fetches = h.store.change_fetch_count();

        h.store.hold_note_reads();
        let first = {
            let sync = h.sync.clone();
            tokio::spawn(async move { sync.poll_once().await })
        };
        until_reads_held(&h.store, 1).await;
        let second = {
            let sync = h.sync.clone();
            tokio::spawn(async move { sync.poll_once().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.store.held_reads(), 1);
        assert_eq!(
            h.store.change_fetch_count(),
            fetches + 1,
            "second cycle waits before reading the feed"
        );

        h.store.release_note_reads();
        let first = timeout(Duration::from_secs(1), first)
            .await
            .expect("First cycle should finish within 1 second")??;
        let second = timeout(Duration::from_secs(1), second)
            .await
            .expect("Second cycle should finish within 1 second")??;

        assert_eq!(ids(&first.expect("first cycle applies the record").add), vec!["a"]);
        assert_eq!(second, None);
        assert_eq!(h.store.fetched_note_ids(), vec!["a"]);
        assert_eq!(next_update(&h.channel).await?.add.len(), 1);
        assert_eq!(h.channel.pending_len(), 0);

        Ok(())
    }
}
