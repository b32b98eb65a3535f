//! NoteGraph watcher
//!
//! Serves a note store fixture through a graph session and prints every
//! message a consumer would receive, one JSON document per line.
//!
//! Edits to the fixture file are replayed into the store as note changes, so
//! the sync engine picks them up on its next cycle.
//!
//! Usage: `notegraph-watch <fixture.json> [config.json]`
//!
//! Set `RUST_LOG=notegraph_core=debug` for cycle-level logging.

use anyhow::{Context, Result};
use notegraph_core::config::SyncConfig;
use notegraph_core::db::{InMemoryNoteStore, StoreFixture};
use notegraph_core::services::GraphSession;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let fixture_path = PathBuf::from(
        args.next()
            .context("usage: notegraph-watch <fixture.json> [config.json]")?,
    );
    let config = match args.next() {
        Some(path) => SyncConfig::load(&path)
            .await
            .with_context(|| format!("loading config {path}"))?,
        None => SyncConfig::default(),
    };

    let mut fixture = read_fixture(&fixture_path).await?;
    let mut modified = modified_at(&fixture_path).await;
    let store = Arc::new(InMemoryNoteStore::from_fixture(fixture.clone()));
    let session = GraphSession::new(store.clone(), config.clone())?;

    info!("Watching {:?}", fixture_path);
    session.start().await?;
    session.request_settings();

    let mut reload = tokio::time::interval(config.poll_interval());
    loop {
        tokio::select! {
            message = session.accept() => {
                println!("{}", serde_json::to_string(&message?)?);
            }
            _ = reload.tick() => {
                let current = modified_at(&fixture_path).await;
                if current == modified {
                    continue;
                }
                modified = current;
                match read_fixture(&fixture_path).await {
                    Ok(next) => {
                        replay_fixture(&store, &fixture, &next);
                        fixture = next;
                    }
                    Err(e) => warn!("Ignoring unreadable fixture: {:#}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    session.stop();
    Ok(())
}

async fn read_fixture(path: &Path) -> Result<StoreFixture> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading fixture {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing fixture {}", path.display()))
}

async fn modified_at(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path)
        .await
        .and_then(|meta| meta.modified())
        .ok()
}

/// Apply the difference between two fixtures to the store
fn replay_fixture(store: &InMemoryNoteStore, previous: &StoreFixture, next: &StoreFixture) {
    let before: BTreeMap<_, _> = previous.notes.iter().map(|n| (&n.id, n)).collect();
    let after: BTreeMap<_, _> = next.notes.iter().map(|n| (&n.id, n)).collect();

    for (id, note) in &after {
        match before.get(id) {
            None => store.insert_note((*note).clone()),
            Some(old) if old != note => store.update_note((*note).clone()),
            Some(_) => {}
        }
    }
    for id in before.keys().filter(|id| !after.contains_key(*id)) {
        store.delete_note(id);
    }

    let old_tags: BTreeMap<_, _> = previous.tags.iter().map(|t| (&t.id, t)).collect();
    for tag in &next.tags {
        let old_members: BTreeSet<&String> = old_tags
            .get(&tag.id)
            .map(|t| t.note_ids.iter().collect())
            .unwrap_or_default();
        let new_members: BTreeSet<&String> = tag.note_ids.iter().collect();

        store.add_tag(&tag.id, &tag.title);
        for note_id in new_members.difference(&old_members) {
            store.tag_note(&tag.id, note_id);
        }
        for note_id in old_members.difference(&new_members) {
            store.untag_note(&tag.id, note_id);
        }
    }
    for tag in previous.tags.iter().filter(|t| !next.tags.iter().any(|n| n.id == t.id)) {
        store.remove_tag(&tag.id);
    }
}
