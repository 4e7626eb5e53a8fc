use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher, recommended_watcher};
use tokio::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Added(PathBuf),
    Removed(PathBuf),
}

impl FileChange {
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Added(p) | FileChange::Removed(p) => p,
        }
    }
}

/// Watch `dir` (non-recursively) and bridge file additions and removals into an async channel.
///
/// The returned watcher must be kept alive for events to keep flowing.
pub fn watch_dir(dir: &Path) -> Result<(RecommendedWatcher, Receiver<FileChange>)> {
    let (tx, rx) = mpsc::channel::<FileChange>(128);
    let mut watcher = recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => forward(event, &tx),
        Err(err) => error!("watch error: {err}"),
    })?;
    watcher
        .watch(dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("failed to watch {}", dir.display()))?;
    match dir.canonicalize() {
        Ok(abs) => info!(watching = %abs.display(), "notify watcher initialized"),
        Err(_) => info!(watching = %dir.display(), "notify watcher initialized"),
    }
    Ok((watcher, rx))
}

fn forward(event: Event, tx: &Sender<FileChange>) {
    debug!(kind = ?event.kind, paths = ?event.paths, "notify event");
    let added = |p: PathBuf| FileChange::Added(p);
    let removed = |p: PathBuf| FileChange::Removed(p);
    let classify: &dyn Fn(PathBuf) -> FileChange = match &event.kind {
        EventKind::Create(CreateKind::File | CreateKind::Any) => &added,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => &added,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => &removed,
        EventKind::Remove(RemoveKind::File | RemoveKind::Any) => &removed,
        // Some platforms only report Name(Any); decide per path by existence.
        EventKind::Modify(ModifyKind::Name(_)) => {
            for p in event.paths {
                let change = if p.exists() { added(p) } else { removed(p) };
                let _ = tx.blocking_send(change);
            }
            return;
        }
        _ => return,
    };
    for p in event.paths {
        let _ = tx.blocking_send(classify(p));
    }
}
