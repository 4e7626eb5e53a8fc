use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc::Sender;
use tokio::time::{Instant, interval_at, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::config::LibraryOptions;
use crate::error::CollaboratorError;
use crate::events::{Inbound, Request};
use crate::tasks::command::run_command;
use crate::tasks::watch::{FileChange, watch_dir};

/// Time a burst of file events must stay quiet before the folder is rescanned.
const SETTLE: Duration = Duration::from_secs(2);
const SYNC_TIMEOUT: Duration = Duration::from_secs(300);

/// Family photo collaborator: scans the pictures folder, watches it, and runs the sync job.
#[instrument(
    skip(cfg, to_sequencer, requests, cancel),
    fields(root = %cfg.pictures_dir.display())
)]
pub async fn run(
    cfg: LibraryOptions,
    to_sequencer: Sender<Inbound>,
    mut requests: broadcast::Receiver<Request>,
    cancel: CancellationToken,
) -> Result<()> {
    std::fs::create_dir_all(&cfg.pictures_dir)
        .with_context(|| format!("failed to create {}", cfg.pictures_dir.display()))?;

    let mut known = scan_family(&cfg.pictures_dir)?;
    info!(discovered = known.len(), "startup scan complete");
    if !publish(&to_sequencer, &known, false).await {
        return Ok(());
    }

    let (_watcher, mut changes) = watch_dir(&cfg.pictures_dir)?;
    let mut sync = interval_at(Instant::now() + cfg.sync_interval, cfg.sync_interval);
    let mut settle_at: Option<Instant> = None;
    let mut saw_upload = false;

    loop {
        let deadline = settle_at;
        let settle = async move {
            match deadline {
                Some(at) => sleep_until(at).await,
                None => std::future::pending().await,
            }
        };
        let rescan_upload = tokio::select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting library task");
                break;
            }
            _ = sync.tick() => {
                sync_once(&cfg).await;
                None
            }
            request = requests.recv() => match request {
                Ok(Request::PhotoSync) => {
                    sync_once(&cfg).await;
                    None
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "library fell behind on requests");
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
            Some(change) = changes.recv() => {
                if !is_image(change.path()) {
                    continue;
                }
                if let FileChange::Added(path) = &change {
                    info!(path = %path.display(), "fs: photo added");
                    saw_upload = true;
                }
                settle_at = Some(Instant::now() + SETTLE);
                continue;
            }
            _ = settle => {
                settle_at = None;
                Some(std::mem::take(&mut saw_upload))
            }
        };

        let paths = match scan_family(&cfg.pictures_dir) {
            Ok(paths) => paths,
            Err(err) => {
                warn!("{err:#}");
                continue;
            }
        };
        let new_upload = rescan_upload.unwrap_or_else(|| gained(&known, &paths));
        known = paths;
        if !publish(&to_sequencer, &known, new_upload).await {
            break;
        }
    }
    Ok(())
}

async fn sync_once(cfg: &LibraryOptions) {
    let Some(argv) = cfg.sync_command.as_deref() else {
        debug!("no sync command configured; rescanning only");
        return;
    };
    match run_command(argv, SYNC_TIMEOUT).await {
        Ok(out) => info!(output = %out, "photo sync finished"),
        Err(err) => warn!("photo sync failed: {err}"),
    }
}

async fn publish(to_sequencer: &Sender<Inbound>, paths: &[PathBuf], new_upload: bool) -> bool {
    let paths = paths
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    to_sequencer
        .send(Inbound::FamilyPhotosReady { paths, new_upload })
        .await
        .is_ok()
}

/// `true` when `now` holds a path that `before` did not.
fn gained(before: &[PathBuf], now: &[PathBuf]) -> bool {
    let before: HashSet<&PathBuf> = before.iter().collect();
    now.iter().any(|p| !before.contains(p))
}

/// Images directly inside `dir`, newest first by creation (or modification) time.
pub fn scan_family(dir: &Path) -> Result<Vec<PathBuf>, CollaboratorError> {
    let mut found: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = entry.map_err(|err| CollaboratorError::Directory {
            path: dir.to_path_buf(),
            source: err.into(),
        })?;
        if !entry.file_type().is_file() || !is_image(entry.path()) {
            continue;
        }
        let stamp = entry
            .metadata()
            .ok()
            .and_then(|m| m.created().or_else(|_| m.modified()).ok())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        found.push((stamp, entry.into_path()));
    }
    found.sort_by(|a, b| b.cmp(a));
    Ok(found.into_iter().map(|(_, path)| path).collect())
}

#[inline]
pub fn is_image(p: &Path) -> bool {
    matches!(
        p.extension()
            .and_then(OsStr::to_str)
            .map(|s| s.to_ascii_lowercase()),
        Some(ref e) if ["jpg", "jpeg", "png", "gif"].contains(&e.as_str())
    )
}
