use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc::Sender;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::camera::{MediaKind, Relevance, select_relevant};
use crate::config::CameraOptions;
use crate::error::CollaboratorError;
use crate::events::{Inbound, Request};
use crate::sequencer::WallClock;
use crate::tasks::command::run_command;
use crate::tasks::watch::{FileChange, watch_dir};

/// Clips are announced only once the writer has been quiet this long.
const SETTLE: Duration = Duration::from_secs(2);

/// Snapshot of the media folder, split by kind. Names only, no directory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MediaListing {
    pub snapshots: Vec<String>,
    pub clips: Vec<String>,
}

/// Camera collaborator: runs the fetch and cleanup scripts and watches for motion clips.
#[instrument(
    skip(cfg, clock, to_sequencer, requests, cancel),
    fields(media = %cfg.media_dir.display())
)]
pub async fn run(
    cfg: CameraOptions,
    clock: WallClock,
    to_sequencer: Sender<Inbound>,
    mut requests: broadcast::Receiver<Request>,
    cancel: CancellationToken,
) -> Result<()> {
    std::fs::create_dir_all(&cfg.media_dir)
        .with_context(|| format!("failed to create {}", cfg.media_dir.display()))?;

    // Clips already on disk at startup are history, not motion.
    let mut reported: HashSet<String> = list_media(&cfg.media_dir)?.clips.into_iter().collect();
    debug!(clips = reported.len(), "existing clips marked as seen");

    let (_watcher, mut changes) = watch_dir(&cfg.media_dir)?;
    let mut settle_at: Option<Instant> = None;

    loop {
        let deadline = settle_at;
        let settle = async move {
            match deadline {
                Some(at) => sleep_until(at).await,
                None => std::future::pending().await,
            }
        };
        let event = tokio::select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting camera task");
                break;
            }
            request = requests.recv() => match request {
                Ok(Request::CameraMedia) => fetch(&cfg, clock, &mut reported).await,
                Ok(Request::Cleanup) => {
                    cleanup(&cfg).await;
                    None
                }
                Ok(_) => None,
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "camera fell behind on requests");
                    None
                }
                Err(RecvError::Closed) => break,
            },
            Some(change) = changes.recv() => {
                if let FileChange::Added(path) = &change
                    && MediaKind::from_name(&path.to_string_lossy()) == Some(MediaKind::Clip)
                {
                    info!(path = %path.display(), "motion clip detected");
                    settle_at = Some(Instant::now() + SETTLE);
                }
                None
            }
            _ = settle => {
                settle_at = None;
                motion_clips(&cfg.media_dir, &mut reported)
            }
        };

        if let Some(event) = event
            && to_sequencer.send(event).await.is_err()
        {
            break;
        }
    }
    Ok(())
}

/// Run the fetch script, then report the relevant snapshots and any unseen clips.
async fn fetch(cfg: &CameraOptions, clock: WallClock, reported: &mut HashSet<String>) -> Option<Inbound> {
    if let Some(argv) = cfg.fetch_command.as_deref() {
        match run_command(argv, cfg.command_timeout).await {
            Ok(out) => debug!(output = %out, "camera fetch finished"),
            Err(err) => {
                warn!("camera fetch failed: {err}");
                return None;
            }
        }
    }
    let listing = match list_media(&cfg.media_dir) {
        Ok(listing) => listing,
        Err(err) => {
            warn!("{err}");
            return None;
        }
    };
    let (images, tier) = select_relevant(&listing.snapshots, clock.now());
    match tier {
        Relevance::CurrentHour => info!(count = images.len(), "camera images from current hour"),
        Relevance::Today => info!(count = images.len(), "no images this hour; using today's"),
        Relevance::Everything => info!(count = images.len(), "no images today; using all"),
    }
    let videos = unseen(listing.clips, reported);
    Some(Inbound::CameraMediaReady {
        images: absolute(&cfg.media_dir, images),
        videos: absolute(&cfg.media_dir, videos),
    })
}

fn motion_clips(dir: &Path, reported: &mut HashSet<String>) -> Option<Inbound> {
    let listing = match list_media(dir) {
        Ok(listing) => listing,
        Err(err) => {
            warn!("{err}");
            return None;
        }
    };
    let videos = unseen(listing.clips, reported);
    if videos.is_empty() {
        return None;
    }
    Some(Inbound::CameraMediaReady {
        images: Vec::new(),
        videos: absolute(dir, videos),
    })
}

async fn cleanup(cfg: &CameraOptions) {
    let Some(argv) = cfg.cleanup_command.as_deref() else {
        debug!("no cleanup command configured");
        return;
    };
    match run_command(argv, cfg.command_timeout).await {
        Ok(_) => info!("camera media cleanup finished"),
        Err(err) => warn!("camera media cleanup failed: {err}"),
    }
}

/// Clips not reported before, newest name first. Marks them as reported.
pub fn unseen(clips: Vec<String>, reported: &mut HashSet<String>) -> Vec<String> {
    let mut fresh: Vec<String> = clips
        .into_iter()
        .filter(|clip| reported.insert(clip.clone()))
        .collect();
    fresh.sort_by(|a, b| b.cmp(a));
    fresh
}

/// File names directly inside `dir`, split into snapshots and clips.
pub fn list_media(dir: &Path) -> Result<MediaListing, CollaboratorError> {
    let mut listing = MediaListing::default();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|err| CollaboratorError::Directory {
            path: dir.to_path_buf(),
            source: err.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        match MediaKind::from_name(&name) {
            Some(MediaKind::Snapshot) => listing.snapshots.push(name),
            Some(MediaKind::Clip) => listing.clips.push(name),
            None => debug!(file = %name, "ignoring non-media file"),
        }
    }
    Ok(listing)
}

fn absolute(dir: &Path, names: Vec<String>) -> Vec<String> {
    names
        .into_iter()
        .map(|name| dir.join(name).to_string_lossy().into_owned())
        .collect()
}
