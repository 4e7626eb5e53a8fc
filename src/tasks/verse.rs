use anyhow::Result;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::VerseOptions;
use crate::events::{Inbound, Request};
use crate::tasks::command::run_command;

/// Verse collaborator: answers every verse request with exactly one `VerseReady`.
#[instrument(skip_all)]
pub async fn run(
    cfg: VerseOptions,
    to_sequencer: Sender<Inbound>,
    mut requests: broadcast::Receiver<Request>,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting verse task");
                break;
            }
            request = requests.recv() => match request {
                Ok(Request::Verse) => {
                    let text = fetch_verse(&cfg).await;
                    if to_sequencer.send(Inbound::VerseReady(text)).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => warn!(missed, "verse fell behind on requests"),
                Err(RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}

/// The verse of the day, or the fallback text when the command is missing, fails, or times out.
pub async fn fetch_verse(cfg: &VerseOptions) -> String {
    let Some(argv) = cfg.command.as_deref() else {
        debug!("no verse command configured; using fallback text");
        return cfg.fallback_text.clone();
    };
    match run_command(argv, cfg.timeout).await {
        Ok(text) if !text.is_empty() => {
            info!(chars = text.len(), "verse fetched");
            text
        }
        Ok(_) => {
            warn!("verse command printed nothing");
            cfg.fallback_text.clone()
        }
        Err(err) => {
            warn!("verse fetch failed: {err}");
            cfg.fallback_text.clone()
        }
    }
}
