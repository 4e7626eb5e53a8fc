//! Console renderer.
//!
//! Stands in for the real screen: every frame is logged, photos are probed for
//! their displayed size and placed with the layout math, and anything that
//! cannot be shown is reported back so the sequencer can move on.

use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::sync::mpsc::{Receiver, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::{Background, RenderOptions};
use crate::events::{Inbound, View};
use crate::processing::layout::{Placement, scale_to_frame};

/// Displayed dimensions of an image file, with EXIF rotation applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
    pub orientation: u16,
}

pub fn probe_image(path: &Path) -> Result<ImageSize> {
    let (raw_w, raw_h) = image::image_dimensions(path)
        .with_context(|| format!("failed to read dimensions of {}", path.display()))?;
    let orientation = read_exif_orientation(path).unwrap_or(1);
    let (width, height) = if matches!(orientation, 5..=8) {
        (raw_h, raw_w)
    } else {
        (raw_w, raw_h)
    };
    Ok(ImageSize {
        width,
        height,
        orientation,
    })
}

fn read_exif_orientation(path: &Path) -> Option<u16> {
    use exif::{In, Tag, Value};
    let f = fs::File::open(path).ok()?;
    let mut buf = BufReader::new(f);
    let reader = exif::Reader::new().read_from_container(&mut buf).ok()?;
    let field = reader.get_field(Tag::Orientation, In::PRIMARY)?;
    match &field.value {
        Value::Short(arr) => arr.first().copied(),
        Value::Long(arr) => arr.first().and_then(|v| u16::try_from(*v).ok()),
        _ => None,
    }
}

/// Where `size` lands on screen. `None` outside fullscreen, where the image keeps its natural size.
pub fn place(size: ImageSize, render: &RenderOptions) -> Option<Placement> {
    if !render.fullscreen {
        return None;
    }
    Some(scale_to_frame(
        i64::from(size.width),
        i64::from(size.height),
        i64::from(render.screen_width),
        i64::from(render.screen_height),
        render.letterbox,
    ))
}

/// What fills the screen around a placed photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backdrop {
    /// The photo reaches every edge; nothing shows behind it.
    Covered,
    Blurred { radius: u32 },
    Solid(String),
    Bare,
}

pub fn backdrop(placement: Placement, render: &RenderOptions) -> Backdrop {
    let covers = placement.left <= 0
        && placement.top <= 0
        && placement.left + placement.width >= i64::from(render.screen_width)
        && placement.top + placement.height >= i64::from(render.screen_height);
    if covers {
        return Backdrop::Covered;
    }
    match render.background {
        Background::Blur => Backdrop::Blurred {
            radius: render.blur,
        },
        Background::Color => Backdrop::Solid(render.background_color.clone()),
        Background::None => Backdrop::Bare,
    }
}

#[instrument(skip_all)]
pub async fn run(
    render: RenderOptions,
    mut views: Receiver<View>,
    feedback: Sender<Inbound>,
    cancel: CancellationToken,
) -> Result<()> {
    info!(
        fullscreen = render.fullscreen,
        letterbox = render.letterbox,
        width = render.screen_width,
        height = render.screen_height,
        opacity = render.opacity,
        transition = %humantime::format_duration(render.transition),
        background = ?render.background,
        "display ready"
    );
    loop {
        let view = tokio::select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting display task");
                break;
            }
            view = views.recv() => match view {
                Some(view) => view,
                None => break,
            },
        };
        if let Some(report) = show(&render, view).await
            && feedback.send(report).await.is_err()
        {
            break;
        }
    }
    Ok(())
}

/// Render one frame; returns the failure report, if any.
async fn show(render: &RenderOptions, view: View) -> Option<Inbound> {
    match view {
        View::Loading => {
            info!("screen: loading");
            None
        }
        View::Verse(verse) => {
            info!(
                text = %verse.text,
                reference = verse.reference.as_deref().unwrap_or(""),
                "screen: verse"
            );
            None
        }
        View::Unavailable { category, message } => {
            info!(mode = ?category, "screen: {message}");
            None
        }
        View::Photo { category, item } => {
            let path = PathBuf::from(&item);
            let probed = tokio::task::spawn_blocking(move || probe_image(&path)).await;
            let size = match probed {
                Ok(Ok(size)) => size,
                Ok(Err(err)) => {
                    warn!("{err:#}");
                    return Some(Inbound::ItemFailed(item));
                }
                Err(err) => {
                    warn!("image probe panicked: {err}");
                    return Some(Inbound::ItemFailed(item));
                }
            };
            match place(size, render) {
                Some(placement) if placement.is_empty() => {
                    warn!(item = %item, "image has no displayable area");
                    Some(Inbound::ItemFailed(item))
                }
                Some(placement) => {
                    info!(
                        mode = ?category,
                        item = %item,
                        width = placement.width,
                        height = placement.height,
                        left = placement.left,
                        top = placement.top,
                        pinned = if placement.fit_to_width { "width" } else { "height" },
                        orientation = size.orientation,
                        backdrop = ?backdrop(placement, render),
                        opacity = render.opacity,
                        "screen: photo"
                    );
                    None
                }
                None => {
                    info!(
                        mode = ?category,
                        item = %item,
                        width = size.width,
                        height = size.height,
                        orientation = size.orientation,
                        opacity = render.opacity,
                        "screen: photo (natural size)"
                    );
                    None
                }
            }
        }
        View::Clip { item } => match fs::metadata(&item) {
            Ok(meta) if meta.is_file() && meta.len() > 0 => {
                info!(item = %item, bytes = meta.len(), "screen: motion clip");
                None
            }
            Ok(_) => {
                warn!(item = %item, "motion clip is empty");
                Some(Inbound::ClipFailed(item))
            }
            Err(err) => {
                debug!(item = %item, "clip unreadable: {err}");
                warn!(item = %item, "motion clip cannot be played");
                Some(Inbound::ClipFailed(item))
            }
        },
    }
}
