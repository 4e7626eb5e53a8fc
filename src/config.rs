use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::sequencer::{NewPhotoPolicy, SequencerOptions};
use crate::slide_order::OrderMode;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// How long the verse stays up at the start of each hour.
    #[serde(with = "humantime_serde")]
    pub verse_display_time: Duration,
    /// How long the camera stage lasts before family photos take over.
    #[serde(with = "humantime_serde")]
    pub camera_display_time: Duration,
    /// Per-snapshot interval within the camera stage.
    #[serde(with = "humantime_serde")]
    pub camera_interval: Duration,
    /// Per-photo interval within the family stage.
    #[serde(with = "humantime_serde")]
    pub family_interval: Duration,
    /// Total time a motion interrupt stays on screen.
    #[serde(with = "humantime_serde")]
    pub motion_clip_display_time: Duration,
    /// Extra slack before the watchdog forces the motion resume.
    #[serde(with = "humantime_serde")]
    pub motion_watchdog_grace: Duration,
    #[serde(with = "humantime_serde")]
    pub loading_poll_interval: Duration,
    /// Wall-clock poll cadence for the hourly restart.
    #[serde(with = "humantime_serde")]
    pub clock_poll_interval: Duration,
    /// Family photo ordering.
    pub ordering: OrderMode,
    pub show_newest_first: bool,
    pub new_photo_policy: NewPhotoPolicy,
    pub prioritize_motion_clips: bool,
    pub show_camera: bool,
    /// Optional deterministic seed for the family shuffle.
    pub shuffle_seed: Option<u64>,
    /// IANA zone for the hourly clock and camera timestamps. System local time when unset.
    pub timezone: Option<Tz>,
    pub render: RenderOptions,
    pub library: LibraryOptions,
    pub camera: CameraOptions,
    pub verse: VerseOptions,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        for (name, value) in [
            ("verse-display-time", self.verse_display_time),
            ("camera-display-time", self.camera_display_time),
            ("camera-interval", self.camera_interval),
            ("family-interval", self.family_interval),
            ("motion-clip-display-time", self.motion_clip_display_time),
            ("motion-watchdog-grace", self.motion_watchdog_grace),
            ("loading-poll-interval", self.loading_poll_interval),
            ("clock-poll-interval", self.clock_poll_interval),
        ] {
            ensure!(!value.is_zero(), "{name} must be greater than zero");
        }
        self.render.validate().context("invalid render configuration")?;
        ensure!(
            !self.library.sync_interval.is_zero(),
            "library.sync-interval must be greater than zero"
        );
        ensure!(
            !self.camera.command_timeout.is_zero(),
            "camera.command-timeout must be greater than zero"
        );
        ensure!(
            !self.verse.timeout.is_zero(),
            "verse.timeout must be greater than zero"
        );
        Ok(self)
    }

    pub fn sequencer_options(&self) -> SequencerOptions {
        SequencerOptions {
            verse_display_time: self.verse_display_time,
            camera_display_time: self.camera_display_time,
            camera_interval: self.camera_interval,
            family_interval: self.family_interval,
            motion_clip_display_time: self.motion_clip_display_time,
            motion_watchdog_grace: self.motion_watchdog_grace,
            loading_poll_interval: self.loading_poll_interval,
            ordering: self.ordering,
            show_newest_first: self.show_newest_first,
            new_photo_policy: self.new_photo_policy,
            prioritize_motion_clips: self.prioritize_motion_clips,
            show_camera: self.show_camera,
            shuffle_seed: self.shuffle_seed,
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        let core = SequencerOptions::default();
        Self {
            verse_display_time: core.verse_display_time,
            camera_display_time: core.camera_display_time,
            camera_interval: core.camera_interval,
            family_interval: core.family_interval,
            motion_clip_display_time: core.motion_clip_display_time,
            motion_watchdog_grace: core.motion_watchdog_grace,
            loading_poll_interval: core.loading_poll_interval,
            clock_poll_interval: Duration::from_secs(60),
            ordering: core.ordering,
            show_newest_first: core.show_newest_first,
            new_photo_policy: core.new_photo_policy,
            prioritize_motion_clips: core.prioritize_motion_clips,
            show_camera: core.show_camera,
            shuffle_seed: None,
            timezone: None,
            render: RenderOptions::default(),
            library: LibraryOptions::default(),
            camera: CameraOptions::default(),
            verse: VerseOptions::default(),
        }
    }
}

/// Backdrop behind letterboxed photos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Background {
    #[default]
    Blur,
    Color,
    None,
}

/// Renderer settings. Only the fullscreen geometry feeds the layout math; the
/// rest is passed through to the renderer untouched.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RenderOptions {
    pub fullscreen: bool,
    /// Letterbox (fit inside) when true, fill (crop) when false.
    pub letterbox: bool,
    pub screen_width: u32,
    pub screen_height: u32,
    pub opacity: f32,
    pub blur: u32,
    #[serde(with = "humantime_serde")]
    pub transition: Duration,
    pub background: Background,
    pub background_color: String,
}

impl RenderOptions {
    const fn default_opacity() -> f32 {
        0.9
    }

    const fn default_blur() -> u32 {
        8
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.screen_width > 0 && self.screen_height > 0,
            "render.screen-width and render.screen-height must be positive"
        );
        ensure!(
            (0.0..=1.0).contains(&self.opacity),
            "render.opacity must be within 0..=1"
        );
        Ok(())
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            fullscreen: true,
            letterbox: true,
            screen_width: 1920,
            screen_height: 1080,
            opacity: Self::default_opacity(),
            blur: Self::default_blur(),
            transition: Duration::from_secs(1),
            background: Background::default(),
            background_color: "black".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LibraryOptions {
    /// Directory holding the family photos. Created if missing.
    pub pictures_dir: PathBuf,
    /// Argv of the cloud photo sync job.
    pub sync_command: Option<Vec<String>>,
    #[serde(with = "humantime_serde")]
    pub sync_interval: Duration,
}

impl Default for LibraryOptions {
    fn default() -> Self {
        Self {
            pictures_dir: PathBuf::from("pictures"),
            sync_command: None,
            sync_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CameraOptions {
    /// Where the fetch script drops snapshots and motion clips. Created if missing.
    pub media_dir: PathBuf,
    pub fetch_command: Option<Vec<String>>,
    pub cleanup_command: Option<Vec<String>>,
    /// Upper bound on a single fetch or cleanup run.
    #[serde(with = "humantime_serde")]
    pub command_timeout: Duration,
}

impl Default for CameraOptions {
    fn default() -> Self {
        Self {
            media_dir: PathBuf::from("media"),
            fetch_command: None,
            cleanup_command: None,
            command_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct VerseOptions {
    /// Argv printing the verse of the day on stdout.
    pub command: Option<Vec<String>>,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub fallback_text: String,
}

impl Default for VerseOptions {
    fn default() -> Self {
        Self {
            command: None,
            timeout: Duration::from_secs(10),
            fallback_text: "Verse not available.".to_string(),
        }
    }
}
