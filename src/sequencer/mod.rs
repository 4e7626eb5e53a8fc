//! Display sequencing state machine.
//!
//! The sequencer is pure: every inbound event is handled synchronously and
//! yields a list of [`Command`]s (arm/cancel a timer, emit a request, render a
//! view). The async driver in `tasks::sequencer` executes them against real
//! timers and channels; tests execute them against virtual time.
//!
//! Hourly cycle: `Loading -> Verse -> Camera -> Family`, restarted on every
//! wall-clock hour change. `Motion` interrupts any of them and returns to the
//! mode it interrupted.

mod clock;
mod timers;

use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::{debug, info, warn};

pub use clock::{SequenceClock, WallClock};
pub use timers::{TimerId, TimerKind, TimerSlots};

use crate::events::{Inbound, Request, View};
use crate::slide_order::{OrderMode, SlideOrder};
use crate::verse::VerseText;

/// Content category on screen. Exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayMode {
    Loading,
    Verse,
    Camera,
    Family,
    Motion,
}

/// What happens to a new family photo that arrives outside Family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NewPhotoPolicy {
    /// Keep the current mode; the photo is shown first when Family is next entered.
    #[default]
    Queue,
    /// Leave the current stage and show the photo right away.
    SwitchToFamily,
}

/// Side effects requested by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Arm {
        kind: TimerKind,
        id: TimerId,
        after: Duration,
    },
    Cancel {
        kind: TimerKind,
        id: TimerId,
    },
    Request(Request),
    Render(View),
}

#[derive(Debug, Clone)]
pub struct SequencerOptions {
    pub verse_display_time: Duration,
    pub camera_display_time: Duration,
    pub camera_interval: Duration,
    pub family_interval: Duration,
    pub motion_clip_display_time: Duration,
    pub motion_watchdog_grace: Duration,
    pub loading_poll_interval: Duration,
    pub ordering: OrderMode,
    pub show_newest_first: bool,
    pub new_photo_policy: NewPhotoPolicy,
    pub prioritize_motion_clips: bool,
    pub show_camera: bool,
    pub shuffle_seed: Option<u64>,
}

impl Default for SequencerOptions {
    fn default() -> Self {
        Self {
            verse_display_time: Duration::from_secs(120),
            camera_display_time: Duration::from_secs(120),
            camera_interval: Duration::from_secs(10),
            family_interval: Duration::from_secs(30),
            motion_clip_display_time: Duration::from_secs(30),
            motion_watchdog_grace: Duration::from_secs(2),
            loading_poll_interval: Duration::from_secs(5),
            ordering: OrderMode::Sequential,
            show_newest_first: true,
            new_photo_policy: NewPhotoPolicy::Queue,
            prioritize_motion_clips: true,
            show_camera: true,
            shuffle_seed: None,
        }
    }
}

/// Live motion interrupt.
#[derive(Debug, Clone)]
pub struct MotionState {
    pub previous_mode: DisplayMode,
    pub started_at: NaiveDateTime,
    pub clips: Vec<String>,
    pub clip_cursor: usize,
}

impl MotionState {
    pub fn current_clip(&self) -> Option<&str> {
        self.clips.get(self.clip_cursor).map(String::as_str)
    }
}

/// All mutable sequencing state, owned by one [`Sequencer`].
#[derive(Debug)]
pub struct SequencerState {
    pub mode: DisplayMode,
    pub loaded: bool,
    pub verse: Option<String>,
    pub family: Vec<String>,
    pub family_order: SlideOrder,
    pub camera: Vec<String>,
    pub camera_order: SlideOrder,
    pub motion: Option<MotionState>,
    pub clock: SequenceClock,
    pub timers: TimerSlots,
    /// Head of the family list as last reported; repeats never re-trigger.
    pub newest_seen: Option<String>,
    /// Show index 0 the next time Family is entered.
    pub newest_queued: bool,
    /// A stage transition came due while Motion was on screen.
    pub stage_deferred: bool,
    /// Consecutive render failures in the current category.
    pub failed_streak: usize,
}

pub struct Sequencer {
    options: SequencerOptions,
    state: SequencerState,
}

impl Sequencer {
    pub fn new(options: SequencerOptions, now: NaiveDateTime) -> Self {
        let family_order = SlideOrder::new(options.ordering, options.shuffle_seed);
        let camera_order = SlideOrder::new(OrderMode::Sequential, None);
        let state = SequencerState {
            mode: DisplayMode::Loading,
            loaded: false,
            verse: None,
            family: Vec::new(),
            family_order,
            camera: Vec::new(),
            camera_order,
            motion: None,
            clock: SequenceClock::new(now),
            timers: TimerSlots::default(),
            newest_seen: None,
            newest_queued: false,
            stage_deferred: false,
            failed_streak: 0,
        };
        Self { options, state }
    }

    pub fn options(&self) -> &SequencerOptions {
        &self.options
    }

    pub fn state(&self) -> &SequencerState {
        &self.state
    }

    pub fn mode(&self) -> DisplayMode {
        self.state.mode
    }

    /// Initial requests, the loading screen, and the loading poll.
    pub fn start(&mut self) -> Vec<Command> {
        let mut out = Vec::new();
        out.push(Command::Request(Request::Verse));
        out.push(Command::Request(Request::PhotoSync));
        if self.options.show_camera {
            out.push(Command::Request(Request::CameraMedia));
            out.push(Command::Request(Request::Cleanup));
        }
        self.state.mode = DisplayMode::Loading;
        self.render(&mut out);
        self.state
            .timers
            .arm(TimerKind::Stage, self.options.loading_poll_interval, &mut out);
        out
    }

    pub fn handle(&mut self, now: NaiveDateTime, event: Inbound) -> Vec<Command> {
        let mut out = Vec::new();
        match event {
            Inbound::VerseReady(text) => self.on_verse(text, &mut out),
            Inbound::FamilyPhotosReady { paths, new_upload } => {
                self.on_family_photos(paths, new_upload, &mut out)
            }
            Inbound::CameraMediaReady { images, videos } => {
                self.on_camera_media(images, videos, now, &mut out)
            }
            Inbound::ClockTick => self.on_clock_tick(now, &mut out),
            Inbound::TimerFired { kind, id } => {
                if !self.state.timers.fire(kind, id) {
                    debug!(kind = ?kind, "stale timer ignored");
                    return out;
                }
                match kind {
                    TimerKind::Advance => self.on_advance_timer(&mut out),
                    TimerKind::Stage => self.on_stage_timer(&mut out),
                    TimerKind::Motion => self.on_motion_timer(false, now, &mut out),
                    TimerKind::MotionWatchdog => self.on_motion_timer(true, now, &mut out),
                }
            }
            Inbound::ClipFinished => self.on_clip_finished(&mut out),
            Inbound::ClipFailed(item) => self.on_clip_failed(&item, &mut out),
            Inbound::ItemFailed(item) => self.on_item_failed(&item, &mut out),
        }
        out
    }

    /// What belongs on screen right now.
    pub fn view(&self) -> View {
        let state = &self.state;
        match state.mode {
            DisplayMode::Loading => View::Loading,
            DisplayMode::Verse => View::Verse(VerseText::parse(
                state.verse.as_deref().unwrap_or("Loading verse..."),
            )),
            DisplayMode::Family => match self.family_item() {
                Some(item) => View::Photo {
                    category: DisplayMode::Family,
                    item: item.to_string(),
                },
                None => View::Unavailable {
                    category: DisplayMode::Family,
                    message: "No family images available",
                },
            },
            DisplayMode::Camera => match self.camera_item() {
                Some(item) => View::Photo {
                    category: DisplayMode::Camera,
                    item: item.to_string(),
                },
                None => View::Unavailable {
                    category: DisplayMode::Camera,
                    message: "Camera images not available",
                },
            },
            DisplayMode::Motion => match state.motion.as_ref().and_then(MotionState::current_clip) {
                Some(clip) => View::Clip {
                    item: clip.to_string(),
                },
                None => View::Unavailable {
                    category: DisplayMode::Motion,
                    message: "No motion clips available",
                },
            },
        }
    }

    pub fn family_item(&self) -> Option<&str> {
        let idx = self.state.family_order.current()?;
        self.state.family.get(idx).map(String::as_str)
    }

    pub fn camera_item(&self) -> Option<&str> {
        let idx = self.state.camera_order.current()?;
        self.state.camera.get(idx).map(String::as_str)
    }

    fn render(&self, out: &mut Vec<Command>) {
        out.push(Command::Render(self.view()));
    }

    fn on_verse(&mut self, text: String, out: &mut Vec<Command>) {
        info!(chars = text.len(), "verse received");
        self.state.verse = Some(text);
        self.check_loaded(out);
        if self.state.mode == DisplayMode::Verse {
            self.render(out);
        }
    }

    fn check_loaded(&mut self, out: &mut Vec<Command>) {
        let state = &self.state;
        if state.loaded
            || state.verse.is_none()
            || (state.family.is_empty() && state.camera.is_empty())
        {
            return;
        }
        self.state.loaded = true;
        info!("all data loaded");
        if self.state.mode == DisplayMode::Loading {
            self.start_cycle(out);
        }
    }

    fn start_cycle(&mut self, out: &mut Vec<Command>) {
        self.state.timers.cancel_all(out);
        self.state.motion = None;
        self.state.stage_deferred = false;
        self.state.mode = DisplayMode::Verse;
        info!(
            after = %humantime::format_duration(self.options.verse_display_time),
            "display sequence started with verse"
        );
        self.render(out);
        self.state
            .timers
            .arm(TimerKind::Stage, self.options.verse_display_time, out);
    }

    fn on_stage_timer(&mut self, out: &mut Vec<Command>) {
        match self.state.mode {
            DisplayMode::Loading => {
                if self.state.loaded {
                    self.start_cycle(out);
                } else {
                    debug!("waiting for data before starting sequence");
                    self.state
                        .timers
                        .arm(TimerKind::Stage, self.options.loading_poll_interval, out);
                }
            }
            DisplayMode::Verse => {
                if self.options.show_camera {
                    self.enter_camera(out);
                } else {
                    self.enter_family(out);
                }
            }
            DisplayMode::Camera => self.enter_family(out),
            DisplayMode::Motion => {
                debug!("stage transition deferred until motion ends");
                self.state.stage_deferred = true;
            }
            DisplayMode::Family => debug!("stage timer ignored in family"),
        }
    }

    fn enter_camera(&mut self, out: &mut Vec<Command>) {
        if self.state.camera.is_empty() {
            info!("no camera images cached; requesting fetch");
            out.push(Command::Request(Request::CameraMedia));
        }
        self.state.mode = DisplayMode::Camera;
        self.state.failed_streak = 0;
        self.state.camera_order.reset();
        self.state.camera_order.advance();
        info!(images = self.state.camera.len(), "showing camera images");
        self.render(out);
        self.arm_item_timer(out);
        self.state
            .timers
            .arm(TimerKind::Stage, self.options.camera_display_time, out);
    }

    fn enter_family(&mut self, out: &mut Vec<Command>) {
        self.state.timers.cancel(TimerKind::Stage, out);
        self.state.stage_deferred = false;
        self.state.mode = DisplayMode::Family;
        self.state.failed_streak = 0;
        let queued = std::mem::take(&mut self.state.newest_queued);
        if !(queued && self.state.family_order.current() == Some(0)) {
            self.state.family_order.advance();
        }
        info!(
            photos = self.state.family.len(),
            newest_first = queued,
            "showing family photos until end of hour"
        );
        self.render(out);
        self.arm_item_timer(out);
    }

    /// Arm the per-item timer for the current category, or drop it when there is nothing to cycle.
    fn arm_item_timer(&mut self, out: &mut Vec<Command>) {
        let (len, interval) = match self.state.mode {
            DisplayMode::Family => (self.state.family.len(), self.options.family_interval),
            DisplayMode::Camera => (self.state.camera.len(), self.options.camera_interval),
            _ => (0, Duration::ZERO),
        };
        if len == 0 {
            self.state.timers.cancel(TimerKind::Advance, out);
            return;
        }
        self.state.timers.arm(TimerKind::Advance, interval, out);
    }

    fn on_advance_timer(&mut self, out: &mut Vec<Command>) {
        self.state.failed_streak = 0;
        if self.step_item() {
            self.render(out);
            self.arm_item_timer(out);
        } else {
            debug!(mode = ?self.state.mode, "advance timer ignored");
        }
    }

    /// Move the current category to its next item. `false` outside Family/Camera.
    fn step_item(&mut self) -> bool {
        let idx = match self.state.mode {
            DisplayMode::Family => self.state.family_order.advance(),
            DisplayMode::Camera => self.state.camera_order.advance(),
            _ => return false,
        };
        debug!(mode = ?self.state.mode, index = ?idx, "advanced item");
        true
    }

    fn on_family_photos(&mut self, paths: Vec<String>, new_upload: bool, out: &mut Vec<Command>) {
        let head = paths.first().cloned();
        let fresh_head = new_upload && head.is_some() && head != self.state.newest_seen;
        self.state.newest_seen = head;
        let previous = std::mem::replace(&mut self.state.family, paths);
        let len = self.state.family.len();
        info!(count = len, new_upload, fresh_head, "family images received");

        if fresh_head && self.options.show_newest_first {
            self.state.family_order.promote_head(len);
            self.on_newest_photo(out);
        } else if previous != self.state.family {
            realign(&mut self.state.family_order, &previous, &self.state.family);
            if self.state.mode == DisplayMode::Family {
                self.refresh_category(out);
            }
        }
        self.check_loaded(out);
    }

    fn on_newest_photo(&mut self, out: &mut Vec<Command>) {
        let policy = self.options.new_photo_policy;
        match self.state.mode {
            DisplayMode::Family => {
                info!("new photo shown immediately");
                self.state.failed_streak = 0;
                self.render(out);
                self.arm_item_timer(out);
            }
            DisplayMode::Verse | DisplayMode::Camera
                if policy == NewPhotoPolicy::SwitchToFamily =>
            {
                info!(from = ?self.state.mode, "new photo interrupts current stage");
                self.state.newest_queued = true;
                self.state.timers.cancel(TimerKind::Advance, out);
                self.enter_family(out);
            }
            DisplayMode::Motion if policy == NewPhotoPolicy::SwitchToFamily => {
                info!("new photo will be shown when motion ends");
                self.state.newest_queued = true;
                self.state.stage_deferred = false;
                self.state.timers.cancel(TimerKind::Stage, out);
                if let Some(motion) = self.state.motion.as_mut() {
                    motion.previous_mode = DisplayMode::Family;
                }
            }
            mode => {
                debug!(mode = ?mode, "new photo queued for next family stage");
                self.state.newest_queued = true;
            }
        }
    }

    fn on_camera_media(
        &mut self,
        images: Vec<String>,
        videos: Vec<String>,
        now: NaiveDateTime,
        out: &mut Vec<Command>,
    ) {
        if images.is_empty() {
            debug!("no camera images received; keeping cached list");
        } else {
            info!(count = images.len(), "camera images received");
            let previous = std::mem::replace(&mut self.state.camera, images);
            realign(&mut self.state.camera_order, &previous, &self.state.camera);
            if self.state.mode == DisplayMode::Camera {
                self.refresh_category(out);
            }
        }
        self.check_loaded(out);

        if videos.is_empty() {
            return;
        }
        if self.options.prioritize_motion_clips {
            self.enter_motion(videos, now, out);
        } else {
            debug!(clips = videos.len(), "motion clips received; interrupts disabled");
        }
    }

    /// Re-render the visible Family/Camera list after its contents changed.
    fn refresh_category(&mut self, out: &mut Vec<Command>) {
        let order = match self.state.mode {
            DisplayMode::Family => &mut self.state.family_order,
            DisplayMode::Camera => &mut self.state.camera_order,
            _ => return,
        };
        if order.current().is_none() {
            order.advance();
        }
        self.render(out);
        if !self.state.timers.is_armed(TimerKind::Advance) {
            self.arm_item_timer(out);
        }
    }

    fn enter_motion(&mut self, clips: Vec<String>, now: NaiveDateTime, out: &mut Vec<Command>) {
        self.state.timers.cancel(TimerKind::Motion, out);
        self.state.timers.cancel(TimerKind::MotionWatchdog, out);
        if clips.is_empty() {
            self.exit_motion_to_family(out);
            return;
        }
        let previous_mode = match &self.state.motion {
            Some(motion) => motion.previous_mode,
            None => self.state.mode,
        };
        self.state.timers.cancel(TimerKind::Advance, out);
        info!(
            clips = clips.len(),
            previous = ?previous_mode,
            "motion detected; interrupting display"
        );
        self.state.motion = Some(MotionState {
            previous_mode,
            started_at: now,
            clips,
            clip_cursor: 0,
        });
        self.state.mode = DisplayMode::Motion;
        self.render(out);
        let duration = self.options.motion_clip_display_time;
        self.state.timers.arm(TimerKind::Motion, duration, out);
        self.state.timers.arm(
            TimerKind::MotionWatchdog,
            duration + self.options.motion_watchdog_grace,
            out,
        );
    }

    fn on_motion_timer(&mut self, watchdog: bool, now: NaiveDateTime, out: &mut Vec<Command>) {
        if self.state.mode != DisplayMode::Motion {
            debug!(watchdog, "motion timer ignored outside motion");
            return;
        }
        let shown_for = self
            .state
            .motion
            .as_ref()
            .and_then(|motion| (now - motion.started_at).to_std().ok())
            .unwrap_or_default();
        if watchdog {
            warn!(shown_for = %humantime::format_duration(shown_for), "motion watchdog forced resume");
        } else {
            debug!(shown_for = %humantime::format_duration(shown_for), "motion duration elapsed");
        }
        self.resume_from_motion(out);
    }

    fn resume_from_motion(&mut self, out: &mut Vec<Command>) {
        self.state.timers.cancel(TimerKind::Motion, out);
        self.state.timers.cancel(TimerKind::MotionWatchdog, out);
        let Some(motion) = self.state.motion.take() else {
            self.exit_motion_to_family(out);
            return;
        };
        let previous = motion.previous_mode;
        info!(restored = ?previous, "motion finished; resuming");
        match previous {
            DisplayMode::Family if self.state.newest_queued => {
                self.enter_family(out);
                return;
            }
            DisplayMode::Family | DisplayMode::Camera => {
                self.state.mode = previous;
                self.state.failed_streak = 0;
                self.refresh_category(out);
            }
            DisplayMode::Loading if self.state.loaded => {
                self.state.mode = DisplayMode::Loading;
                self.start_cycle(out);
                return;
            }
            DisplayMode::Loading | DisplayMode::Verse => {
                self.state.mode = previous;
                self.render(out);
            }
            DisplayMode::Motion => {
                self.exit_motion_to_family(out);
                return;
            }
        }
        if std::mem::take(&mut self.state.stage_deferred) {
            self.on_stage_timer(out);
        }
    }

    fn exit_motion_to_family(&mut self, out: &mut Vec<Command>) {
        warn!("no motion clips to play; falling back to family");
        self.state.motion = None;
        self.state.timers.cancel(TimerKind::Motion, out);
        self.state.timers.cancel(TimerKind::MotionWatchdog, out);
        self.enter_family(out);
    }

    fn on_clip_finished(&mut self, out: &mut Vec<Command>) {
        if self.state.mode != DisplayMode::Motion {
            return;
        }
        let Some(motion) = self.state.motion.as_mut() else {
            return;
        };
        if motion.clips.is_empty() {
            self.exit_motion_to_family(out);
            return;
        }
        motion.clip_cursor = (motion.clip_cursor + 1) % motion.clips.len();
        debug!(cursor = motion.clip_cursor, "next motion clip");
        self.render(out);
    }

    fn on_clip_failed(&mut self, item: &str, out: &mut Vec<Command>) {
        if self.state.mode != DisplayMode::Motion {
            return;
        }
        let Some(motion) = self.state.motion.as_mut() else {
            return;
        };
        let Some(pos) = motion.clips.iter().position(|c| c == item) else {
            return;
        };
        warn!(clip = item, "dropping unplayable motion clip");
        motion.clips.remove(pos);
        if motion.clips.is_empty() {
            self.exit_motion_to_family(out);
            return;
        }
        if motion.clip_cursor >= motion.clips.len() {
            motion.clip_cursor = 0;
        }
        self.render(out);
    }

    fn on_item_failed(&mut self, item: &str, out: &mut Vec<Command>) {
        let (current, len) = match self.state.mode {
            DisplayMode::Family => (self.family_item(), self.state.family.len()),
            DisplayMode::Camera => (self.camera_item(), self.state.camera.len()),
            _ => return,
        };
        if current != Some(item) {
            return;
        }
        self.state.failed_streak += 1;
        if self.state.failed_streak >= len {
            warn!(item, "every item failed to render; waiting for next interval");
            return;
        }
        warn!(item, "skipping item that failed to render");
        self.step_item();
        self.render(out);
        self.arm_item_timer(out);
    }

    fn on_clock_tick(&mut self, now: NaiveDateTime, out: &mut Vec<Command>) {
        if !self.state.clock.observe(now) {
            return;
        }
        info!(hour = self.state.clock.hour(), "hour changed; restarting sequence");
        self.state.timers.cancel_all(out);
        self.state.motion = None;
        self.state.stage_deferred = false;
        out.push(Command::Request(Request::Verse));
        if self.options.show_camera {
            out.push(Command::Request(Request::CameraMedia));
            out.push(Command::Request(Request::Cleanup));
        }
        if self.state.loaded {
            self.start_cycle(out);
        } else {
            self.state.mode = DisplayMode::Loading;
            self.render(out);
            self.state
                .timers
                .arm(TimerKind::Stage, self.options.loading_poll_interval, out);
        }
    }
}

/// Carry an order over to a new list by path, not by position.
fn realign(order: &mut SlideOrder, previous: &[String], list: &[String]) {
    if previous == list {
        return;
    }
    match embedded_at(previous, list) {
        Some(offset) => order.grow_around(offset, list.len()),
        None => {
            let on_screen = order
                .current()
                .and_then(|idx| previous.get(idx))
                .and_then(|path| list.iter().position(|p| p == path));
            debug!(previous = previous.len(), len = list.len(), "media list replaced");
            order.rebuild(list.len(), on_screen);
        }
    }
}

/// Position of `old` as one contiguous run inside `new`.
fn embedded_at(old: &[String], new: &[String]) -> Option<usize> {
    if old.is_empty() || old.len() > new.len() {
        return None;
    }
    new.windows(old.len()).position(|run| run == old)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn options() -> SequencerOptions {
        SequencerOptions {
            shuffle_seed: Some(7),
            ..SequencerOptions::default()
        }
    }

    fn photos(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn armed_id(out: &[Command], kind: TimerKind) -> Option<TimerId> {
        out.iter().rev().find_map(|c| match c {
            Command::Arm { kind: k, id, .. } if *k == kind => Some(*id),
            _ => None,
        })
    }

    fn fire(seq: &mut Sequencer, kind: TimerKind) -> Vec<Command> {
        let id = seq.state().timers.armed(kind).expect("timer armed");
        seq.handle(noon(), Inbound::TimerFired { kind, id })
    }

    fn loaded(opts: SequencerOptions) -> Sequencer {
        let mut seq = Sequencer::new(opts, noon());
        seq.start();
        seq.handle(noon(), Inbound::VerseReady("Hello - John 1:1".into()));
        seq.handle(
            noon(),
            Inbound::FamilyPhotosReady {
                paths: photos(&["c.jpg", "b.jpg", "a.jpg"]),
                new_upload: false,
            },
        );
        seq
    }

    fn in_family(opts: SequencerOptions) -> Sequencer {
        let mut seq = loaded(opts);
        fire(&mut seq, TimerKind::Stage);
        fire(&mut seq, TimerKind::Stage);
        assert_eq!(seq.mode(), DisplayMode::Family);
        seq
    }

    #[test]
    fn start_requests_data_and_polls() {
        let mut seq = Sequencer::new(options(), noon());
        let out = seq.start();
        assert!(out.contains(&Command::Request(Request::Verse)));
        assert!(out.contains(&Command::Request(Request::PhotoSync)));
        assert!(out.contains(&Command::Request(Request::CameraMedia)));
        assert!(out.contains(&Command::Render(View::Loading)));
        assert!(armed_id(&out, TimerKind::Stage).is_some());
    }

    #[test]
    fn loading_poll_rearms_until_data_arrives() {
        let mut seq = Sequencer::new(options(), noon());
        seq.start();
        let out = fire(&mut seq, TimerKind::Stage);
        assert_eq!(seq.mode(), DisplayMode::Loading);
        assert!(armed_id(&out, TimerKind::Stage).is_some());
    }

    #[test]
    fn verse_alone_does_not_leave_loading() {
        let mut seq = Sequencer::new(options(), noon());
        seq.start();
        seq.handle(noon(), Inbound::VerseReady("v".into()));
        assert_eq!(seq.mode(), DisplayMode::Loading);
        seq.handle(
            noon(),
            Inbound::CameraMediaReady {
                images: photos(&["cam.jpg"]),
                videos: vec![],
            },
        );
        assert_eq!(seq.mode(), DisplayMode::Verse);
    }

    #[test]
    fn verse_view_splits_reference() {
        let seq = loaded(options());
        assert_eq!(
            seq.view(),
            View::Verse(VerseText {
                text: "Hello".into(),
                reference: Some("John 1:1".into()),
            })
        );
    }

    #[test]
    fn verse_to_camera_requests_fetch_when_cache_empty() {
        let mut seq = loaded(options());
        let out = fire(&mut seq, TimerKind::Stage);
        assert_eq!(seq.mode(), DisplayMode::Camera);
        assert!(out.contains(&Command::Request(Request::CameraMedia)));
        assert_eq!(
            seq.view(),
            View::Unavailable {
                category: DisplayMode::Camera,
                message: "Camera images not available"
            }
        );
        assert!(!seq.state().timers.is_armed(TimerKind::Advance));
    }

    #[test]
    fn camera_images_arriving_mid_stage_start_cycling() {
        let mut seq = loaded(options());
        fire(&mut seq, TimerKind::Stage);
        let out = seq.handle(
            noon(),
            Inbound::CameraMediaReady {
                images: photos(&["front_1.jpg", "back_1.jpg"]),
                videos: vec![],
            },
        );
        assert_eq!(seq.camera_item(), Some("front_1.jpg"));
        assert!(armed_id(&out, TimerKind::Advance).is_some());
        fire(&mut seq, TimerKind::Advance);
        assert_eq!(seq.camera_item(), Some("back_1.jpg"));
    }

    #[test]
    fn empty_camera_delivery_keeps_cache() {
        let mut seq = loaded(options());
        seq.handle(
            noon(),
            Inbound::CameraMediaReady {
                images: photos(&["front_1.jpg"]),
                videos: vec![],
            },
        );
        seq.handle(
            noon(),
            Inbound::CameraMediaReady {
                images: vec![],
                videos: vec![],
            },
        );
        assert_eq!(seq.state().camera, photos(&["front_1.jpg"]));
    }

    #[test]
    fn show_camera_disabled_skips_camera_stage() {
        let mut seq = loaded(SequencerOptions {
            show_camera: false,
            ..options()
        });
        fire(&mut seq, TimerKind::Stage);
        assert_eq!(seq.mode(), DisplayMode::Family);
    }

    #[test]
    fn family_cycles_sequentially() {
        let mut seq = in_family(options());
        assert_eq!(seq.family_item(), Some("c.jpg"));
        fire(&mut seq, TimerKind::Advance);
        assert_eq!(seq.family_item(), Some("b.jpg"));
        fire(&mut seq, TimerKind::Advance);
        fire(&mut seq, TimerKind::Advance);
        assert_eq!(seq.family_item(), Some("c.jpg"));
    }

    #[test]
    fn stale_timer_is_a_no_op() {
        let mut seq = in_family(options());
        let stale = seq.state().timers.armed(TimerKind::Advance).unwrap();
        fire(&mut seq, TimerKind::Advance);
        let before = seq.family_item().map(str::to_string);
        let out = seq.handle(
            noon(),
            Inbound::TimerFired {
                kind: TimerKind::Advance,
                id: stale,
            },
        );
        assert!(out.is_empty());
        assert_eq!(seq.family_item().map(str::to_string), before);
    }

    #[test]
    fn newest_photo_in_family_shows_immediately() {
        let mut seq = in_family(options());
        fire(&mut seq, TimerKind::Advance);
        let out = seq.handle(
            noon(),
            Inbound::FamilyPhotosReady {
                paths: photos(&["d.jpg", "c.jpg", "b.jpg", "a.jpg"]),
                new_upload: true,
            },
        );
        assert_eq!(seq.family_item(), Some("d.jpg"));
        assert!(armed_id(&out, TimerKind::Advance).is_some());
    }

    #[test]
    fn duplicate_newest_report_interrupts_once() {
        let mut seq = in_family(options());
        let list = photos(&["d.jpg", "c.jpg", "b.jpg", "a.jpg"]);
        seq.handle(
            noon(),
            Inbound::FamilyPhotosReady {
                paths: list.clone(),
                new_upload: true,
            },
        );
        fire(&mut seq, TimerKind::Advance);
        assert_eq!(seq.family_item(), Some("c.jpg"));
        let out = seq.handle(
            noon(),
            Inbound::FamilyPhotosReady {
                paths: list,
                new_upload: true,
            },
        );
        assert_eq!(seq.family_item(), Some("c.jpg"));
        assert!(armed_id(&out, TimerKind::Advance).is_none());
    }

    #[test]
    fn queue_policy_waits_for_family_stage() {
        let mut seq = loaded(options());
        seq.handle(
            noon(),
            Inbound::FamilyPhotosReady {
                paths: photos(&["d.jpg", "c.jpg", "b.jpg", "a.jpg"]),
                new_upload: true,
            },
        );
        assert_eq!(seq.mode(), DisplayMode::Verse);
        fire(&mut seq, TimerKind::Stage);
        assert_eq!(seq.mode(), DisplayMode::Camera);
        fire(&mut seq, TimerKind::Stage);
        assert_eq!(seq.mode(), DisplayMode::Family);
        assert_eq!(seq.family_item(), Some("d.jpg"));
    }

    #[test]
    fn switch_policy_leaves_verse_for_family() {
        let mut seq = loaded(SequencerOptions {
            new_photo_policy: NewPhotoPolicy::SwitchToFamily,
            ..options()
        });
        let out = seq.handle(
            noon(),
            Inbound::FamilyPhotosReady {
                paths: photos(&["d.jpg", "c.jpg", "b.jpg", "a.jpg"]),
                new_upload: true,
            },
        );
        assert_eq!(seq.mode(), DisplayMode::Family);
        assert_eq!(seq.family_item(), Some("d.jpg"));
        assert!(!seq.state().timers.is_armed(TimerKind::Stage));
        assert!(out.iter().any(|c| matches!(c, Command::Cancel { kind: TimerKind::Stage, .. })));
    }

    #[test]
    fn newest_first_disabled_just_grows_rotation() {
        let mut seq = in_family(SequencerOptions {
            show_newest_first: false,
            ..options()
        });
        seq.handle(
            noon(),
            Inbound::FamilyPhotosReady {
                paths: photos(&["d.jpg", "c.jpg", "b.jpg", "a.jpg"]),
                new_upload: true,
            },
        );
        assert_eq!(seq.family_item(), Some("c.jpg"));
        let mut rest = Vec::new();
        for _ in 0..3 {
            fire(&mut seq, TimerKind::Advance);
            rest.extend(seq.family_item().map(str::to_string));
        }
        assert_eq!(rest, photos(&["b.jpg", "a.jpg", "d.jpg"]));
    }

    #[test]
    fn camera_refresh_follows_image_by_name() {
        let mut seq = loaded(options());
        fire(&mut seq, TimerKind::Stage);
        seq.handle(
            noon(),
            Inbound::CameraMediaReady {
                images: photos(&["front_2.jpg", "front_1.jpg"]),
                videos: vec![],
            },
        );
        fire(&mut seq, TimerKind::Advance);
        assert_eq!(seq.camera_item(), Some("front_1.jpg"));
        seq.handle(
            noon(),
            Inbound::CameraMediaReady {
                images: photos(&["front_3.jpg", "front_2.jpg", "front_1.jpg"]),
                videos: vec![],
            },
        );
        assert_eq!(seq.camera_item(), Some("front_1.jpg"));
        fire(&mut seq, TimerKind::Advance);
        assert_eq!(seq.camera_item(), Some("front_3.jpg"));
    }

    #[test]
    fn replaced_family_list_keeps_photo_on_screen() {
        let mut seq = in_family(options());
        fire(&mut seq, TimerKind::Advance);
        assert_eq!(seq.family_item(), Some("b.jpg"));
        seq.handle(
            noon(),
            Inbound::FamilyPhotosReady {
                paths: photos(&["e.jpg", "b.jpg", "a.jpg"]),
                new_upload: false,
            },
        );
        assert_eq!(seq.family_item(), Some("b.jpg"));
        fire(&mut seq, TimerKind::Advance);
        assert_eq!(seq.family_item(), Some("a.jpg"));
    }

    #[test]
    fn embedded_run_is_found_by_path() {
        let old = photos(&["c", "b"]);
        assert_eq!(embedded_at(&old, &photos(&["d", "c", "b"])), Some(1));
        assert_eq!(embedded_at(&old, &photos(&["c", "b", "a"])), Some(0));
        assert_eq!(embedded_at(&old, &photos(&["c", "x", "b"])), None);
        assert_eq!(embedded_at(&[], &photos(&["a"])), None);
    }

    #[test]
    fn motion_interrupts_and_restores_family() {
        let mut seq = in_family(options());
        fire(&mut seq, TimerKind::Advance);
        let shown = seq.family_item().map(str::to_string);
        seq.handle(
            noon(),
            Inbound::CameraMediaReady {
                images: vec![],
                videos: photos(&["clip1.mp4", "clip2.mp4"]),
            },
        );
        assert_eq!(seq.mode(), DisplayMode::Motion);
        assert!(!seq.state().timers.is_armed(TimerKind::Advance));
        assert!(seq.state().timers.is_armed(TimerKind::MotionWatchdog));
        assert_eq!(seq.view().item(), Some("clip1.mp4"));

        let out = fire(&mut seq, TimerKind::Motion);
        assert_eq!(seq.mode(), DisplayMode::Family);
        assert_eq!(seq.family_item().map(str::to_string), shown);
        assert!(armed_id(&out, TimerKind::Advance).is_some());
        assert!(!seq.state().timers.is_armed(TimerKind::MotionWatchdog));
    }

    #[test]
    fn motion_disabled_only_updates_camera() {
        let mut seq = in_family(SequencerOptions {
            prioritize_motion_clips: false,
            ..options()
        });
        seq.handle(
            noon(),
            Inbound::CameraMediaReady {
                images: photos(&["cam.jpg"]),
                videos: photos(&["clip1.mp4"]),
            },
        );
        assert_eq!(seq.mode(), DisplayMode::Family);
    }

    #[test]
    fn retriggered_motion_keeps_original_return_mode() {
        let mut seq = loaded(options());
        let clips = Inbound::CameraMediaReady {
            images: vec![],
            videos: photos(&["clip1.mp4"]),
        };
        seq.handle(noon(), clips.clone());
        seq.handle(noon(), clips);
        assert_eq!(
            seq.state().motion.as_ref().map(|m| m.previous_mode),
            Some(DisplayMode::Verse)
        );
        fire(&mut seq, TimerKind::Motion);
        assert_eq!(seq.mode(), DisplayMode::Verse);
    }

    #[test]
    fn retriggered_motion_restarts_its_clock() {
        let mut seq = in_family(options());
        let clips = Inbound::CameraMediaReady {
            images: vec![],
            videos: photos(&["clip1.mp4"]),
        };
        seq.handle(noon(), clips.clone());
        let later = noon() + chrono::Duration::seconds(5);
        seq.handle(later, clips);
        assert_eq!(seq.state().motion.as_ref().map(|m| m.started_at), Some(later));
        let id = seq.state().timers.armed(TimerKind::Motion).unwrap();
        seq.handle(later, Inbound::TimerFired { kind: TimerKind::Motion, id });
        assert_eq!(seq.mode(), DisplayMode::Family);
    }

    #[test]
    fn clips_loop_until_duration_elapses() {
        let mut seq = in_family(options());
        seq.handle(
            noon(),
            Inbound::CameraMediaReady {
                images: vec![],
                videos: photos(&["a.mp4", "b.mp4"]),
            },
        );
        seq.handle(noon(), Inbound::ClipFinished);
        assert_eq!(seq.view().item(), Some("b.mp4"));
        seq.handle(noon(), Inbound::ClipFinished);
        assert_eq!(seq.view().item(), Some("a.mp4"));
        assert_eq!(seq.mode(), DisplayMode::Motion);
    }

    #[test]
    fn watchdog_forces_resume() {
        let mut seq = in_family(options());
        seq.handle(
            noon(),
            Inbound::CameraMediaReady {
                images: vec![],
                videos: photos(&["a.mp4"]),
            },
        );
        fire(&mut seq, TimerKind::MotionWatchdog);
        assert_eq!(seq.mode(), DisplayMode::Family);
        assert!(!seq.state().timers.is_armed(TimerKind::Motion));
    }

    #[test]
    fn failing_clips_fall_back_to_family_not_previous() {
        let mut seq = loaded(options());
        seq.handle(
            noon(),
            Inbound::CameraMediaReady {
                images: vec![],
                videos: photos(&["a.mp4", "b.mp4"]),
            },
        );
        seq.handle(noon(), Inbound::ClipFailed("a.mp4".into()));
        assert_eq!(seq.mode(), DisplayMode::Motion);
        assert_eq!(seq.view().item(), Some("b.mp4"));
        seq.handle(noon(), Inbound::ClipFailed("b.mp4".into()));
        assert_eq!(seq.mode(), DisplayMode::Family);
        assert!(seq.family_item().is_some());
        assert!(seq.state().timers.is_armed(TimerKind::Advance));
        assert!(!seq.state().timers.is_armed(TimerKind::Motion));
    }

    #[test]
    fn stage_due_during_motion_runs_after_resume() {
        let mut seq = loaded(options());
        seq.handle(
            noon(),
            Inbound::CameraMediaReady {
                images: vec![],
                videos: photos(&["a.mp4"]),
            },
        );
        fire(&mut seq, TimerKind::Stage);
        assert_eq!(seq.mode(), DisplayMode::Motion);
        assert!(seq.state().stage_deferred);
        fire(&mut seq, TimerKind::Motion);
        assert_eq!(seq.mode(), DisplayMode::Camera);
    }

    #[test]
    fn switch_policy_during_motion_resumes_into_newest() {
        let mut seq = loaded(SequencerOptions {
            new_photo_policy: NewPhotoPolicy::SwitchToFamily,
            ..options()
        });
        seq.handle(
            noon(),
            Inbound::CameraMediaReady {
                images: vec![],
                videos: photos(&["a.mp4"]),
            },
        );
        seq.handle(
            noon(),
            Inbound::FamilyPhotosReady {
                paths: photos(&["d.jpg", "c.jpg", "b.jpg", "a.jpg"]),
                new_upload: true,
            },
        );
        assert_eq!(seq.mode(), DisplayMode::Motion);
        fire(&mut seq, TimerKind::Motion);
        assert_eq!(seq.mode(), DisplayMode::Family);
        assert_eq!(seq.family_item(), Some("d.jpg"));
    }

    #[test]
    fn failed_item_is_skipped() {
        let mut seq = in_family(options());
        seq.handle(noon(), Inbound::ItemFailed("c.jpg".into()));
        assert_eq!(seq.family_item(), Some("b.jpg"));
        // Reports for items no longer on screen are ignored.
        seq.handle(noon(), Inbound::ItemFailed("c.jpg".into()));
        assert_eq!(seq.family_item(), Some("b.jpg"));
    }

    #[test]
    fn all_items_failing_stops_skipping() {
        let mut seq = in_family(options());
        seq.handle(noon(), Inbound::ItemFailed("c.jpg".into()));
        seq.handle(noon(), Inbound::ItemFailed("b.jpg".into()));
        let out = seq.handle(noon(), Inbound::ItemFailed("a.jpg".into()));
        assert!(out.is_empty());
        assert_eq!(seq.family_item(), Some("a.jpg"));
    }

    #[test]
    fn hour_change_restarts_with_verse() {
        let mut seq = in_family(options());
        seq.handle(
            noon(),
            Inbound::CameraMediaReady {
                images: vec![],
                videos: photos(&["a.mp4"]),
            },
        );
        let later = noon() + chrono::Duration::minutes(61);
        let out = seq.handle(later, Inbound::ClockTick);
        assert_eq!(seq.mode(), DisplayMode::Verse);
        assert!(seq.state().motion.is_none());
        assert!(out.contains(&Command::Request(Request::Verse)));
        assert!(out.contains(&Command::Request(Request::CameraMedia)));
        for kind in [TimerKind::Advance, TimerKind::Motion, TimerKind::MotionWatchdog] {
            assert!(!seq.state().timers.is_armed(kind), "{kind:?} still armed");
        }
        assert!(seq.state().timers.is_armed(TimerKind::Stage));
        assert!(seq.handle(later, Inbound::ClockTick).is_empty());
    }
}
