use std::time::Duration;

use super::Command;

/// The independent timer slots owned by the sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKind {
    /// Next item within Family or Camera.
    Advance,
    /// Verse -> Camera -> Family, and the loading poll.
    Stage,
    /// End of the motion interrupt.
    Motion,
    /// Forces the motion resume if the motion timer never lands.
    MotionWatchdog,
}

impl TimerKind {
    pub const ALL: [TimerKind; 4] = [
        TimerKind::Advance,
        TimerKind::Stage,
        TimerKind::Motion,
        TimerKind::MotionWatchdog,
    ];
}

/// Identity of one arming. A firing whose id is no longer armed is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// At most one live timer per kind.
#[derive(Debug, Default)]
pub struct TimerSlots {
    next_id: u64,
    advance: Option<TimerId>,
    stage: Option<TimerId>,
    motion: Option<TimerId>,
    watchdog: Option<TimerId>,
}

impl TimerSlots {
    fn slot(&self, kind: TimerKind) -> &Option<TimerId> {
        match kind {
            TimerKind::Advance => &self.advance,
            TimerKind::Stage => &self.stage,
            TimerKind::Motion => &self.motion,
            TimerKind::MotionWatchdog => &self.watchdog,
        }
    }

    fn slot_mut(&mut self, kind: TimerKind) -> &mut Option<TimerId> {
        match kind {
            TimerKind::Advance => &mut self.advance,
            TimerKind::Stage => &mut self.stage,
            TimerKind::Motion => &mut self.motion,
            TimerKind::MotionWatchdog => &mut self.watchdog,
        }
    }

    pub fn armed(&self, kind: TimerKind) -> Option<TimerId> {
        *self.slot(kind)
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.slot(kind).is_some()
    }

    /// Cancel whatever `kind` holds, then arm a fresh timer.
    pub fn arm(&mut self, kind: TimerKind, after: Duration, out: &mut Vec<Command>) -> TimerId {
        self.cancel(kind, out);
        self.next_id += 1;
        let id = TimerId(self.next_id);
        *self.slot_mut(kind) = Some(id);
        out.push(Command::Arm { kind, id, after });
        id
    }

    pub fn cancel(&mut self, kind: TimerKind, out: &mut Vec<Command>) {
        if let Some(id) = self.slot_mut(kind).take() {
            out.push(Command::Cancel { kind, id });
        }
    }

    pub fn cancel_all(&mut self, out: &mut Vec<Command>) {
        for kind in TimerKind::ALL {
            self.cancel(kind, out);
        }
    }

    /// Consume the slot if `id` is its live timer. Returns `false` for stale firings.
    pub fn fire(&mut self, kind: TimerKind, id: TimerId) -> bool {
        let slot = self.slot_mut(kind);
        if *slot == Some(id) {
            *slot = None;
            true
        } else {
            false
        }
    }
}
