use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Result, bail};
use tokio::sync::broadcast;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::{Instant, MissedTickBehavior, interval, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace};

use crate::events::{Inbound, Request, View};
use crate::sequencer::{Command, Sequencer, TimerId, TimerKind, WallClock};

/// Real-time timers for the sequencer's commands.
#[derive(Debug, Default)]
struct TimerTable {
    armed: BTreeMap<TimerKind, (TimerId, Instant)>,
}

impl TimerTable {
    fn arm(&mut self, kind: TimerKind, id: TimerId, after: Duration) {
        self.armed.insert(kind, (id, Instant::now() + after));
    }

    fn cancel(&mut self, kind: TimerKind, id: TimerId) {
        if self.armed.get(&kind).is_some_and(|(armed, _)| *armed == id) {
            self.armed.remove(&kind);
        }
    }

    fn next(&self) -> Option<(TimerKind, TimerId, Instant)> {
        self.armed
            .iter()
            .map(|(kind, (id, at))| (*kind, *id, *at))
            .min_by_key(|(_, _, at)| *at)
    }
}

/// Wiring between the pure sequencer and the rest of the process.
pub struct Channels {
    pub inbound: Receiver<Inbound>,
    pub requests: broadcast::Sender<Request>,
    pub views: Sender<View>,
}

/// Drive `sequencer` until cancelled: feeds it collaborator events, timer
/// firings, and clock ticks, and executes the commands it returns.
#[instrument(skip_all, fields(clock_poll = %humantime::format_duration(clock_poll)))]
pub async fn run(
    mut sequencer: Sequencer,
    clock: WallClock,
    clock_poll: Duration,
    channels: Channels,
    cancel: CancellationToken,
) -> Result<()> {
    let Channels {
        mut inbound,
        requests,
        views,
    } = channels;
    let mut timers = TimerTable::default();
    let mut ticker = interval(clock_poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let commands = sequencer.start();
    execute(commands, &mut timers, &requests, &views).await?;

    loop {
        let next = timers.next();
        let due = async move {
            match next {
                Some((_, _, at)) => sleep_until(at).await,
                None => std::future::pending().await,
            }
        };
        let event = tokio::select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting sequencer task");
                break;
            }
            event = inbound.recv() => match event {
                Some(event) => event,
                None => {
                    info!("all collaborators gone; exiting sequencer task");
                    break;
                }
            },
            _ = due => match next {
                Some((kind, id, _)) => {
                    timers.armed.remove(&kind);
                    Inbound::TimerFired { kind, id }
                }
                None => continue,
            },
            _ = ticker.tick() => Inbound::ClockTick,
        };
        trace!(event = ?event, "sequencer event");
        let commands = sequencer.handle(clock.now(), event);
        execute(commands, &mut timers, &requests, &views).await?;
    }
    Ok(())
}

async fn execute(
    commands: Vec<Command>,
    timers: &mut TimerTable,
    requests: &broadcast::Sender<Request>,
    views: &Sender<View>,
) -> Result<()> {
    for command in commands {
        match command {
            Command::Arm { kind, id, after } => timers.arm(kind, id, after),
            Command::Cancel { kind, id } => timers.cancel(kind, id),
            Command::Request(request) => {
                if requests.send(request).is_err() {
                    debug!(request = ?request, "no collaborator listening");
                }
            }
            Command::Render(view) => {
                if views.send(view).await.is_err() {
                    bail!("display channel closed");
                }
            }
        }
    }
    Ok(())
}
