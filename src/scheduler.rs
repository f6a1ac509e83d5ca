/*
 *  scheduler.rs
 *
 *  SchoolRing - the day at a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Schedule poll, lunch poll and tick timers
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use log::{debug, trace};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    SchedulePoll,
    LunchPoll,
    Tick,
}

impl TimerKind {
    const ALL: [TimerKind; 3] = [TimerKind::SchedulePoll, TimerKind::LunchPoll, TimerKind::Tick];

    fn slot(self) -> usize {
        match self {
            TimerKind::SchedulePoll => 0,
            TimerKind::LunchPoll => 1,
            TimerKind::Tick => 2,
        }
    }
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerKind::SchedulePoll => write!(f, "schedule-poll"),
            TimerKind::LunchPoll => write!(f, "lunch-poll"),
            TimerKind::Tick => write!(f, "tick"),
        }
    }
}

/// Posted to the owning loop when a timer expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub kind: TimerKind,
    pub generation: u64,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    cancel: Option<CancellationToken>,
}

/// Owns the three one-shot timer slots. Each firing re-arms (or not) through
/// the engine, so every timer is self-rescheduling.
///
/// Arming a slot cancels whatever was pending in it and bumps its
/// generation; a firing whose generation no longer matches is stale.
pub struct RefreshScheduler<M> {
    liveness: CancellationToken,
    tx: UnboundedSender<M>,
    slots: [Slot; 3],
}

impl<M> RefreshScheduler<M>
where
    M: From<TimerFired> + Send + 'static,
{
    pub fn new(liveness: CancellationToken, tx: UnboundedSender<M>) -> Self {
        Self {
            liveness,
            tx,
            slots: Default::default(),
        }
    }

    /// Schedules `kind` to fire after `delay`, replacing any pending firing.
    pub fn arm(&mut self, kind: TimerKind, delay: Duration) -> u64 {
        let slot = &mut self.slots[kind.slot()];
        if let Some(pending) = slot.cancel.take() {
            pending.cancel();
        }
        slot.generation += 1;

        let generation = slot.generation;
        let token = self.liveness.child_token();
        slot.cancel = Some(token.clone());

        if self.liveness.is_cancelled() {
            trace!("{} not armed, scheduler torn down", kind);
            return generation;
        }

        let tx = self.tx.clone();
        let fired = TimerFired { kind, generation };
        trace!("{} armed for {:?} (gen {})", kind, delay, generation);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    trace!("{} gen {} cancelled", fired.kind, fired.generation);
                }
                _ = tokio::time::sleep(delay) => {
                    if !token.is_cancelled() {
                        let _ = tx.send(M::from(fired));
                    }
                }
            }
        });
        generation
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        let slot = &mut self.slots[kind.slot()];
        if let Some(pending) = slot.cancel.take() {
            debug!("{} cancelled", kind);
            pending.cancel();
        }
        slot.generation += 1;
    }

    /// Teardown: flips the liveness token, which takes every slot with it.
    pub fn shutdown(&mut self) {
        self.liveness.cancel();
        for kind in TimerKind::ALL {
            self.cancel(kind);
        }
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.slots[kind.slot()].cancel.is_some()
    }

    pub fn is_live(&self) -> bool {
        !self.liveness.is_cancelled()
    }

    /// True when `fired` is the current firing of a live scheduler. The slot
    /// is then empty until the engine arms it again.
    pub fn accept(&mut self, fired: &TimerFired) -> bool {
        if self.liveness.is_cancelled() {
            return false;
        }
        let slot = &mut self.slots[fired.kind.slot()];
        if slot.generation != fired.generation {
            trace!(
                "dropping stale {} (gen {}, current {})",
                fired.kind, fired.generation, slot.generation
            );
            return false;
        }
        slot.cancel = None;
        true
    }
}

/// Delay until the next multiple of `interval` on the epoch-millisecond
/// clock. Never zero; a clock sitting exactly on a boundary waits a full
/// interval.
pub fn next_tick_delay(now_ms: i64, interval: Duration) -> Duration {
    let interval_ms = (interval.as_millis() as i64).max(1);
    let delay = interval_ms - now_ms.rem_euclid(interval_ms);
    Duration::from_millis(delay as u64)
}
