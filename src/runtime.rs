/*
 *  runtime.rs
 *
 *  SchoolRing - the day at a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Event loop owning the face engine, its timers and its I/O
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

use chrono::{DateTime, FixedOffset, Local};
use log::{debug, error, info, trace, warn};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

use crate::config::FaceConfig;
use crate::display::FaceSurface;
use crate::engine::{Action, FaceEngine, TapKind};
use crate::error::FaceError;
use crate::lunch::LunchMenu;
use crate::provider::{DataProvider, ProviderError};
use crate::render::{render, Bounds};
use crate::schedule::SchoolDay;
use crate::scheduler::{next_tick_delay, RefreshScheduler, TimerFired, TimerKind};
use crate::token::{acquire_token, token_from_item, AuthToken, DataEvent, TokenChannel, TokenSettings};

/// Wall clock. The offset of `now()` is also the zone class times are
/// shown in.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Lifecycle signals from whatever hosts the face.
#[derive(Debug, Clone, PartialEq)]
pub enum FaceEvent {
    Activate,
    Deactivate,
    Visible(bool),
    Ambient(bool),
    Properties { low_bit_ambient: bool, burn_in_protection: bool },
    Tap { x: i32, y: i32, kind: TapKind },
    Bounds { bounds: Bounds, round: bool },
    TimeTick,
    TimeZoneChanged,
}

#[derive(Debug)]
enum Message {
    Lifecycle(FaceEvent),
    Timer(TimerFired),
    Token(AuthToken),
    /// Tagged with the request number; only the newest request is applied.
    Schedule(u64, Result<Value, ProviderError>),
    Lunch(Result<Value, ProviderError>),
}

impl From<TimerFired> for Message {
    fn from(fired: TimerFired) -> Self {
        Message::Timer(fired)
    }
}

/// Cloneable lifecycle port into a running face.
#[derive(Debug, Clone)]
pub struct FaceHandle {
    tx: UnboundedSender<Message>,
}

impl FaceHandle {
    pub fn send(&self, event: FaceEvent) -> Result<(), FaceError> {
        self.tx
            .send(Message::Lifecycle(event))
            .map_err(|_| FaceError::Closed)
    }

    pub fn activate(&self) -> Result<(), FaceError> {
        self.send(FaceEvent::Activate)
    }

    pub fn deactivate(&self) -> Result<(), FaceError> {
        self.send(FaceEvent::Deactivate)
    }

    pub fn set_visible(&self, visible: bool) -> Result<(), FaceError> {
        self.send(FaceEvent::Visible(visible))
    }

    pub fn enter_ambient(&self, ambient: bool) -> Result<(), FaceError> {
        self.send(FaceEvent::Ambient(ambient))
    }

    pub fn properties_changed(&self, low_bit_ambient: bool, burn_in_protection: bool) -> Result<(), FaceError> {
        self.send(FaceEvent::Properties { low_bit_ambient, burn_in_protection })
    }

    pub fn tap(&self, x: i32, y: i32, kind: TapKind) -> Result<(), FaceError> {
        self.send(FaceEvent::Tap { x, y, kind })
    }

    pub fn bounds_changed(&self, bounds: Bounds, round: bool) -> Result<(), FaceError> {
        self.send(FaceEvent::Bounds { bounds, round })
    }

    pub fn time_tick(&self) -> Result<(), FaceError> {
        self.send(FaceEvent::TimeTick)
    }

    pub fn time_zone_changed(&self) -> Result<(), FaceError> {
        self.send(FaceEvent::TimeZoneChanged)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Single owner of the engine. Timer firings, fetch results, token pushes
/// and lifecycle events all arrive on one mailbox and are handled in order.
pub struct FaceRuntime {
    engine: FaceEngine,
    token_settings: TokenSettings,
    provider: Arc<dyn DataProvider>,
    tokens: Arc<dyn TokenChannel>,
    surface: Box<dyn FaceSurface>,
    clock: Arc<dyn Clock>,
    scheduler: RefreshScheduler<Message>,
    schedule_request: u64,
    liveness: CancellationToken,
    tx: UnboundedSender<Message>,
    rx: UnboundedReceiver<Message>,
}

impl FaceRuntime {
    pub fn new(
        config: FaceConfig,
        token_settings: TokenSettings,
        provider: Arc<dyn DataProvider>,
        tokens: Arc<dyn TokenChannel>,
        surface: Box<dyn FaceSurface>,
        clock: Arc<dyn Clock>,
    ) -> (Self, FaceHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let liveness = CancellationToken::new();
        let scheduler = RefreshScheduler::new(liveness.clone(), tx.clone());
        let runtime = Self {
            engine: FaceEngine::new(config),
            token_settings,
            provider,
            tokens,
            surface,
            clock,
            scheduler,
            schedule_request: 0,
            liveness,
            tx: tx.clone(),
            rx,
        };
        (runtime, FaceHandle { tx })
    }

    /// Runs until the face is deactivated.
    pub async fn run(mut self) {
        info!("Face runtime started");
        while let Some(message) = self.rx.recv().await {
            let actions = self.handle(message);
            self.execute(actions);
            if self.engine.is_torn_down() {
                break;
            }
        }
        info!("Face runtime stopped");
    }

    fn handle(&mut self, message: Message) -> Vec<Action> {
        match message {
            Message::Lifecycle(event) => self.lifecycle(event),
            Message::Timer(fired) => {
                if !self.scheduler.accept(&fired) {
                    return Vec::new();
                }
                match fired.kind {
                    TimerKind::SchedulePoll => self.engine.schedule_poll_due(),
                    TimerKind::LunchPoll => self.engine.lunch_poll_due(),
                    TimerKind::Tick => self.engine.tick_due(),
                }
            }
            Message::Token(token) => self.engine.install_token(token),
            Message::Schedule(request, _) if request != self.schedule_request => {
                debug!("Dropping schedule response {} (latest is {})", request, self.schedule_request);
                Vec::new()
            }
            Message::Schedule(_, Ok(payload)) => {
                let now = self.clock.now();
                let day = SchoolDay::from_payload(&payload, self.engine.config().default_school_end, now.offset());
                self.engine.apply_schedule(day)
            }
            Message::Lunch(Ok(payload)) => {
                let menu = LunchMenu::from_payload(&payload, self.clock.now().date_naive());
                self.engine.apply_lunch(menu)
            }
            Message::Schedule(_, Err(e)) => {
                error!("Schedule poll failed: {}", e);
                Vec::new()
            }
            Message::Lunch(Err(e)) => {
                error!("Lunch poll failed: {}", e);
                Vec::new()
            }
        }
    }

    fn lifecycle(&mut self, event: FaceEvent) -> Vec<Action> {
        trace!("lifecycle {:?}", event);
        let engine = &mut self.engine;
        match event {
            FaceEvent::Activate => engine.activate(),
            FaceEvent::Deactivate => engine.deactivate(),
            FaceEvent::Visible(v) => engine.set_visible(v),
            FaceEvent::Ambient(a) => engine.enter_ambient(a),
            FaceEvent::Properties { low_bit_ambient, burn_in_protection } => {
                engine.properties_changed(low_bit_ambient, burn_in_protection)
            }
            FaceEvent::Tap { x, y, kind } => engine.tap(x, y, kind),
            FaceEvent::Bounds { bounds, round } => engine.bounds_changed(bounds, round),
            FaceEvent::TimeTick => engine.time_tick(),
            FaceEvent::TimeZoneChanged => engine.time_zone_changed(),
        }
    }

    fn execute(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Redraw => self.redraw(),
                Action::StartTick => {
                    self.redraw();
                    self.arm_tick();
                }
                Action::ArmTick => self.arm_tick(),
                Action::StopTick => self.scheduler.cancel(TimerKind::Tick),
                Action::FetchSchedule(token) => self.fetch_schedule(token),
                Action::ArmSchedulePoll => {
                    let every = self.engine.config().schedule_interval;
                    self.scheduler.arm(TimerKind::SchedulePoll, every);
                }
                Action::FetchLunch => self.fetch_lunch(),
                Action::ArmLunchPoll => {
                    let every = self.engine.config().lunch_interval;
                    self.scheduler.arm(TimerKind::LunchPoll, every);
                }
                Action::AcquireToken => self.acquire_token(),
                Action::Teardown => {
                    debug!("Cancelling timers and in-flight work");
                    self.scheduler.shutdown();
                }
            }
        }
    }

    fn arm_tick(&mut self) {
        let now_ms = self.clock.now().timestamp_millis();
        let delay = next_tick_delay(now_ms, self.engine.config().tick_interval);
        self.scheduler.arm(TimerKind::Tick, delay);
    }

    fn redraw(&mut self) {
        let state = *self.engine.display_state();
        if state.bounds.is_empty() {
            trace!("no bounds yet, frame skipped");
            return;
        }
        let now = self.clock.now().naive_local();
        let plan = render(
            &state,
            self.engine.school_day(),
            self.engine.lunch(),
            now,
            self.engine.config(),
            self.surface.measure(),
        );
        if let Err(e) = self.surface.present(&plan) {
            error!("Failed to present frame: {}", e);
        }
    }

    /// Runs `work` off the loop and posts its result back unless the face
    /// was torn down first.
    fn spawn_job<F>(&self, work: F)
    where
        F: std::future::Future<Output = Message> + Send + 'static,
    {
        let liveness = self.liveness.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = liveness.cancelled() => {}
                message = work => {
                    if !liveness.is_cancelled() {
                        let _ = tx.send(message);
                    }
                }
            }
        });
    }

    fn fetch_schedule(&mut self, token: AuthToken) {
        self.schedule_request += 1;
        let request = self.schedule_request;
        debug!("Fetching schedule (request {})", request);
        let provider = Arc::clone(&self.provider);
        self.spawn_job(async move { Message::Schedule(request, provider.fetch_schedule(&token).await) });
    }

    fn fetch_lunch(&self) {
        debug!("Fetching lunch");
        let provider = Arc::clone(&self.provider);
        self.spawn_job(async move { Message::Lunch(provider.fetch_lunch().await) });
    }

    /// One-shot discovery plus a standing subscription to token pushes.
    fn acquire_token(&self) {
        let liveness = self.liveness.clone();
        let tx = self.tx.clone();
        let settings = self.token_settings.clone();
        let mut events = self.tokens.subscribe();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = liveness.cancelled() => break,
                    event = events.recv() => event,
                };
                match event {
                    Ok(DataEvent::Changed(item)) => {
                        if let Some(token) = token_from_item(&item, &settings) {
                            debug!("Token pushed from {}", item.address);
                            if tx.send(Message::Token(token)).is_err() {
                                break;
                            }
                        }
                    }
                    Ok(DataEvent::Deleted(address)) => debug!("{} deleted, ignored", address),
                    Err(RecvError::Lagged(n)) => warn!("Missed {} companion events", n),
                    Err(RecvError::Closed) => break,
                }
            }
            trace!("token subscription ended");
        });

        let tokens = Arc::clone(&self.tokens);
        let settings = self.token_settings.clone();
        let tx = self.tx.clone();
        let liveness = self.liveness.clone();
        tokio::spawn(async move {
            let acquired = tokio::select! {
                _ = liveness.cancelled() => return,
                acquired = acquire_token(tokens.as_ref(), &settings) => acquired,
            };
            match acquired {
                Ok(Some(token)) if !liveness.is_cancelled() => {
                    let _ = tx.send(Message::Token(token));
                }
                Ok(_) => {}
                Err(e) => error!("Token acquisition failed: {}", e),
            }
        });
    }
}
