// End-to-end runs of the face runtime on a paused tokio clock.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use schoolring::config::FaceConfig;
use schoolring::display::{DisplayError, FaceSurface, MonoTextMeasure, SurfaceCapabilities};
use schoolring::provider::{DataProvider, ProviderError};
use schoolring::render::{Bounds, CenterContent, DrawPlan, TextMeasure};
use schoolring::runtime::{Clock, FaceHandle, FaceRuntime};
use schoolring::token::{AuthToken, CompanionNode, LocalTokenChannel, TokenSettings, TOKEN_CAPABILITY};
use schoolring::{FaceError, TapKind};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

const NODE: &str = "phone";

/// Wall clock that moves with tokio's (paused) clock.
struct TestClock {
    base: DateTime<FixedOffset>,
    start: Instant,
}

impl TestClock {
    fn at(rfc3339: &str) -> Self {
        Self {
            base: DateTime::parse_from_rfc3339(rfc3339).unwrap(),
            start: Instant::now(),
        }
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<FixedOffset> {
        let elapsed = chrono::Duration::from_std(self.start.elapsed()).unwrap();
        self.base + elapsed
    }
}

#[derive(Default)]
struct FakeProvider {
    schedule_calls: AtomicUsize,
    lunch_calls: AtomicUsize,
    tokens_seen: Mutex<Vec<String>>,
    latency: Duration,
    /// answered ten seconds late, with the first class renamed "Stale"
    slow_token: Option<&'static str>,
}

#[async_trait]
impl DataProvider for FakeProvider {
    async fn fetch_schedule(&self, token: &AuthToken) -> Result<Value, ProviderError> {
        self.schedule_calls.fetch_add(1, Ordering::SeqCst);
        self.tokens_seen.lock().unwrap().push(token.as_str().to_string());
        sleep(self.latency).await;
        let mut first = "Math";
        if self.slow_token == Some(token.as_str()) {
            sleep(Duration::from_secs(10)).await;
            first = "Stale";
        }
        Ok(json!({
            "schedule": {
                "day": "1",
                "classes": [
                    {
                        "class": { "name": first, "color": "#FF0000" },
                        "start": "2026-10-19T08:00:00Z",
                        "end": "2026-10-19T09:00:00Z"
                    },
                    {
                        "class": { "name": "History", "color": "#00FF00" },
                        "start": "2026-10-19T09:10:00Z",
                        "end": "2026-10-19T10:00:00Z"
                    }
                ]
            }
        }))
    }

    async fn fetch_lunch(&self) -> Result<Value, ProviderError> {
        self.lunch_calls.fetch_add(1, Ordering::SeqCst);
        sleep(self.latency).await;
        Ok(json!({
            "lunch": { "2026-10-19": { "upperschool": { "categories": { "Main Dish": ["Tacos"] } } } }
        }))
    }
}

#[derive(Default)]
struct Frames {
    count: AtomicUsize,
    last: Mutex<Option<DrawPlan>>,
}

impl Frames {
    fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    fn last(&self) -> DrawPlan {
        self.last.lock().unwrap().clone().expect("no frame presented")
    }
}

struct RecordingSurface {
    fonts: MonoTextMeasure,
    frames: Arc<Frames>,
}

impl FaceSurface for RecordingSurface {
    fn capabilities(&self) -> SurfaceCapabilities {
        SurfaceCapabilities { width: 400, height: 400, round: true, low_bit_ambient: false }
    }

    fn measure(&self) -> &dyn TextMeasure {
        &self.fonts
    }

    fn present(&mut self, plan: &DrawPlan) -> Result<(), DisplayError> {
        self.frames.count.fetch_add(1, Ordering::SeqCst);
        *self.frames.last.lock().unwrap() = Some(plan.clone());
        Ok(())
    }
}

struct Harness {
    handle: FaceHandle,
    provider: Arc<FakeProvider>,
    companion: LocalTokenChannel,
    frames: Arc<Frames>,
    task: JoinHandle<()>,
}

impl Harness {
    fn start(provider: FakeProvider, token: Option<&str>) -> Self {
        let settings = TokenSettings::default();
        let companion = LocalTokenChannel::new();
        companion.add_node(
            CompanionNode { id: NODE.to_string(), display_name: "Phone".to_string() },
            TOKEN_CAPABILITY,
        );
        if let Some(token) = token {
            companion.put_token(NODE, &settings, token);
        }

        let provider = Arc::new(provider);
        let frames = Arc::new(Frames::default());
        let surface = RecordingSurface { fonts: MonoTextMeasure::default(), frames: frames.clone() };
        let (runtime, handle) = FaceRuntime::new(
            FaceConfig::default(),
            settings,
            provider.clone(),
            Arc::new(companion.clone()),
            Box::new(surface),
            Arc::new(TestClock::at("2026-10-19T08:30:00.350Z")),
        );
        let task = tokio::spawn(runtime.run());
        handle.bounds_changed(Bounds::new(400, 400), true).unwrap();
        Harness { handle, provider, companion, frames, task }
    }

    fn schedule_calls(&self) -> usize {
        self.provider.schedule_calls.load(Ordering::SeqCst)
    }

    fn lunch_calls(&self) -> usize {
        self.provider.lunch_calls.load(Ordering::SeqCst)
    }
}

async fn settle() {
    sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn test_activation_fetches_and_draws() {
    let face = Harness::start(FakeProvider::default(), Some("jwt-1"));
    face.handle.activate().unwrap();
    face.handle.set_visible(true).unwrap();
    settle().await;

    assert_eq!(face.schedule_calls(), 1);
    assert_eq!(face.lunch_calls(), 1);
    assert_eq!(*face.provider.tokens_seen.lock().unwrap(), ["jwt-1"]);

    let plan = face.frames.last();
    assert_eq!(plan.percent_label.unwrap().text, "Math: 50%");
    assert_eq!(plan.next_class_label.unwrap().text, "History: 9:10");
    assert!(plan.class_ring.is_some());
    match plan.center {
        CenterContent::Time(label) => assert_eq!(label.text, "8:30"),
        other => panic!("unexpected centre {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_polls_follow_their_cadence() {
    let face = Harness::start(FakeProvider::default(), Some("jwt-1"));
    face.handle.activate().unwrap();
    settle().await;
    assert_eq!((face.schedule_calls(), face.lunch_calls()), (1, 1));

    sleep(Duration::from_secs(3600)).await;
    assert_eq!((face.schedule_calls(), face.lunch_calls()), (2, 1));

    sleep(Duration::from_secs(5 * 3600)).await;
    assert_eq!((face.schedule_calls(), face.lunch_calls()), (7, 2));
}

#[tokio::test(start_paused = true)]
async fn test_schedule_waits_for_pushed_token() {
    let face = Harness::start(FakeProvider::default(), None);
    face.handle.activate().unwrap();
    sleep(Duration::from_secs(7200)).await;
    assert_eq!(face.schedule_calls(), 0);
    assert_eq!(face.lunch_calls(), 1);

    face.companion.put_token(NODE, &TokenSettings::default(), "pushed");
    settle().await;
    assert_eq!(face.schedule_calls(), 1);
    assert_eq!(*face.provider.tokens_seen.lock().unwrap(), ["pushed"]);

    // the push armed the hourly chain
    sleep(Duration::from_secs(3600)).await;
    assert_eq!(face.schedule_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_replacement_token_does_not_double_the_chain() {
    let face = Harness::start(FakeProvider::default(), Some("first"));
    face.handle.activate().unwrap();
    settle().await;

    sleep(Duration::from_secs(1800)).await;
    face.companion.put_token(NODE, &TokenSettings::default(), "second");
    settle().await;
    assert_eq!(face.schedule_calls(), 2);

    // one hour after the push, not one hour after activation as well
    sleep(Duration::from_secs(3600)).await;
    assert_eq!(face.schedule_calls(), 3);
    assert_eq!(face.provider.tokens_seen.lock().unwrap().last().unwrap(), "second");
}

#[tokio::test(start_paused = true)]
async fn test_superseded_schedule_response_is_dropped() {
    let provider = FakeProvider { slow_token: Some("first"), ..FakeProvider::default() };
    let face = Harness::start(provider, Some("first"));
    face.handle.activate().unwrap();
    face.handle.set_visible(true).unwrap();
    settle().await;

    // the fetch for "first" is still in flight when "second" arrives
    face.companion.put_token(NODE, &TokenSettings::default(), "second");
    settle().await;
    assert_eq!(face.schedule_calls(), 2);
    assert!(face.frames.last().percent_label.unwrap().text.starts_with("Math"));

    sleep(Duration::from_secs(15)).await;
    assert!(face.frames.last().percent_label.unwrap().text.starts_with("Math"));
}

#[tokio::test(start_paused = true)]
async fn test_tick_stops_in_ambient_and_restarts() {
    let face = Harness::start(FakeProvider::default(), Some("jwt"));
    face.handle.activate().unwrap();
    face.handle.set_visible(true).unwrap();
    settle().await;

    let before = face.frames.count();
    sleep(Duration::from_secs(3)).await;
    assert!(face.frames.count() >= before + 3);

    face.handle.enter_ambient(true).unwrap();
    settle().await;
    let ambient = face.frames.count();
    assert_eq!(face.frames.last().class_ring.unwrap().color, FaceConfig::default().theme.ambient_ring);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(face.frames.count(), ambient);

    face.handle.enter_ambient(false).unwrap();
    settle().await;
    assert_eq!(face.frames.count(), ambient + 1);
    sleep(Duration::from_secs(2)).await;
    assert!(face.frames.count() >= ambient + 3);
}

#[tokio::test(start_paused = true)]
async fn test_tap_toggles_lunch_view() {
    let face = Harness::start(FakeProvider::default(), None);
    face.handle.activate().unwrap();
    face.handle.enter_ambient(true).unwrap();
    face.handle.set_visible(true).unwrap();
    settle().await;

    face.handle.tap(200, 200, TapKind::Touch).unwrap();
    settle().await;
    assert!(face.frames.last().tap_indicator.is_some());

    face.handle.tap(200, 200, TapKind::Tap).unwrap();
    settle().await;
    let plan = face.frames.last();
    assert!(plan.tap_indicator.is_none());
    match plan.center {
        CenterContent::Lunch(lines) => {
            let texts: Vec<String> = lines.into_iter().map(|l| l.text).collect();
            assert_eq!(texts, ["Lunch", "Tacos"]);
        }
        other => panic!("unexpected centre {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_teardown_drops_late_results() {
    let provider = FakeProvider { latency: Duration::from_secs(5), ..FakeProvider::default() };
    let face = Harness::start(provider, Some("jwt"));
    face.handle.activate().unwrap();
    face.handle.enter_ambient(true).unwrap();
    face.handle.set_visible(true).unwrap();
    settle().await;
    let frames = face.frames.count();

    face.handle.deactivate().unwrap();
    face.task.await.unwrap();

    sleep(Duration::from_secs(60)).await;
    assert_eq!(face.frames.count(), frames);
    assert!(matches!(face.handle.set_visible(true), Err(FaceError::Closed)));
}
