//! Shared fakes for integration tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use run_tracker::{
    AchievementPayload, Backend, Coordinate, GoalPayload, LocationProvider, Result, RunPayload,
    SampleCallback, SubscriptionHandle, TrackerError,
};

/// Route test output through `RUST_LOG`.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Backend that records what it was asked to write and can be told to fail.
#[derive(Default)]
pub struct RecordingBackend {
    pub failing: AtomicBool,
    runs: Mutex<Vec<RunPayload>>,
    calls: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl RecordingBackend {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn runs(&self) -> Vec<RunPayload> {
        self.runs.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn attempt(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.failing.load(Ordering::SeqCst) {
            Err(TrackerError::Http {
                message: "service unavailable".to_string(),
                status_code: Some(503),
            })
        } else {
            Ok(())
        }
    }
}

impl Backend for RecordingBackend {
    async fn save_run(&self, run: &RunPayload) -> Result<()> {
        self.attempt("save_run".to_string())?;
        self.runs.lock().unwrap().push(run.clone());
        Ok(())
    }

    async fn create_goal(&self, goal: &GoalPayload) -> Result<()> {
        self.attempt(format!("create_goal:{}", goal.goal_id))
    }

    async fn update_goal(&self, goal: &GoalPayload) -> Result<()> {
        self.attempt(format!("update_goal:{}", goal.goal_id))
    }

    async fn delete_goal(&self, goal_id: &str) -> Result<()> {
        self.attempt(format!("delete_goal:{}", goal_id))
    }

    async fn record_achievement(&self, achievement: &AchievementPayload) -> Result<()> {
        self.attempt(format!("record_achievement:{}", achievement.achievement_id))
    }
}

/// Location provider that replays fixes pushed by the test.
pub struct ScriptedProvider {
    pub granted: AtomicBool,
    callback: Mutex<Option<SampleCallback>>,
}

#[allow(dead_code)]
impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            granted: AtomicBool::new(true),
            callback: Mutex::new(None),
        }
    }

    pub fn emit(&self, sample: Coordinate) {
        if let Some(callback) = self.callback.lock().unwrap().as_ref() {
            callback(sample);
        }
    }

    pub fn is_watching(&self) -> bool {
        self.callback.lock().unwrap().is_some()
    }
}

impl LocationProvider for ScriptedProvider {
    fn request_permission(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    fn current_position(&self) -> Option<Coordinate> {
        Some(Coordinate::new(51.5074, -0.1278, 0))
    }

    fn watch_position(&self, callback: SampleCallback) -> Result<SubscriptionHandle> {
        *self.callback.lock().unwrap() = Some(callback);
        Ok(SubscriptionHandle(1))
    }

    fn unwatch(&self, _handle: SubscriptionHandle) {
        self.callback.lock().unwrap().take();
    }
}
