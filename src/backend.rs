//! Remote persistence and connectivity collaborators.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::actions::{AchievementPayload, Action, GoalPayload, RunPayload};
use crate::error::Result;

/// Hosted backend receiving runs, goal changes and achievements.
///
/// Any error is treated as retryable by the offline queue.
pub trait Backend: Send + Sync + 'static {
    fn save_run(&self, run: &RunPayload) -> impl Future<Output = Result<()>> + Send;

    fn create_goal(&self, goal: &GoalPayload) -> impl Future<Output = Result<()>> + Send;

    fn update_goal(&self, goal: &GoalPayload) -> impl Future<Output = Result<()>> + Send;

    fn delete_goal(&self, goal_id: &str) -> impl Future<Output = Result<()>> + Send;

    fn record_achievement(
        &self,
        achievement: &AchievementPayload,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Send one action to the matching backend operation.
pub async fn dispatch<B: Backend>(backend: &B, action: &Action) -> Result<()> {
    match action {
        Action::SaveRun(run) => backend.save_run(run).await,
        Action::CreateGoal(goal) => backend.create_goal(goal).await,
        Action::UpdateGoal(goal) => backend.update_goal(goal).await,
        Action::DeleteGoal { goal_id } => backend.delete_goal(goal_id).await,
        Action::RecordAchievement(achievement) => backend.record_achievement(achievement).await,
    }
}

/// Network reachability as seen by the host.
pub trait Connectivity: Send + Sync + 'static {
    fn is_online(&self) -> bool;
}

/// Connectivity flag the host flips from its own reachability listener.
#[derive(Debug, Clone)]
pub struct ConnectivityFlag {
    online: Arc<AtomicBool>,
}

impl ConnectivityFlag {
    pub fn new(online: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(online)),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl Connectivity for ConnectivityFlag {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

impl<T: Backend> Backend for Arc<T> {
    async fn save_run(&self, run: &RunPayload) -> Result<()> {
        self.as_ref().save_run(run).await
    }

    async fn create_goal(&self, goal: &GoalPayload) -> Result<()> {
        self.as_ref().create_goal(goal).await
    }

    async fn update_goal(&self, goal: &GoalPayload) -> Result<()> {
        self.as_ref().update_goal(goal).await
    }

    async fn delete_goal(&self, goal_id: &str) -> Result<()> {
        self.as_ref().delete_goal(goal_id).await
    }

    async fn record_achievement(&self, achievement: &AchievementPayload) -> Result<()> {
        self.as_ref().record_achievement(achievement).await
    }
}
