//! Typed backend writes carried by the offline queue.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::record::FinalRunRecord;

/// Upload form of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunPayload {
    /// RFC 3339 start time
    pub started_at: String,
    /// RFC 3339 end time
    pub ended_at: String,
    pub distance_km: f64,
    pub duration_seconds: u32,
    pub avg_speed_kmh: f64,
    pub max_speed_kmh: f64,
    pub pace: String,
    pub elevation_gain_m: f64,
    pub calories_kcal: u32,
    /// Simplified route as a Google encoded polyline
    pub route_polyline: String,
    pub point_count: u32,
}

impl RunPayload {
    pub fn from_record(record: &FinalRunRecord) -> Self {
        let stats = &record.stats;
        Self {
            started_at: rfc3339(record.started_at_millis.unwrap_or_default()),
            ended_at: rfc3339(record.ended_at_millis.unwrap_or_default()),
            distance_km: stats.distance_km,
            duration_seconds: stats.duration_seconds,
            avg_speed_kmh: stats.avg_speed_kmh,
            max_speed_kmh: stats.max_speed_kmh,
            pace: stats.pace.clone(),
            elevation_gain_m: stats.elevation_gain_m,
            calories_kcal: stats.calories_kcal,
            route_polyline: record.encoded_polyline(),
            point_count: record.route.len() as u32,
        }
    }
}

fn rfc3339(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    Distance,
    Duration,
    RunCount,
    Calories,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalPayload {
    pub goal_id: String,
    pub title: String,
    pub goal_type: GoalType,
    pub target_value: f64,
    pub current_value: f64,
    /// RFC 3339 deadline, if any
    pub deadline: Option<String>,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementPayload {
    pub achievement_id: String,
    /// Run that earned it, when there is one
    pub run_id: Option<String>,
    /// RFC 3339 time it was earned
    pub earned_at: String,
    pub value: Option<f64>,
}

/// A pending write to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Action {
    SaveRun(RunPayload),
    CreateGoal(GoalPayload),
    UpdateGoal(GoalPayload),
    DeleteGoal { goal_id: String },
    RecordAchievement(AchievementPayload),
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::SaveRun(_) => ActionKind::SaveRun,
            Action::CreateGoal(_) => ActionKind::CreateGoal,
            Action::UpdateGoal(_) => ActionKind::UpdateGoal,
            Action::DeleteGoal { .. } => ActionKind::DeleteGoal,
            Action::RecordAchievement(_) => ActionKind::RecordAchievement,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    SaveRun,
    CreateGoal,
    UpdateGoal,
    DeleteGoal,
    RecordAchievement,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::SaveRun => "save_run",
            ActionKind::CreateGoal => "create_goal",
            ActionKind::UpdateGoal => "update_goal",
            ActionKind::DeleteGoal => "delete_goal",
            ActionKind::RecordAchievement => "record_achievement",
        };
        f.write_str(name)
    }
}

/// An [`Action`] waiting in the offline queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedAction {
    pub id: String,
    pub action: Action,
    pub enqueued_at_millis: i64,
    /// Failed delivery attempts so far
    pub retry_count: u32,
}

impl QueuedAction {
    pub fn new(action: Action, enqueued_at_millis: i64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            action,
            enqueued_at_millis,
            retry_count: 0,
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.action.kind()
    }
}
