//! REST backend for queued writes.
//!
//! Talks to a PostgREST-style API:
//! - `POST /rest/v1/runs`
//! - `POST /rest/v1/goals`, `PATCH`/`DELETE /rest/v1/goals?id=eq.{id}`
//! - `POST /rest/v1/user_achievements`
//!
//! Every request carries the project `apikey` header and the user's bearer
//! token. Non-2xx responses become [`TrackerError::Http`] so the offline queue
//! retries them.

use std::time::Duration;

use log::{debug, warn};
use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;

use crate::actions::{AchievementPayload, GoalPayload, RunPayload};
use crate::backend::Backend;
use crate::error::{Result, TrackerError};

const REQUEST_TIMEOUT_SECS: u64 = 30;

const RUNS_TABLE: &str = "runs";
const GOALS_TABLE: &str = "goals";
const ACHIEVEMENTS_TABLE: &str = "user_achievements";

/// Backend over HTTP.
pub struct RestBackend {
    client: Client,
    base_url: String,
    api_key: String,
    access_token: String,
}

impl RestBackend {
    /// Create a backend for `base_url` (e.g. `https://project.example.co`).
    pub fn new(base_url: &str, api_key: &str, access_token: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| TrackerError::Http {
                message: format!("Failed to create HTTP client: {}", e),
                status_code: None,
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            access_token: access_token.to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn row_url(&self, table: &str, id: &str) -> String {
        format!("{}?id=eq.{}", self.table_url(table), id)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.access_token)
            .header("Prefer", "return=minimal")
    }

    async fn send(&self, method: Method, url: String, body: Option<&impl Serialize>) -> Result<()> {
        debug!("[RestBackend] {} {}", method, url);
        let mut request = self.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        warn!("[RestBackend] {} {} failed: HTTP {}", method, url, status);
        Err(TrackerError::Http {
            message: if message.is_empty() {
                status.to_string()
            } else {
                message
            },
            status_code: Some(status.as_u16()),
        })
    }
}

impl Backend for RestBackend {
    async fn save_run(&self, run: &RunPayload) -> Result<()> {
        self.send(Method::POST, self.table_url(RUNS_TABLE), Some(run))
            .await
    }

    async fn create_goal(&self, goal: &GoalPayload) -> Result<()> {
        self.send(Method::POST, self.table_url(GOALS_TABLE), Some(goal))
            .await
    }

    async fn update_goal(&self, goal: &GoalPayload) -> Result<()> {
        self.send(
            Method::PATCH,
            self.row_url(GOALS_TABLE, &goal.goal_id),
            Some(goal),
        )
        .await
    }

    async fn delete_goal(&self, goal_id: &str) -> Result<()> {
        self.send(
            Method::DELETE,
            self.row_url(GOALS_TABLE, goal_id),
            None::<&()>,
        )
        .await
    }

    async fn record_achievement(&self, achievement: &AchievementPayload) -> Result<()> {
        self.send(
            Method::POST,
            self.table_url(ACHIEVEMENTS_TABLE),
            Some(achievement),
        )
        .await
    }
}
