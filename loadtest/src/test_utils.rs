//! Test Utilities Module
//!
//! Scripted API and recording collector for exercising sessions without a
//! network. This module is only compiled when running tests.

#![cfg(test)]

use crate::api::{ApiError, ApiResponse, AuthApi};
use crate::collector::OutcomeCollector;
use crate::outcome::TaskOutcome;
use crate::task::TaskKind;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Mock API
// ============================================================================

/// Reply queued on a [`MockAuthApi`]
#[derive(Debug, Clone)]
pub enum MockReply {
    Response { status: u16, body: String },
    Timeout,
}

impl MockReply {
    pub fn json(status: u16, body: Value) -> Self {
        MockReply::Response {
            status,
            body: body.to_string(),
        }
    }

    pub fn raw(status: u16, body: &str) -> Self {
        MockReply::Response {
            status,
            body: body.to_string(),
        }
    }
}

/// A request observed by [`MockAuthApi`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub path: String,
    pub body: Option<Value>,
    pub bearer: Option<String>,
}

/// Replays queued replies in order; answers 503 once the queue is empty
#[derive(Default)]
pub struct MockAuthApi {
    replies: Mutex<VecDeque<MockReply>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockAuthApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, reply: MockReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthApi for MockAuthApi {
    async fn post(
        &self,
        path: &str,
        body: Option<&Value>,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, ApiError> {
        self.calls.lock().unwrap().push(RecordedCall {
            path: path.to_string(),
            body: body.cloned(),
            bearer: bearer.map(str::to_string),
        });

        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(MockReply::Response { status, body }) => Ok(ApiResponse::new(status, body)),
            Some(MockReply::Timeout) => Err(ApiError::Timeout(Duration::from_secs(30))),
            None => Ok(ApiResponse::new(503, "")),
        }
    }
}

// ============================================================================
// Recording Collector
// ============================================================================

/// Keeps every reported outcome in order
#[derive(Default)]
pub struct RecordingCollector {
    reports: Mutex<Vec<(TaskKind, TaskOutcome)>>,
}

impl RecordingCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcomes(&self) -> Vec<(TaskKind, TaskOutcome)> {
        self.reports.lock().unwrap().clone()
    }

    /// Failure reasons only
    pub fn reasons(&self) -> Vec<(TaskKind, String)> {
        self.outcomes()
            .into_iter()
            .filter_map(|(task, outcome)| outcome.reason().map(|r| (task, r)))
            .collect()
    }
}

impl OutcomeCollector for RecordingCollector {
    fn report(&self, task: TaskKind, outcome: &TaskOutcome, _elapsed: Duration) {
        self.reports.lock().unwrap().push((task, outcome.clone()));
    }
}
