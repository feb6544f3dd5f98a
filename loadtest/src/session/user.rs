//! A single simulated client running the register/login/logout cycle

use super::identity::SessionIdentity;
use super::token::{AuthToken, extract_token};
use crate::api::{ApiResponse, AuthApi, EndpointPaths};
use crate::collector::OutcomeCollector;
use crate::config::{Config, ConfigError, LogoutFailurePolicy};
use crate::outcome::{FailureKind, TaskOutcome};
use crate::pacing::PacingPolicy;
use crate::task::{TaskKind, TaskSelector};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

/// Behavior shared read-only by every session of a run
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub endpoints: EndpointPaths,
    pub token_fields: Vec<String>,
    pub send_password_confirmation: bool,
    pub logout_failure_policy: LogoutFailurePolicy,
    pub eager_register: bool,
    pub selector: TaskSelector,
    pub pacing: PacingPolicy,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let selector = config.task_selector()?;

        Ok(Self {
            endpoints: config.endpoints.paths(),
            token_fields: config.session.token_fields.clone(),
            send_password_confirmation: config.identity.send_password_confirmation,
            logout_failure_policy: config.session.logout_failure_policy,
            eager_register: config.session.eager_register,
            selector,
            pacing: config.session.pacing,
        })
    }
}

/// One virtual user.
///
/// Owns its identity and token exclusively; the API client and the
/// collector are the only shared collaborators. A session never has more
/// than one request in flight.
pub struct VirtualUserSession {
    id: Uuid,
    identity: SessionIdentity,
    token: Option<AuthToken>,
    settings: Arc<SessionSettings>,
    api: Arc<dyn AuthApi>,
    collector: Arc<dyn OutcomeCollector>,
    rng: StdRng,
}

impl VirtualUserSession {
    pub fn new(
        identity: SessionIdentity,
        settings: Arc<SessionSettings>,
        api: Arc<dyn AuthApi>,
        collector: Arc<dyn OutcomeCollector>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity,
            token: None,
            settings,
            api,
            collector,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Replace the task/pacing RNG, for reproducible runs
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn token(&self) -> Option<&AuthToken> {
        self.token.as_ref()
    }

    /// Lifecycle hook run once before the task cycle
    pub async fn on_start(&mut self) {
        if self.settings.eager_register {
            self.run_task(TaskKind::Register).await;
        }
    }

    /// Execute one task and report its outcome.
    ///
    /// Returns `None` when the task was skipped (logout without a token);
    /// nothing is reported in that case.
    pub async fn run_task(&mut self, task: TaskKind) -> Option<TaskOutcome> {
        let start = Instant::now();
        let outcome = match task {
            TaskKind::Register => Some(self.register().await),
            TaskKind::Login => Some(self.login().await),
            TaskKind::Logout => self.logout().await,
        };
        let elapsed = start.elapsed();

        match &outcome {
            Some(TaskOutcome::Success) => {
                debug!(%task, elapsed_ms = elapsed.as_millis() as u64, "task succeeded");
            }
            Some(TaskOutcome::Failure(kind)) => {
                debug!(%task, reason = %kind, "task failed");
            }
            None => debug!(%task, "task skipped"),
        }
        if let Some(outcome) = &outcome {
            self.collector.report(task, outcome, elapsed);
        }

        outcome
    }

    /// Pick the next task by weight and run it
    pub async fn step(&mut self) -> (TaskKind, Option<TaskOutcome>) {
        let task = self.settings.selector.pick(&mut self.rng);
        (task, self.run_task(task).await)
    }

    /// Next pacing interval
    pub fn next_delay(&mut self) -> Duration {
        self.settings.pacing.next_delay(&mut self.rng)
    }

    /// Run until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// Shutdown is observed between tasks and during pacing; an in-flight
    /// request always completes.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        if *shutdown.borrow() {
            return;
        }
        self.on_start().await;

        loop {
            let stopped = *shutdown.borrow();
            if stopped || shutdown.has_changed().is_err() {
                break;
            }
            self.step().await;

            let delay = self.next_delay();
            if delay.is_zero() {
                tokio::task::yield_now().await;
                continue;
            }
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        debug!(registered = self.identity.is_registered(), "session stopped");
    }

    async fn register(&mut self) -> TaskOutcome {
        let mut payload = Map::new();
        payload.insert("name".into(), json!(self.identity.name()));
        payload.insert("email".into(), json!(self.identity.email()));
        payload.insert("password".into(), json!(self.identity.password()));
        if self.settings.send_password_confirmation {
            payload.insert(
                "password_confirmation".into(),
                json!(self.identity.password()),
            );
        }
        let body = Value::Object(payload);

        match self
            .api
            .post(&self.settings.endpoints.register, Some(&body), None)
            .await
        {
            Ok(response) if response.is_ok() => {
                self.identity.mark_registered();
                TaskOutcome::Success
            }
            Ok(response) => FailureKind::HttpStatus(response.status).into(),
            Err(e) => FailureKind::Transport(e.to_string()).into(),
        }
    }

    async fn login(&mut self) -> TaskOutcome {
        let body = json!({
            "email": self.identity.email(),
            "password": self.identity.password(),
        });

        let response = match self
            .api
            .post(&self.settings.endpoints.login, Some(&body), None)
            .await
        {
            Ok(response) if response.is_ok() => response,
            Ok(response) => return FailureKind::HttpStatus(response.status).into(),
            Err(e) => return FailureKind::Transport(e.to_string()).into(),
        };

        match self.token_from(&response) {
            Ok(token) => {
                self.token = Some(token);
                TaskOutcome::Success
            }
            Err(kind) => kind.into(),
        }
    }

    async fn logout(&mut self) -> Option<TaskOutcome> {
        let token = self.token.clone()?;

        let outcome = match self
            .api
            .post(&self.settings.endpoints.logout, None, Some(token.as_str()))
            .await
        {
            Ok(response) if response.is_ok() => TaskOutcome::Success,
            Ok(response) => FailureKind::HttpStatus(response.status).into(),
            Err(e) => FailureKind::Transport(e.to_string()).into(),
        };

        match (&outcome, self.settings.logout_failure_policy) {
            (TaskOutcome::Success, _) | (_, LogoutFailurePolicy::ClearToken) => {
                self.token = None;
            }
            (TaskOutcome::Failure(_), LogoutFailurePolicy::KeepToken) => {}
        }

        Some(outcome)
    }

    fn token_from(&self, response: &ApiResponse) -> Result<AuthToken, FailureKind> {
        let body: Value = serde_json::from_slice(&response.body)
            .map_err(|e| FailureKind::BodyParse(e.to_string()))?;
        extract_token(&body, &self.settings.token_fields).ok_or(FailureKind::TokenMissing)
    }
}
