//! Load test configuration
//!
//! Configuration starts from a scenario profile and is then overridden by
//! environment variables. Numeric overrides that fail to parse are ignored;
//! unknown enum values and inconsistent settings are reported as [`ConfigError`].

use crate::api::EndpointPaths;
use crate::pacing::PacingPolicy;
use crate::task::{TaskSelector, TaskWeights};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Unknown value {value:?} for {var}")]
    UnknownValue { var: &'static str, value: String },

    #[error("USERS must be at least 1")]
    NoUsers,

    #[error("At least one task weight must be non-zero")]
    NoEnabledTasks,

    #[error("Task weights sum to {0}, above the supported maximum of {max}", max = u32::MAX)]
    WeightOverflow(u64),

    #[error("SPAWN_RATE {0} is too low to schedule session starts")]
    InvalidSpawnRate(f64),

    #[error("Invalid wait range: min={min}s max={max}s")]
    InvalidWaitRange { min: f64, max: f64 },

    #[error("TOKEN_FIELDS must name at least one field")]
    NoTokenFields,

    #[error("EMAIL_ID_MAX must be at least 1")]
    EmptyEmailRange,

    #[error("MAX_FAILURE_RATE must be within 0.0..=1.0, got {0}")]
    InvalidFailureRate(f64),
}

/// Named presets distinguishing realistic load from saturation runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scenario {
    /// Realistic traffic: 1-3s think time
    #[default]
    Load,
    /// Capacity probing: 1-2s think time
    Capacity,
    /// No think time at all
    Saturation,
    /// Logout-heavy mix with `token`-first lookup and password confirmation
    Mixed,
}

impl Scenario {
    pub fn name(&self) -> &'static str {
        match self {
            Scenario::Load => "load",
            Scenario::Capacity => "capacity",
            Scenario::Saturation => "saturation",
            Scenario::Mixed => "mixed",
        }
    }
}

impl FromStr for Scenario {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "load" => Ok(Scenario::Load),
            "capacity" => Ok(Scenario::Capacity),
            "saturation" => Ok(Scenario::Saturation),
            "mixed" => Ok(Scenario::Mixed),
            _ => Err(ConfigError::UnknownValue {
                var: "SCENARIO",
                value: s.to_string(),
            }),
        }
    }
}

/// Which family of endpoint paths the target exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndpointLayout {
    /// `/api/register`, `/api/login`
    #[default]
    Standard,
    /// `/api/test/register`, `/api/test/login`
    TestPrefixed,
}

impl EndpointLayout {
    pub fn paths(&self) -> EndpointPaths {
        match self {
            EndpointLayout::Standard => EndpointPaths {
                register: "/api/register".to_string(),
                login: "/api/login".to_string(),
                logout: "/api/logout".to_string(),
            },
            EndpointLayout::TestPrefixed => EndpointPaths {
                register: "/api/test/register".to_string(),
                login: "/api/test/login".to_string(),
                logout: "/api/logout".to_string(),
            },
        }
    }
}

impl FromStr for EndpointLayout {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(EndpointLayout::Standard),
            "test" | "test_prefixed" => Ok(EndpointLayout::TestPrefixed),
            _ => Err(ConfigError::UnknownValue {
                var: "ENDPOINT_LAYOUT",
                value: s.to_string(),
            }),
        }
    }
}

/// How a session picks its email
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentityMode {
    /// Every session shares `fixed_email` (contention scenario)
    #[default]
    Fixed,
    /// `user_<n>@example.com` with a random `n` per session
    Unique,
}

impl FromStr for IdentityMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed" => Ok(IdentityMode::Fixed),
            "unique" => Ok(IdentityMode::Unique),
            _ => Err(ConfigError::UnknownValue {
                var: "IDENTITY_MODE",
                value: s.to_string(),
            }),
        }
    }
}

/// What happens to the held token when logout is rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogoutFailurePolicy {
    /// Keep the token so a later cycle retries logout
    #[default]
    KeepToken,
    /// Drop the token, matching login's clear-on-ambiguity behavior
    ClearToken,
}

impl FromStr for LogoutFailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keep" => Ok(LogoutFailurePolicy::KeepToken),
            "clear" => Ok(LogoutFailurePolicy::ClearToken),
            _ => Err(ConfigError::UnknownValue {
                var: "LOGOUT_FAILURE_POLICY",
                value: s.to_string(),
            }),
        }
    }
}

/// Main load test configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Profile the defaults were taken from
    pub scenario: Scenario,
    /// Base URL of the API under test
    pub target_host: String,
    /// Endpoint path family
    pub endpoints: EndpointLayout,

    /// Swarm sizing and duration
    pub swarm: SwarmConfig,

    /// Credentials used by each session
    pub identity: IdentityConfig,

    /// Per-session behavior
    pub session: SessionConfig,

    /// Reporting and exit gate
    pub report: ReportConfig,
}

/// Swarm-related configuration
#[derive(Debug, Clone)]
pub struct SwarmConfig {
    /// Number of concurrent virtual users
    pub users: usize,
    /// Users started per second (<= 0 starts everyone at once)
    pub spawn_rate: f64,
    /// Total run length
    pub run_time: Duration,
    /// Per-request timeout
    pub request_timeout: Duration,
}

/// Identity-related configuration
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub mode: IdentityMode,
    /// Shared email for [`IdentityMode::Fixed`]
    pub fixed_email: String,
    /// Upper bound (inclusive) of the generated id for [`IdentityMode::Unique`]
    pub email_id_max: u32,
    pub password: String,
    /// Display name sent on register
    pub name: String,
    /// Include `password_confirmation` in the register payload
    pub send_password_confirmation: bool,
}

/// Session behavior configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Register once in `on_start` before the task cycle
    pub eager_register: bool,
    pub weights: TaskWeights,
    pub pacing: PacingPolicy,
    /// Ordered token field names tried on the login response
    pub token_fields: Vec<String>,
    pub logout_failure_policy: LogoutFailurePolicy,
}

/// Reporting configuration
#[derive(Debug, Clone, Default)]
pub struct ReportConfig {
    /// Fail the process when the overall failure rate exceeds this fraction
    pub max_failure_rate: Option<f64>,
    /// Where to write the JSON run summary
    pub summary_path: Option<PathBuf>,
    /// Bind address for the Prometheus `/metrics` endpoint
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for Config {
    fn default() -> Self {
        Self::for_scenario(Scenario::default())
    }
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            users: 10,
            spawn_rate: 1.0,
            run_time: Duration::from_secs(60),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            mode: IdentityMode::Fixed,
            fixed_email: "user_test@example.com".to_string(),
            email_id_max: 1_000_000,
            password: "password123".to_string(),
            name: "Test User".to_string(),
            send_password_confirmation: false,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            eager_register: false,
            weights: TaskWeights::default(),
            pacing: PacingPolicy::default(),
            token_fields: vec!["access_token".to_string(), "token".to_string()],
            logout_failure_policy: LogoutFailurePolicy::KeepToken,
        }
    }
}

impl Config {
    /// Defaults for a named scenario
    pub fn for_scenario(scenario: Scenario) -> Self {
        let base = Self {
            scenario,
            target_host: "http://127.0.0.1:8000".to_string(),
            endpoints: EndpointLayout::default(),
            swarm: SwarmConfig::default(),
            identity: IdentityConfig::default(),
            session: SessionConfig::default(),
            report: ReportConfig::default(),
        };

        match scenario {
            Scenario::Load => base,
            Scenario::Capacity => Self {
                session: SessionConfig {
                    pacing: PacingPolicy::between_secs(1.0, 2.0),
                    ..base.session
                },
                ..base
            },
            Scenario::Saturation => Self {
                session: SessionConfig {
                    pacing: PacingPolicy::Constant(Duration::ZERO),
                    ..base.session
                },
                ..base
            },
            Scenario::Mixed => Self {
                identity: IdentityConfig {
                    email_id_max: 100_000,
                    send_password_confirmation: true,
                    ..base.identity
                },
                session: SessionConfig {
                    weights: TaskWeights {
                        register: 1,
                        login: 2,
                        logout: 3,
                    },
                    token_fields: vec!["token".to_string(), "access_token".to_string()],
                    logout_failure_policy: LogoutFailurePolicy::ClearToken,
                    ..base.session
                },
                ..base
            },
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let scenario = match lookup("SCENARIO") {
            Some(val) if !val.is_empty() => val.parse()?,
            _ => Scenario::default(),
        };
        let mut config = Self::for_scenario(scenario);

        // Target
        if let Some(host) = lookup("TARGET_HOST")
            && !host.is_empty()
        {
            config.target_host = host.trim_end_matches('/').to_string();
        }
        if let Some(val) = lookup("ENDPOINT_LAYOUT") {
            config.endpoints = val.parse()?;
        }

        // Swarm config
        if let Some(val) = lookup("USERS")
            && let Ok(v) = val.parse()
        {
            config.swarm.users = v;
        }
        if let Some(val) = lookup("SPAWN_RATE")
            && let Ok(v) = val.parse()
        {
            config.swarm.spawn_rate = v;
        }
        if let Some(val) = lookup("RUN_TIME_SECS")
            && let Ok(secs) = val.parse::<u64>()
        {
            config.swarm.run_time = Duration::from_secs(secs);
        }
        if let Some(val) = lookup("REQUEST_TIMEOUT_SECS")
            && let Ok(secs) = val.parse::<u64>()
        {
            config.swarm.request_timeout = Duration::from_secs(secs);
        }

        // Identity config
        if let Some(val) = lookup("IDENTITY_MODE") {
            config.identity.mode = val.parse()?;
        }
        if let Some(email) = lookup("FIXED_EMAIL")
            && !email.is_empty()
        {
            config.identity.fixed_email = email;
        }
        if let Some(val) = lookup("EMAIL_ID_MAX")
            && let Ok(v) = val.parse()
        {
            config.identity.email_id_max = v;
        }
        if let Some(password) = lookup("USER_PASSWORD") {
            config.identity.password = password;
        }
        if let Some(name) = lookup("USER_NAME") {
            config.identity.name = name;
        }
        if let Some(val) = lookup("SEND_PASSWORD_CONFIRMATION") {
            config.identity.send_password_confirmation = parse_flag(&val);
        }

        // Session config
        if let Some(val) = lookup("EAGER_REGISTER") {
            config.session.eager_register = parse_flag(&val);
        }
        if let Some(val) = lookup("WEIGHT_REGISTER")
            && let Ok(v) = val.parse()
        {
            config.session.weights.register = v;
        }
        if let Some(val) = lookup("WEIGHT_LOGIN")
            && let Ok(v) = val.parse()
        {
            config.session.weights.login = v;
        }
        if let Some(val) = lookup("WEIGHT_LOGOUT")
            && let Ok(v) = val.parse()
        {
            config.session.weights.logout = v;
        }
        let wait_min = lookup("WAIT_MIN_SECS").and_then(|v| v.parse::<f64>().ok());
        let wait_max = lookup("WAIT_MAX_SECS").and_then(|v| v.parse::<f64>().ok());
        if wait_min.is_some() || wait_max.is_some() {
            let (cur_min, cur_max) = pacing_bounds(&config.session.pacing);
            let min = wait_min.unwrap_or(cur_min);
            let max = wait_max.unwrap_or(cur_max);
            validate_wait_range(min, max)?;
            config.session.pacing = PacingPolicy::between_secs(min, max);
        }
        if let Some(val) = lookup("TOKEN_FIELDS") {
            config.session.token_fields = val
                .split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(val) = lookup("LOGOUT_FAILURE_POLICY") {
            config.session.logout_failure_policy = val.parse()?;
        }

        // Report config
        if let Some(val) = lookup("MAX_FAILURE_RATE")
            && let Ok(v) = val.parse()
        {
            config.report.max_failure_rate = Some(v);
        }
        if let Some(path) = lookup("SUMMARY_PATH")
            && !path.is_empty()
        {
            config.report.summary_path = Some(PathBuf::from(path));
        }
        if let Some(val) = lookup("METRICS_ADDR")
            && let Ok(addr) = val.parse()
        {
            config.report.metrics_addr = Some(addr);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.swarm.users == 0 {
            return Err(ConfigError::NoUsers);
        }
        self.task_selector()?;
        let rate = self.swarm.spawn_rate;
        if rate.is_finite() && rate > 0.0 && Duration::try_from_secs_f64(1.0 / rate).is_err() {
            return Err(ConfigError::InvalidSpawnRate(rate));
        }
        let (min, max) = pacing_bounds(&self.session.pacing);
        validate_wait_range(min, max)?;
        if self.session.token_fields.is_empty() {
            return Err(ConfigError::NoTokenFields);
        }
        if self.identity.email_id_max == 0 {
            return Err(ConfigError::EmptyEmailRange);
        }
        if let Some(rate) = self.report.max_failure_rate
            && !(0.0..=1.0).contains(&rate)
        {
            return Err(ConfigError::InvalidFailureRate(rate));
        }
        Ok(())
    }

    /// Weighted selector over the enabled tasks
    pub fn task_selector(&self) -> Result<TaskSelector, ConfigError> {
        let total = self.session.weights.total();
        if total > u64::from(u32::MAX) {
            return Err(ConfigError::WeightOverflow(total));
        }
        TaskSelector::new(self.session.weights).ok_or(ConfigError::NoEnabledTasks)
    }

    /// Full URL for an endpoint path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.target_host, path)
    }
}

fn parse_flag(val: &str) -> bool {
    val.to_lowercase() == "true" || val == "1"
}

fn pacing_bounds(pacing: &PacingPolicy) -> (f64, f64) {
    match pacing {
        PacingPolicy::Constant(d) => (d.as_secs_f64(), d.as_secs_f64()),
        PacingPolicy::Between { min, max } => (min.as_secs_f64(), max.as_secs_f64()),
    }
}

fn validate_wait_range(min: f64, max: f64) -> Result<(), ConfigError> {
    if !min.is_finite() || !max.is_finite() || min < 0.0 || min > max {
        return Err(ConfigError::InvalidWaitRange { min, max });
    }
    if Duration::try_from_secs_f64(max).is_err() {
        return Err(ConfigError::InvalidWaitRange { min, max });
    }
    Ok(())
}
