//! Swarm runner: ramps virtual users up and stops them at the deadline

use crate::api::AuthApi;
use crate::collector::OutcomeCollector;
use crate::config::{Config, ConfigError};
use crate::session::{SessionIdentity, SessionSettings, VirtualUserSession};
use futures_util::future::join_all;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{Instrument, info, info_span, warn};

/// What a finished run looked like from the driver's side
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwarmReport {
    /// Sessions actually started (fewer than configured if stopped during ramp-up)
    pub spawned: usize,
    pub elapsed: Duration,
    pub interrupted: bool,
}

/// Spawns `users` independent sessions and stops them together
pub struct SwarmRunner {
    config: Config,
    settings: Arc<SessionSettings>,
    api: Arc<dyn AuthApi>,
    collector: Arc<dyn OutcomeCollector>,
}

impl SwarmRunner {
    pub fn new(
        config: Config,
        api: Arc<dyn AuthApi>,
        collector: Arc<dyn OutcomeCollector>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let settings = Arc::new(SessionSettings::from_config(&config)?);
        Ok(Self {
            config,
            settings,
            api,
            collector,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Delay between two session starts, `None` to start everyone at once
    pub fn spawn_interval(&self) -> Option<Duration> {
        let rate = self.config.swarm.spawn_rate;
        if rate.is_finite() && rate > 0.0 {
            Duration::try_from_secs_f64(1.0 / rate).ok()
        } else {
            None
        }
    }

    /// Run until `run_time` elapses or `interrupt` resolves.
    ///
    /// Sessions finish their in-flight request before stopping; this returns
    /// once every session task has exited.
    pub async fn run<F>(&self, interrupt: F) -> SwarmReport
    where
        F: Future<Output = ()>,
    {
        let users = self.config.swarm.users;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let start = Instant::now();
        let mut rng = StdRng::from_os_rng();

        let deadline = tokio::time::sleep(self.config.swarm.run_time);
        tokio::pin!(deadline);
        tokio::pin!(interrupt);

        info!(
            "Starting {} users ({}) against {} for {:?}",
            users,
            self.config.scenario.name(),
            self.config.target_host,
            self.config.swarm.run_time
        );

        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(users);
        let mut stopped_early = None;

        for idx in 0..users {
            if idx > 0
                && let Some(interval) = self.spawn_interval()
            {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = &mut deadline => {
                        stopped_early = Some(false);
                        break;
                    }
                    _ = &mut interrupt => {
                        stopped_early = Some(true);
                        break;
                    }
                }
            }

            handles.push(self.spawn_session(&mut rng, shutdown_rx.clone()));
            metrics::gauge!("authswarm_users_active").set(handles.len() as f64);

            if (idx + 1) % 50 == 0 {
                info!("Spawned {}/{} users", idx + 1, users);
            }
        }

        let interrupted = match stopped_early {
            Some(interrupted) => interrupted,
            None => {
                info!("All {} users spawned", handles.len());
                tokio::select! {
                    _ = &mut deadline => false,
                    _ = &mut interrupt => true,
                }
            }
        };

        if interrupted {
            info!("Interrupted, stopping {} users", handles.len());
        } else {
            info!("Run time elapsed, stopping {} users", handles.len());
        }
        let _ = shutdown_tx.send(true);

        let spawned = handles.len();
        for result in join_all(handles).await {
            if let Err(e) = result {
                warn!("Session task ended abnormally: {}", e);
            }
        }
        metrics::gauge!("authswarm_users_active").set(0.0);

        SwarmReport {
            spawned,
            elapsed: start.elapsed(),
            interrupted,
        }
    }

    fn spawn_session(&self, rng: &mut StdRng, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let identity = SessionIdentity::generate(&self.config.identity, rng);
        let session = VirtualUserSession::new(
            identity,
            self.settings.clone(),
            self.api.clone(),
            self.collector.clone(),
        )
        .with_rng(StdRng::from_rng(rng));

        let span = info_span!("session", id = %session.id());
        tokio::spawn(session.run(shutdown).instrument(span))
    }
}
