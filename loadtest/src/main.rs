use anyhow::Context;
use authswarm::{Config, HttpAuthApi, StatsCollector, SwarmRunner};
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Serve the Prometheus rendering on `GET /metrics` for the duration of the run
async fn serve_metrics(addr: SocketAddr, handle: PrometheusHandle) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding metrics endpoint on {}", addr))?;
    info!("Metrics available at http://{}/metrics", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "authswarm=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };
    info!(
        "Loaded configuration: scenario={}, target={}, users={}, spawn_rate={}/s",
        config.scenario.name(),
        config.target_host,
        config.swarm.users,
        config.swarm.spawn_rate
    );
    info!(
        "Pacing: {}, weights: register={} login={} logout={}, eager_register={}",
        config.session.pacing.describe(),
        config.session.weights.register,
        config.session.weights.login,
        config.session.weights.logout,
        config.session.eager_register
    );

    // Prometheus recorder must be installed before any metric is recorded
    if let Some(addr) = config.report.metrics_addr {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("installing Prometheus recorder")?;
        tokio::spawn(async move {
            if let Err(e) = serve_metrics(addr, handle).await {
                warn!("Metrics endpoint stopped: {:#}", e);
            }
        });
    }

    let api = HttpAuthApi::new(&config.target_host, config.swarm.request_timeout)
        .context("building HTTP client")?;
    let collector = Arc::new(StatsCollector::new());
    let runner = SwarmRunner::new(config.clone(), Arc::new(api), collector.clone())?;

    let report = runner.run(ctrl_c()).await;
    info!(
        "Stopped {} users after {:.1}s",
        report.spawned,
        report.elapsed.as_secs_f64()
    );

    let summary = collector.summary(config.scenario.name(), report.spawned, report.elapsed);
    summary.print();

    if let Some(ref path) = config.report.summary_path {
        std::fs::write(path, summary.to_json())
            .with_context(|| format!("writing summary to {:?}", path))?;
        info!("Summary written to {:?}", path);
    }

    if let Some(max) = config.report.max_failure_rate
        && summary.exceeds_failure_rate(max)
    {
        anyhow::bail!(
            "failure rate {:.2}% exceeds limit {:.2}%",
            summary.failure_rate * 100.0,
            max * 100.0
        );
    }

    Ok(())
}
