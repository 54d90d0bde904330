//! Process wiring: registry, authenticated client, listener and loop

use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::{AppConfig, ConfigError};
use crate::observability::{ExporterMetrics, MetricsError};
use crate::scheduler::Scheduler;
use crate::server;
use crate::updater::Updater;
use crate::upstream::{AriaClient, AuthError, Upstream};

#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("metrics registry error: {0}")]
    Metrics(#[from] MetricsError),

    #[error("listener error: {0}")]
    Io(#[from] std::io::Error),
}

/// A ready-to-run exporter: registry built and session authenticated
pub struct Exporter {
    config: Arc<AppConfig>,
    metrics: Arc<ExporterMetrics>,
    client: Arc<AriaClient>,
}

impl Exporter {
    /// Build the registry, then authenticate. Fails before anything listens.
    pub async fn bootstrap(config: AppConfig) -> Result<Self, ExporterError> {
        let metrics = Arc::new(ExporterMetrics::new(&config.labels)?);
        let client = AriaClient::connect(
            &config.upstream,
            &config.metrics.timeouts,
            Arc::clone(&metrics),
        )
        .await?;

        Ok(Self {
            config: Arc::new(config),
            metrics,
            client: Arc::new(client),
        })
    }

    pub fn metrics(&self) -> Arc<ExporterMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn updater(&self) -> Updater {
        let upstream: Arc<dyn Upstream> = Arc::clone(&self.client) as Arc<dyn Upstream>;
        Updater::new(upstream, Arc::clone(&self.config), Arc::clone(&self.metrics))
    }

    /// Bind the configured port and run until `shutdown` resolves
    pub async fn run(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ExporterError> {
        let listener = server::bind(self.config.exporter.port).await?;
        self.serve(listener, shutdown).await
    }

    /// Run the scrape listener and the collection loop on an existing listener
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ExporterError> {
        let (stop_tx, stop_rx) = watch::channel(false);
        tokio::spawn(async move {
            shutdown.await;
            let _ = stop_tx.send(true);
        });

        let mut server_stop = stop_rx.clone();
        let server = tokio::spawn(server::serve(listener, self.metrics(), async move {
            let _ = server_stop.wait_for(|stop| *stop).await;
        }));

        info!(
            host = %self.config.upstream.host,
            interval_secs = self.config.exporter.interval,
            "Exporter started"
        );

        let scheduler = Scheduler::new(
            Arc::new(self.updater()),
            self.config.exporter.interval(),
            self.config.exporter.error_cooldown(),
        );
        scheduler.run(stop_rx).await;

        match server.await {
            Ok(result) => result?,
            Err(e) => error!(error = %e, "Metrics listener task failed"),
        }

        info!("Exporter stopped");
        Ok(())
    }
}
