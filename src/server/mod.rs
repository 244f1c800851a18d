// Control server module
// Loopback HTTP endpoint that step commands call into while a job runs

mod handlers;
mod tmpl_handler;
pub mod tmpl_types;

pub use handlers::{create_router, health_check, HealthStatus};
pub use tmpl_handler::{handle_tmpl, TmplError};

use anyhow::{bail, Context, Result};
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::interpolate::{Engine, Interpolator};
use crate::job::JobContext;

/// Control server state, shared read-only across requests
pub struct ControlServer {
    /// Variables of the job being executed
    job: Arc<JobContext>,
    /// Substitution engine used by /tmpl
    interpolator: Arc<dyn Interpolator>,
    config: ServerConfig,
    started_at: Instant,
}

impl ControlServer {
    /// Create a control server using the default interpolation engine
    pub fn new(job: JobContext, config: ServerConfig) -> Self {
        Self::with_interpolator(job, config, Arc::new(Engine::new()))
    }

    pub fn with_interpolator(
        job: JobContext,
        config: ServerConfig,
        interpolator: Arc<dyn Interpolator>,
    ) -> Self {
        Self {
            job: Arc::new(job),
            interpolator,
            config,
            started_at: Instant::now(),
        }
    }

    /// Bind the listener without serving yet, so callers can learn the port
    pub async fn bind(self) -> Result<BoundServer> {
        let addr: SocketAddr = self
            .config
            .bind_address
            .parse()
            .with_context(|| format!("Invalid bind address: {}", self.config.bind_address))?;

        // /tmpl reads and writes arbitrary paths, never expose it off-host
        if !addr.ip().is_loopback() {
            bail!("Control server must bind a loopback address, got {}", addr);
        }

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind control server on {}", addr))?;
        let local_addr = listener.local_addr()?;

        let app = create_router(Arc::new(self)).layer(TraceLayer::new_for_http());

        tracing::info!(%local_addr, "Control server listening");

        Ok(BoundServer {
            listener,
            local_addr,
            app,
        })
    }

    pub fn job(&self) -> &Arc<JobContext> {
        &self.job
    }

    pub fn interpolator(&self) -> &Arc<dyn Interpolator> {
        &self.interpolator
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// A control server with its listener bound
pub struct BoundServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    app: Router,
}

impl BoundServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until `shutdown` resolves
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}
