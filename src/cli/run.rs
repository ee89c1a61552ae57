//! Long-running commands.

use crate::mcp::RpcServer;
use crate::models::ControlStatus;
use crate::services::MonitorService;
use crate::watcher::StopSignal;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Interval at which `run` checks that the pipeline is still alive.
const LIVENESS_INTERVAL: Duration = Duration::from_secs(1);

/// Runs the pipeline until `shutdown` triggers.
///
/// # Errors
///
/// Returns an error if the pipeline cannot be started.
pub fn cmd_run(service: &MonitorService, shutdown: &StopSignal) -> Result<()> {
    if service.start()? == ControlStatus::AlreadyRunning {
        info!("Pipeline already running");
    }

    while !shutdown.wait_timeout(LIVENESS_INTERVAL) {
        if !service.is_running() {
            warn!("Pipeline exited, shutting down");
            break;
        }
    }

    service.stop();
    Ok(())
}

/// Serves JSON-RPC on stdio until stdin closes.
///
/// With `watch`, the pipeline runs in the background for the lifetime of
/// the server.
///
/// # Errors
///
/// Returns an error if the pipeline cannot be started or stdio fails.
pub fn cmd_serve(service: Arc<MonitorService>, watch: bool) -> Result<()> {
    if watch {
        service.start()?;
    }

    let result = RpcServer::new(Arc::clone(&service)).run_stdio();
    service.stop();
    result
}
