//! Engine invocation on tokio's blocking pool.
//!
//! Rendering is CPU-bound and blocking, so it never runs on the async
//! executor. `tokio::task::spawn_blocking` moves it onto the blocking thread
//! pool, and a semaphore caps how many renders run at once.
//!
//! The permit is moved into the blocking closure. If the caller stops
//! waiting (deadline), the render still holds its slot until it actually
//! finishes, so the cap counts real work.

use crate::engine::{EngineError, RenderJob, RenderedDocument, Renderer};
use crate::error::GatewayError;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

/// Run `job` on a blocking worker once a render slot is free.
pub async fn run_engine(
    renderer: Arc<dyn Renderer>,
    job: RenderJob,
    permits: Arc<Semaphore>,
    limit_ms: u64,
) -> Result<RenderedDocument, GatewayError> {
    let permit = permits
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| GatewayError::Internal("render slots closed".into()))?;
    debug!("Acquired render slot ({} free)", permits.available_permits());

    let engine = renderer.name();
    let result = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        renderer.render(&job)
    })
    .await
    .map_err(|e| GatewayError::Internal(format!("Render task panicked: {}", e)))?;

    result.map_err(|e| engine_error(engine, e, limit_ms))
}

fn engine_error(engine: &'static str, err: EngineError, limit_ms: u64) -> GatewayError {
    match err {
        EngineError::Failed { message, detail } => GatewayError::RenderingFailed {
            engine,
            message,
            detail,
        },
        EngineError::DeadlineExceeded => GatewayError::Timeout { limit_ms },
        EngineError::Io(e) => GatewayError::RenderingFailed {
            engine,
            message: format!("I/O error: {e}"),
            detail: None,
        },
        EngineError::Unavailable(reason) => GatewayError::EngineUnavailable(reason),
        EngineError::Unsupported { option, reason } => GatewayError::InvalidOption {
            option,
            reason: format!("{reason} ({engine} engine)"),
        },
    }
}
