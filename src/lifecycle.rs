//! Lifecycle callbacks for the per-request render state machine.
//!
//! Every call to [`crate::gateway::RenderGateway::render`] walks
//!
//! ```text
//! Idle ──▶ Validating ──▶ Rendering ──▶ Succeeded
//!              │              │
//!              └──────────────┴───────▶ Failed(kind)
//! ```
//!
//! Inject an [`Arc<dyn RenderObserver>`] via
//! [`crate::config::GatewayConfigBuilder::observer`] to receive each
//! transition. The observer is shared by all requests, so it must be
//! `Send + Sync`.
//!
//! # Example
//!
//! ```rust
//! use reportdoc::{GatewayConfig, RenderObserver, RenderPhase};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct FailureCounter {
//!     failures: AtomicUsize,
//! }
//!
//! impl RenderObserver for FailureCounter {
//!     fn on_phase(&self, phase: RenderPhase) {
//!         if let RenderPhase::Failed(_) = phase {
//!             self.failures.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//!
//! let counter = Arc::new(FailureCounter { failures: AtomicUsize::new(0) });
//! let config = GatewayConfig::builder()
//!     .observer(counter as Arc<dyn RenderObserver>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::{ErrorKind, ResourceIssue};
use serde::Serialize;
use std::sync::Arc;

/// States of a single conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RenderPhase {
    Idle,
    Validating,
    Rendering,
    Succeeded,
    Failed(ErrorKind),
}

impl RenderPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, RenderPhase::Succeeded | RenderPhase::Failed(_))
    }
}

/// Called by the gateway as a request moves through its states.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// Concurrent requests call the same observer from different tasks.
/// Implementations must protect shared mutable state with `Mutex`,
/// atomics, or similar.
pub trait RenderObserver: Send + Sync {
    /// Called on entry to every state after `Idle`.
    fn on_phase(&self, phase: RenderPhase) {
        let _ = phase;
    }

    /// Called for each unresolved reference that was tolerated under the
    /// degrade policy.
    fn on_resource_issue(&self, issue: &ResourceIssue) {
        let _ = issue;
    }

    /// Called once after a successful render.
    ///
    /// # Arguments
    /// * `byte_length`: size of the produced PDF
    /// * `elapsed_ms`: wall-clock time from Validating to Succeeded
    fn on_succeeded(&self, byte_length: usize, elapsed_ms: u64) {
        let _ = (byte_length, elapsed_ms);
    }
}

/// A no-op implementation for callers that don't need lifecycle events.
///
/// This is the default when no observer is configured.
pub struct NoopObserver;

impl RenderObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::GatewayConfig`].
pub type SharedObserver = Arc<dyn RenderObserver>;
