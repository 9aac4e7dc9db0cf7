//! Pipeline stages for HTML-to-PDF conversion.
//!
//! Each submodule implements one step of [`crate::gateway::RenderGateway::render`].
//!
//! ## Data Flow
//!
//! ```text
//! validate ──▶ resources ──▶ document ──▶ invoke
//! (limits, URLs) (CSS fetch)  (@page rule)  (blocking engine call)
//! ```
//!
//! 1. [`validate`]: size limits, base URL and stylesheet syntax; pure, runs
//!    before anything touches the network
//! 2. [`resources`]: inline, `data:`, `file:` and HTTP(S) stylesheets,
//!    fetched concurrently in request order
//! 3. [`document`]: `@page` synthesis from render options, style injection
//!    and download names
//! 4. [`invoke`]: the engine call on the blocking pool under a
//!    concurrency cap

pub mod document;
pub mod invoke;
pub mod resources;
pub mod validate;
