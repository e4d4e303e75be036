//! focus-backend: single-user markdown notes server with live updates.
//!
//! A password-gated actix-web server exposing one notes file for
//! reading and writing. A filesystem watcher debounces change signals
//! and pushes fresh content to every connected browser tab over SSE.
//! The static UI (editor plus alarm/stopwatch/timer workers) is served
//! from `public/`.

pub mod auth;
pub mod config;
pub mod controllers;
pub mod error;
pub mod notes;

use std::sync::Arc;
use std::time::Instant;

use config::Config;
use notes::{NoteBroadcaster, NotesStore};

/// Process-wide state handed to every request handler.
///
/// Created once at init and owned by the HTTP server; tests build their
/// own instances, so nothing lives in a global.
pub struct AppState {
    pub config: Config,
    pub store: Arc<NotesStore>,
    pub broadcaster: Arc<NoteBroadcaster>,
    /// Server start time for uptime calculation
    pub started_at: Instant,
}
