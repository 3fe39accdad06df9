//! Gatewarden - real-time abuse detection and rate limiting for game backends
//!
//! The engine admits, throttles, or rejects inbound actions (HTTP requests,
//! player game-events, economic transactions) under concurrent load, using
//! only eventually-consistent shared counters in a Dragonfly/Redis store.
//!
//! # Modules
//!
//! - [`config`] — Strongly-typed configuration with file and environment variable support
//! - [`domain`] — Limit keys, event records, and admission outcomes
//! - [`application`] — The admission pipeline, error taxonomy, and telemetry
//! - [`infrastructure`] — Store backends, limiters, guards, and detectors
//! - [`presentation`] — axum request filter mapping outcomes to HTTP statuses
//! - [`logging`] — Structured logging with tracing
//!
//! # Architecture
//!
//! ```text
//! gatewarden/
//! ├── domain/           # Pure types: keys, events, outcomes
//! ├── application/      # Admission pipeline, telemetry, errors
//! ├── infrastructure/   # External integrations
//! │   ├── store/        # Dragonfly/Redis + in-memory counter store
//! │   ├── limiter/      # Sliding window, token bucket, service
//! │   ├── nonce         # Replay guard
//! │   ├── blacklist     # Denylist
//! │   ├── frequency     # DDoS detector
//! │   └── anomaly/      # Movement + economy detectors
//! ├── presentation/     # HTTP filter
//! └── config/           # Configuration management
//! ```
//!
//! Control flow for one inbound unit of work: blacklist check, nonce/replay
//! check, rate limit check, then the behavioral detectors with escalation
//! bookkeeping on any violation. Every check catches store failures at its
//! own boundary and fails open, keeping the game available through an
//! infrastructure outage.
//!
//! # Configuration
//!
//! ```rust,ignore
//! use gatewarden::Config;
//!
//! let config = Config::load()?;
//! ```
//!
//! Environment variables use the `GATEWARDEN__` prefix with double
//! underscore separators:
//!
//! ```bash
//! GATEWARDEN__STORE__URL=redis://127.0.0.1:6379
//! GATEWARDEN__RATE_LIMIT__DEFAULT_POLICY__QPS=100
//! ```
//!
//! # Logging
//!
//! ```rust,ignore
//! use gatewarden::init_tracing;
//!
//! init_tracing("info");
//! ```

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod logging;
pub mod presentation;

pub use application::admission::AdmissionService;
pub use application::telemetry::{ChannelTelemetrySink, NullTelemetrySink, SecurityEvent, TelemetrySink};
pub use config::Config;
pub use domain::admission::{AdmissionOutcome, InboundAction, RejectReason};
pub use domain::keys::LimitKey;
pub use logging::init_tracing;
