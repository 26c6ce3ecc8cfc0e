#![allow(clippy::doc_markdown)] // Allow technical terms like apprise-api, Redis in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # JJZ Alert Core
//!
//! Tracks Beijing entry permits (进京证) for a set of vehicles and pushes
//! their status to configured notification channels.
//!
//! ## Overview
//!
//! Each run resolves every plate's permit status from one or more upstream
//! accounts, reconciles conflicting records (the latest application wins),
//! checks the day's tail-number traffic restriction and fans the composed
//! message out to each recipient's channels. Failures are retried, isolated
//! by per-service circuit breakers and escalated to a throttled admin channel.
//!
//! ## Module Organization
//!
//! - [`resolver`] - Upstream queries, record reconciliation and the permit state machine
//! - [`notify`] - Channel notifiers, placeholder substitution and push dispatch
//! - [`resilience`] - Retry, circuit breakers, error collection and admin escalation
//! - [`workflow`] - Per-run orchestration over all configured plates
//! - [`traffic`] - Tail-number restriction rules
//! - [`cache`] - Cache backends and the key schema over them
//! - [`config`] - TOML configuration, validation and account reloading
//! - [`bootstrap`] - Wiring of all components from a configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jjz_alert::bootstrap::AlertBootstrap;
//! use jjz_alert::config::ConfigManager;
//! use jjz_alert::workflow::WorkflowRequest;
//!
//! # async fn example() -> Result<(), jjz_alert::error::AlertError> {
//! let manager = ConfigManager::load_from_path("config.toml")?;
//! let system = AlertBootstrap::from_manager(&manager).await?;
//! let report = system.run(WorkflowRequest::default()).await;
//! println!("{} of {} plates succeeded", report.success_plates, report.total_plates);
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod notify;
pub mod resilience;
pub mod resolver;
pub mod traffic;
pub mod workflow;

pub use bootstrap::{AlertBootstrap, AlertSystem, Collaborators};
pub use config::{AppConfig, ConfigManager};
pub use error::{AlertError, AlertResult, ErrorKind};
pub use resolver::{PermitState, PermitStatus};
pub use workflow::{WorkflowReport, WorkflowRequest};
