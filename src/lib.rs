// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Halldyll Deploy Sync
//!
//! Reconciles declared GPU container deployments against a remote control
//! plane that does not echo back everything it is given.
//!
//! ## Overview
//!
//! A host orchestrator owns the tracked state and drives create, read,
//! update and delete. This crate turns each of those into remote calls and
//! hands back a reconciled state with structured diagnostics:
//!
//! - Remote responses are flattened into the local shape, then merged with
//!   the prior state so fields the remote side is silent about survive
//! - A field mutability table decides between in-place updates and
//!   replacement
//! - Scaling triggers are updated read-modify-write
//! - Deletes that time out are confirmed by polling until not-found
//!
//! ## Modules
//!
//! - [`config`]: Declared types, settings, validation and hashing
//! - [`gateway`]: Control-plane gateway trait and REST client
//! - [`state`]: Flattening, merging and the lifecycle state machine
//! - [`planner`]: Mutability policy, diffs and plans
//! - [`scaling`]: Read-modify-write of scaling triggers
//! - [`poller`]: Deletion confirmation
//! - [`reconciler`]: The operations the orchestrator calls
//! - [`telemetry`]: Log output
//!
//! ## Example
//!
//! ```yaml
//! name: svc
//! compute:
//!   gpu_class: rtx4090
//! scaling:
//!   max_replicas: 4
//!   triggers:
//!     queue_load:
//!       threshold: 4
//! containers:
//!   - image: ghcr.io/acme/infer:1.2.0
//!     port: 8000
//!     env:
//!       - kind: secret
//!         name: HF_TOKEN
//!         secret_ref: hf/token
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod config;
pub mod error;
pub mod gateway;
pub mod planner;
pub mod poller;
pub mod reconciler;
pub mod scaling;
pub mod state;
pub mod telemetry;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{
    ConfigHasher, ConfigParser, ConfigValidator, DeploymentSpec, ReconcilerSettings, ResourceKind,
};
pub use error::{Diagnostic, ErrorKind, HalldyllError, Result};
pub use gateway::{HttpGateway, RemoteGateway, ResourceId};
pub use planner::{Plan, PlannedAction};
pub use poller::{Clock, DeletionPoller, TokioClock};
pub use reconciler::{OperationResult, Reconciler};
pub use state::{DeploymentState, Phase};
pub use telemetry::init_logging;
