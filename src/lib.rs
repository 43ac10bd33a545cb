// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
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
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

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
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Quaymaster
//!
//! A host-side agent that keeps the local Docker container set in sync with
//! a remotely declared desired state.
//!
//! ## Overview
//!
//! Quaymaster receives desired-state "delta" documents (which containers
//! should exist, from which image and tag, in which state), compares them
//! with the locally observed container inventory, and executes the minimal
//! set of stop/start/pull actions to converge. After each pass it publishes
//! a reported-state document upstream.
//!
//! ## Architecture
//!
//! Each inbound delta triggers exactly one **reconciliation pass**:
//!
//! 1. **Inventory**: query running and all containers from the runtime
//! 2. **Plan**: pure diff of desired state against the inventory
//! 3. **Execute**: stop phase, then start phase, collecting per-container
//!    results
//! 4. **Report**: publish the applied state upstream
//!
//! Passes are serialized: deltas land on a single-slot feed that coalesces
//! to the latest document, and one worker drains it.
//!
//! ## Modules
//!
//! - [`config`]: Agent configuration and desired-state documents
//! - [`runtime`]: Container runtime client (bollard-backed)
//! - [`planner`]: Plan computation and execution
//! - [`agent`]: Delta handling, reporting, transport seams
//! - [`cli`]: Command-line interface
//!
//! ## Example delta document
//!
//! ```json
//! {
//!   "app": {
//!     "image": "registry.example.com/group/app",
//!     "tag": "1.2",
//!     "state": "running",
//!     "ports": {"8080": "80"},
//!     "volumes": {"/srv/app": "/data"}
//!   }
//! }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod planner;
pub mod runtime;

// ============================================================================
// Re-exports
// ============================================================================

pub use agent::{
    AgentWorker, DeltaFeed, DeltaFilePoller, DeltaHandler, FileReportSink, LogReportSink,
    PassState, PassSummary, ReportSink, StateReport, StateReporter,
};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{
    AgentConfig, ConfigParser, ConfigValidator, DeltaHasher, DesiredContainerSpec, DesiredSet,
    RegistryCredential,
};
pub use error::{QuaymasterError, Result};
pub use planner::{ActionExecutor, ExecutionReport, Planner, ReconciliationPlan};
pub use runtime::{ContainerIdentity, ContainerRuntime, DockerRuntime, LocalContainerRecord};
