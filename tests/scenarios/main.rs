//! Workflow scenario tests
//!
//! Each module runs whole workflows through the engine on a mock provider.
//! Run with: cargo test --test scenarios

mod helpers;

mod failure_isolation;
mod job_dependencies;
mod parallelism;
mod step_ordering;
mod triggers;
