//! # Task Execution
//!
//! The task-side surface of the crate: the invocation model, the handler
//! trait business logic implements, the context that logic receives, and the
//! runner that drives one invocation through its reporting lifecycle.
//!
//! ## Key Components
//!
//! - [`TaskHandler`]: async trait for the business function
//! - [`TaskRunner`]: wraps a handler in start/terminal reporting with retries
//! - [`TaskContext`]: invocation identity, input, heartbeats, cancellation
//! - [`TaskInvocation`] / [`InvocationState`]: identity and lifecycle model

pub mod context;
pub mod handler;
pub mod invocation;
pub mod runner;

pub use context::{RunContext, TaskContext};
pub use handler::TaskHandler;
pub use invocation::{InvocationState, TaskInvocation};
pub use runner::{BusinessOutcome, RunError, TaskRunner};
