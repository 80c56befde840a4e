//! Task Agent - routes typed tasks, resolves their secrets and payload expressions
//!
//! A [`Request`] carries a primary [`Task`] plus secret-producing sub-tasks.
//! The [`Router`] runs the sub-tasks, substitutes the resulting secrets into
//! the primary task's payload, evaluates `<{ ... }>` template expressions and
//! hands the task to the handler registered for its type.

pub mod config;
pub mod context;
pub mod error;
pub mod expression;
pub mod handler;
pub mod logging;
pub mod request;
pub mod response;
pub mod router;
pub mod sample;
pub mod secret;
pub mod task;

pub use config::AgentConfig;
pub use context::Context;
pub use error::{FixSuggestion, Result, TaskError};
pub use expression::{FunctionTable, Resolution, Resolver};
pub use handler::{Handler, HandlerFn, Middleware};
pub use logging::{LogSink, Masker};
pub use request::Request;
pub use response::Response;
pub use router::Router;
pub use secret::{CgiEnvelope, Secret};
pub use task::{Payload, Task};
