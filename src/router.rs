//! Task router
//!
//! Maps task types to handlers and runs the request pipeline:
//!
//! ```text
//! handle(req)
//!   ├─ resolve secrets   sub-tasks in order, each through dispatch
//!   ├─ install span + default log sink
//!   └─ dispatch(primary)
//!        ├─ lookup handler (or not-found)
//!        ├─ resolve expressions in task.data
//!        └─ middleware chain → handler
//! ```
//!
//! Registration happens before the router is shared; `handle` takes `&self`
//! and concurrent requests share nothing mutable.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info_span, warn, Instrument, Span};

use crate::context::Context;
use crate::error::{Result, TaskError};
use crate::expression::{FunctionTable, Resolution, Resolver, BUILTIN_FUNCTIONS};
use crate::handler::{chain, Handler, HandlerFn, Middleware};
use crate::logging::LogSink;
use crate::request::Request;
use crate::response::Response;
use crate::secret::{decode_secret, Secret};
use crate::task::Payload;

/// Which secrets a dispatched task may reference in its expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// The primary task sees every resolved secret
    Primary,
    /// Secret sub-tasks resolve their payload without secrets
    SubTask,
}

pub struct Router {
    handlers: HashMap<String, Arc<dyn Handler>>,
    middleware: Vec<Middleware>,
    not_found: Option<Arc<dyn Handler>>,
    functions: Arc<FunctionTable>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            middleware: Vec::new(),
            not_found: None,
            functions: Arc::clone(&BUILTIN_FUNCTIONS),
        }
    }

    /// Use a custom template function table instead of the builtins
    pub fn with_functions(mut self, functions: Arc<FunctionTable>) -> Self {
        self.functions = functions;
        self
    }

    /// Register a handler for a task type. Re-registering a type replaces
    /// the previous handler.
    pub fn register(&mut self, kind: impl Into<String>, handler: impl Handler + 'static) {
        self.handlers.insert(kind.into(), Arc::new(handler));
    }

    /// Register a synchronous function as a handler
    pub fn register_fn<F>(&mut self, kind: impl Into<String>, f: F)
    where
        F: Fn(&Context, &mut Request) -> Response + Send + Sync + 'static,
    {
        self.register(kind, HandlerFn(f));
    }

    /// Append a middleware. The first one added wraps outermost.
    pub fn use_middleware<F>(&mut self, wrap: F)
    where
        F: Fn(Arc<dyn Handler>) -> Arc<dyn Handler> + Send + Sync + 'static,
    {
        self.middleware.push(Arc::new(wrap));
    }

    /// Handler receiving every task whose type has no registration
    pub fn set_not_found(&mut self, handler: impl Handler + 'static) {
        self.not_found = Some(Arc::new(handler));
    }

    pub fn set_not_found_fn<F>(&mut self, f: F)
    where
        F: Fn(&Context, &mut Request) -> Response + Send + Sync + 'static,
    {
        self.set_not_found(HandlerFn(f));
    }

    pub fn has_handler(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    /// Route a request: resolve its secrets, then dispatch the primary task.
    ///
    /// Every failure is returned as an error response. A failing secret
    /// sub-task aborts the request with that sub-task's response.
    pub async fn handle(&self, ctx: &Context, req: &mut Request) -> Response {
        let span = info_span!(
            "route",
            "task.id" = %req.task.id,
            "task.type" = %req.task.kind,
            "task.driver" = %req.task.driver
        );
        self.route(ctx, req).instrument(span).await
    }

    async fn route(&self, ctx: &Context, req: &mut Request) -> Response {
        debug!(subtasks = req.tasks.len(), "route task");

        let secrets = match self.resolve_secrets(ctx, req).await {
            Ok(secrets) => secrets,
            Err(res) => return res,
        };
        req.secrets = secrets;

        let ctx = ctx.with_span(Span::current());

        if req.logger.is_none() {
            req.logger = Some(LogSink::discard());
        }

        if ctx.is_cancelled() {
            return Response::error(TaskError::Cancelled);
        }

        self.dispatch(&ctx, req, Scope::Primary).await
    }

    /// Run each secret sub-task of `req` in order and collect its secret.
    ///
    /// Stops at the first failure and returns the failed response. On
    /// success the secrets line up one-to-one with `req.tasks`.
    pub async fn resolve_secrets(
        &self,
        ctx: &Context,
        req: &Request,
    ) -> std::result::Result<Vec<Secret>, Response> {
        let mut secrets: Vec<Secret> = Vec::with_capacity(req.tasks.len());

        for subtask in &req.tasks {
            if ctx.is_cancelled() {
                return Err(Response::error(TaskError::Cancelled));
            }

            // only the sub-task itself; nested sub-tasks are not followed
            let mut subreq = Request {
                task: subtask.clone(),
                secrets: secrets.clone(),
                logger: req.logger.clone(),
                account: req.account.clone(),
                id: req.id.clone(),
                ..Default::default()
            };

            debug!(secret.task = %subtask.id, "secret.type" = %subtask.kind, "resolve secret");

            let res = self.dispatch(ctx, &mut subreq, Scope::SubTask).await;
            if let Some(err) = res.error_ref() {
                warn!(secret.task = %subtask.id, error = %err, "secret task failed");
                return Err(res);
            }

            match decode_secret(subtask, res.body().unwrap_or_default()) {
                Ok(secret) => secrets.push(secret),
                Err(err) => {
                    warn!(secret.task = %subtask.id, error = %err, "secret task response rejected");
                    return Err(Response::error(err));
                }
            }
        }

        Ok(secrets)
    }

    /// Run both expression passes over `data` with this router's functions
    pub fn resolve_expressions(&self, secrets: &[Secret], data: &[u8]) -> Result<Resolution> {
        Resolver::new(secrets)
            .with_functions(&self.functions)
            .resolve(data)
    }

    async fn dispatch(&self, ctx: &Context, req: &mut Request, scope: Scope) -> Response {
        let handler = match self.handlers.get(&req.task.kind).or(self.not_found.as_ref()) {
            Some(handler) => Arc::clone(handler),
            None => {
                debug!("task.type" = %req.task.kind, "handler not found");
                return Response::error(TaskError::HandlerNotFound);
            }
        };

        let inputs: &[Secret] = match scope {
            Scope::Primary => &req.secrets,
            Scope::SubTask => &[],
        };

        match self.resolve_expressions(inputs, req.task.data.as_bytes()) {
            Ok(resolution) => {
                debug!(masks = resolution.masks.len(), "task data resolved");
                req.task.data = Payload::new(resolution.data);
                req.masks.extend(resolution.masks);
            }
            Err(err) => {
                warn!(task.id = %req.task.id, error = %err, "expression resolution failed");
                return Response::error(err);
            }
        }

        chain(&self.middleware, handler).handle(ctx, req).await
    }
}
