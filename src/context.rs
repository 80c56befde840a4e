//! Per-request execution context
//!
//! Carries the cancellation signal and the structured-logging span that the
//! router installs for a request. Handlers receive it by reference and must
//! return promptly once it is cancelled.

use tokio_util::sync::CancellationToken;
use tracing::Span;

#[derive(Debug, Clone)]
pub struct Context {
    cancel: CancellationToken,
    span: Span,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// A fresh, never-cancelled context logging into the current span
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            span: Span::current(),
        }
    }

    /// Use an existing cancellation token, e.g. one owned by the poller
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            cancel: token,
            span: Span::current(),
        }
    }

    /// Derive a context that is cancelled with this one but can also be
    /// cancelled on its own.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            span: self.span.clone(),
        }
    }

    /// Same cancellation, different logging span
    pub fn with_span(&self, span: Span) -> Self {
        Self {
            cancel: self.cancel.clone(),
            span,
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the context is cancelled
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }
}
