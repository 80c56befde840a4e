//! Task requests

use serde::{Deserialize, Serialize};

use crate::logging::{LogSink, Masker};
use crate::secret::Secret;
use crate::task::Task;

/// The unit submitted to the router: a primary task plus the ordered
/// secret-producing sub-tasks it depends on.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Request {
    /// The primary task
    pub task: Task,

    /// Secret-producing sub-tasks, evaluated in order
    #[serde(default, rename = "secrets")]
    pub tasks: Vec<Task>,

    /// Secrets resolved from `tasks`. Lives only for this request.
    #[serde(skip)]
    pub secrets: Vec<Secret>,

    /// Values derived from secrets during expression resolution
    #[serde(skip)]
    pub masks: Vec<String>,

    /// Destination for task output
    #[serde(skip)]
    pub logger: Option<LogSink>,

    /// Account identifier
    #[serde(default)]
    pub account: String,

    /// Correlation ID for status reporting
    #[serde(default)]
    pub id: String,
}

impl Request {
    pub fn new(task: Task) -> Self {
        Self {
            task,
            ..Default::default()
        }
    }

    pub fn with_secret_tasks(mut self, tasks: Vec<Task>) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn with_logger(mut self, sink: LogSink) -> Self {
        self.logger = Some(sink);
        self
    }

    /// Look up a resolved secret by ID
    pub fn secret(&self, id: &str) -> Option<&str> {
        self.secrets
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.value.as_str())
    }

    /// Every value that must never appear in task output
    pub fn redaction_values(&self) -> impl Iterator<Item = &str> {
        self.secrets
            .iter()
            .map(|s| s.value.as_str())
            .chain(self.masks.iter().map(String::as_str))
    }

    /// The request's log sink wrapped in a masker for its secrets
    pub fn masked_logger(&self) -> Masker<LogSink> {
        let sink = self.logger.clone().unwrap_or_else(LogSink::discard);
        Masker::new(sink, self.redaction_values())
    }
}
