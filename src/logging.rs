//! Task output sinks and secret redaction
//!
//! - [`LogSink`]: shared, cloneable destination for task output
//! - [`Masker`]: writer adapter replacing secrets and derived masks with `[redacted]`

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use regex::Regex;

/// Replacement text for masked values
pub const REDACTED: &str = "[redacted]";

/// Cloneable, thread-safe writer for task output
#[derive(Clone)]
pub struct LogSink {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl LogSink {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// A sink that drops everything written to it
    pub fn discard() -> Self {
        Self::new(io::sink())
    }
}

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LogSink")
    }
}

/// Writer that finds and masks sensitive data before passing it on
pub struct Masker<W> {
    inner: W,
    pattern: Option<Regex>,
}

impl<W: Write> Masker<W> {
    /// Build a masker over `inner` for the given sensitive values.
    ///
    /// Multi-line values are masked line by line; each line is trimmed and
    /// blank lines are skipped.
    pub fn new<I, S>(inner: W, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parts: Vec<String> = values
            .into_iter()
            .flat_map(|value| {
                value
                    .as_ref()
                    .split('\n')
                    .map(|line| line.trim().to_string())
                    .collect::<Vec<_>>()
            })
            .filter(|part| !part.is_empty())
            .collect();

        // longest first so overlapping values are masked whole
        parts.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        parts.dedup();

        let pattern = if parts.is_empty() {
            None
        } else {
            let alternation = parts
                .iter()
                .map(|p| regex::escape(p))
                .collect::<Vec<_>>()
                .join("|");
            // escaped literals always compile; on the off chance the pattern
            // exceeds the size limit, fall back to masking nothing
            match Regex::new(&alternation) {
                Ok(re) => Some(re),
                Err(err) => {
                    tracing::warn!(error = %err, "secret mask pattern rejected");
                    None
                }
            }
        };

        Self { inner, pattern }
    }

    /// Apply masking to a string without writing it anywhere
    pub fn mask<'a>(&self, text: &'a str) -> std::borrow::Cow<'a, str> {
        match &self.pattern {
            Some(re) => re.replace_all(text, REDACTED),
            None => std::borrow::Cow::Borrowed(text),
        }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for Masker<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.pattern.is_none() {
            return self.inner.write(buf);
        }
        let text = String::from_utf8_lossy(buf);
        let masked = self.mask(&text);
        self.inner.write_all(masked.as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
