//! Nested `<{ ... }>` template evaluation
//!
//! Expressions are resolved innermost first and their results spliced back
//! into the payload until none remain. Every result derived from secret
//! material is recorded as a mask so it can be redacted from output.

use std::borrow::Cow;
use std::collections::HashMap;
use std::ops::Range;

use tracing::debug;

use super::eval::Evaluator;
use super::functions::FunctionTable;
use crate::error::{Result, TaskError};
use crate::secret::Secret;

pub const DELIM_START: &str = "<{";
pub const DELIM_END: &str = "}>";

/// Upper bound on resolution passes over one payload
pub const MAX_ITERATIONS: usize = 100;

/// Resolves template expressions in a payload for one set of secrets
pub struct TemplateResolver<'a> {
    evaluator: Evaluator<'a>,
    functions: &'a FunctionTable,
    /// Non-empty secret values
    sensitive: Vec<&'a str>,
    /// Secret values as they appear inside a JSON string, where that differs
    escaped: Vec<String>,
}

impl<'a> TemplateResolver<'a> {
    pub fn new(functions: &'a FunctionTable, secrets: &'a [Secret]) -> Self {
        // later secrets with the same id win
        let lookup: HashMap<&str, &str> = secrets
            .iter()
            .map(|s| (s.id.as_str(), s.value.as_str()))
            .collect();

        Self {
            evaluator: Evaluator::new(functions, lookup),
            functions,
            sensitive: secrets
                .iter()
                .map(|s| s.value.as_str())
                .filter(|v| !v.is_empty())
                .collect(),
            escaped: secrets
                .iter()
                .filter_map(|s| json_escaped(&s.value))
                .collect(),
        }
    }

    /// Resolve every expression in `data`, returning the new payload and the
    /// masks derived along the way.
    pub fn resolve(&self, data: &[u8]) -> Result<(Vec<u8>, Vec<String>)> {
        let mut buf = data.to_vec();
        let mut masks: Vec<String> = Vec::new();

        for iteration in 0..MAX_ITERATIONS {
            let Some(span) = find_innermost(&buf) else {
                debug!(
                    iterations = iteration,
                    masks = masks.len(),
                    "template expressions resolved"
                );
                return Ok((buf, masks));
            };

            let source = std::str::from_utf8(&buf[span.clone()]).map_err(|_| {
                TaskError::syntax(
                    &String::from_utf8_lossy(&buf[span.clone()]),
                    "expression is not valid UTF-8",
                )
            })?;

            let prepared = preprocess(source, self.functions);
            let body = &prepared[DELIM_START.len()..prepared.len() - DELIM_END.len()];
            let evaluated = self
                .evaluator
                .evaluate(body)
                .map_err(|reason| TaskError::syntax(source, reason))?;

            if evaluated.read_secret || self.touches_sensitive(source, &masks) {
                self.record_mask(&mut masks, &evaluated.value);
            }

            buf.splice(span, evaluated.value.into_bytes()).for_each(drop);
        }

        if find_innermost(&buf).is_some() {
            return Err(TaskError::IterationLimit {
                limit: MAX_ITERATIONS,
            });
        }
        Ok((buf, masks))
    }

    fn touches_sensitive(&self, source: &str, masks: &[String]) -> bool {
        self.sensitive.iter().any(|v| source.contains(*v))
            || self.escaped.iter().any(|v| source.contains(v.as_str()))
            || masks
                .iter()
                .any(|m| !m.is_empty() && source.contains(m.as_str()))
    }

    fn record_mask(&self, masks: &mut Vec<String>, value: &str) {
        // raw secret values are redacted anyway
        if value.is_empty() || self.sensitive.iter().any(|s| *s == value) {
            return;
        }
        if !masks.iter().any(|m| m == value) {
            masks.push(value.to_string());
        }
    }
}

/// Locate the first innermost `<{ ... }>` expression, delimiters included.
///
/// Scans left to right tracking nesting depth; the first closing delimiter
/// seen at depth > 0 ends the innermost expression. Unmatched closers are
/// ignored and an unclosed opener yields `None`.
pub fn find_innermost(input: &[u8]) -> Option<Range<usize>> {
    let start_delim = DELIM_START.as_bytes();
    let end_delim = DELIM_END.as_bytes();

    let mut depth = 0usize;
    let mut innermost_start = 0usize;
    let mut i = 0usize;

    while i < input.len() {
        if input[i..].starts_with(start_delim) {
            depth += 1;
            innermost_start = i;
            i += start_delim.len();
        } else if input[i..].starts_with(end_delim) {
            if depth > 0 {
                return Some(innermost_start..i + end_delim.len());
            }
            i += end_delim.len();
        } else {
            i += 1;
        }
    }

    None
}

/// Quote a bare left-hand operand of a pipeline into a string literal.
///
/// `<{ hello world | getAsBase64 }>` becomes `<{ "hello world" | getAsBase64 }>`.
/// Applies only when a later stage names a known function. Field references,
/// quoted strings and call forms are left untouched; an operand wrapped in
/// escaped quotes (`\"x\"`) is unescaped to `"x"`.
pub fn preprocess<'e>(expr: &'e str, functions: &FunctionTable) -> Cow<'e, str> {
    let Some(body) = expr
        .strip_prefix(DELIM_START)
        .and_then(|rest| rest.strip_suffix(DELIM_END))
    else {
        return Cow::Borrowed(expr);
    };

    let mut stages = body.split('|');
    let operand = stages.next().unwrap_or_default().trim();
    let rest: Vec<&str> = stages.collect();

    if rest.is_empty() || !rest.iter().any(|stage| functions.contains(stage.trim())) {
        return Cow::Borrowed(expr);
    }

    let quoted = if let Some(inner) = operand
        .strip_prefix("\\\"")
        .and_then(|s| s.strip_suffix("\\\""))
    {
        format!("\"{inner}\"")
    } else if is_literal(operand) || operand.starts_with('.') || is_call(operand, functions) {
        return Cow::Borrowed(expr);
    } else {
        format!("\"{}\"", escape(&json_unescaped(operand)))
    };

    Cow::Owned(format!(
        "{DELIM_START} {quoted} |{}{DELIM_END}",
        rest.join("|")
    ))
}

fn is_literal(operand: &str) -> bool {
    (operand.len() >= 2 && operand.starts_with('"') && operand.ends_with('"'))
        || (operand.len() >= 2 && operand.starts_with('`') && operand.ends_with('`'))
}

fn is_call(operand: &str, functions: &FunctionTable) -> bool {
    operand
        .split_whitespace()
        .next()
        .is_some_and(|word| functions.contains(word))
}

/// Contents of a JSON string literal holding `value`, if it differs from `value`
fn json_escaped(value: &str) -> Option<String> {
    let encoded = serde_json::to_string(value).ok()?;
    let inner = &encoded[1..encoded.len() - 1];
    (!value.is_empty() && inner != value).then(|| inner.to_string())
}

/// Payloads are JSON text, so a bare operand may still carry JSON string
/// escapes. Operands that are not valid string contents are kept as written.
fn json_unescaped(operand: &str) -> Cow<'_, str> {
    if !operand.contains('\\') {
        return Cow::Borrowed(operand);
    }
    match serde_json::from_str::<String>(&format!("\"{operand}\"")) {
        Ok(decoded) => Cow::Owned(decoded),
        Err(_) => Cow::Borrowed(operand),
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
