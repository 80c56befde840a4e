//! Expression resolution for task payloads
//!
//! Two passes, in order:
//! 1. [`legacy`]: `${{secrets.ID}}` references in JSON string leaves
//! 2. [`template`]: nested `<{ ... }>` expressions, innermost first
//!
//! Values derived from secrets during pass 2 are returned as masks.

mod eval;
pub mod functions;
pub mod legacy;
pub mod template;

pub use eval::NO_VALUE;
pub use functions::{FunctionTable, TemplateFn, BUILTIN_FUNCTIONS, GET_AS_BASE64};
pub use template::{find_innermost, preprocess, DELIM_END, DELIM_START, MAX_ITERATIONS};

use tracing::trace;

use crate::error::Result;
use crate::secret::Secret;
use template::TemplateResolver;

/// Resolved payload plus the derived values that must be redacted
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub data: Vec<u8>,
    pub masks: Vec<String>,
}

/// Runs both resolution passes over a payload
pub struct Resolver<'a> {
    secrets: &'a [Secret],
    functions: &'a FunctionTable,
}

impl<'a> Resolver<'a> {
    /// A resolver using the builtin function table
    pub fn new(secrets: &'a [Secret]) -> Self {
        Self {
            secrets,
            functions: &BUILTIN_FUNCTIONS,
        }
    }

    pub fn with_functions(mut self, functions: &'a FunctionTable) -> Self {
        self.functions = functions;
        self
    }

    /// Resolve `data`. An empty payload resolves to itself.
    pub fn resolve(&self, data: &[u8]) -> Result<Resolution> {
        if data.is_empty() {
            return Ok(Resolution::default());
        }

        let substituted = if legacy::has_legacy_refs(data) {
            trace!(secrets = self.secrets.len(), "substituting legacy secret references");
            legacy::substitute(data, self.secrets)?
        } else {
            data.to_vec()
        };

        let (data, masks) =
            TemplateResolver::new(self.functions, self.secrets).resolve(&substituted)?;
        Ok(Resolution { data, masks })
    }

    /// Non-empty secret values known to this resolver
    pub fn secret_values(&self) -> impl Iterator<Item = &'a str> {
        self.secrets
            .iter()
            .map(|s| s.value.as_str())
            .filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn as_json(data: &[u8]) -> Value {
        serde_json::from_slice(data).unwrap()
    }

    #[test]
    fn empty_payload() {
        let out = Resolver::new(&[]).resolve(b"").unwrap();
        assert_eq!(out, Resolution::default());
    }

    #[test]
    fn legacy_then_template() {
        let secrets = [Secret::new("sid", "mySecretValue")];
        let input = json!({"auth": "<{ ${{secrets.sid}} | getAsBase64 }>"}).to_string();

        let out = Resolver::new(&secrets).resolve(input.as_bytes()).unwrap();

        assert_eq!(as_json(&out.data), json!({"auth": "bXlTZWNyZXRWYWx1ZQ=="}));
        assert_eq!(out.masks, vec!["bXlTZWNyZXRWYWx1ZQ==".to_string()]);
    }

    #[test]
    fn legacy_reference_with_json_escapes() {
        let secrets = [Secret::new("sid", r#"p\w"q"#)];
        let resolver = Resolver::new(&secrets);

        let legacy = resolver
            .resolve(br#"{"a":"<{ ${{secrets.sid}} | getAsBase64 }>"}"#)
            .unwrap();
        let field = resolver
            .resolve(br#"{"a":"<{ .secrets.sid | getAsBase64 }>"}"#)
            .unwrap();

        assert_eq!(as_json(&legacy.data), json!({"a": "cFx3InE="}));
        assert_eq!(legacy.masks, vec!["cFx3InE=".to_string()]);
        assert_eq!(legacy, field);
    }

    #[test]
    fn template_only_payload_need_not_be_json() {
        let out = Resolver::new(&[]).resolve(b"plain <{ x | getAsBase64 }>").unwrap();
        assert_eq!(out.data, b"plain eA==".to_vec());
    }

    #[test]
    fn legacy_pass_requires_json() {
        let secrets = [Secret::new("sid", "v")];
        let err = Resolver::new(&secrets).resolve(b"${{secrets.sid}}").unwrap_err();
        assert!(matches!(err, TaskError::Json(_)));
    }

    #[test]
    fn resolution_is_stable() {
        let secrets = [Secret::new("sid", "v")];
        let resolver = Resolver::new(&secrets);
        let first = resolver
            .resolve(br#"{"a":"${{secrets.sid}}","b":"<{ q | getAsBase64 }>"}"#)
            .unwrap();
        let second = resolver.resolve(&first.data).unwrap();
        assert_eq!(first.data, second.data);
    }

    #[test]
    fn custom_function_table() {
        fn shout(s: &str) -> String {
            s.to_uppercase()
        }
        let table = FunctionTable::new().with("shout", shout);
        let out = Resolver::new(&[])
            .with_functions(&table)
            .resolve(b"<{ hi | shout }>")
            .unwrap();
        assert_eq!(out.data, b"HI".to_vec());

        let err = Resolver::new(&[])
            .with_functions(&table)
            .resolve(b"<{ getAsBase64 \"x\" }>")
            .unwrap_err();
        assert!(matches!(err, TaskError::ExpressionSyntax { .. }));
    }

    #[test]
    fn secret_values_skip_empty() {
        let secrets = [Secret::new("a", ""), Secret::new("b", "x")];
        let values: Vec<&str> = Resolver::new(&secrets).secret_values().collect();
        assert_eq!(values, vec!["x"]);
    }
}
