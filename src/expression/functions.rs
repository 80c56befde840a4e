//! Template function table
//!
//! Functions available inside `<{ }>` expressions. The table is an explicit
//! value handed to the evaluator; routers share the immutable builtin table
//! unless given their own.

use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use once_cell::sync::Lazy;

/// Name of the base64 encoding function
pub const GET_AS_BASE64: &str = "getAsBase64";

/// A single-argument string transform
pub type TemplateFn = fn(&str) -> String;

/// Shared builtin function table
pub static BUILTIN_FUNCTIONS: Lazy<Arc<FunctionTable>> =
    Lazy::new(|| Arc::new(FunctionTable::builtin()));

/// Name → function mapping used by the template evaluator
#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    functions: HashMap<String, TemplateFn>,
}

impl FunctionTable {
    /// An empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// The builtin functions: `getAsBase64`
    pub fn builtin() -> Self {
        Self::new().with(GET_AS_BASE64, get_as_base64)
    }

    /// Add or replace a function
    pub fn with(mut self, name: impl Into<String>, function: TemplateFn) -> Self {
        self.register(name, function);
        self
    }

    pub fn register(&mut self, name: impl Into<String>, function: TemplateFn) {
        self.functions.insert(name.into(), function);
    }

    pub fn get(&self, name: &str) -> Option<TemplateFn> {
        self.functions.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Standard (RFC 4648, padded) base64 of the string's bytes
pub fn get_as_base64(s: &str) -> String {
    STANDARD.encode(s.as_bytes())
}
