//! Legacy `${{secrets.ID}}` substitution
//!
//! Runs before template evaluation. The payload is parsed as JSON and every
//! string leaf has its `${{secrets.ID}}` references replaced; structure is
//! never altered and no HTML escaping is applied on re-encoding.

use serde_json::Value;

use crate::error::Result;
use crate::secret::Secret;

/// Payloads without this marker skip the legacy pass entirely
pub const LEGACY_MARKER: &str = "${{secrets";

const REFERENCE_OPEN: &str = "${{";

/// Whether `data` needs the legacy pass
pub fn has_legacy_refs(data: &[u8]) -> bool {
    data.windows(LEGACY_MARKER.len())
        .any(|w| w == LEGACY_MARKER.as_bytes())
}

/// Substitute `${{secrets.ID}}` references in every string leaf of a JSON
/// payload. Fails if the payload is not valid JSON.
pub fn substitute(data: &[u8], secrets: &[Secret]) -> Result<Vec<u8>> {
    let mut value: Value = serde_json::from_slice(data)?;
    visit_strings(&mut value, &mut |s: &mut String| {
        if s.contains(REFERENCE_OPEN) {
            *s = replace_refs(s, secrets);
        }
    });
    Ok(serde_json::to_vec(&value)?)
}

/// Depth-first walk over every string in a JSON value, including strings
/// nested in arrays. Object keys are left alone.
pub fn visit_strings<F>(value: &mut Value, f: &mut F)
where
    F: FnMut(&mut String),
{
    match value {
        Value::String(s) => f(s),
        Value::Array(items) => items.iter_mut().for_each(|item| visit_strings(item, f)),
        Value::Object(map) => map.values_mut().for_each(|item| visit_strings(item, f)),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

fn replace_refs(s: &str, secrets: &[Secret]) -> String {
    secrets.iter().fold(s.to_string(), |acc, secret| {
        acc.replace(&format!("${{{{secrets.{}}}}}", secret.id), &secret.value)
    })
}
