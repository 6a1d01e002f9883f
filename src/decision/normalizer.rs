//! Response normalization: reduce any model answer to canonical decisions.
//!
//! The response variants form a closed set, resolved by ordered extraction
//! attempts: a structured `decisions` list, a flat single-decision object,
//! completions-style wrapped text, JSON pulled out of prose, and finally a
//! keyword scan. Every path funnels into the same allow-list coercion, so
//! malformed or extra fields are dropped rather than propagated.

use serde_json::Value;
use tracing::debug;

use crate::domain::{Action, Decision, MatchPolicy, ResponseOrigin};

/// Normalize one raw response body against the requested symbol set.
pub fn normalize_response(
    body: &str,
    requested: &[String],
    policy: MatchPolicy,
) -> (Vec<Decision>, ResponseOrigin) {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        // Structured `decisions` list
        if let Some(list) = value.get("decisions").and_then(Value::as_array) {
            let decisions = coerce_list(list);
            debug!(parsed = decisions.len(), "structured decisions list");
            return (
                resolve(decisions, requested, policy),
                ResponseOrigin::Structured,
            );
        }

        // Flat single-decision object: {"action": ..., "confidence": ...}
        if value.get("action").is_some() || value.get("recommendation").is_some() {
            if let Some(decision) = coerce_flat(&value, requested.first().map(String::as_str)) {
                return (
                    resolve(vec![decision], requested, policy),
                    ResponseOrigin::Structured,
                );
            }
        }

        // Completions-style wrapper: {"choices": [{"text"| "message": {"content"}}]}
        if let Some(text) = completions_text(&value) {
            return normalize_prose(&text, requested, policy);
        }

        // Some other JSON shape entirely; scan its rendering for keywords
        return (
            keyword_decisions(&value.to_string(), requested),
            ResponseOrigin::KeywordScan,
        );
    }

    normalize_prose(body, requested, policy)
}

/// Prose path: try to dig a JSON block out of the text, else keyword-scan.
fn normalize_prose(
    text: &str,
    requested: &[String],
    policy: MatchPolicy,
) -> (Vec<Decision>, ResponseOrigin) {
    if let Some(embedded) = extract_json_block(text) {
        let decisions = match &embedded {
            Value::Object(map) if map.contains_key("decisions") => map
                .get("decisions")
                .and_then(Value::as_array)
                .map(|items| coerce_list(items))
                .unwrap_or_default(),
            Value::Object(_) => coerce_flat(&embedded, requested.first().map(String::as_str))
                .into_iter()
                .collect(),
            Value::Array(items) => coerce_list(items),
            _ => Vec::new(),
        };

        if !decisions.is_empty() {
            debug!(parsed = decisions.len(), "extracted embedded JSON");
            return (
                resolve(decisions, requested, policy),
                ResponseOrigin::ExtractedJson,
            );
        }
    }

    (keyword_decisions(text, requested), ResponseOrigin::KeywordScan)
}

/// Inner text of a completions-style wrapper, when the response is one.
fn completions_text(value: &Value) -> Option<String> {
    let choice = value.get("choices")?.as_array()?.first()?;

    choice
        .get("text")
        .and_then(Value::as_str)
        .or_else(|| {
            choice
                .get("message")
                .and_then(|m| m.get("content"))
                .and_then(Value::as_str)
        })
        .map(str::to_string)
}

fn coerce_list(items: &[Value]) -> Vec<Decision> {
    items.iter().filter_map(coerce_object).collect()
}

/// Allow-list coercion of one decision object. Objects without a usable
/// symbol are skipped entirely.
fn coerce_object(value: &Value) -> Option<Decision> {
    let obj = value.as_object()?;

    let symbol = obj
        .get("symbol")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())?
        .to_uppercase();

    Some(Decision {
        symbol,
        action: coerce_action(obj.get("action")),
        confidence: coerce_confidence(obj.get("confidence")),
        reason: coerce_reason(obj),
    })
}

/// Like `coerce_object`, but for flat objects that may omit the symbol;
/// `fallback_symbol` fills the gap when the model left it implicit.
fn coerce_flat(value: &Value, fallback_symbol: Option<&str>) -> Option<Decision> {
    let obj = value.as_object()?;

    let symbol = obj
        .get("symbol")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_uppercase)
        .or_else(|| fallback_symbol.map(|s| s.to_uppercase()))?;

    let action_field = obj.get("action").or_else(|| obj.get("recommendation"));

    Some(Decision {
        symbol,
        action: coerce_action(action_field),
        confidence: coerce_confidence(obj.get("confidence")),
        reason: coerce_reason(obj),
    })
}

fn coerce_action(value: Option<&Value>) -> Action {
    value
        .and_then(Value::as_str)
        .map(Action::from_loose)
        .unwrap_or_default()
}

fn coerce_confidence(value: Option<&Value>) -> f64 {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match raw {
        Some(v) if v.is_finite() => v.clamp(0.0, 1.0),
        _ => 0.0,
    }
}

fn coerce_reason(obj: &serde_json::Map<String, Value>) -> String {
    obj.get("reason")
        .or_else(|| obj.get("explanation"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Reconcile coerced decisions with the requested symbols.
///
/// Exact matches always win. With no match, lenient policy substitutes the
/// first valid decision re-keyed to the requested symbol; strict drops the
/// symbol. An empty request set passes decisions through untouched.
fn resolve(decisions: Vec<Decision>, requested: &[String], policy: MatchPolicy) -> Vec<Decision> {
    if requested.is_empty() {
        return decisions;
    }

    let mut resolved = Vec::with_capacity(requested.len());
    for symbol in requested {
        let wanted = symbol.to_uppercase();
        if let Some(exact) = decisions.iter().find(|d| d.symbol == wanted) {
            resolved.push(exact.clone());
        } else if policy == MatchPolicy::Lenient {
            if let Some(substitute) = decisions.first() {
                resolved.push(Decision {
                    symbol: wanted,
                    ..substitute.clone()
                });
            }
        }
    }
    resolved
}

/// Find a JSON object/array inside prose: fenced code block first, then the
/// first balanced brace/bracket span that parses.
fn extract_json_block(text: &str) -> Option<Value> {
    if let Some(inner) = extract_fenced(text) {
        if let Ok(value) = serde_json::from_str::<Value>(inner.trim()) {
            if value.is_object() || value.is_array() {
                return Some(value);
            }
        }
    }

    extract_balanced(text)
}

fn extract_fenced(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let rest = &text[start + 7..];
        if let Some(end) = rest.find("```") {
            return Some(&rest[..end]);
        }
    }

    if let Some(start) = text.find("```") {
        let rest = &text[start + 3..];
        if let Some(end) = rest.find("```") {
            let content = rest[..end].trim();
            // Skip a language identifier line if present
            let starts_json = content.starts_with('{') || content.starts_with('[');
            return match content.find('\n') {
                Some(newline) if !starts_json => Some(&content[newline + 1..]),
                _ => Some(content),
            };
        }
    }

    None
}

/// Scan for the first balanced `{…}` or `[…]` span that parses as JSON.
fn extract_balanced(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();

    for (start, &byte) in bytes.iter().enumerate() {
        let open = byte as char;
        if open != '{' && open != '[' {
            continue;
        }

        if let Some(end) = balanced_end(&text[start..]) {
            let candidate = &text[start..start + end];
            if let Ok(value) = serde_json::from_str::<Value>(candidate) {
                if value.is_object() || value.is_array() {
                    return Some(value);
                }
            }
        }
    }

    None
}

/// Byte length of the balanced span starting at the first character of
/// `text`, respecting JSON string literals and escapes.
fn balanced_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(idx + ch.len_utf8());
                }
            }
            _ => {}
        }
    }

    None
}

/// Last-resort keyword scan over free text: one decision per requested
/// symbol, all carrying the same scanned action and confidence.
fn keyword_decisions(text: &str, requested: &[String]) -> Vec<Decision> {
    let action = scan_action(text);
    let confidence = scan_confidence(text);
    let reason = text.trim().to_string();

    requested
        .iter()
        .map(|symbol| Decision::new(symbol.as_str(), action, confidence, reason.clone()))
        .collect()
}

fn scan_action(text: &str) -> Action {
    let lowered = text.to_lowercase();
    let has_buy = lowered.contains("buy");
    let has_sell = lowered.contains("sell");

    match (has_buy, has_sell) {
        (true, false) => Action::Buy,
        (false, true) => Action::Sell,
        _ => Action::Hold,
    }
}

/// First free-standing numeric token in [0, 100]. Values above 1 are read
/// as percentages and normalized into [0, 1].
fn scan_confidence(text: &str) -> f64 {
    text.replace('%', " ")
        .split_whitespace()
        .filter_map(|token| token.parse::<f64>().ok())
        .find(|v| (0.0..=100.0).contains(v))
        .map(|v| if v > 1.0 { v / 100.0 } else { v })
        .unwrap_or(0.0)
}
