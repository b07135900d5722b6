//! # Subscription Routing
//!
//! A subscription route carries an ordered rule set, its metadata and an
//! optional dead-letter topic. Resolving an event to an application path is
//! delegated to a [`RouteMatcher`] so the rule language can be swapped out;
//! [`RuleRouteMatcher`] understands simple field comparisons such as
//! `event.type == "order.created"`.

use super::errors::{BulkDispatchError, RouteMatchError};
use super::message::RAW_PAYLOAD_KEY;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt::Debug;

/// Event as seen by the route matcher
#[derive(Debug, Clone, Copy)]
pub enum MatchInput<'a> {
    /// Raw payload, matched as text
    Raw(&'a str),
    /// Decoded cloud event
    Structured(&'a Map<String, Value>),
}

/// One routing rule: events satisfying `condition` go to `path`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    pub path: String,
    /// No condition means the rule always matches
    #[serde(default, rename = "match")]
    pub condition: Option<String>,
}

impl RouteRule {
    pub fn always(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            condition: None,
        }
    }

    pub fn when(path: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            condition: Some(condition.into()),
        }
    }
}

/// Subscription route for one topic
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRoute {
    pub rules: Vec<RouteRule>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub dead_letter_topic: Option<String>,
}

impl TopicRoute {
    /// Route every event to a single path
    pub fn single(path: impl Into<String>) -> Self {
        Self {
            rules: vec![RouteRule::always(path)],
            ..Default::default()
        }
    }

    pub fn with_rules(rules: Vec<RouteRule>) -> Self {
        Self {
            rules,
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_dead_letter_topic(mut self, topic: impl Into<String>) -> Self {
        self.dead_letter_topic = Some(topic.into());
        self
    }

    /// Configured dead-letter topic, ignoring blank values
    pub fn dead_letter_topic(&self) -> Option<&str> {
        self.dead_letter_topic
            .as_deref()
            .filter(|topic| !topic.is_empty())
    }

    /// Whether the batch is delivered raw rather than as cloud events.
    ///
    /// The flag applies to the whole batch; an unparseable value fails it.
    pub fn is_raw_payload(&self) -> Result<bool, BulkDispatchError> {
        match self.metadata.get(RAW_PAYLOAD_KEY) {
            None => Ok(false),
            Some(value) if value.is_empty() => Ok(false),
            Some(value) => {
                parse_bool(value).ok_or_else(|| BulkDispatchError::MetadataDeserialization {
                    message: format!("invalid value {value:?} for metadata key {RAW_PAYLOAD_KEY}"),
                })
            }
        }
    }
}

/// Boolean spellings accepted in subscription metadata
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Resolves an event to a destination path
pub trait RouteMatcher: Send + Sync + Debug {
    /// `Ok(None)` means no rule matched and the event should be dropped.
    fn match_route(
        &self,
        rules: &[RouteRule],
        event: MatchInput<'_>,
    ) -> Result<Option<String>, RouteMatchError>;
}

/// Default matcher evaluating `event.<path> == "literal"` and `!=` conditions
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleRouteMatcher;

impl RuleRouteMatcher {
    pub fn new() -> Self {
        Self
    }

    fn evaluate(condition: &str, event: MatchInput<'_>) -> Result<bool, RouteMatchError> {
        let parsed = Condition::parse(condition)?;
        let MatchInput::Structured(fields) = event else {
            // Raw payloads have no fields to compare against
            return Ok(false);
        };
        let actual = lookup(fields, &parsed.field);
        let equal = actual.is_some_and(|value| literal_equals(value, &parsed.literal));
        Ok(if parsed.negated { !equal } else { equal })
    }
}

impl RouteMatcher for RuleRouteMatcher {
    fn match_route(
        &self,
        rules: &[RouteRule],
        event: MatchInput<'_>,
    ) -> Result<Option<String>, RouteMatchError> {
        for rule in rules {
            match rule.condition.as_deref().map(str::trim) {
                None | Some("") => return Ok(Some(rule.path.clone())),
                Some(condition) => {
                    if Self::evaluate(condition, event)? {
                        return Ok(Some(rule.path.clone()));
                    }
                }
            }
        }
        Ok(None)
    }
}

#[derive(Debug)]
struct Condition {
    field: Vec<String>,
    literal: String,
    negated: bool,
}

impl Condition {
    fn parse(condition: &str) -> Result<Self, RouteMatchError> {
        let invalid = |reason: &str| RouteMatchError::InvalidCondition {
            condition: condition.to_string(),
            reason: reason.to_string(),
        };

        let (lhs, rhs, negated) =
            split_operator(condition).ok_or_else(|| invalid("expected `==` or `!=`"))?;

        let path = lhs
            .trim()
            .strip_prefix("event.")
            .ok_or_else(|| invalid("left side must start with `event.`"))?;
        let field: Vec<String> = path.split('.').map(str::to_string).collect();
        if field.iter().any(String::is_empty) {
            return Err(invalid("empty field name"));
        }

        let rhs = rhs.trim();
        let literal = if rhs.len() >= 2 && rhs.starts_with('"') && rhs.ends_with('"') {
            rhs[1..rhs.len() - 1].to_string()
        } else if rhs.is_empty() || rhs.contains(char::is_whitespace) {
            return Err(invalid("right side must be a literal"));
        } else {
            rhs.to_string()
        };

        Ok(Self {
            field,
            literal,
            negated,
        })
    }
}

/// Splits at the first `==` or `!=` outside a quoted literal.
fn split_operator(condition: &str) -> Option<(&str, &str, bool)> {
    let bytes = condition.as_bytes();
    let mut in_quotes = false;
    for (i, pair) in bytes.windows(2).enumerate() {
        match pair {
            [b'"', _] => in_quotes = !in_quotes,
            [op @ (b'=' | b'!'), b'='] if !in_quotes => {
                return Some((&condition[..i], &condition[i + 2..], *op == b'!'));
            }
            _ => {}
        }
    }
    None
}

fn lookup<'a>(fields: &'a Map<String, Value>, path: &[String]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = fields.get(first)?;
    for segment in rest {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn literal_equals(value: &Value, literal: &str) -> bool {
    match value {
        Value::String(s) => s == literal,
        Value::Number(n) => n.to_string() == literal,
        Value::Bool(b) => b.to_string() == literal,
        Value::Null => literal == "null",
        Value::Array(_) | Value::Object(_) => false,
    }
}
