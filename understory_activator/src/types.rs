// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core types for the activation protocol: guard responses, activation data, options, and errors.
//!
//! ## Overview
//!
//! Guard hooks ([`Participant::can_activate`](crate::participant::Participant::can_activate) and
//! [`Participant::can_deactivate`](crate::participant::Participant::can_deactivate)) answer with a
//! [`Response`], which the activator interprets as a yes/no decision.
//! Activation hooks receive an [`ActivationData`] describing the arguments supplied with the request.

use serde_json::Value;

/// Lower-cased words which represent a truthy guard answer by default.
pub const DEFAULT_AFFIRMATIONS: [&str; 3] = ["yes", "ok", "true"];

/// The answer returned by a guard hook.
///
/// Interpreted by [`Response::interpret`]:
/// - `Bool` is taken as is.
/// - `Text` is true iff it matches one of the affirmations, ignoring case.
/// - `Value` follows the loose JSON rules: an object answers with its `can` field
///   (missing means `false`), strings are matched against the affirmations, numbers are
///   true when non-zero, `null` and arrays are false.
#[derive(Clone, Debug, PartialEq)]
pub enum Response {
    /// A plain yes/no answer.
    Bool(bool),
    /// A word such as `"Yes"` or `"ok"`.
    Text(String),
    /// A structured answer, typically `{ "can": bool }`.
    Value(Value),
}

impl Response {
    /// Shorthand for an object answer carrying only a `can` field.
    pub fn can(can: bool) -> Self {
        Self::Value(serde_json::json!({ "can": can }))
    }

    /// Interpret the answer using the given affirmation words.
    pub fn interpret<S: AsRef<str>>(&self, affirmations: &[S]) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Text(text) => is_affirmation(text, affirmations),
            Self::Value(value) => interpret_value(value, affirmations),
        }
    }
}

impl From<bool> for Response {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Response {
    fn from(value: &str) -> Self {
        Self::Text(value.into())
    }
}

impl From<String> for Response {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Value> for Response {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

fn is_affirmation<S: AsRef<str>>(text: &str, affirmations: &[S]) -> bool {
    let text = text.to_lowercase();
    affirmations
        .iter()
        .any(|a| a.as_ref().to_lowercase() == text)
}

fn interpret_value<S: AsRef<str>>(value: &Value, affirmations: &[S]) -> bool {
    let value = match value {
        Value::Object(map) => match map.get("can") {
            Some(can) => can,
            None => return false,
        },
        Value::Array(_) => return false,
        other => other,
    };
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(text) => is_affirmation(text, affirmations),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Arguments supplied with an activation request.
///
/// `Multiple` is the positional form: hooks see every value in order through
/// [`ActivationData::args`]. `Single` is one argument, and `None` means no data was given.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum ActivationData {
    /// No activation data.
    #[default]
    None,
    /// A single argument.
    Single(Value),
    /// Positional arguments.
    Multiple(Vec<Value>),
}

impl ActivationData {
    /// Returns true if no data was supplied.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// The data as a positional argument list.
    pub fn args(&self) -> &[Value] {
        match self {
            Self::None => &[],
            Self::Single(value) => core::slice::from_ref(value),
            Self::Multiple(values) => values,
        }
    }

    /// The first positional argument, if any.
    pub fn first(&self) -> Option<&Value> {
        self.args().first()
    }
}

impl From<Value> for ActivationData {
    fn from(value: Value) -> Self {
        Self::Single(value)
    }
}

impl From<Vec<Value>> for ActivationData {
    fn from(values: Vec<Value>) -> Self {
        Self::Multiple(values)
    }
}

/// Per-request options controlling the activation process.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ActivationOptions {
    /// Whether the outgoing item's `can_deactivate` guard is consulted.
    pub can_deactivate: bool,
}

impl Default for ActivationOptions {
    fn default() -> Self {
        Self {
            can_deactivate: true,
        }
    }
}

/// Failure reported by a lifecycle hook.
///
/// Returning `Err` from a hook covers both a hook that fails outright and one whose
/// pending work is rejected. The activator never propagates these; it logs them and
/// treats the step as a negative outcome.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    /// The hook failed with a reason.
    #[error("{0}")]
    Failed(String),
    /// The hook was rejected without a reason.
    #[error("rejected")]
    Rejected,
}

impl LifecycleError {
    /// Create a failure with a reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    /// Create a rejection that carries no reason.
    pub fn rejected() -> Self {
        Self::Rejected
    }
}
