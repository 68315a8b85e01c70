//! Command response envelopes
//!
//! Every command reply carries an `ok` flag. A reply with `ok != 1` is a
//! perfectly normal outcome and is returned, never raised: callers get a
//! [`CommandOutcome::Failed`] carrying `errmsg`/`errno` and the full raw
//! response.

use mongodb::bson::{Bson, Document};

use crate::error::ErrorInfo;

/// Reply key carrying the success flag.
pub const OK: &str = "ok";
/// Reply key carrying the previous profiling level.
pub const WAS: &str = "was";
/// Reply key carrying the server error message.
pub const ERRMSG: &str = "errmsg";
/// Reply key carrying the legacy numeric error.
pub const ERRNO: &str = "errno";
/// Reply key carrying the modern numeric error.
pub const CODE: &str = "code";
/// Reply key carrying an eval return value.
pub const RETVAL: &str = "retval";

/// Whether a reply reports success.
///
/// The flag is compared numerically, so `1`, `1_i64` and `1.0` all count.
/// A boolean `true` is treated as `1` as well.
pub fn is_ok(response: &Document) -> bool {
    match response.get(OK) {
        Some(Bson::Int32(v)) => *v == 1,
        Some(Bson::Int64(v)) => *v == 1,
        Some(Bson::Double(v)) => *v == 1.0,
        Some(Bson::Boolean(v)) => *v,
        _ => false,
    }
}

/// A server-reported command failure.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandFailure {
    /// `errmsg`, when the server sent one
    pub errmsg: Option<String>,

    /// `errno`, when the server sent one
    pub errno: Option<i32>,

    /// `code`, when the server sent one
    pub code: Option<i32>,

    /// The full reply
    pub response: Document,
}

impl CommandFailure {
    /// Extract the failure fields of a reply.
    pub fn from_response(response: Document) -> Self {
        let errmsg = match response.get(ERRMSG) {
            Some(Bson::String(msg)) => Some(msg.clone()),
            _ => None,
        };

        Self {
            errmsg,
            errno: response.get(ERRNO).and_then(numeric_i32),
            code: response.get(CODE).and_then(numeric_i32),
            response,
        }
    }

    /// Structured, serializable view of this failure.
    pub fn info(&self) -> ErrorInfo {
        ErrorInfo::from_command_response(&self.response)
    }
}

/// Outcome of a command whose reply is surfaced as a whole.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Succeeded(Document),
    Failed(CommandFailure),
}

impl CommandOutcome {
    /// Interpret a raw reply.
    pub fn interpret(response: Document) -> Self {
        if is_ok(&response) {
            CommandOutcome::Succeeded(response)
        } else {
            CommandOutcome::Failed(CommandFailure::from_response(response))
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, CommandOutcome::Succeeded(_))
    }

    /// The unmodified server reply, whatever the outcome.
    pub fn response(&self) -> &Document {
        match self {
            CommandOutcome::Succeeded(response) => response,
            CommandOutcome::Failed(failure) => &failure.response,
        }
    }

    pub fn into_response(self) -> Document {
        match self {
            CommandOutcome::Succeeded(response) => response,
            CommandOutcome::Failed(failure) => failure.response,
        }
    }

    /// `errmsg` of a failed command.
    pub fn errmsg(&self) -> Option<&str> {
        match self {
            CommandOutcome::Succeeded(_) => None,
            CommandOutcome::Failed(failure) => failure.errmsg.as_deref(),
        }
    }

    /// `errno` of a failed command.
    pub fn errno(&self) -> Option<i32> {
        match self {
            CommandOutcome::Succeeded(_) => None,
            CommandOutcome::Failed(failure) => failure.errno,
        }
    }

    /// `retval` of a successful eval.
    pub fn retval(&self) -> Option<&Bson> {
        match self {
            CommandOutcome::Succeeded(response) => response.get(RETVAL),
            CommandOutcome::Failed(_) => None,
        }
    }
}

/// Outcome of reading or setting the profiling level.
///
/// `Failed` is distinct from `Previous(0)`: a failed call has no level.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfilingOutcome {
    /// The level in effect before the call
    Previous(i32),
    Failed(CommandFailure),
}

impl ProfilingOutcome {
    /// Interpret a `profile` reply.
    ///
    /// A reply that claims success but carries no numeric `was` is reported
    /// as a failure with the raw reply attached.
    pub fn interpret(response: Document) -> Self {
        if is_ok(&response) {
            if let Some(level) = response.get(WAS).and_then(numeric_i32) {
                return ProfilingOutcome::Previous(level);
            }
        }
        ProfilingOutcome::Failed(CommandFailure::from_response(response))
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ProfilingOutcome::Previous(_))
    }

    pub fn level(&self) -> Option<i32> {
        match self {
            ProfilingOutcome::Previous(level) => Some(*level),
            ProfilingOutcome::Failed(_) => None,
        }
    }
}

/// Numeric BSON value as `i32`, accepting integral doubles.
///
/// Values outside the `i32` range give `None` whatever their BSON type.
pub(crate) fn numeric_i32(value: &Bson) -> Option<i32> {
    match value {
        Bson::Int32(v) => Some(*v),
        Bson::Int64(v) => i32::try_from(*v).ok(),
        Bson::Double(v)
            if v.fract() == 0.0 && (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(v) =>
        {
            Some(*v as i32)
        }
        _ => None,
    }
}
