use std::fmt;

use mongodb::bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use crate::response::numeric_i32;

/// Structured error information extracted from driver errors and from
/// failed command responses.
///
/// Serialized to JSON for logging and for the command-line output.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub(crate) error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) message: Option<String>,
}

impl ErrorInfo {
    /// Build error info from a command response whose `ok` flag is not 1.
    ///
    /// Servers report the numeric error either as `code` or, on older
    /// versions, as `errno`; `code` wins when both are present.
    pub fn from_command_response(response: &Document) -> Self {
        let code = response
            .get("code")
            .and_then(numeric_i32)
            .or_else(|| response.get("errno").and_then(numeric_i32));

        let message = match response.get("errmsg") {
            Some(Bson::String(msg)) => Some(msg.clone()),
            _ => None,
        };

        let name = match response.get("codeName") {
            Some(Bson::String(name)) => Some(name.clone()),
            _ => code.and_then(get_error_name),
        };

        ErrorInfo {
            error_type: Some("mongo.command_failed".to_string()),
            code,
            name,
            message,
        }
    }

    /// Error code, if the source carried one.
    pub fn code(&self) -> Option<i32> {
        self.code
    }

    /// Human-readable error message, if any.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Convert error info to compact JSON string (single line).
    pub fn to_json_compact(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Format driver errors as pretty JSON wrapped in an `error` field.
///
/// Used by the `Display` implementation of `DbError::MongoDb`.
pub fn format_mongodb_error(
    f: &mut fmt::Formatter<'_>,
    error: &mongodb::error::Error,
) -> fmt::Result {
    let info = extract_error_info(error);
    let wrapper = serde_json::json!({ "error": info });
    let json_output = serde_json::to_string_pretty(&wrapper).map_err(|_| fmt::Error)?;
    write!(f, "\n{json_output}")
}

/// Extract structured information from a driver error using its typed kinds.
pub fn extract_error_info(error: &mongodb::error::Error) -> ErrorInfo {
    use mongodb::error::ErrorKind;

    let mut info = ErrorInfo::default();

    match error.kind.as_ref() {
        ErrorKind::Command(command_error) => {
            info.error_type = Some("mongo.command_error".to_string());
            info.code = Some(command_error.code);
            info.message = Some(command_error.message.clone());
            info.name = Some(command_error.code_name.clone())
                .filter(|name| !name.is_empty())
                .or_else(|| get_error_name(command_error.code));
        }
        ErrorKind::Authentication { message, .. } => {
            info.error_type = Some("mongo.authentication_error".to_string());
            info.message = Some(message.clone());
        }
        ErrorKind::InvalidArgument { message, .. } => {
            info.error_type = Some("mongo.invalid_argument".to_string());
            info.message = Some(message.clone());
        }
        ErrorKind::ServerSelection { message, .. } => {
            info.error_type = Some("mongo.server_selection_error".to_string());
            info.message = Some(message.clone());
        }
        ErrorKind::Io(io_error) => {
            info.error_type = Some("mongo.io_error".to_string());
            info.message = Some(io_error.to_string());
        }
        _ => {
            info.message = Some(error.to_string());
        }
    }

    info
}

/// Get a human-readable error name from a server error code.
fn get_error_name(code: i32) -> Option<String> {
    let name = match code {
        13 => "Unauthorized",
        18 => "AuthenticationFailed",
        26 => "NamespaceNotFound",
        48 => "NamespaceExists",
        50 => "MaxTimeMSExpired",
        59 => "CommandNotFound",
        73 => "InvalidNamespace",
        139 => "JSInterpreterFailure",
        _ => return None,
    };

    Some(name.to_string())
}
