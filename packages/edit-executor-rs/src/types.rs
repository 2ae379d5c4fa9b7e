use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which match of `old_string` a `replace_text` call rewrites.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Occurrence {
    First,
    Last,
    #[default]
    All,
}

/// Where `insert_at_line` places the new line relative to `line_number`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertPosition {
    Before,
    #[default]
    After,
}

/// Closed set of edits the assistant may request. Line numbers are 1-indexed and
/// signed so that zero or negative values surface as range errors, not parse errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditOperation {
    ReplaceLineRange {
        start_line: i64,
        end_line: i64,
        new_content: String,
    },
    ReplaceText {
        old_string: String,
        new_string: String,
        occurrence: Occurrence,
    },
    InsertAtLine {
        line_number: i64,
        content: String,
        position: InsertPosition,
    },
    DeleteLineRange {
        start_line: i64,
        end_line: i64,
    },
    Append {
        content: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    ReplaceLineRange,
    ReplaceText,
    InsertAtLine,
    DeleteLineRange,
    Append,
}

impl OperationKind {
    pub const ALL: [OperationKind; 5] = [
        OperationKind::ReplaceLineRange,
        OperationKind::ReplaceText,
        OperationKind::InsertAtLine,
        OperationKind::DeleteLineRange,
        OperationKind::Append,
    ];

    /// Resolves a tool-call name, including the names older chat prompts still emit.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "replace_line_range" | "update_doc_by_line" => Some(Self::ReplaceLineRange),
            "replace_text" | "update_doc_by_replace" => Some(Self::ReplaceText),
            "insert_at_line" => Some(Self::InsertAtLine),
            "delete_line_range" | "delete_lines" => Some(Self::DeleteLineRange),
            "append" | "append_to_document" => Some(Self::Append),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::ReplaceLineRange => "replace_line_range",
            OperationKind::ReplaceText => "replace_text",
            OperationKind::InsertAtLine => "insert_at_line",
            OperationKind::DeleteLineRange => "delete_line_range",
            OperationKind::Append => "append",
        }
    }
}

impl EditOperation {
    pub fn kind(&self) -> OperationKind {
        match self {
            EditOperation::ReplaceLineRange { .. } => OperationKind::ReplaceLineRange,
            EditOperation::ReplaceText { .. } => OperationKind::ReplaceText,
            EditOperation::InsertAtLine { .. } => OperationKind::InsertAtLine,
            EditOperation::DeleteLineRange { .. } => OperationKind::DeleteLineRange,
            EditOperation::Append { .. } => OperationKind::Append,
        }
    }

    /// Builds a typed operation from a tool-call name and its JSON arguments.
    ///
    /// Arguments may arrive either as an object or as a JSON-encoded string, which is
    /// how most chat completion APIs deliver them.
    pub fn from_call(name: &str, arguments: &Value) -> Result<Self, EditError> {
        let kind = OperationKind::from_name(name)
            .ok_or_else(|| EditError::UnsupportedOperation(name.to_string()))?;
        let arguments = normalize_arguments(kind, arguments)?;

        let operation = match kind {
            OperationKind::ReplaceLineRange => {
                let args: ReplaceLineRangeArgs = parse_arguments(kind, arguments)?;
                EditOperation::ReplaceLineRange {
                    start_line: args.start_line,
                    end_line: args.end_line,
                    new_content: args.new_content,
                }
            }
            OperationKind::ReplaceText => {
                let args: ReplaceTextArgs = parse_arguments(kind, arguments)?;
                if args.old_string.is_empty() {
                    return Err(EditError::InvalidArguments {
                        operation: kind.as_str().to_string(),
                        reason: "old_string must not be empty".to_string(),
                    });
                }
                EditOperation::ReplaceText {
                    old_string: args.old_string,
                    new_string: args.new_string,
                    occurrence: args.occurrence.unwrap_or_default(),
                }
            }
            OperationKind::InsertAtLine => {
                let args: InsertAtLineArgs = parse_arguments(kind, arguments)?;
                EditOperation::InsertAtLine {
                    line_number: args.line_number,
                    content: args.content,
                    position: args.position.unwrap_or_default(),
                }
            }
            OperationKind::DeleteLineRange => {
                let args: LineRangeArgs = parse_arguments(kind, arguments)?;
                EditOperation::DeleteLineRange {
                    start_line: args.start_line,
                    end_line: args.end_line,
                }
            }
            OperationKind::Append => {
                let args: AppendArgs = parse_arguments(kind, arguments)?;
                EditOperation::Append {
                    content: args.content,
                }
            }
        };

        Ok(operation)
    }
}

fn normalize_arguments(kind: OperationKind, arguments: &Value) -> Result<Value, EditError> {
    match arguments {
        Value::String(encoded) => serde_json::from_str(encoded).map_err(|error| {
            EditError::InvalidArguments {
                operation: kind.as_str().to_string(),
                reason: format!("arguments are not valid JSON: {error}"),
            }
        }),
        other => Ok(other.clone()),
    }
}

fn parse_arguments<T: serde::de::DeserializeOwned>(
    kind: OperationKind,
    arguments: Value,
) -> Result<T, EditError> {
    serde_json::from_value(arguments).map_err(|error| EditError::InvalidArguments {
        operation: kind.as_str().to_string(),
        reason: error.to_string(),
    })
}

#[derive(Deserialize)]
struct ReplaceLineRangeArgs {
    start_line: i64,
    end_line: i64,
    new_content: String,
}

#[derive(Deserialize)]
struct ReplaceTextArgs {
    old_string: String,
    new_string: String,
    occurrence: Option<Occurrence>,
}

#[derive(Deserialize)]
struct InsertAtLineArgs {
    line_number: i64,
    content: String,
    position: Option<InsertPosition>,
}

#[derive(Deserialize)]
struct LineRangeArgs {
    start_line: i64,
    end_line: i64,
}

#[derive(Deserialize)]
struct AppendArgs {
    content: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EditErrorCode {
    InvalidLineRange,
    InvalidLineNumber,
    TextNotFound,
    UnsupportedOperation,
    InvalidArguments,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("invalid line range: requested {start}-{end}, document has {total} lines")]
    InvalidLineRange { start: i64, end: i64, total: usize },
    #[error("invalid line number: requested {line}, document has {total} lines")]
    InvalidLineNumber { line: i64, total: usize },
    #[error("text not found in document: {needle:?}")]
    TextNotFound { needle: String },
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
    #[error("invalid arguments for {operation}: {reason}")]
    InvalidArguments { operation: String, reason: String },
}

impl EditError {
    pub fn code(&self) -> EditErrorCode {
        match self {
            EditError::InvalidLineRange { .. } => EditErrorCode::InvalidLineRange,
            EditError::InvalidLineNumber { .. } => EditErrorCode::InvalidLineNumber,
            EditError::TextNotFound { .. } => EditErrorCode::TextNotFound,
            EditError::UnsupportedOperation(_) => EditErrorCode::UnsupportedOperation,
            EditError::InvalidArguments { .. } => EditErrorCode::InvalidArguments,
        }
    }
}

/// Wire shape handed back to the chat loop; `error` is forwarded verbatim to the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<EditErrorCode>,
}

impl EditOutcome {
    pub fn applied(new_content: String) -> Self {
        Self {
            success: true,
            new_content: Some(new_content),
            error: None,
            code: None,
        }
    }

    pub fn rejected(error: &EditError) -> Self {
        Self {
            success: false,
            new_content: None,
            error: Some(error.to_string()),
            code: Some(error.code()),
        }
    }
}

impl From<Result<String, EditError>> for EditOutcome {
    fn from(result: Result<String, EditError>) -> Self {
        match result {
            Ok(content) => EditOutcome::applied(content),
            Err(error) => EditOutcome::rejected(&error),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCall {
    pub id: Option<String>,
    #[serde(alias = "functionName")]
    pub name: String,
    #[serde(default, alias = "args")]
    pub arguments: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub success: bool,
    pub applied: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<EditErrorCode>,
}

/// Function definition in the `{ name, description, parameters }` shape chat
/// completion requests carry.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditTool {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}
