use serde_json::Value;

use crate::types::{
    BatchOutcome, EditError, EditOperation, EditOutcome, FunctionCall, InsertPosition, Occurrence,
};

/// Parses and applies one tool call. Never panics; every failure is an outcome.
pub fn execute(function_name: &str, arguments: &Value, current_content: &str) -> EditOutcome {
    EditOperation::from_call(function_name, arguments)
        .and_then(|operation| apply(&operation, current_content))
        .into()
}

pub fn execute_call(call: &FunctionCall, current_content: &str) -> EditOutcome {
    execute(&call.name, &call.arguments, current_content)
}

/// Applies calls in order and stops at the first rejection. On failure no content is
/// returned, so callers keep their original buffer.
pub fn execute_batch(calls: &[FunctionCall], current_content: &str) -> BatchOutcome {
    let mut content = current_content.to_string();

    for (index, call) in calls.iter().enumerate() {
        let result = EditOperation::from_call(&call.name, &call.arguments)
            .and_then(|operation| apply(&operation, &content));
        match result {
            Ok(next) => content = next,
            Err(error) => {
                return BatchOutcome {
                    success: false,
                    applied: index,
                    new_content: None,
                    failed_index: Some(index),
                    error: Some(error.to_string()),
                    code: Some(error.code()),
                };
            }
        }
    }

    BatchOutcome {
        success: true,
        applied: calls.len(),
        new_content: Some(content),
        failed_index: None,
        error: None,
        code: None,
    }
}

/// Applies a typed operation to `content`. Bounds are checked against the line count
/// before any mutation.
pub fn apply(operation: &EditOperation, content: &str) -> Result<String, EditError> {
    let lines: Vec<&str> = content.split('\n').collect();
    let total = lines.len();

    match operation {
        EditOperation::ReplaceLineRange {
            start_line,
            end_line,
            new_content,
        } => {
            let (start, end) = validate_range(*start_line, *end_line, total)?;
            let mut next = Vec::with_capacity(total - (end - start) + 1);
            next.extend_from_slice(&lines[..start]);
            next.push(new_content.as_str());
            next.extend_from_slice(&lines[end..]);
            Ok(next.join("\n"))
        }
        EditOperation::ReplaceText {
            old_string,
            new_string,
            occurrence,
        } => replace_text(content, old_string, new_string, *occurrence),
        EditOperation::InsertAtLine {
            line_number,
            content: inserted,
            position,
        } => {
            if *line_number < 1 || *line_number > total as i64 {
                return Err(EditError::InvalidLineNumber {
                    line: *line_number,
                    total,
                });
            }
            let index = match position {
                InsertPosition::Before => (*line_number - 1) as usize,
                InsertPosition::After => *line_number as usize,
            };
            let mut next = lines;
            next.insert(index, inserted.as_str());
            Ok(next.join("\n"))
        }
        EditOperation::DeleteLineRange {
            start_line,
            end_line,
        } => {
            let (start, end) = validate_range(*start_line, *end_line, total)?;
            let mut next = Vec::with_capacity(total - (end - start));
            next.extend_from_slice(&lines[..start]);
            next.extend_from_slice(&lines[end..]);
            Ok(next.join("\n"))
        }
        EditOperation::Append { content: appended } => {
            if content.is_empty() {
                Ok(appended.clone())
            } else {
                Ok(format!("{content}\n{appended}"))
            }
        }
    }
}

pub fn line_count(content: &str) -> usize {
    content.split('\n').count()
}

/// Converts an inclusive 1-indexed range into a half-open 0-indexed slice range.
fn validate_range(start_line: i64, end_line: i64, total: usize) -> Result<(usize, usize), EditError> {
    if start_line < 1 || end_line > total as i64 || start_line > end_line {
        return Err(EditError::InvalidLineRange {
            start: start_line,
            end: end_line,
            total,
        });
    }
    Ok(((start_line - 1) as usize, end_line as usize))
}

fn replace_text(
    content: &str,
    old_string: &str,
    new_string: &str,
    occurrence: Occurrence,
) -> Result<String, EditError> {
    let not_found = || EditError::TextNotFound {
        needle: old_string.to_string(),
    };

    match occurrence {
        Occurrence::First => {
            let index = content.find(old_string).ok_or_else(not_found)?;
            Ok(splice(content, index, old_string.len(), new_string))
        }
        Occurrence::Last => {
            let index = content.rfind(old_string).ok_or_else(not_found)?;
            Ok(splice(content, index, old_string.len(), new_string))
        }
        Occurrence::All => {
            if !content.contains(old_string) {
                return Err(not_found());
            }
            Ok(content.replace(old_string, new_string))
        }
    }
}

fn splice(content: &str, index: usize, len: usize, replacement: &str) -> String {
    let mut next = String::with_capacity(content.len() - len + replacement.len());
    next.push_str(&content[..index]);
    next.push_str(replacement);
    next.push_str(&content[index + len..]);
    next
}
