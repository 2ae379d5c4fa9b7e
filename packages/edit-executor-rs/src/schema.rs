use serde_json::json;

use crate::types::{EditTool, OperationKind};

/// Tool definitions advertised to the chat backend, one per [`OperationKind`].
pub fn edit_tools() -> Vec<EditTool> {
    OperationKind::ALL.iter().map(|kind| edit_tool(*kind)).collect()
}

pub fn edit_tool(kind: OperationKind) -> EditTool {
    let (description, parameters) = match kind {
        OperationKind::ReplaceLineRange => (
            "Replace an inclusive range of lines with new content. Line numbers start at 1.",
            json!({
                "type": "object",
                "properties": {
                    "start_line": { "type": "integer", "minimum": 1, "description": "First line to replace" },
                    "end_line": { "type": "integer", "minimum": 1, "description": "Last line to replace" },
                    "new_content": { "type": "string", "description": "Replacement text, may span several lines" }
                },
                "required": ["start_line", "end_line", "new_content"]
            }),
        ),
        OperationKind::ReplaceText => (
            "Replace literal text in the document. The match is exact, not a pattern.",
            json!({
                "type": "object",
                "properties": {
                    "old_string": { "type": "string", "description": "Exact text to find" },
                    "new_string": { "type": "string", "description": "Text to put in its place" },
                    "occurrence": {
                        "type": "string",
                        "enum": ["first", "last", "all"],
                        "description": "Which match to replace; defaults to all"
                    }
                },
                "required": ["old_string", "new_string"]
            }),
        ),
        OperationKind::InsertAtLine => (
            "Insert a new line before or after an existing line.",
            json!({
                "type": "object",
                "properties": {
                    "line_number": { "type": "integer", "minimum": 1, "description": "Anchor line" },
                    "content": { "type": "string", "description": "Text of the inserted line" },
                    "position": {
                        "type": "string",
                        "enum": ["before", "after"],
                        "description": "Side of the anchor line; defaults to after"
                    }
                },
                "required": ["line_number", "content"]
            }),
        ),
        OperationKind::DeleteLineRange => (
            "Delete an inclusive range of lines.",
            json!({
                "type": "object",
                "properties": {
                    "start_line": { "type": "integer", "minimum": 1 },
                    "end_line": { "type": "integer", "minimum": 1 }
                },
                "required": ["start_line", "end_line"]
            }),
        ),
        OperationKind::Append => (
            "Append content as a new line at the end of the document.",
            json!({
                "type": "object",
                "properties": {
                    "content": { "type": "string" }
                },
                "required": ["content"]
            }),
        ),
    };

    EditTool {
        name: kind.as_str().to_string(),
        description: description.to_string(),
        parameters,
    }
}
