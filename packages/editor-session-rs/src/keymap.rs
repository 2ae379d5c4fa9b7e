use serde::{Deserialize, Serialize};

/// Keyboard event as reported by the editing surface.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyChord {
    pub key: String,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HistoryCommand {
    Undo,
    Redo,
}

/// Ctrl and Cmd are interchangeable as the primary modifier.
pub fn resolve(chord: &KeyChord) -> Option<HistoryCommand> {
    if !(chord.ctrl || chord.meta) || chord.alt {
        return None;
    }
    match chord.key.to_ascii_lowercase().as_str() {
        "z" if chord.shift => Some(HistoryCommand::Redo),
        "z" => Some(HistoryCommand::Undo),
        "y" => Some(HistoryCommand::Redo),
        _ => None,
    }
}
