use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Plain-text download of the current buffer, named after the document title.
pub fn export_document(title: &str, content: &str) -> ExportedFile {
    ExportedFile {
        file_name: format!("{title}.txt"),
        mime_type: "text/plain".to_string(),
        bytes: content.as_bytes().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_file_after_title() {
        let file = export_document("Meeting notes", "a\nb");
        assert_eq!(file.file_name, "Meeting notes.txt");
        assert_eq!(file.mime_type, "text/plain");
        assert_eq!(file.bytes, b"a\nb".to_vec());
    }
}
