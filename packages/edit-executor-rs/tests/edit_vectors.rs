use edit_executor_rs::{EditErrorCode, FunctionCall, execute_call};
use serde::Deserialize;

const VECTOR_JSON: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/tests/fixtures/edit-vectors.json"
));

#[derive(Deserialize)]
struct EditVectorFile {
    version: String,
    cases: Vec<EditCase>,
}

#[derive(Deserialize)]
struct EditCase {
    name: String,
    content: String,
    call: FunctionCall,
    expected: EditExpected,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditExpected {
    success: bool,
    new_content: Option<String>,
    code: Option<EditErrorCode>,
    #[serde(default)]
    error_contains: Vec<String>,
}

#[test]
fn edit_vectors_match() {
    let vectors: EditVectorFile = serde_json::from_str(VECTOR_JSON).expect("parse vectors");
    assert_eq!(vectors.version, "1");

    for case in vectors.cases {
        let outcome = execute_call(&case.call, &case.content);

        assert_eq!(outcome.success, case.expected.success, "case {}", case.name);

        if let Some(expected_content) = case.expected.new_content {
            assert_eq!(
                outcome.new_content.as_deref(),
                Some(expected_content.as_str()),
                "case {}",
                case.name
            );
        }

        if let Some(expected_code) = case.expected.code {
            assert_eq!(outcome.code, Some(expected_code), "case {}", case.name);
        }

        let message = outcome.error.unwrap_or_default();
        for fragment in case.expected.error_contains {
            assert!(
                message.contains(&fragment),
                "case {} error {:?} missing {:?}",
                case.name,
                message,
                fragment
            );
        }
    }
}

#[test]
fn failures_never_carry_content() {
    let vectors: EditVectorFile = serde_json::from_str(VECTOR_JSON).expect("parse vectors");
    for case in vectors.cases.into_iter().filter(|case| !case.expected.success) {
        let outcome = execute_call(&case.call, &case.content);
        assert!(outcome.new_content.is_none(), "case {}", case.name);
        assert!(outcome.error.is_some(), "case {}", case.name);
    }
}
