use std::env;
use std::fs;

use serde::Deserialize;
use serde_json::json;

use edit_executor_rs::{FunctionCall, execute_call, line_count};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplayScenario {
    #[serde(default)]
    content: String,
    calls: Vec<FunctionCall>,
    #[serde(default)]
    stop_on_error: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = env::args()
        .nth(1)
        .ok_or("Usage: edit-replay <scenario.json>")?;
    let payload = fs::read_to_string(path)?;
    let scenario: ReplayScenario = serde_json::from_str(&payload)?;

    let mut content = scenario.content;
    let mut failures = 0usize;

    for (index, call) in scenario.calls.iter().enumerate() {
        let outcome = execute_call(call, &content);
        let step = json!({
            "index": index,
            "id": call.id,
            "name": call.name,
            "success": outcome.success,
            "error": outcome.error,
            "code": outcome.code,
        });
        println!("{}", serde_json::to_string(&step)?);

        match outcome.new_content {
            Some(next) => content = next,
            None => {
                failures += 1;
                if scenario.stop_on_error {
                    break;
                }
            }
        }
    }

    let output = json!({
        "content": content,
        "lineCount": line_count(&content),
        "failures": failures,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
