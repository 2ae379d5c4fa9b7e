mod engine;
mod schema;
mod types;

pub use engine::{apply, execute, execute_batch, execute_call, line_count};
pub use schema::{edit_tool, edit_tools};

use napi::bindgen_prelude::Result as NapiResult;
use napi_derive::napi;
use serde::de::DeserializeOwned;
use serde_json::Value;

fn to_napi_error(error: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(error.to_string())
}

fn parse_input<T: DeserializeOwned>(value: Value, label: &str) -> NapiResult<T> {
    serde_json::from_value(value).map_err(|error| to_napi_error(format!("Invalid {label}: {error}")))
}

#[napi(js_name = "executeFunctionCall")]
pub fn execute_function_call(
    function_name: String,
    args: Value,
    current_content: String,
) -> NapiResult<Value> {
    let outcome = execute(&function_name, &args, &current_content);
    if let Some(error) = &outcome.error {
        tracing::debug!(function = %function_name, %error, "edit rejected");
    }
    serde_json::to_value(outcome).map_err(to_napi_error)
}

#[napi(js_name = "executeFunctionCalls")]
pub fn execute_function_calls(calls: Vec<Value>, current_content: String) -> NapiResult<Value> {
    let mut parsed = Vec::with_capacity(calls.len());
    for call in calls {
        parsed.push(parse_input::<FunctionCall>(call, "function call")?);
    }
    serde_json::to_value(execute_batch(&parsed, &current_content)).map_err(to_napi_error)
}

#[napi(js_name = "listEditTools")]
pub fn list_edit_tools() -> NapiResult<Value> {
    serde_json::to_value(edit_tools()).map_err(to_napi_error)
}

pub use types::*;
