pub mod download;
pub mod request;
pub mod session;

use anyhow::Context;
use serde_json::Value;

fn print_json(value: &Value) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize response")?;
    println!("{text}");
    Ok(())
}

/// Parse an optional JSON argument, defaulting to an empty object.
fn parse_body(data: Option<&str>) -> anyhow::Result<Value> {
    match data {
        Some(text) => serde_json::from_str(text).context("--data is not valid JSON"),
        None => Ok(Value::Object(Default::default())),
    }
}

/// Parse `key=value` into a query pair.
fn parse_pair(s: &str) -> Result<(String, String), String> {
    let (k, v) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {s:?}"))?;
    Ok((k.to_string(), v.to_string()))
}
