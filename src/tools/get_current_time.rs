//! Get current time tool

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde_json::{json, Value};

use crate::error::McpResult;
use crate::protocol::{McpTool, Tool};
use crate::server::text_response;

/// Tool for getting the current datetime and timestamp
pub struct GetCurrentTimeTool;

impl GetCurrentTimeTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GetCurrentTimeTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Time information as JSON for the given instant
pub fn time_info(now: DateTime<Utc>) -> Value {
    json!({
        "timestamp": now.timestamp(),
        "timestamp_ms": now.timestamp_millis(),
        "iso8601": now.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        "readable": now.format("%A, %-d %B %Y %H:%M:%S UTC").to_string(),
        "components": {
            "year": now.year(),
            "month": now.month(),
            "day": now.day(),
            "hour": now.hour(),
            "minute": now.minute(),
            "second": now.second(),
            "weekday": now.format("%A").to_string()
        }
    })
}

impl Tool for GetCurrentTimeTool {
    fn definition(&self) -> McpTool {
        McpTool {
            name: "get_current_time".to_string(),
            description: "Get the current datetime and timestamp".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }

    fn execute(&self, _params: Value) -> McpResult<Value> {
        let info = time_info(Utc::now());
        Ok(text_response(serde_json::to_string_pretty(&info)?))
    }
}
