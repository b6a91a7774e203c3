//! Tool definitions and tool calls for function calling.
//!
//! Tool parameter schemas are plain JSON values: callers that derive their
//! schemas from user configuration build them dynamically, so there is no
//! typed-tool layer here.

use serde::Serialize;
use serde_json::Value;

/// A function the model may call.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    /// The name of the tool.
    pub name: String,

    /// A description of what the tool does.
    pub description: String,

    /// JSON schema for the tool's parameters.
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Convert to the wire format of the chat completions API.
    pub fn to_api_format(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters
            }
        })
    }
}

/// A tool call from the model.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// The ID of this tool call (for matching responses).
    pub id: String,

    /// The name of the tool to call.
    pub name: String,

    /// The arguments as a JSON string.
    pub arguments: String,
}

impl ToolCall {
    /// Parse a tool call from the API response format.
    pub fn from_api_value(value: &Value) -> Option<Self> {
        Some(Self {
            id: value.get("id")?.as_str()?.to_string(),
            name: value.get("function")?.get("name")?.as_str()?.to_string(),
            arguments: value
                .get("function")?
                .get("arguments")?
                .as_str()?
                .to_string(),
        })
    }

    /// Parse the arguments into a JSON object.
    pub fn parse_arguments(&self) -> Result<serde_json::Map<String, Value>, serde_json::Error> {
        serde_json::from_str(&self.arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_definition_api_format() {
        let def = ToolDefinition::new(
            "find_cars",
            "Find cars matching the query",
            serde_json::json!({
                "type": "object",
                "properties": { "make": { "type": "string" } }
            }),
        );
        let wire = def.to_api_format();

        assert_eq!(wire["type"], "function");
        assert_eq!(wire["function"]["name"], "find_cars");
        assert_eq!(
            wire["function"]["parameters"]["properties"]["make"]["type"],
            "string"
        );
    }

    #[test]
    fn test_tool_call_parsing() {
        let value = serde_json::json!({
            "id": "call_123",
            "function": {
                "name": "find_cars",
                "arguments": "{\"make\": \"opel\", \"year\": 2011}"
            }
        });

        let call = ToolCall::from_api_value(&value).unwrap();
        assert_eq!(call.id, "call_123");
        assert_eq!(call.name, "find_cars");

        let args = call.parse_arguments().unwrap();
        assert_eq!(args["make"], "opel");
        assert_eq!(args["year"], 2011);
    }

    #[test]
    fn test_tool_call_missing_function() {
        let value = serde_json::json!({ "id": "call_123" });
        assert!(ToolCall::from_api_value(&value).is_none());
    }
}
