//! Prompt templates that wrap tool calls for conversational clients.

use serde::Deserialize;
use serde_json::{Map, Value, json};

use genmedia_tools::tools::{GENERATE_VIDEO, LIST_VOICES};
use genmedia_types::ToolInvocation;

use crate::dispatcher::ToolDispatcher;
use crate::handlers::CallContext;
use crate::protocol::{INVALID_PARAMS, JsonRpcResponse};
use crate::resources::LANGUAGE_CODES_URI;

/// prompts/list
pub fn handle_list(id: Value) -> JsonRpcResponse {
    JsonRpcResponse::success(
        id,
        json!({
            "prompts": [
                {
                    "name": GENERATE_VIDEO,
                    "description": "Generates a video from a text prompt.",
                    "arguments": [
                        { "name": "prompt", "description": "The text prompt to generate a video from.", "required": true },
                        { "name": "duration", "description": "The duration of the video in seconds.", "required": false },
                        { "name": "aspect_ratio", "description": "The aspect ratio of the generated video.", "required": false },
                        { "name": "model", "description": "The model to use for generation.", "required": false },
                    ]
                },
                {
                    "name": LIST_VOICES,
                    "description": "Lists available voices, optionally filtered by language.",
                    "arguments": [
                        { "name": "language", "description": "Language name or code, e.g. 'English (United States)' or 'en-US'.", "required": false },
                    ]
                },
            ]
        }),
    )
}

#[derive(Deserialize)]
struct GetParams {
    name: String,
    #[serde(default)]
    arguments: Map<String, Value>,
}

/// prompts/get
///
/// Params:
///   - name: string (required)
///   - arguments: object of strings (optional)
pub async fn handle_get(
    params: &Value,
    id: Value,
    dispatcher: &ToolDispatcher,
    ctx: &CallContext,
) -> JsonRpcResponse {
    let get: GetParams = match serde_json::from_value(params.clone()) {
        Ok(get) => get,
        Err(e) => {
            return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Invalid prompts/get params: {e}"));
        }
    };

    let (description, text) = match get.name.as_str() {
        GENERATE_VIDEO => {
            if argument(&get.arguments, "prompt").is_none() {
                ("Missing Prompt", "What video would you like me to generate?".to_string())
            } else {
                let text = run_tool(dispatcher, GENERATE_VIDEO, get.arguments, ctx).await;
                ("Video Generation Result", text)
            }
        }
        LIST_VOICES => {
            if argument(&get.arguments, "language").is_none() {
                (
                    "Specify Language",
                    format!(
                        "What language would you like to list the voices for? Available languages are in the resource '{LANGUAGE_CODES_URI}'."
                    ),
                )
            } else {
                let text = run_tool(dispatcher, LIST_VOICES, get.arguments, ctx).await;
                ("Voice List", text)
            }
        }
        other => {
            return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Unknown prompt: {other}"));
        }
    };

    JsonRpcResponse::success(
        id,
        json!({
            "description": description,
            "messages": [{
                "role": "assistant",
                "content": { "type": "text", "text": text },
            }]
        }),
    )
}

fn argument<'a>(arguments: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Run a tool and keep only its text blocks.
async fn run_tool(
    dispatcher: &ToolDispatcher,
    tool: &str,
    arguments: Map<String, Value>,
    ctx: &CallContext,
) -> String {
    let result = dispatcher
        .dispatch(
            ToolInvocation::new(tool, Value::Object(arguments)),
            ctx.cancel.clone(),
            None,
        )
        .await;
    result.text().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::server;

    async fn get(params: Value) -> Value {
        let s = server();
        handle_get(&params, json!(1), s.dispatcher(), &CallContext::default())
            .await
            .to_value()
    }

    #[test]
    fn test_list_prompts() {
        let resp = handle_list(json!(1)).to_value();
        let prompts = resp["result"]["prompts"].as_array().unwrap();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0]["arguments"][0]["required"], true);
    }

    #[tokio::test]
    async fn test_video_prompt_asks_for_prompt() {
        let resp = get(json!({"name": "generate-video", "arguments": {"prompt": "  "}})).await;
        assert_eq!(resp["result"]["description"], "Missing Prompt");
        assert_eq!(resp["result"]["messages"][0]["role"], "assistant");
        assert_eq!(
            resp["result"]["messages"][0]["content"]["text"],
            "What video would you like me to generate?"
        );
    }

    #[tokio::test]
    async fn test_video_prompt_surfaces_validation_text() {
        let resp = get(json!({"name": "generate-video",
                              "arguments": {"prompt": "waves", "model": "veo-3.0-generate-001", "duration": "5"}}))
        .await;
        let text = resp["result"]["messages"][0]["content"]["text"].as_str().unwrap();
        assert!(text.contains("4, 6, 8"));
    }

    #[tokio::test]
    async fn test_voices_prompt() {
        let resp = get(json!({"name": "list-voices"})).await;
        assert_eq!(resp["result"]["description"], "Specify Language");

        let resp = get(json!({"name": "list-voices", "arguments": {"language": "de-DE"}})).await;
        assert_eq!(resp["result"]["description"], "Voice List");
        let text = resp["result"]["messages"][0]["content"]["text"].as_str().unwrap();
        assert!(text.contains("'de-DE'"));
    }

    #[tokio::test]
    async fn test_unknown_prompt() {
        let resp = get(json!({"name": "compose-symphony"})).await;
        assert_eq!(resp["error"]["code"], INVALID_PARAMS);
    }
}
