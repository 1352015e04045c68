use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionMessageToolCalls, ChatCompletionRequestAssistantMessage,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestUserMessage, ChatCompletionTool, ChatCompletionToolChoiceOption,
        ChatCompletionTools, CreateChatCompletionRequestArgs, FunctionObject, ToolChoiceOptions,
    },
    Client,
};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::Value;
use tokio::time::Instant;

use crate::{config::Config, errors::GatewayError};

const MAX_COMPLETION_TOKENS: u32 = 4096;

/// One prior turn of a stage's conversation. Assistant turns carry the tool
/// arguments the model returned earlier, so it can see its own output.
#[derive(Clone, Debug)]
pub enum ChatTurn {
    User(String),
    Assistant(String),
}

/// A named function tool with JSON-Schema parameters.
#[derive(Clone, Debug)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

#[derive(Clone, Debug)]
pub struct ToolCallRequest {
    pub model: String,
    pub system: &'static str,
    pub turns: Vec<ChatTurn>,
    pub tool: ToolSpec,
}

/// Chat-completion with a forced tool call. Implementations return the parsed
/// arguments of the first tool call matching the requested tool.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn invoke(&self, request: ToolCallRequest) -> Result<Value, GatewayError>;
}

/// Runs one gateway call under the run deadline. Expiry is a transport
/// failure, so the orchestrator's retry rules apply to it unchanged.
pub async fn invoke_with_deadline(
    gateway: &dyn ChatGateway,
    request: ToolCallRequest,
    deadline: Instant,
) -> Result<Value, GatewayError> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining == Duration::ZERO {
        return Err(GatewayError::Transport("run deadline exceeded".to_string()));
    }
    match tokio::time::timeout(remaining, gateway.invoke(request)).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Transport(
            "gateway call timed out at the run deadline".to_string(),
        )),
    }
}

pub struct OpenAiGateway {
    client: Client<OpenAIConfig>,
}

impl OpenAiGateway {
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(config.openai_api_key.expose_secret())
            .with_api_base(&config.openai_base_url);

        Self {
            client: Client::with_config(openai_config),
        }
    }
}

#[async_trait]
impl ChatGateway for OpenAiGateway {
    async fn invoke(&self, request: ToolCallRequest) -> Result<Value, GatewayError> {
        let mut messages: Vec<ChatCompletionRequestMessage> =
            Vec::with_capacity(request.turns.len() + 1);
        messages.push(ChatCompletionRequestSystemMessage::from(request.system).into());

        for turn in &request.turns {
            match turn {
                ChatTurn::User(content) => {
                    messages.push(ChatCompletionRequestUserMessage::from(content.as_str()).into());
                }
                ChatTurn::Assistant(content) => {
                    let assistant = ChatCompletionRequestAssistantMessage {
                        content: Some(content.clone().into()),
                        ..Default::default()
                    };
                    messages.push(assistant.into());
                }
            }
        }

        let tool = ChatCompletionTools::Function(ChatCompletionTool {
            function: FunctionObject {
                name: request.tool.name.to_string(),
                description: Some(request.tool.description.to_string()),
                parameters: Some(request.tool.parameters.clone()),
                strict: Some(false),
            },
        });

        let completion_request = CreateChatCompletionRequestArgs::default()
            .max_tokens(MAX_COMPLETION_TOKENS)
            .model(&request.model)
            .messages(messages)
            .tools(vec![tool])
            .tool_choice(ChatCompletionToolChoiceOption::Mode(
                ToolChoiceOptions::Required,
            ))
            .build()
            .map_err(|e| GatewayError::Transport(format!("failed to build chat request: {}", e)))?;

        log::debug!(
            "Invoking {} with tool {}",
            request.model,
            request.tool.name
        );

        let response = self
            .client
            .chat()
            .create(completion_request)
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::Protocol("no choices in response".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .ok_or_else(|| GatewayError::Protocol("no tool calls in response".to_string()))?;

        let call = tool_calls
            .into_iter()
            .find_map(|tool_call| match tool_call {
                ChatCompletionMessageToolCalls::Function(call) => Some(call),
                ChatCompletionMessageToolCalls::Custom(call) => {
                    log::warn!("Ignoring unsupported custom tool call: {}", call.custom_tool.name);
                    None
                }
            })
            .ok_or_else(|| GatewayError::Protocol("no tool calls in response".to_string()))?;

        if call.function.name != request.tool.name {
            return Err(GatewayError::Protocol(format!(
                "unexpected tool call: {}",
                call.function.name
            )));
        }

        serde_json::from_str(&call.function.arguments).map_err(|e| {
            GatewayError::Parse(format!("tool arguments are not valid JSON: {}", e))
        })
    }
}

/// Builds the parameter schema for a tool from a `JsonSchema` type, with all
/// `$defs` inlined because some providers reject `$ref` in tool parameters.
pub fn tool_parameters<T: schemars::JsonSchema>() -> Value {
    let schema = schemars::schema_for!(T);
    let mut schema_value = serde_json::to_value(&schema).unwrap_or_else(|_| Value::Null);

    let defs = schema_value
        .get("$defs")
        .cloned()
        .unwrap_or_else(|| Value::Object(Default::default()));

    inline_schema_refs(&mut schema_value, &defs);

    if let Some(obj) = schema_value.as_object_mut() {
        obj.remove("$defs");
        obj.remove("$schema");
        obj.remove("title");
    }

    schema_value
}

fn inline_schema_refs(schema: &mut Value, defs: &Value) {
    match schema {
        Value::Object(obj) => {
            if let Some(ref_value) = obj.get("$ref").cloned() {
                if let Some(ref_str) = ref_value.as_str() {
                    if let Some(def_name) = ref_str.strip_prefix("#/$defs/") {
                        if let Some(Value::Object(def_obj)) = defs.get(def_name) {
                            obj.clear();
                            for (k, v) in def_obj {
                                obj.insert(k.clone(), v.clone());
                            }
                        }
                    }
                }
            }

            for (_, v) in obj.iter_mut() {
                inline_schema_refs(v, defs);
            }
        }
        Value::Array(arr) => {
            for item in arr.iter_mut() {
                inline_schema_refs(item, defs);
            }
        }
        _ => {}
    }
}
