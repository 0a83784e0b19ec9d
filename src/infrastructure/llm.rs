//! Chat-completions client for Azure OpenAI / OpenAI and the two LLM stages
//! built on it: query decomposition and tool-assisted answering.
//!
//! Both stages request structured output (`response_format: json_schema`) and
//! decode the reply into [`DecomposedQuery`] / [`AnswerDraft`].

use async_trait::async_trait;
use reqwest::header;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{AgentConfig, LlmProvider};
use crate::domain::{AnswerDraft, AnswerGenerator, DecomposedQuery, ParagraphSearch, QueryDecomposer};
use crate::error::{RagError, RagResult};

pub const SEARCH_TOOL_NAME: &str = "search_paragraphs";
/// Upper bound on hits handed back to the model per tool call.
pub const MAX_TOOL_RESULTS: usize = 5;

const OPENAI_DEFAULT_ENDPOINT: &str = "https://api.openai.com";

const ANSWER_INSTRUCTIONS: &str = "You are a legal assistant that answers questions about a single PDF document. \
Use the search_paragraphs tool to retrieve paragraphs from the document and answer only from what it returns, \
citing page numbers where helpful. Report your confidence between 0 and 1. \
Set retry to true only when the retrieved paragraphs do not contain the answer and a reformulated query might.";

const DECOMPOSER_INSTRUCTIONS: &str = "You are a query decomposer. Rewrite the user's question into one concise, \
self-contained search query that is likely to match the wording of a paragraph in a legal document. \
Report your confidence between 0 and 1.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self::plain("system", content)
    }

    pub fn user(content: &str) -> Self {
        Self::plain("user", content)
    }

    pub fn tool(call_id: &str, content: String) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content),
            tool_calls: None,
            tool_call_id: Some(call_id.to_string()),
        }
    }

    fn plain(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    fn pending_tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, as produced by the model.
    pub arguments: String,
}

/// Body of a `/chat/completions` request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,
    pub response_format: Value,
}

/// Sends one chat request and returns the assistant message of the first choice.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> RagResult<ChatMessage>;
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// HTTP transport against Azure OpenAI deployments or the OpenAI API.
#[derive(Debug)]
pub struct HttpChatTransport {
    client: reqwest::Client,
    url: String,
    model: Option<String>,
}

impl HttpChatTransport {
    pub fn new(cfg: &AgentConfig) -> RagResult<Self> {
        let api_key = cfg
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| RagError::Config("agent.api_key is not set".to_string()))?;
        let url = chat_url(cfg)?;

        let mut headers = header::HeaderMap::new();
        let auth = match cfg.provider {
            LlmProvider::Azure => (header::HeaderName::from_static("api-key"), api_key.to_string()),
            LlmProvider::OpenAi => (header::AUTHORIZATION, format!("Bearer {}", api_key)),
        };
        let mut auth_value = header::HeaderValue::from_str(&auth.1)
            .map_err(|e| RagError::Config(format!("invalid API key header: {}", e)))?;
        auth_value.set_sensitive(true);
        headers.insert(auth.0, auth_value);
        headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .default_headers(headers)
            .build()?;

        let model = match cfg.provider {
            LlmProvider::Azure => None,
            LlmProvider::OpenAi => cfg.deployment.clone(),
        };
        log::info!("Chat transport initialized for {:?} at {}", cfg.provider, url);
        Ok(Self { client, url, model })
    }
}

/// Builds the chat-completions URL for the configured provider.
pub fn chat_url(cfg: &AgentConfig) -> RagResult<String> {
    let endpoint = match (cfg.provider, cfg.endpoint.as_deref()) {
        (_, Some(e)) => e.trim(),
        (LlmProvider::OpenAi, None) => OPENAI_DEFAULT_ENDPOINT,
        (LlmProvider::Azure, None) => {
            return Err(RagError::Config("agent.endpoint is required for Azure".to_string()));
        }
    };
    if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
        return Err(RagError::Config(format!("invalid agent.endpoint: {}", endpoint)));
    }
    let base = endpoint.trim_end_matches('/');
    let deployment = cfg
        .deployment
        .as_deref()
        .ok_or_else(|| RagError::Config("agent.deployment is not set".to_string()))?;

    Ok(match cfg.provider {
        LlmProvider::Azure => {
            let version = cfg
                .api_version
                .as_deref()
                .ok_or_else(|| RagError::Config("agent.api_version is required for Azure".to_string()))?;
            format!("{}/openai/deployments/{}/chat/completions?api-version={}", base, deployment, version)
        }
        LlmProvider::OpenAi => format!("{}/v1/chat/completions", base),
    })
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn complete(&self, request: &ChatRequest) -> RagResult<ChatMessage> {
        let started = Instant::now();
        let mut body = request.clone();
        if body.model.is_none() {
            body.model = self.model.clone();
        }

        log::debug!("POST {} ({} messages)", self.url, body.messages.len());
        let resp = self.client.post(&self.url).json(&body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(300).collect();
            log::error!("Chat completion returned {}: {}", status, snippet);
            return Err(RagError::Llm(format!("HTTP {}: {}", status, snippet)));
        }

        let out: ChatCompletionResponse = resp
            .json()
            .await
            .map_err(|e| RagError::MalformedOutput(format!("unexpected completion body: {}", e)))?;
        log::debug!("Chat completion took {} ms", started.elapsed().as_millis());

        out.choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| RagError::MalformedOutput("completion had no choices".to_string()))
    }
}

fn json_schema_format(name: &str, schema: Value) -> Value {
    json!({
        "type": "json_schema",
        "json_schema": { "name": name, "strict": true, "schema": schema }
    })
}

fn answer_format() -> Value {
    json_schema_format(
        "rag_answer",
        json!({
            "type": "object",
            "properties": {
                "response": { "type": "string", "description": "The answer to the user's question." },
                "confidence": { "type": "number", "description": "Confidence in the answer, 0 to 1." },
                "retry": { "type": "boolean", "description": "Whether another attempt with a rewritten query should be made." }
            },
            "required": ["response", "confidence", "retry"],
            "additionalProperties": false
        }),
    )
}

fn decomposition_format() -> Value {
    json_schema_format(
        "query_decomposition",
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The rewritten search query." },
                "confidence": { "type": "number", "description": "Confidence in the rewrite, 0 to 1." }
            },
            "required": ["query", "confidence"],
            "additionalProperties": false
        }),
    )
}

fn search_tool_spec() -> Value {
    json!({
        "type": "function",
        "function": {
            "name": SEARCH_TOOL_NAME,
            "description": "Search for paragraphs in the PDF document being asked about, based on the query text.",
            "parameters": {
                "type": "object",
                "properties": {
                    "query_text": { "type": "string", "description": "The text to search for in the PDF." },
                    "top_k": { "type": "integer", "description": "The number of top results to return (at most 5)." }
                },
                "required": ["query_text"]
            }
        }
    })
}

#[derive(Debug, Deserialize)]
struct SearchToolArgs {
    query_text: String,
    #[serde(default)]
    pdf_name: Option<String>,
    #[serde(default)]
    top_k: Option<usize>,
}

/// Decodes a structured reply, tolerating a surrounding Markdown code fence.
pub fn parse_structured<T: DeserializeOwned>(content: &str) -> RagResult<T> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();
    serde_json::from_str(unfenced).map_err(|e| RagError::MalformedOutput(format!("{}: {}", e, unfenced)))
}

pub struct LlmQueryDecomposer {
    transport: Arc<dyn ChatTransport>,
    temperature: f32,
}

impl LlmQueryDecomposer {
    pub fn new(transport: Arc<dyn ChatTransport>, temperature: f32) -> Self {
        Self { transport, temperature }
    }
}

#[async_trait]
impl QueryDecomposer for LlmQueryDecomposer {
    async fn decompose(&self, query: &str) -> RagResult<DecomposedQuery> {
        let request = ChatRequest {
            model: None,
            messages: vec![ChatMessage::system(DECOMPOSER_INSTRUCTIONS), ChatMessage::user(query)],
            temperature: self.temperature,
            tools: None,
            response_format: decomposition_format(),
        };
        let message = self.transport.complete(&request).await?;
        let content = message
            .content
            .ok_or_else(|| RagError::MalformedOutput("decomposition reply had no content".to_string()))?;
        parse_structured(&content)
    }
}

/// Answer stage: may call [`SEARCH_TOOL_NAME`] up to `tool_call_limit` times
/// before it must produce the structured answer. Searches always target the
/// document the question is about, whatever name the model puts in the call.
pub struct LlmAnswerGenerator {
    transport: Arc<dyn ChatTransport>,
    search: Arc<dyn ParagraphSearch>,
    temperature: f32,
    tool_call_limit: u32,
}

impl LlmAnswerGenerator {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        search: Arc<dyn ParagraphSearch>,
        temperature: f32,
        tool_call_limit: u32,
    ) -> Self {
        Self {
            transport,
            search,
            temperature,
            tool_call_limit,
        }
    }

    async fn run_tool(&self, call: &ToolCall, docid: &str) -> RagResult<String> {
        if call.function.name != SEARCH_TOOL_NAME {
            log::warn!("Model requested unknown tool '{}'", call.function.name);
            return Ok(json!({ "error": format!("unknown tool {}", call.function.name) }).to_string());
        }
        let args: SearchToolArgs = serde_json::from_str(&call.function.arguments)
            .map_err(|e| RagError::MalformedOutput(format!("bad {} arguments: {}", SEARCH_TOOL_NAME, e)))?;
        let top_k = args.top_k.unwrap_or(MAX_TOOL_RESULTS).clamp(1, MAX_TOOL_RESULTS);
        if let Some(requested) = args.pdf_name.as_deref().filter(|name| *name != docid) {
            log::warn!("Model asked for PDF '{}'; searching '{}' instead.", requested, docid);
        }
        log::info!("Searching for '{}' in PDF '{}' with top_k={}.", args.query_text, docid, top_k);
        let hits = self.search.search_paragraphs(&args.query_text, docid, top_k).await?;
        serde_json::to_string(&hits).map_err(|e| RagError::MalformedOutput(e.to_string()))
    }
}

#[async_trait]
impl AnswerGenerator for LlmAnswerGenerator {
    async fn answer(&self, prompt: &str, docid: &str) -> RagResult<AnswerDraft> {
        let mut messages = vec![ChatMessage::system(ANSWER_INSTRUCTIONS), ChatMessage::user(prompt)];
        let mut calls_made = 0u32;

        loop {
            let offer_tools = calls_made < self.tool_call_limit;
            let request = ChatRequest {
                model: None,
                messages: messages.clone(),
                temperature: self.temperature,
                tools: offer_tools.then(|| vec![search_tool_spec()]),
                response_format: answer_format(),
            };
            let reply = self.transport.complete(&request).await?;

            if offer_tools && !reply.pending_tool_calls().is_empty() {
                let calls = reply.pending_tool_calls().to_vec();
                messages.push(reply);
                for call in &calls {
                    let result = if calls_made < self.tool_call_limit {
                        calls_made += 1;
                        self.run_tool(call, docid).await?
                    } else {
                        json!({ "error": "tool call limit reached" }).to_string()
                    };
                    messages.push(ChatMessage::tool(&call.id, result));
                }
                continue;
            }

            let content = reply
                .content
                .ok_or_else(|| RagError::MalformedOutput("answer reply had no content".to_string()))?;
            return parse_structured(&content);
        }
    }
}
