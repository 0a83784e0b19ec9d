use rmcp::{
    model::{CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    schemars::{self, JsonSchema},
    tool, Error as McpError, ServerHandler,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::application::RagServices;
use crate::config::RagConfig;
use crate::domain::ParagraphSearch;
use crate::initialization::ServiceState;

const INITIALIZING_MESSAGE: &str = "The PDF services are still initializing. Please try again shortly.";

/// Handler for the MCP server logic.
#[derive(Clone)]
pub struct PdfRagHandler {
    pub service_state: ServiceState,
    pub config: Arc<RagConfig>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct IndexPdfArgs {
    #[schemars(description = "Path to the PDF file; its file name without extension becomes the document id")]
    path: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SearchParagraphsArgs {
    #[schemars(description = "Natural language query")]
    query_text: String,
    #[schemars(description = "Document id (PDF file name without extension)")]
    pdf_name: String,
    #[schemars(description = "Optional maximum number of paragraphs (default from config)")]
    top_k: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct AskDocumentArgs {
    #[schemars(description = "Question about the document")]
    query: String,
    #[schemars(description = "Document id (PDF file name without extension)")]
    pdf_name: String,
    #[schemars(description = "Optional number of paragraphs to retrieve per attempt")]
    top_k: Option<usize>,
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    match serde_json::to_string(value) {
        Ok(text) => Ok(CallToolResult::success(vec![Content::text(text)])),
        Err(e) => {
            log::error!("Failed to serialize tool result: {}", e);
            Ok(CallToolResult::error(vec![Content::text(format!(
                "Failed to serialize result: {}",
                e
            ))]))
        }
    }
}

fn error_result(message: String) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(message)]))
}

#[tool(tool_box)]
impl PdfRagHandler {
    /// Creates a new handler instance with uninitialized service state.
    pub fn new(config: Arc<RagConfig>) -> Self {
        Self {
            service_state: Arc::new(Mutex::new(None)),
            config,
        }
    }

    fn services(&self) -> Option<Arc<RagServices>> {
        self.service_state.lock().ok().and_then(|state| state.clone())
    }

    #[tool(description = "Extract the paragraphs of a PDF and add them to the vector index.")]
    async fn index_pdf(&self, #[tool(aggr)] args: IndexPdfArgs) -> Result<CallToolResult, McpError> {
        log::info!("Executing index_pdf tool for '{}'", args.path);
        let Some(services) = self.services() else {
            log::warn!("index_pdf called but services are not yet initialized.");
            return error_result(INITIALIZING_MESSAGE.to_string());
        };

        match services.indexer.index_pdf(&PathBuf::from(&args.path)).await {
            Ok(report) => json_result(&report),
            Err(e) => {
                log::error!("Indexing '{}' failed: {}", args.path, e);
                error_result(format!("Indexing failed: {}", e))
            }
        }
    }

    #[tool(description = "Find the paragraphs of one indexed PDF that best match a query.")]
    async fn search_paragraphs(
        &self,
        #[tool(aggr)] args: SearchParagraphsArgs,
    ) -> Result<CallToolResult, McpError> {
        let top_k = args.top_k.unwrap_or(self.config.agent.top_k);
        log::info!(
            "Executing search_paragraphs tool: query='{}', pdf='{}', top_k={}",
            args.query_text,
            args.pdf_name,
            top_k
        );
        let Some(services) = self.services() else {
            log::warn!("search_paragraphs called but services are not yet initialized.");
            return error_result(INITIALIZING_MESSAGE.to_string());
        };

        match services.search.search_paragraphs(&args.query_text, &args.pdf_name, top_k).await {
            Ok(hits) => json_result(&hits),
            Err(e) => error_result(format!("Search failed: {}", e)),
        }
    }

    #[tool(description = "Answer a question from the content of one indexed PDF.")]
    async fn ask_document(&self, #[tool(aggr)] args: AskDocumentArgs) -> Result<CallToolResult, McpError> {
        log::info!("Executing ask_document tool: query='{}', pdf='{}'", args.query, args.pdf_name);
        let Some(services) = self.services() else {
            log::warn!("ask_document called but services are not yet initialized.");
            return error_result(INITIALIZING_MESSAGE.to_string());
        };
        let Some(agent) = services.agent.as_ref() else {
            return error_result(
                "Question answering is not configured. Set [agent] endpoint, deployment and api_key.".to_string(),
            );
        };

        let response = agent
            .retrieve_or_sentinel(&args.query, &args.pdf_name, args.top_k)
            .await;
        json_result(&response)
    }
}

#[tool(tool_box)]
impl ServerHandler for PdfRagHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "This server indexes PDF documents by paragraph and answers questions about a single document."
                    .into(),
            ),
        }
    }
}
