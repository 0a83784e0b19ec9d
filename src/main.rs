use anyhow::Result;
use rmcp::ServiceExt;
use std::sync::Arc;
use tokio::io::{stdin, stdout};

use pdf_rag::config;
use pdf_rag::initialization::initialize_background_services;
use pdf_rag::server::PdfRagHandler;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the MCP protocol; logs go to stderr.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();
    log::info!("pdf-rag server (MCP over stdio) started.");

    let config = config::load_config()?;
    log::debug!("Configuration loaded: {:?}", config);
    let config_arc = Arc::new(config);

    let handler = PdfRagHandler::new(config_arc.clone());
    let service_state = handler.service_state.clone();

    // Serve immediately; tools answer "initializing" until the model and store are ready.
    log::info!("Starting MCP server listener...");
    let serve_future = handler.serve((stdin(), stdout()));

    let init_config = config_arc.clone();
    tokio::spawn(async move {
        log::info!("Background initialization task started.");
        match initialize_background_services(init_config, service_state).await {
            Ok(()) => log::info!("Background initialization completed successfully."),
            Err(e) => log::error!("Background initialization failed: {}", e),
        }
    });

    let server_handle = serve_future.await.inspect_err(|e| {
        log::error!("serving error: {:?}", e);
    })?;

    let shutdown_reason = server_handle.waiting().await?;
    log::info!("pdf-rag server finished. Reason: {:?}", shutdown_reason);

    Ok(())
}
