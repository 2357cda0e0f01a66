//! Infer command handler.
//!
//! Streams tokens to stdout as they arrive. Ctrl-C cancels the exchange.

use airframe_core::{
    EndpointDescriptor, EndpointRegistry, GatewayError, InferenceRequest, InferenceStreamEvent,
    Message,
};
use airframe_runtime::StaticRegistry;
use anyhow::{Result, anyhow, bail};
use futures_util::StreamExt;
use tokio::io::{AsyncWriteExt, stdout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::bootstrap::CliContext;
use crate::commands::InferArgs;

/// Build the inference request described by `args`.
pub fn build_request(args: &InferArgs) -> InferenceRequest {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &args.system {
        messages.push(Message::system(system.clone()));
    }
    messages.push(Message::user(args.prompt.join(" ")));

    let mut request = InferenceRequest::new(messages).with_stream(!args.no_stream);
    if let Some(model) = &args.model {
        request = request.with_model(model.clone());
    }
    if let Some(max_tokens) = args.max_tokens {
        request = request.with_max_tokens(max_tokens);
    }
    if let Some(temperature) = args.temperature {
        request = request.with_temperature(temperature);
    }
    request
}

/// The named endpoint, or the first healthy one after a probe pass.
async fn select_endpoint(
    registry: &StaticRegistry,
    name: Option<&str>,
) -> Result<EndpointDescriptor> {
    if let Some(name) = name {
        return registry
            .endpoint(name)
            .ok_or_else(|| anyhow!("unknown endpoint '{name}'"));
    }
    registry.check_health().await;
    registry
        .first_healthy_endpoint()
        .await
        .ok_or_else(|| anyhow!("no healthy endpoint in the catalog"))
}

fn describe(error: &GatewayError) -> String {
    match &error.raw_backend {
        Some(raw) => format!("{error}\n{raw}"),
        None => error.to_string(),
    }
}

/// Execute the infer command.
pub async fn execute(ctx: &CliContext, args: &InferArgs) -> Result<()> {
    let registry = ctx.catalog_registry().await?;
    let endpoint = select_endpoint(&registry, args.endpoint.as_deref()).await?;
    let request = build_request(args);
    debug!(endpoint = %endpoint.name, stream = request.stream, "Sending prompt");

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let mut events = ctx
        .gateway
        .stream_infer_with_cancel(&endpoint, &request, cancel.clone());
    let mut out = stdout();
    let mut pending_error: Option<GatewayError> = None;
    let mut finished = false;

    while let Some(event) = events.next().await {
        if let Some(previous) = pending_error.take() {
            warn!(endpoint = %endpoint.name, error = %previous, "Skipped undecodable chunk");
        }
        match event {
            InferenceStreamEvent::Token { content, .. }
            | InferenceStreamEvent::Message { content, .. } => {
                out.write_all(content.as_bytes()).await?;
                out.flush().await?;
            }
            InferenceStreamEvent::ToolCall { call, .. } => {
                eprintln!(
                    "[tool call #{}] {} {}",
                    call.index,
                    call.name.as_deref().unwrap_or("?"),
                    call.arguments
                );
            }
            InferenceStreamEvent::Error { error } => pending_error = Some(error),
            InferenceStreamEvent::Done {
                finish_reason,
                usage,
                ..
            } => {
                finished = true;
                debug!(?finish_reason, ?usage, "Inference finished");
            }
        }
    }
    out.write_all(b"\n").await?;
    out.flush().await?;
    interrupt.abort();

    if let Some(error) = pending_error {
        bail!("inference failed on '{}': {}", endpoint.name, describe(&error));
    }
    if !finished && cancel.is_cancelled() {
        bail!("interrupted");
    }
    Ok(())
}
