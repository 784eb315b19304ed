//! Code handler
//!
//! The model answers with a `{path, command, content}` object; exactly one
//! side effect follows: run the file, or overwrite it with `content`.

use super::{failure, CODE_TAG};
use crate::config::prompts;
use crate::error::Result;
use crate::extract::{CommandAction, CommandPayload};
use crate::executor::ExecutionResult;
use crate::pipeline::PipelineContext;
use crate::routing::Intent;
use tokio_util::sync::CancellationToken;

pub async fn handle(
    ctx: &PipelineContext,
    intent: Intent,
    user_input: &str,
    cancel: &CancellationToken,
) -> String {
    let payload = match request_payload(ctx, intent, user_input).await {
        Ok(payload) => payload,
        Err(e) => return failure(CODE_TAG, "code action extraction", &e),
    };

    tracing::info!(command = %payload.command, path = %payload.path, "code action accepted");
    match apply(ctx, &payload, cancel).await {
        Ok(text) => text,
        Err(e) => failure(CODE_TAG, &format!("{} of {}", payload.command, payload.path), &e),
    }
}

async fn request_payload(ctx: &PipelineContext, intent: Intent, user_input: &str) -> Result<CommandPayload> {
    let system = ctx.prompts.get(prompts::CODE)?;
    let user = format!("Intent: {}\nRequest: {}", intent, user_input);
    let raw = ctx
        .model
        .generate(system, &user, ctx.settings.generation.code_max_tokens)
        .await?;
    ctx.extractor.extract_command(&raw)
}

async fn apply(ctx: &PipelineContext, payload: &CommandPayload, cancel: &CancellationToken) -> Result<String> {
    match payload.command {
        CommandAction::Execute => {
            let result = ctx.executor.run_file(&payload.path, cancel).await?;
            Ok(describe_run(&payload.path, &result))
        }
        CommandAction::Refactor => {
            let bytes = ctx.executor.write_file(&payload.path, &payload.content).await?;
            Ok(format!("{} Wrote {} bytes to {}", CODE_TAG, bytes, payload.path))
        }
    }
}

/// `"[Code Tool] Ran <path> (<command>, exit code N)"` plus the output.
/// A run that did not succeed says so in the header.
fn describe_run(path: &str, result: &ExecutionResult) -> String {
    let status = match result.exit_code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    };
    let verdict = if result.success { "" } else { ", failed" };
    format!(
        "{} Ran {} ({}, {}{})\n{}",
        CODE_TAG,
        path,
        result.command,
        status,
        verdict,
        result.combined_output().trim_end()
    )
}
