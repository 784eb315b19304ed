//! Web handler: stock and news lookups through the search API

use super::{failure, WEB_TAG};
use crate::config::prompts;
use crate::error::Result;
use crate::pipeline::PipelineContext;
use crate::routing::Intent;
use crate::services::{news, stocks, SearchParams};

pub async fn handle(ctx: &PipelineContext, intent: Intent, user_input: &str) -> String {
    match intent {
        Intent::FetchStocks => match stock_summary(ctx, user_input).await {
            Ok(text) => text,
            Err(e) => failure(WEB_TAG, "stock lookup", &e),
        },
        Intent::FetchNews => match news_summary(ctx, user_input).await {
            Ok(text) => text,
            Err(e) => failure(WEB_TAG, "news lookup", &e),
        },
        Intent::FetchJobs => format!("{} Job listings are not connected to a live source yet.", WEB_TAG),
        other => {
            tracing::warn!(intent = %other, "web handler received a non-web intent");
            format!("{} No web results.", WEB_TAG)
        }
    }
}

/// Ask the model for search parameters under the given prompt key.
async fn extract_search_params(ctx: &PipelineContext, prompt_key: &str, user_input: &str) -> Result<SearchParams> {
    let system = ctx.prompts.get(prompt_key)?;
    let raw = ctx
        .model
        .generate(system, user_input, ctx.settings.generation.max_tokens)
        .await?;
    let params = ctx.extractor.extract_params(&raw)?;
    tracing::debug!(?params, "search parameters extracted");
    Ok(params)
}

async fn stock_summary(ctx: &PipelineContext, user_input: &str) -> Result<String> {
    let params = extract_search_params(ctx, prompts::STOCK_API, user_input).await?;
    let data = stocks::fetch_stocks(ctx.search.as_ref(), &params).await?;
    Ok(stocks::format_stock_result(&data))
}

async fn news_summary(ctx: &PipelineContext, user_input: &str) -> Result<String> {
    let params = extract_search_params(ctx, prompts::NEWS_API, user_input).await?;
    let data = news::fetch_news(ctx.search.as_ref(), &params).await?;
    Ok(news::format_news_result(&data, &ctx.settings.news))
}
