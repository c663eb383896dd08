use anyhow::{Context, Result};
use paper_harvest::enrich::{EnrichStats, EnrichmentPass};
use paper_harvest::sources::SemanticScholarClient;
use paper_harvest::store::PaperFilter;

use crate::app::context::RunContext;
use crate::cli::ScopeArgs;
use crate::commands::download::scope_filter;

pub(crate) async fn run_enrich_command(ctx: &RunContext, scope: &ScopeArgs) -> Result<EnrichStats> {
    run_enrich(ctx, &scope_filter(scope)).await
}

pub(crate) async fn run_enrich(ctx: &RunContext, filter: &PaperFilter) -> Result<EnrichStats> {
    let client =
        SemanticScholarClient::new(ctx.fetcher.clone()).with_delay(ctx.settings.enrich_delay);
    let stats = EnrichmentPass::new(&client, &ctx.store)
        .run_until(filter, &ctx.interrupted)
        .await
        .context("Failed to list papers for enrichment")?;

    println!(
        "Enrich: {} abstracts added, {} not found, {} skipped",
        stats.success, stats.failed, stats.skipped
    );
    Ok(stats)
}
