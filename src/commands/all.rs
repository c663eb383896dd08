use anyhow::Result;
use paper_harvest::store::PaperFilter;
use tracing::info;

use crate::app::context::RunContext;
use crate::cli::AllArgs;
use crate::commands::download::run_download;
use crate::commands::enrich::run_enrich;
use crate::commands::ingest::{resolve_venues, run_ingest_command};

/// Ingest, optional enrichment, then download, scoped to the requested
/// venues and years.
pub(crate) async fn run_all_command(ctx: &RunContext, args: &AllArgs) -> Result<()> {
    let venues = resolve_venues(&args.ingest.venues)?;
    run_ingest_command(ctx, &args.ingest).await?;

    let scopes: Vec<PaperFilter> = venues
        .iter()
        .flat_map(|venue| {
            args.ingest
                .years
                .iter()
                .map(move |year| PaperFilter::scoped(Some(venue.conference.to_string()), Some(*year)))
        })
        .collect();

    if args.with_abstract {
        for filter in &scopes {
            if ctx.is_interrupted() {
                return Ok(());
            }
            info!(conference = ?filter.conference, year = ?filter.year, "Enriching");
            run_enrich(ctx, filter).await?;
        }
    }

    let settings = ctx.settings.with_pool(&args.pool);
    for filter in &scopes {
        if ctx.is_interrupted() {
            return Ok(());
        }
        info!(conference = ?filter.conference, year = ?filter.year, "Downloading");
        run_download(ctx, &settings, filter).await?;
    }
    Ok(())
}
