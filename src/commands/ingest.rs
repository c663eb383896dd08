use anyhow::Result;
use paper_harvest::ingest::{IngestCoordinator, IngestReport, SourceTask, TaskState};
use paper_harvest::sources::{Venue, build_default_registry, find_venue};

use crate::app::context::RunContext;
use crate::cli::IngestArgs;

/// Resolves `--venue` values against the catalog.
pub(crate) fn resolve_venues(names: &[String]) -> Result<Vec<&'static Venue>> {
    let mut venues: Vec<&'static Venue> = Vec::with_capacity(names.len());
    for name in names {
        let venue = find_venue(name)?;
        if !venues.contains(&venue) {
            venues.push(venue);
        }
    }
    Ok(venues)
}

pub(crate) async fn run_ingest_command(ctx: &RunContext, args: &IngestArgs) -> Result<IngestReport> {
    let venues = resolve_venues(&args.venues)?;
    let tasks = SourceTask::expand(args.source.into(), &venues, &args.years);
    let registry = build_default_registry(&ctx.fetcher, ctx.settings.dblp_max_results);

    let report = IngestCoordinator::new(&registry, &ctx.store)
        .run(&tasks)
        .await;
    print_ingest_summary(&report);
    Ok(report)
}

fn print_ingest_summary(report: &IngestReport) {
    for task in &report.tasks {
        match task.state {
            TaskState::Failed => println!(
                "  {:<28} failed: {}",
                task.task.to_string(),
                task.error.as_deref().unwrap_or("unknown error")
            ),
            _ => println!(
                "  {:<28} fetched {:>5}  new {:>5}  existing {:>5}",
                task.task.to_string(),
                task.fetched,
                task.inserted,
                task.skipped
            ),
        }
    }
    println!(
        "Ingest: {} fetched, {} new, {} already stored, {} store errors, {}/{} tasks failed",
        report.fetched(),
        report.inserted(),
        report.skipped(),
        report.store_errors(),
        report.failed_tasks(),
        report.tasks.len()
    );
}
