use anyhow::Result;
use paper_harvest::store::{DownloadStatus, StoreStatistics};

use crate::app::context::RunContext;

pub(crate) async fn run_stats_command(ctx: &RunContext) -> Result<StoreStatistics> {
    let stats = ctx.store.statistics().await?;
    for line in format_statistics(&stats) {
        println!("{line}");
    }
    Ok(stats)
}

fn format_statistics(stats: &StoreStatistics) -> Vec<String> {
    let mut lines = vec![
        format!("Total papers:  {}", stats.total),
        format!("With abstract: {}", stats.with_abstract),
        format!("With PDF URL:  {}", stats.with_pdf_url),
        String::new(),
        "By conference:".to_string(),
    ];
    for (conference, count) in &stats.by_conference {
        lines.push(format!("  {conference:<20} {count:>6}"));
    }
    lines.push(String::new());
    lines.push("By download status:".to_string());
    for status in [
        DownloadStatus::Pending,
        DownloadStatus::Downloading,
        DownloadStatus::Completed,
        DownloadStatus::Failed,
    ] {
        lines.push(format!(
            "  {:<20} {:>6}",
            status.as_str(),
            stats.status_count(status)
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::format_statistics;
    use paper_harvest::store::StoreStatistics;

    #[test]
    fn test_format_statistics_lists_every_status() {
        let stats = StoreStatistics {
            total: 3,
            by_conference: vec![("CRYPTO".to_string(), 2), ("NDSS".to_string(), 1)],
            by_status: vec![("completed".to_string(), 1), ("pending".to_string(), 2)],
            with_abstract: 1,
            with_pdf_url: 2,
        };
        let lines = format_statistics(&stats);
        assert!(lines.iter().any(|l| l.starts_with("Total papers:") && l.ends_with('3')));
        assert!(lines.iter().any(|l| l.contains("CRYPTO") && l.ends_with('2')));
        assert!(lines.iter().any(|l| l.contains("failed") && l.ends_with('0')));
        assert!(lines.iter().any(|l| l.contains("pending") && l.ends_with('2')));
    }
}
