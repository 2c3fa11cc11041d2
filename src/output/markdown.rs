//! Markdown crawl report
//!
//! Renders the run summary followed by one section per page record.

use crate::output::record::PageRecord;
use crate::output::stats::CrawlSummary;
use crate::output::traits::SinkResult;
use std::fs::File;
use std::io::Write;
use std::path::Path;

const EXCERPT_CHARS: usize = 300;

/// Writes the markdown report to `output_path`
pub fn write_report(
    summary: &CrawlSummary,
    records: &[PageRecord],
    output_path: &Path,
) -> SinkResult<()> {
    let markdown = format_report(summary, records);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a crawl summary and its records as markdown
pub fn format_report(summary: &CrawlSummary, records: &[PageRecord]) -> String {
    let mut md = String::new();

    md.push_str("# Priority-Crawl Report\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **State**: {}\n", summary.state));
    md.push_str(&format!(
        "- **Started**: {}\n",
        summary.started_at.to_rfc3339()
    ));
    md.push_str(&format!(
        "- **Finished**: {}\n",
        summary.finished_at.to_rfc3339()
    ));
    md.push_str(&format!(
        "- **Duration**: {:.2} seconds\n\n",
        summary.elapsed.as_secs_f64()
    ));

    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Pages Fetched**: {}\n", summary.total_pages()));
    md.push_str(&format!("- **Succeeded**: {}\n", summary.pages_succeeded));
    md.push_str(&format!("- **Failed**: {}\n", summary.pages_failed));
    md.push_str(&format!("- **Links Enqueued**: {}\n", summary.links_enqueued));
    md.push_str(&format!("- **URLs Seen**: {}\n", summary.urls_seen));
    if summary.sink_failures > 0 {
        md.push_str(&format!(
            "- **Sink Write Failures**: {}\n",
            summary.sink_failures
        ));
    }
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n\n",
        summary.success_rate()
    ));

    if !summary.by_depth.is_empty() {
        md.push_str("## Depth Breakdown\n\n");
        md.push_str("| Depth | Pages |\n");
        md.push_str("|-------|-------|\n");
        for (depth, count) in &summary.by_depth {
            md.push_str(&format!("| {} | {} |\n", depth, count));
        }
        md.push('\n');
    }

    if !records.is_empty() {
        md.push_str("## Pages\n\n");
        for record in records {
            format_record(&mut md, record);
        }
    }

    md
}

fn format_record(md: &mut String, record: &PageRecord) {
    md.push_str(&format!(
        "### {}\n\n",
        record.title.as_deref().unwrap_or("No Title")
    ));
    md.push_str(&format!("- **URL**: {}\n", record.url));
    md.push_str(&format!("- **Depth**: {}\n", record.depth));
    md.push_str(&format!("- **Status**: {}\n", record.status));

    if let Some(reason) = &record.failure_reason {
        md.push_str(&format!("- **Failure**: {}\n", reason));
    }

    if let Some(annotations) = &record.score_annotations {
        if !annotations.categories.is_empty() {
            md.push_str(&format!(
                "- **Categories**: {}\n",
                annotations.categories.join(", ")
            ));
        }
        if let Some(summary) = &annotations.summary {
            md.push_str(&format!("- **Summary**: {}\n", summary));
        }
    }

    if !record.outbound_links.is_empty() {
        md.push_str(&format!(
            "- **Outbound Links**: {}\n",
            record.outbound_links.len()
        ));
    }

    if !record.body_text.is_empty() {
        let excerpt: String = record.body_text.chars().take(EXCERPT_CHARS).collect();
        md.push_str("\n```text\n");
        md.push_str(&excerpt);
        if record.body_text.chars().count() > EXCERPT_CHARS {
            md.push_str("...");
        }
        md.push_str("\n```\n");
    }

    md.push('\n');
}
