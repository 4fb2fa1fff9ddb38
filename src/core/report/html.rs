//! HTML rendering of a [`Report`]

use std::fmt::Write as _;

use super::Report;
use crate::core::machine::BuildResult;
use crate::core::target::TargetStatus;

const STYLE: &str = "\
body { font-family: sans-serif; background: #f4f5f7; margin: 0; padding: 24px; }
.container { max-width: 1100px; margin: 0 auto; background: #fff; padding: 32px; border-radius: 8px; }
h1 { border-bottom: 3px solid #3f51b5; padding-bottom: 12px; }
.summary { display: flex; flex-wrap: wrap; gap: 16px; margin: 24px 0; }
.stat { flex: 1 1 160px; text-align: center; padding: 20px; background: #eef1f8; border-radius: 8px; }
.stat-value { font-size: 36px; font-weight: bold; }
.stat-label { color: #666; font-size: 13px; text-transform: uppercase; }
.success { color: #2e7d32; }
.failed { color: #c62828; }
.skipped { color: #8d6e63; }
table { width: 100%; border-collapse: collapse; }
th { background: #3f51b5; color: #fff; padding: 12px; text-align: left; }
td { padding: 12px; border-bottom: 1px solid #e0e0e0; vertical-align: top; }
.badge { padding: 4px 12px; border-radius: 12px; color: #fff; font-size: 13px; }
.badge-success { background: #2e7d32; }
.badge-failed { background: #c62828; }
.badge-skipped { background: #8d6e63; }
.note { color: #555; font-size: 13px; }
.footer { margin-top: 40px; color: #999; font-size: 13px; text-align: center; }
";

/// Escape text for HTML element and attribute content
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the report as a standalone HTML page
pub fn render_html(report: &Report) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n\
         <title>BSP Build Test Report</title>\n<style>\n{STYLE}</style>\n</head>\n<body>\n\
         <div class=\"container\">\n<h1>BSP Build Test Report</h1>\n<div class=\"summary\">\n"
    );

    stat(&mut html, &report.total.to_string(), "Total", "");
    stat(&mut html, &report.success.to_string(), "Success", "success");
    stat(&mut html, &report.failed.to_string(), "Failed", "failed");
    stat(&mut html, &report.skipped.to_string(), "Skipped", "skipped");
    stat(&mut html, &format!("{:.1}%", report.success_rate), "Success Rate", "");
    stat(&mut html, &format!("{:.1}s", report.duration_seconds), "Duration", "");

    html.push_str(
        "</div>\n<h2>Results</h2>\n<table>\n<thead><tr><th>#</th><th>BSP</th>\
         <th>Status</th><th>Duration</th><th>Artifacts</th><th>Log</th></tr></thead>\n<tbody>\n",
    );
    for (index, result) in report.all_results().enumerate() {
        row(&mut html, index + 1, result);
    }

    let _ = write!(
        html,
        "</tbody>\n</table>\n<div class=\"footer\">\n<p>Start: {}</p>\n<p>End: {}</p>\n\
         <p>Total duration: {:.2} seconds</p>\n</div>\n</div>\n</body>\n</html>\n",
        report.start_time.format("%Y-%m-%d %H:%M:%S"),
        report.end_time.format("%Y-%m-%d %H:%M:%S"),
        report.duration_seconds
    );
    html
}

fn stat(html: &mut String, value: &str, label: &str, class: &str) {
    let _ = writeln!(
        html,
        "<div class=\"stat\"><div class=\"stat-value {class}\">{}</div>\
         <div class=\"stat-label\">{label}</div></div>",
        escape_html(value)
    );
}

fn row(html: &mut String, index: usize, result: &BuildResult) {
    let (class, label) = match result.status {
        TargetStatus::Success => ("success", "Success"),
        TargetStatus::Skipped => ("skipped", "Skipped"),
        _ => ("failed", "Failed"),
    };

    let artifacts = result
        .artifacts
        .iter()
        .map(|(name, size)| format!("{} ({size} B)", escape_html(name)))
        .collect::<Vec<_>>()
        .join("<br>");

    let mut notes = String::new();
    if let Some(reason) = &result.failure {
        let _ = write!(notes, "<div class=\"note\">{}</div>", escape_html(reason));
    }
    if let Some(error) = &result.restore_error {
        let _ = write!(notes, "<div class=\"note failed\">{}</div>", escape_html(error));
    }

    let log = result.log_file.as_deref().map_or_else(
        || "-".to_string(),
        |file| format!("<a href=\"{0}\">{0}</a>", escape_html(file)),
    );

    let _ = writeln!(
        html,
        "<tr><td>{index}</td><td><strong>{}</strong>{notes}</td>\
         <td><span class=\"badge badge-{class}\">{label}</span></td>\
         <td>{:.1}s</td><td>{artifacts}</td><td>{log}</td></tr>",
        escape_html(&result.target),
        result.duration_seconds
    );
}
