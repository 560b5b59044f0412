//! HTML progress dashboard.
//!
//! Produces a self-contained HTML file with all CSS/JS inlined.

use anyhow::Result;
use std::path::Path;

use learnpath_core::aggregate::{LearnerStatus, UserSummary};
use learnpath_core::report::ProgressReport;

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn status_class(status: LearnerStatus) -> &'static str {
    match status {
        LearnerStatus::OnTrack => "pass",
        LearnerStatus::AtRisk => "warn",
        LearnerStatus::Overdue => "fail",
    }
}

/// Generate an HTML dashboard from a progress report.
pub fn generate_html(report: &ProgressReport, title: &str) -> String {
    let team = &report.team;
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>learnpath progress: {}</title>\n",
        html_escape(title)
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    html.push_str("<header>\n");
    html.push_str(&format!("<h1>{}</h1>\n", html_escape(title)));
    html.push_str(&format!(
        "<p class=\"meta\">{} learners | {:.1}% average completion | lookahead {} days | {}</p>\n",
        team.members,
        team.average_completion,
        report.policy.lookahead_days,
        report.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str("</header>\n");

    // Team dashboard
    html.push_str("<section class=\"dashboard\">\n");
    html.push_str("<h2>Team</h2>\n");
    html.push_str("<table class=\"summary\">\n");
    html.push_str("<thead><tr><th>On track</th><th>At risk</th><th>Overdue</th><th>Modules complete</th><th>In progress</th><th>Not started</th></tr></thead>\n");
    html.push_str(&format!(
        "<tbody><tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr></tbody></table>\n",
        team.on_track,
        team.at_risk,
        team.overdue,
        team.modules_complete,
        team.modules_in_progress,
        team.modules_not_started,
    ));
    if !report.users.is_empty() {
        html.push_str(&generate_bar_chart(&report.users));
    }
    html.push_str("</section>\n");

    // Learners needing attention
    let flagged: Vec<&UserSummary> = report.at_risk_users().collect();
    if !flagged.is_empty() {
        html.push_str("<section class=\"at-risk\">\n");
        html.push_str("<h2>Needs attention</h2>\n");
        html.push_str("<table>\n");
        html.push_str("<thead><tr><th>Learner</th><th>Status</th><th>Overdue</th><th>Due soon</th></tr></thead>\n<tbody>\n");
        for u in flagged {
            html.push_str(&format!(
                "<tr><td>{}</td><td class=\"{}\">{}</td><td>{}</td><td>{}</td></tr>\n",
                html_escape(&u.user_id),
                status_class(u.status),
                u.status.label(),
                html_escape(&u.overdue_modules.join(", ")),
                html_escape(&u.due_soon_modules.join(", ")),
            ));
        }
        html.push_str("</tbody></table>\n</section>\n");
    }

    // Per-learner results
    html.push_str("<section class=\"results\">\n");
    html.push_str("<h2>Learners</h2>\n");
    html.push_str("<table class=\"results-table\" id=\"results\">\n");
    html.push_str("<thead><tr><th onclick=\"sortTable(0)\">Learner</th><th onclick=\"sortTable(1)\">Completion</th><th onclick=\"sortTable(2)\">Complete</th><th onclick=\"sortTable(3)\">In progress</th><th onclick=\"sortTable(4)\">Not started</th><th onclick=\"sortTable(5)\">Status</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    for u in &report.users {
        let class = status_class(u.status);
        html.push_str(&format!(
            "<tr><td>{}</td><td>{:.1}%</td><td>{}</td><td>{}</td><td>{}</td><td class=\"{}\">{}</td></tr>\n",
            html_escape(&u.user_id),
            u.average_completion,
            u.complete,
            u.in_progress,
            u.not_started,
            class,
            u.status.label(),
        ));
    }
    html.push_str("</tbody></table>\n");
    html.push_str("</section>\n");

    // Raw JSON
    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(&html_escape(
        &serde_json::to_string_pretty(report).unwrap_or_default(),
    ));
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    html.push_str("<script>\n");
    html.push_str(JS);
    html.push_str("</script>\n");

    html.push_str("</body>\n</html>");
    html
}

/// Write an HTML dashboard to a file.
pub fn write_html_report(report: &ProgressReport, title: &str, path: &Path) -> Result<()> {
    let html = generate_html(report, title);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)?;
    Ok(())
}

fn generate_bar_chart(users: &[UserSummary]) -> String {
    let bar_height = 24;
    let max_width = 400;
    let padding = 8;
    let label_width = 200;

    let total_height = users.len() * (bar_height + padding) + padding;

    let mut svg = format!(
        "<svg width=\"{}\" height=\"{}\" xmlns=\"http://www.w3.org/2000/svg\">\n",
        label_width + max_width + 60,
        total_height
    );

    for (i, user) in users.iter().enumerate() {
        let y = i * (bar_height + padding) + padding;
        let ratio = (user.average_completion / 100.0).clamp(0.0, 1.0);
        let width = (ratio * max_width as f64) as usize;

        let color = match user.status {
            LearnerStatus::Overdue => "#ef4444",
            LearnerStatus::AtRisk => "#eab308",
            LearnerStatus::OnTrack => "#22c55e",
        };

        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"14\" fill=\"currentColor\" text-anchor=\"end\" dominant-baseline=\"middle\">{}</text>\n",
            label_width - 10,
            y + bar_height / 2,
            html_escape(&user.user_id)
        ));
        svg.push_str(&format!(
            "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\" rx=\"4\"/>\n",
            label_width, y, width, bar_height, color
        ));
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"12\" fill=\"currentColor\" dominant-baseline=\"middle\">{:.1}%</text>\n",
            label_width + width + 8,
            y + bar_height / 2,
            user.average_completion
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --pass: #dcfce7; --warn: #fef9c3; --fail: #fde2e2; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --pass: #064e3b; --warn: #713f12; --fail: #7f1d1d; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: #6b7280; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; }
th { background: var(--border); cursor: pointer; }
.pass { background: var(--pass); }
.warn { background: var(--warn); }
.fail { background: var(--fail); }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
svg { margin: 1rem 0; }
"#;

const JS: &str = r#"
function sortTable(col) {
  const table = document.getElementById('results');
  const tbody = table.querySelector('tbody');
  const rows = Array.from(tbody.querySelectorAll('tr'));
  const asc = table.dataset.sortCol == col && table.dataset.sortDir == 'asc' ? false : true;
  rows.sort((a, b) => {
    const va = a.cells[col].textContent;
    const vb = b.cells[col].textContent;
    const na = parseFloat(va), nb = parseFloat(vb);
    const cmp = !isNaN(na) && !isNaN(nb) ? na - nb : va.localeCompare(vb);
    return asc ? cmp : -cmp;
  });
  table.dataset.sortCol = col;
  table.dataset.sortDir = asc ? 'asc' : 'desc';
  rows.forEach(r => tbody.appendChild(r));
}
"#;
