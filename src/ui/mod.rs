use anyhow::Error;
use std::io::{self, Write};
use unicode_width::UnicodeWidthChar;

use crate::core::{
    CategoryResults, CheckStatus, CostReport, SectionOutcome, SectionStatus, ValidationResults,
};

const RULE_WIDE: usize = 80;
const RULE_NARROW: usize = 60;

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub color: bool,
    pub max_warnings: usize,
    pub quiet: bool,
}

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "error:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "caused by:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }

    let _ = writeln!(stderr, "next:");
    let _ = writeln!(
        stderr,
        "  - rerun with `--verbose` for more detail"
    );
    let _ = writeln!(
        stderr,
        "  - see `infracheck --help` for available commands and options"
    );
}

pub fn print_cost_report(report: &CostReport, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    render_cost_report(&mut out, report, cfg.color);
}

pub fn render_cost_report(out: &mut dyn Write, report: &CostReport, color: bool) {
    let _ = writeln!(out, "Cloud Cost Analyzer ({})", report.scope);
    let _ = writeln!(out, "{}", "=".repeat(RULE_WIDE));

    for note in &report.notes {
        let _ = writeln!(out, "{} {note}", paint("error", "31", color));
    }

    if report.findings.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "No cost optimization opportunities found!");
        return;
    }

    let grouped = report.by_type();

    let _ = writeln!(out);
    print_type_table(out, &grouped);

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "=".repeat(RULE_WIDE));
    let _ = writeln!(out, "Cloud Cost Optimization Report");
    let _ = writeln!(out, "{}", "=".repeat(RULE_WIDE));

    for (resource_type, findings) in grouped.iter() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{resource_type} ({} findings):", findings.len());
        let _ = writeln!(out, "{}", "-".repeat(RULE_WIDE));
        for (i, finding) in findings.iter().enumerate() {
            let _ = writeln!(out);
            let _ = writeln!(out, "  {}. Resource: {}", i + 1, finding.resource_id);
            let _ = writeln!(out, "     Issue: {}", finding.issue);
            let _ = writeln!(out, "     Recommendation: {}", finding.recommendation);
            let _ = writeln!(
                out,
                "     Potential Savings: {}",
                finding.potential_savings
            );
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "=".repeat(RULE_WIDE));
    let _ = writeln!(out, "Total Findings: {}", report.findings.len());
    let _ = writeln!(out, "{}", "=".repeat(RULE_WIDE));
}

fn print_type_table(out: &mut dyn Write, grouped: &crate::core::Grouped<&crate::core::Finding>) {
    let label_type = "Type";
    let label_count = "Findings";

    let type_w = grouped
        .categories()
        .map(visible_width_ansi)
        .max()
        .unwrap_or(0)
        .max(visible_width_ansi(label_type));
    let count_w = visible_width_ansi(label_count);

    let _ = writeln!(
        out,
        "{}  {}",
        pad_end_ansi(label_type, type_w),
        label_count
    );
    let _ = writeln!(out, "{}  {}", "-".repeat(type_w), "-".repeat(count_w));
    for (resource_type, findings) in grouped.iter() {
        let _ = writeln!(
            out,
            "{}  {}",
            pad_end_ansi(resource_type, type_w),
            pad_start_ansi(&findings.len().to_string(), count_w)
        );
    }
}

pub fn print_sections(sections: &[SectionOutcome], cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    render_sections(&mut out, sections, cfg.color);
}

pub fn render_sections(out: &mut dyn Write, sections: &[SectionOutcome], color: bool) {
    for section in sections {
        let _ = writeln!(out);
        let _ = writeln!(out, "Validating {} in {}...", title_case(&section.category), section.path);
        if let SectionStatus::Skipped { message } = &section.status {
            let _ = writeln!(out, "  {} {message}", paint("skip", "90", color));
            continue;
        }
        for check in &section.checks {
            let _ = writeln!(out, "  {} {}", format_status(check.status, color), check.detail);
        }
    }
}

pub fn print_validation_summary(results: &ValidationResults, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    render_validation_summary(&mut out, results, cfg.max_warnings, cfg.color);
}

pub fn render_validation_summary(
    out: &mut dyn Write,
    results: &ValidationResults,
    max_warnings: usize,
    color: bool,
) {
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "=".repeat(RULE_NARROW));
    let _ = writeln!(out, "Infrastructure Validation Report");
    let _ = writeln!(out, "{}", "=".repeat(RULE_NARROW));

    for (category, r) in results.iter() {
        if r.total() == 0 {
            continue;
        }
        render_category(out, category, r, max_warnings, color);
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "=".repeat(RULE_NARROW));
}

fn render_category(
    out: &mut dyn Write,
    category: &str,
    r: &CategoryResults,
    max_warnings: usize,
    color: bool,
) {
    let _ = writeln!(out);
    let _ = writeln!(out, "{}:", category.to_uppercase());
    let _ = writeln!(out, "  {} Passed: {}", format_status(CheckStatus::Pass, color), r.passed.len());
    let _ = writeln!(out, "  {} Failed: {}", format_status(CheckStatus::Fail, color), r.failed.len());
    let _ = writeln!(
        out,
        "  {} Warnings: {}",
        format_status(CheckStatus::Warn, color),
        r.warnings.len()
    );

    if !r.failed.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  Critical Issues:");
        for issue in &r.failed {
            let _ = writeln!(out, "    - {issue}");
        }
    }

    if !r.warnings.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  Warnings:");
        for warning in r.warnings.iter().take(max_warnings) {
            let _ = writeln!(out, "    - {warning}");
        }
        if r.warnings.len() > max_warnings {
            let _ = writeln!(out, "    - ... and {} more", r.warnings.len() - max_warnings);
        }
    }
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn status_label(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "pass",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Warn => "warn",
        CheckStatus::Info => "info",
    }
}

fn format_status(status: CheckStatus, color: bool) -> String {
    let code = match status {
        CheckStatus::Pass => "32",
        CheckStatus::Fail => "31",
        CheckStatus::Warn => "33",
        CheckStatus::Info => "36",
    };
    pad_end_ansi(&paint(status_label(status), code, color), 4)
}

fn paint(s: &str, code: &str, color: bool) -> String {
    if !color {
        return s.to_string();
    }
    format!("\x1b[{code}m{s}\x1b[0m")
}

fn pad_end_ansi(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - w))
}

fn pad_start_ansi(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{}{}", " ".repeat(width - w), s)
}

fn visible_width_ansi(s: &str) -> usize {
    let mut width: usize = 0;
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            let _ = chars.next();
            for ch2 in chars.by_ref() {
                if ch2 == 'm' {
                    break;
                }
            }
            continue;
        }
        width = width.saturating_add(UnicodeWidthChar::width(ch).unwrap_or(0));
    }
    width
}
