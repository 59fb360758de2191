//! Report Formatter
//!
//! Output depends only on its inputs; the timestamp printed is the one
//! captured on the plan or summary, so formatting the same analysis twice
//! yields identical text.

use crate::assessment::{Assessment, IoCpuBalance, Tier};
use crate::explain::{ExecutionPlan, ExecutionStep, ExecutionSummary};
use chrono::NaiveDateTime;
use regex::Regex;
use std::fmt::Write as _;
use std::sync::LazyLock;

const BANNER_WIDTH: usize = 80;
const TABLE_RULE_WIDTH: usize = 75;
const SECTION_RULE_WIDTH: usize = 60;
const OPERATION_WIDTH: usize = 25;
const OBJECT_WIDTH: usize = 20;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
const BYTE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

// Longer variants first so "LEFT JOIN" breaks before LEFT, not before JOIN
static CLAUSE_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(LEFT OUTER JOIN|RIGHT OUTER JOIN|FULL OUTER JOIN|LEFT JOIN|RIGHT JOIN|INNER JOIN|FULL JOIN|CROSS JOIN|JOIN|SELECT|FROM|WHERE|ORDER BY|GROUP BY|HAVING)\b",
    )
    .expect("valid regex")
});

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Renders plans and summaries as text reports
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportFormatter;

impl ReportFormatter {
    /// Creates a formatter
    pub fn new() -> Self {
        Self
    }

    /// Renders a detailed plan report
    pub fn format_plan(&self, plan: &ExecutionPlan, assessment: &Assessment) -> String {
        let mut out = String::new();

        self.write_header(
            &mut out,
            "QUERY PLAN ANALYSIS",
            &plan.captured_at,
            &plan.statement_id,
            plan.execution_time_ms,
        );
        let _ = writeln!(out, "Total Cost:     {}", format_number(plan.total_cost, 2));
        out.push_str(&banner());
        out.push('\n');

        self.write_sql(&mut out, &plan.sql);

        section(&mut out, "EXECUTION PLAN:");
        let _ = writeln!(
            out,
            "{}",
            table_row("ID", "OPERATION", "OBJECT", "COST", "CARDINALITY")
        );
        let _ = writeln!(out, "{}", "-".repeat(TABLE_RULE_WIDTH));
        for step in &plan.steps {
            self.write_step(&mut out, step);
        }
        if plan.is_empty() {
            out.push_str("(no plan steps returned)\n");
        }
        out.push('\n');

        self.write_assessment(&mut out, assessment);
        self.write_stack(&mut out, plan.stack_trace.as_deref());
        out.push_str(&banner());
        out
    }

    /// Renders a parent-node summary report
    pub fn format_summary(&self, summary: &ExecutionSummary, assessment: &Assessment) -> String {
        let mut out = String::new();

        self.write_header(
            &mut out,
            "QUERY PLAN SUMMARY",
            &summary.captured_at,
            &summary.statement_id,
            summary.analysis_time_ms,
        );
        out.push_str(&banner());
        out.push('\n');

        if let Some(sql) = summary.sql.as_deref() {
            self.write_sql(&mut out, sql);
        }

        let estimate = &summary.estimate;
        section(&mut out, "EXECUTION PLAN SUMMARY (parent node):");
        let _ = writeln!(out, "Total Cost:       {}", format_number(estimate.cost, 0));
        let _ = writeln!(out, "Cardinality:      {} rows", group_thousands(estimate.cardinality));
        let _ = writeln!(
            out,
            "Bytes:            {} bytes ({})",
            group_thousands(estimate.bytes),
            format_bytes(estimate.bytes)
        );
        let _ = writeln!(out, "CPU Cost:         {}", format_number(estimate.cpu_cost, 0));
        let _ = writeln!(out, "I/O Cost:         {}", format_number(estimate.io_cost, 0));
        let _ = writeln!(
            out,
            "Estimated Time:   {} microseconds",
            group_thousands(estimate.time_us)
        );
        out.push('\n');

        self.write_assessment(&mut out, assessment);
        self.write_stack(&mut out, summary.stack_trace.as_deref());
        out.push_str(&banner());
        out
    }

    fn write_header(
        &self,
        out: &mut String,
        title: &str,
        captured_at: &NaiveDateTime,
        statement_id: &str,
        elapsed_ms: u64,
    ) {
        out.push_str(&banner());
        let _ = writeln!(out, "{}", title);
        out.push_str(&banner());
        let _ = writeln!(out, "Timestamp:      {}", captured_at.format(TIMESTAMP_FORMAT));
        let _ = writeln!(out, "Statement ID:   {}", statement_id);
        let _ = writeln!(out, "Analysis Time:  {} ms", group_thousands(elapsed_ms));
    }

    fn write_sql(&self, out: &mut String, sql: &str) {
        section(out, "SQL QUERY:");
        let _ = writeln!(out, "{}", reflow_sql(sql));
        out.push('\n');
    }

    fn write_step(&self, out: &mut String, step: &ExecutionStep) {
        let _ = writeln!(
            out,
            "{}",
            table_row(
                &step.id.to_string(),
                &truncate(&step.operation, OPERATION_WIDTH),
                &truncate(step.object_name.as_deref().unwrap_or(""), OBJECT_WIDTH),
                &format_number(step.cost, 0),
                &group_thousands(step.cardinality),
            )
        );
        if let Some(access) = &step.access_predicates {
            let _ = writeln!(out, "     Access: {}", access);
        }
        if let Some(filter) = &step.filter_predicates {
            let _ = writeln!(out, "     Filter: {}", filter);
        }
    }

    fn write_assessment(&self, out: &mut String, assessment: &Assessment) {
        section(out, "PERFORMANCE ASSESSMENT:");

        let cost_text = match assessment.cost_tier {
            Tier::High => "very high",
            Tier::Moderate => "moderate",
            Tier::Low => "acceptable",
        };
        let _ = writeln!(
            out,
            "{} COST: Query cost is {} ({})",
            assessment.cost_tier.as_str(),
            cost_text,
            format_number(assessment.cost, 0)
        );
        recommend(out, assessment.cost_recommendation());

        let _ = writeln!(
            out,
            "{} CARDINALITY: Processing {} rows",
            assessment.cardinality_tier.as_str(),
            group_thousands(assessment.cardinality)
        );
        recommend(out, assessment.cardinality_recommendation());

        if let Some(ratio) = assessment.io_ratio {
            let line = match assessment.balance {
                IoCpuBalance::IoBound => {
                    format!("I/O INTENSIVE: Query is I/O bound ({:.1}% I/O)", ratio * 100.0)
                }
                IoCpuBalance::CpuBound => format!(
                    "CPU INTENSIVE: Query is CPU bound ({:.1}% CPU)",
                    (1.0 - ratio) * 100.0
                ),
                IoCpuBalance::Balanced => {
                    format!("BALANCED: I/O and CPU costs are balanced ({:.1}% I/O)", ratio * 100.0)
                }
                IoCpuBalance::Unknown => String::new(),
            };
            if !line.is_empty() {
                let _ = writeln!(out, "{}", line);
                recommend(out, assessment.balance.recommendation());
            }
        }

        if assessment.has_warnings() {
            for warning in &assessment.warnings {
                let _ = writeln!(out, "{}", warning.message());
                recommend(out, Some(warning.recommendation()));
            }
        } else {
            out.push_str("No major performance issues detected\n");
        }
        out.push('\n');
    }

    fn write_stack(&self, out: &mut String, stack_trace: Option<&str>) {
        let Some(stack) = stack_trace.filter(|s| !s.trim().is_empty()) else {
            return;
        };
        section(out, "CALL STACK:");
        let _ = writeln!(out, "{}", stack.trim_end());
        out.push('\n');
    }
}

fn banner() -> String {
    format!("{}\n", "=".repeat(BANNER_WIDTH))
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "{}", title);
    let _ = writeln!(out, "{}", "-".repeat(SECTION_RULE_WIDTH));
}

fn recommend(out: &mut String, recommendation: Option<&str>) {
    if let Some(text) = recommendation {
        let _ = writeln!(out, "   -> {}", text);
    }
}

fn table_row(id: &str, operation: &str, object: &str, cost: &str, cardinality: &str) -> String {
    format!(
        "{:<4} {:<25} {:<20} {:<10} {:<12}",
        id, operation, object, cost, cardinality
    )
}

/// Lays SQL out one clause per line
///
/// Whitespace runs collapse to a single space, then a line break is
/// inserted before each clause keyword.
///
/// ```
/// use planscope_analyzer::report::reflow_sql;
///
/// assert_eq!(
///     reflow_sql("select e.name\n  from emp e left join dept d on e.d = d.id where e.id = 1"),
///     "select e.name\nfrom emp e\nleft join dept d on e.d = d.id\nwhere e.id = 1"
/// );
/// ```
pub fn reflow_sql(sql: &str) -> String {
    let collapsed = WHITESPACE.replace_all(sql.trim(), " ");
    let broken = CLAUSE_KEYWORD.replace_all(&collapsed, "\n${1}");
    broken
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders a byte count in the largest binary unit not exceeding it
///
/// ```
/// use planscope_analyzer::report::format_bytes;
///
/// assert_eq!(format_bytes(0), "0 B");
/// assert_eq!(format_bytes(1_536), "1.5 KB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, BYTE_UNITS[unit])
}

/// Inserts `,` between groups of three digits
pub fn group_thousands(value: u64) -> String {
    group_digits(&value.to_string())
}

fn group_digits(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Renders a real number with `decimals` places and grouped thousands
pub fn format_number(value: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, value.abs());
    let (integer, fraction) = match fixed.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (fixed.as_str(), None),
    };

    let mut out = String::new();
    if value.is_sign_negative() && fixed.chars().any(|c| c.is_ascii_digit() && c != '0') {
        out.push('-');
    }
    if integer.bytes().all(|b| b.is_ascii_digit()) {
        out.push_str(&group_digits(integer));
    } else {
        out.push_str(integer);
    }
    if let Some(fraction) = fraction {
        out.push('.');
        out.push_str(fraction);
    }
    out
}

/// Shortens `text` to `width` characters, ending in `...` when cut
pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let kept: String = text.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", kept)
}
