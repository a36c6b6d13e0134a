// Text report artifact, one file per impact analysis.
use crate::analyzer::descriptive::Summary;
use crate::analyzer::impact::{
    ImmediateImpact, ImpactOutcome, ImpactReport, WindowComparison, WindowedImpact,
};
use crate::analyzer::mann_whitney::PValueMethod;
use crate::analyzer::normality::NormalityCheck;
use crate::model::StorageError;
use crate::utils::{format_thousands, slugify};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

const SEPARATOR_WIDTH: usize = 50;

pub fn report_file_name(source: &str, media_label: &str) -> String {
    format!("{}_{}.txt", source, slugify(media_label))
}

fn write_summary<W: Write>(out: &mut W, title: &str, s: &Summary) -> io::Result<()> {
    writeln!(out, "--- {} ---", title)?;
    writeln!(out, "count  {}", s.count)?;
    writeln!(out, "mean   {}", format_thousands(s.mean, 2))?;
    match s.std_dev {
        Some(sd) => writeln!(out, "std    {}", format_thousands(sd, 2))?,
        None => writeln!(out, "std    n/a")?,
    }
    writeln!(out, "min    {}", format_thousands(s.min, 2))?;
    writeln!(out, "25%    {}", format_thousands(s.q1, 2))?;
    writeln!(out, "50%    {}", format_thousands(s.median, 2))?;
    writeln!(out, "75%    {}", format_thousands(s.q3, 2))?;
    writeln!(out, "max    {}", format_thousands(s.max, 2))
}

fn normality_line(check: &NormalityCheck) -> String {
    match check {
        NormalityCheck::Tested(sw) => format!("W = {:.4}, p = {:.4}", sw.w, sw.p_value),
        NormalityCheck::Indeterminate(reason) => format!("not assessed ({})", reason),
    }
}

fn write_comparison<W: Write>(out: &mut W, metric: &str, cmp: &WindowComparison) -> io::Result<()> {
    let (b0, b1) = cmp.window.before_range();
    let (a0, a1) = cmp.window.after_range();
    writeln!(out, "Before: {} .. {}", b0, b1)?;
    writeln!(out, "After:  {} .. {}", a0, a1)?;
    writeln!(
        out,
        "Mean {} over the {} months BEFORE: {}",
        metric,
        cmp.window.size,
        format_thousands(cmp.before_summary.mean, 2)
    )?;
    writeln!(
        out,
        "Mean {} over the {} months AFTER: {}",
        metric,
        cmp.window.size,
        format_thousands(cmp.after_summary.mean, 2)
    )?;
    write_summary(out, &format!("{} months before", cmp.window.size), &cmp.before_summary)?;
    write_summary(out, &format!("{} months after", cmp.window.size), &cmp.after_summary)?;

    writeln!(out, "Normality (Shapiro-Wilk) before: {}", normality_line(&cmp.before_normality))?;
    writeln!(out, "Normality (Shapiro-Wilk) after: {}", normality_line(&cmp.after_normality))?;
    writeln!(out, "Test: {} ({})", cmp.selection.choice, cmp.selection.reason)?;

    match &cmp.result {
        Ok(r) => {
            writeln!(out, "Alternative hypothesis: {}", r.alternative)?;
            let method = match r.method {
                Some(PValueMethod::Exact) => " (exact)",
                Some(PValueMethod::Asymptotic) => " (normal approximation)",
                None => "",
            };
            writeln!(out, "{} statistic: {:.4}", r.statistic_name, r.statistic)?;
            writeln!(out, "Test p-value: {:.4}{}", r.p_value, method)?;
            if r.p_value < r.alpha {
                writeln!(
                    out,
                    "Conclusion: p-value ({:.4}) is below {}, the result is STATISTICALLY SIGNIFICANT ({}).",
                    r.p_value, r.alpha, r.verdict
                )
            } else {
                writeln!(
                    out,
                    "Conclusion: p-value ({:.4}) is not below {}, no statistical evidence of a significant increase ({}).",
                    r.p_value, r.alpha, r.verdict
                )
            }
        }
        Err(e) => writeln!(out, "The hypothesis test could not be computed: {}.", e),
    }
}

/// Writes the report sections: header, immediate impact, long-term impact, separator.
pub fn render_report<W: Write>(report: &ImpactReport, out: &mut W) -> io::Result<()> {
    writeln!(out, "--- Impact analysis: {} ---", report.media_label)?;
    writeln!(out, "Metric: {} | Release month: {}", report.metric, report.pivot)?;

    match &report.outcome {
        ImpactOutcome::EventNotFound => {
            writeln!(
                out,
                "Error: release month '{}' was not found in the data; nothing could be computed.",
                report.pivot
            )?;
        }
        ImpactOutcome::Analyzed { immediate, windowed } => {
            writeln!(out)?;
            writeln!(out, "[ Immediate impact ]")?;
            match immediate {
                ImmediateImpact::Computed {
                    previous_month,
                    previous_value,
                    pivot_value,
                    change_pct,
                } => {
                    writeln!(
                        out,
                        "{} in previous month ('{}'): {}",
                        report.metric,
                        previous_month,
                        format_thousands(*previous_value, 0)
                    )?;
                    writeln!(
                        out,
                        "{} in release month ('{}'): {}",
                        report.metric,
                        report.pivot,
                        format_thousands(*pivot_value, 0)
                    )?;
                    writeln!(out, "Immediate change: {:+.2}%", change_pct)?;
                }
                ImmediateImpact::Unavailable(gap) => {
                    writeln!(out, "Immediate impact could not be computed: {}.", gap)?;
                }
            }

            writeln!(out)?;
            match windowed {
                WindowedImpact::Computed(cmp) => {
                    writeln!(out, "[ Long-term impact ({} months) ]", cmp.window.size)?;
                    write_comparison(out, &report.metric, cmp)?;
                }
                WindowedImpact::InsufficientData {
                    window,
                    before_present,
                    after_present,
                } => {
                    writeln!(out, "[ Long-term impact ({} months) ]", window.size)?;
                    writeln!(
                        out,
                        "Long-term analysis could not be computed: insufficient data ({} of {} months before, {} of {} after).",
                        before_present, window.size, after_present, window.size
                    )?;
                }
            }
        }
    }

    writeln!(out, "{}", "-".repeat(SEPARATOR_WIDTH))
}

/// Writes the report to `path`, creating parent directories. The buffer is
/// flushed before the handle is released.
pub fn write_report_file(path: &Path, report: &ImpactReport) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    render_report(report, &mut writer)?;
    writer.flush()?;
    Ok(())
}
