//! Terminal rendering for run summaries and table previews.

use arrow::array::*;
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use debtleads_core::AggregatedDebtor;
use debtleads_pipeline::{FilterStats, MatchOutcome};

const MAX_TOP_DEBTORS: usize = 10;

// ── Run summary ──

/// Print the per-stage counts of a finished run.
pub fn print_run_summary(stats: &FilterStats, debtors: &[AggregatedDebtor], matches: Option<&MatchOutcome>) {
    println!("=== Record filter ===");
    println!("  {:<26} {}", "input rows", stats.input);
    println!("  {:<26} {}", "wrong jurisdiction", stats.wrong_jurisdiction);
    println!("  {:<26} {}", "not a legal entity", stats.not_entity);
    println!("  {:<26} {}", "excluded by name", stats.excluded_name);
    println!("  {:<26} {}", "at or below minimum", stats.below_minimum);
    println!("  {:<26} {}", "kept", stats.kept);
    println!();

    println!("=== Aggregator ===");
    println!("  {:<26} {}", "debtors", debtors.len());
    println!();

    if let Some(outcome) = matches {
        println!("=== Plan matcher ({:?}) ===", outcome.strategy());
        println!("  {:<26} {}", "with plan", outcome.debtors_with_plan());
        println!("  {:<26} {}", "without plan", outcome.debtors_without_plan());
        if let MatchOutcome::RowLevel { matched, .. } = outcome {
            println!("  {:<26} {}", "matched rows", matched.len());
        }
        println!();
    }

    print_top_debtors(debtors);
}

fn print_top_debtors(debtors: &[AggregatedDebtor]) {
    if debtors.is_empty() {
        return;
    }
    let mut ranked: Vec<&AggregatedDebtor> = debtors.iter().collect();
    ranked.sort_by(|a, b| b.total_debt.cmp(&a.total_debt));

    println!("Largest debtors");
    for d in ranked.iter().take(MAX_TOP_DEBTORS) {
        let name = if d.debtor_name.chars().count() > 40 {
            format!("{}...", d.debtor_name.chars().take(37).collect::<String>())
        } else {
            d.debtor_name.clone()
        };
        println!("  {:<20} {:<40} {:>18}", d.taxpayer_id, name, d.total_debt.to_string());
    }
    if ranked.len() > MAX_TOP_DEBTORS {
        println!("  ... and {} more", ranked.len() - MAX_TOP_DEBTORS);
    }
    println!();
}

// ── Table inspection ──

/// Print column names with their null counts, then the first `rows` rows.
pub fn print_table_overview(batch: &RecordBatch, rows: usize) -> anyhow::Result<()> {
    println!("{} rows, {} columns", batch.num_rows(), batch.num_columns());
    for (field, col) in batch.schema().fields().iter().zip(batch.columns()) {
        let sample = first_value(col.as_ref()).unwrap_or("-");
        println!(
            "  {:<32} nulls: {:<8} first: {}",
            field.name(),
            col.null_count(),
            sample
        );
    }
    println!();

    let preview = batch.slice(0, rows.min(batch.num_rows()));
    println!("{}", pretty_format_batches(&[preview])?);
    Ok(())
}

// ── Helpers ──

/// First non-null string value of a column, if it holds text.
fn first_value(col: &dyn Array) -> Option<&str> {
    (0..col.len()).find_map(|i| col_str(col, i))
}

/// Get a string value from a column that might be Utf8 or LargeUtf8.
fn col_str(col: &dyn Array, i: usize) -> Option<&str> {
    if col.is_null(i) {
        return None;
    }
    if let Some(arr) = col.as_any().downcast_ref::<StringArray>() {
        return Some(arr.value(i));
    }
    if let Some(arr) = col.as_any().downcast_ref::<LargeStringArray>() {
        return Some(arr.value(i));
    }
    None
}
