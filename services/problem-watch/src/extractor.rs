//! Problem table extraction

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::alert::AlertRecord;
use crate::config::{DurationStrategy, ExtractionConfig};
use crate::driver::js_literal;
use crate::session::Session;

static DURATION_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\d+[hms](\s+\d+[hms])*$").unwrap());

/// Script returning the trimmed cell texts of every matching row
fn table_rows_script(row_selector: &str, cell_selector: &str) -> String {
    format!(
        "Array.from(document.querySelectorAll({rows})).map(row => \
         Array.from(row.querySelectorAll({cells})).map(cell => (cell.innerText || '').trim()))",
        rows = js_literal(row_selector),
        cells = js_literal(cell_selector),
    )
}

/// Whether a whole cell reads like `1h 4m 39s`
pub fn looks_like_duration(text: &str) -> bool {
    DURATION_TEXT.is_match(text.trim())
}

/// Locate the duration text in a row using the first strategy that yields one
pub fn resolve_duration<'c>(
    cells: &'c [String],
    strategies: &[DurationStrategy],
) -> Option<&'c str> {
    strategies.iter().find_map(|strategy| match strategy {
        DurationStrategy::ScanGrammar => cells
            .iter()
            .map(|c| c.trim())
            .find(|c| looks_like_duration(c)),
        DurationStrategy::Column { index } => cells
            .get(*index)
            .map(|c| c.trim())
            .filter(|c| !c.is_empty()),
    })
}

/// Map one row of cell texts to an alert record
///
/// Rows with fewer than `min_cells` cells are summary or malformed rows and
/// yield `None`.
pub fn map_row(cells: &[String], config: &ExtractionConfig) -> Option<AlertRecord> {
    if cells.len() < config.min_cells {
        return None;
    }

    let cell = |index: usize| {
        cells
            .get(index)
            .map(|c| c.trim().to_string())
            .unwrap_or_default()
    };
    let duration = resolve_duration(cells, &config.duration_strategies)
        .unwrap_or_default()
        .to_string();

    Some(AlertRecord {
        host: cell(config.columns.host),
        problem: cell(config.columns.problem),
        severity: cell(config.columns.severity),
        start_time: cell(config.columns.start_time),
        duration,
    })
}

/// Map every row, skipping the ones that are too short
pub fn map_rows(rows: &[Vec<String>], config: &ExtractionConfig) -> Vec<AlertRecord> {
    let records: Vec<AlertRecord> = rows
        .iter()
        .filter_map(|cells| map_row(cells, config))
        .collect();

    let skipped = rows.len() - records.len();
    if skipped > 0 {
        tracing::debug!(
            "Skipped {} rows with fewer than {} cells",
            skipped,
            config.min_cells
        );
    }
    records
}

/// Open the problem list and read every alert on it
///
/// A table that never appears is treated as an empty list.
pub async fn extract(
    session: &mut Session<'_>,
    problems_url: &str,
    config: &ExtractionConfig,
) -> crate::Result<Vec<AlertRecord>> {
    tracing::info!("Opening problem list {}", problems_url);
    session.navigate(problems_url).await?;

    let driver = session.driver();
    let timeout = Duration::from_millis(config.table_timeout_ms);
    let mut found = None;
    for selector in &config.table_selectors {
        match driver.wait_for_selector(selector, timeout).await {
            Ok(()) => {
                found = Some(selector);
                break;
            }
            Err(e) => tracing::debug!("Table selector {} not found: {}", selector, e),
        }
    }
    let Some(selector) = found else {
        tracing::warn!("Problem table not found, continuing with degraded extraction (no alerts)");
        return Ok(Vec::new());
    };
    tracing::debug!("Problem table located via {}", selector);

    tokio::time::sleep(Duration::from_millis(config.settle_delay_ms)).await;

    let rows = driver
        .evaluate(&table_rows_script(&config.row_selector, &config.cell_selector))
        .await?;
    let rows: Vec<Vec<String>> = serde_json::from_value(rows)?;
    let records = map_rows(&rows, config);
    tracing::info!("Extracted {} alerts from {} rows", records.len(), rows.len());
    Ok(records)
}
