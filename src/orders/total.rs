use log::{debug, info};
use scraper::{Html, Selector};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::email::{EmailMessage, ExtractError};

pub const TOTAL_LABEL: &str = "Totale ordine";
pub const TOTALS_FILE: &str = "gomme_totali.txt";

/// Pull the order total out of a confirmation email and append it to
/// `<output_dir>/gomme_totali.txt`.
///
/// The value is the table cell right after the first cell containing
/// "Totale ordine", kept as text. Nothing is written when it cannot be found.
pub fn extract(message: &EmailMessage, output_dir: &Path) -> Result<String, ExtractError> {
    let html_part = message
        .html_part()
        .filter(|part| !part.payload.is_empty())
        .ok_or(ExtractError::MissingHtmlBody)?;
    let html = String::from_utf8_lossy(&html_part.payload);

    let cells = table_cells(&html);
    if cells.is_empty() {
        return Err(ExtractError::MissingTableData);
    }
    debug!("Found {} table cell(s)", cells.len());

    let total = find_total(&cells).ok_or(ExtractError::TotalNotFound)?;
    info!("Totale ordine: {}", total);

    append_total(total, output_dir)?;
    Ok(total.to_string())
}

/// Text of every `<td>` in document order.
///
/// Each text node is trimmed and the non-empty pieces are joined, so
/// `<td> Totale <b>ordine</b> </td>` yields `Totaleordine`.
pub fn table_cells(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("td") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .map(|cell| {
            cell.text()
                .map(str::trim)
                .filter(|piece| !piece.is_empty())
                .collect::<String>()
        })
        .collect()
}

/// Cell following the first one that mentions the total label
pub fn find_total(cells: &[String]) -> Option<&str> {
    let index = cells.iter().position(|cell| cell.contains(TOTAL_LABEL))?;
    cells.get(index + 1).map(String::as_str)
}

fn append_total(total: &str, output_dir: &Path) -> Result<(), ExtractError> {
    let output_path = output_dir.join(TOTALS_FILE);
    let write_failure = |source: std::io::Error| ExtractError::TotalWriteFailure {
        path: output_path.clone(),
        source,
    };

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&output_path)
        .map_err(write_failure)?;
    writeln!(file, "{}", total).map_err(write_failure)?;

    info!("💾 Saved totale ordine to {:?}", output_path);
    Ok(())
}
