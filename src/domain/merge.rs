//! Left-join every normalized source onto the price date axis.

use crate::domain::frame::{FrameRow, MergedFrame};
use crate::domain::normalizer::{PRICE_COLUMN, SourceKind};
use crate::domain::table::DailyTable;
use tracing::{debug, warn};

/// Join `others` onto the dates of `price` in the order given.
///
/// Days without a price are dropped. A column already contributed by an
/// earlier source keeps the earlier values.
pub fn merge_sources(price: &DailyTable, others: &[(SourceKind, &DailyTable)]) -> MergedFrame {
    // (source position, column position in that source)
    let mut sources: Vec<(usize, usize)> = Vec::new();
    let mut columns: Vec<String> = Vec::new();
    for (pos, (kind, table)) in others.iter().enumerate() {
        for (col, name) in table.columns.iter().enumerate() {
            if name == PRICE_COLUMN || columns.contains(name) {
                warn!(source = %kind, column = %name, "column already present, keeping earlier source");
                continue;
            }
            columns.push(name.clone());
            sources.push((pos, col));
        }
    }

    let mut frame = MergedFrame::new(PRICE_COLUMN, columns);
    let mut without_target = 0usize;
    for (&date, cells) in &price.rows {
        let Some(target) = cells.first().copied().flatten() else {
            without_target += 1;
            continue;
        };
        let values = sources
            .iter()
            .map(|&(pos, col)| others[pos].1.get(date).and_then(|row| row[col]))
            .collect();
        // BTreeMap iteration is ascending, so push cannot fail here.
        if let Err(e) = frame.push(FrameRow {
            date,
            target: Some(target),
            values,
        }) {
            warn!(%date, error = %e, "skipping row during merge");
        }
    }

    debug!(
        rows = frame.len(),
        columns = frame.columns.len(),
        without_target,
        "merged sources onto price dates"
    );
    frame
}
