//! Read-side views over the per-variable histories.

use std::collections::BTreeMap;

use opcsim_types::{ChartSeries, HistoryEntry, HistoryRecord, VariableConfig};

/// Rows returned by the merged history view.
pub const HISTORY_VIEW_LIMIT: usize = 200;

/// Points per series returned by the chart view.
pub const CHART_POINTS: usize = 50;

/// Merge every variable's history into one list, newest first.
///
/// Samples with equal timestamps keep their per-variable order. At most
/// `limit` rows are returned.
pub fn merged_history(
    histories: &BTreeMap<String, Vec<HistoryEntry>>,
    limit: usize,
) -> Vec<HistoryRecord> {
    let mut rows: Vec<HistoryRecord> = histories
        .iter()
        .flat_map(|(name, entries)| {
            entries.iter().map(move |entry| HistoryRecord {
                timestamp: entry.timestamp,
                variable: name.clone(),
                value: entry.value.clone(),
            })
        })
        .collect();
    rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    rows.truncate(limit);
    rows
}

/// Chart series for random-walk numeric variables.
///
/// Only variables with more than one recorded sample are included; each
/// series holds the last [`CHART_POINTS`] samples, oldest first.
pub fn chart_series<'a, I>(
    histories: &BTreeMap<String, Vec<HistoryEntry>>,
    configs: I,
) -> BTreeMap<String, ChartSeries>
where
    I: IntoIterator<Item = (&'a str, &'a VariableConfig)>,
{
    configs
        .into_iter()
        .filter_map(|(name, config)| {
            let (min, max) = config.random_range()?;
            let entries = histories.get(name).filter(|h| h.len() > 1)?;
            let tail = entries
                .get(entries.len().saturating_sub(CHART_POINTS)..)
                .unwrap_or_default();
            let (timestamps, data) = tail
                .iter()
                .filter_map(|e| e.value.as_f64().map(|v| (e.timestamp, v)))
                .unzip();
            Some((
                name.to_owned(),
                ChartSeries {
                    timestamps,
                    data,
                    min,
                    max,
                },
            ))
        })
        .collect()
}
