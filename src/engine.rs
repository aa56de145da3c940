use crate::filter::{date_within_window, default_retention_cutoff, within_retention, KpiClock};
use crate::mapping::{is_attended_stage, row_sector, row_state};
use crate::normalize::{flag, row_amount, row_date};
use crate::schema::*;
use chrono::{DateTime, Utc};
use log::debug;

pub fn is_qualified(row: &Row) -> bool {
    flag(row, "qualified")
}

pub fn is_reposicao(row: &Row) -> bool {
    flag(row, "reposicao")
}

/// Attended by the bot and not yet qualified.
pub fn is_attended(row: &Row) -> bool {
    is_attended_stage(row) && !is_qualified(row)
}

pub fn tally_by_sector<'a>(
    rows: impl IntoIterator<Item = &'a Row>,
    include: impl Fn(&Row) -> bool,
) -> SectorCounts {
    let mut counts = SectorCounts::default();
    for row in rows.into_iter().filter(|r| include(*r)) {
        counts.increment(row_sector(row));
    }
    counts
}

/// Computes every dashboard KPI from a row snapshot.
///
/// Pure: the clock is pinned at construction and rows are never mutated, so
/// the same rows always produce the same aggregates.
#[derive(Debug, Clone, Copy)]
pub struct KpiAggregator {
    clock: KpiClock,
    retention_cutoff: DateTime<Utc>,
}

impl KpiAggregator {
    pub fn new(clock: KpiClock, retention_cutoff: DateTime<Utc>) -> Self {
        Self {
            clock,
            retention_cutoff,
        }
    }

    pub fn with_default_cutoff(clock: KpiClock) -> Self {
        Self::new(clock, default_retention_cutoff())
    }

    pub fn clock(&self) -> &KpiClock {
        &self.clock
    }

    pub fn retention_cutoff(&self) -> DateTime<Utc> {
        self.retention_cutoff
    }

    /// Rows on or after the retention cutoff, plus every undated row.
    pub fn retained<'a>(&self, rows: &'a [Row]) -> Vec<&'a Row> {
        let kept: Vec<&Row> = rows
            .iter()
            .filter(|row| within_retention(row, self.retention_cutoff, self.clock.offset()))
            .collect();
        if kept.len() < rows.len() {
            debug!(
                "Retention cutoff {} dropped {} of {} rows",
                self.retention_cutoff,
                rows.len() - kept.len(),
                rows.len()
            );
        }
        kept
    }

    pub fn qualified_totals(&self, rows: &[Row]) -> QualifiedTotals {
        let total_qualified = self
            .retained(rows)
            .into_iter()
            .filter(|row| is_qualified(row))
            .count() as u64;
        QualifiedTotals { total_qualified }
    }

    pub fn qualified_by_sector(&self, rows: &[Row]) -> SectorCounts {
        tally_by_sector(self.retained(rows), is_qualified)
    }

    pub fn attended_by_sector(&self, rows: &[Row]) -> SectorCounts {
        tally_by_sector(self.retained(rows), is_attended)
    }

    /// Non-qualified leads created inside each trailing window.
    pub fn new_leads_kpis(&self, rows: &[Row]) -> LeadWindowCounts {
        let dates: Vec<Option<DateTime<Utc>>> = self
            .retained(rows)
            .into_iter()
            .filter(|row| !is_qualified(row))
            .map(|row| row_date(row, self.clock.offset()))
            .collect();

        LeadWindowCounts::from_fn(|window| {
            dates
                .iter()
                .filter(|date| date_within_window(**date, window.days(), &self.clock))
                .count() as u64
        })
    }

    /// Sales amounts summed inside each trailing window.
    pub fn sales_kpis(&self, rows: &[Row]) -> SalesWindowTotals {
        let sales: Vec<(Option<DateTime<Utc>>, f64)> = self
            .retained(rows)
            .into_iter()
            .map(|row| (row_date(row, self.clock.offset()), row_amount(row)))
            .collect();

        SalesWindowTotals::from_fn(|window| {
            sales
                .iter()
                .filter(|(date, _)| date_within_window(*date, window.days(), &self.clock))
                .map(|(_, amount)| amount)
                .sum()
        })
    }

    /// Client counts per UF; rows without a recognizable state are skipped.
    pub fn clients_by_state(&self, rows: &[Row]) -> StateAggregate {
        let mut aggregate = StateAggregate::new();
        for row in self.retained(rows) {
            if let Some(uf) = row_state(row) {
                aggregate.record(&uf, is_reposicao(row));
            }
        }
        aggregate
    }
}
