//! # Sales Lead KPIs
//!
//! Turns loosely-structured lead and sales rows from a hosted backend into the
//! aggregate numbers a sales dashboard renders.
//!
//! ## Core Concepts
//!
//! - **Rows**: arbitrary column maps; column names differ between tables and over time
//! - **Field Normalizer**: ordered candidate columns plus a name pattern per attribute
//!   (name, phone, date, amount); extraction never fails, it falls back to defaults
//! - **Retention cutoff**: rows dated before it are ignored; undated rows are kept
//! - **Trailing windows**: today, 7, 15 and 30 days back from local midnight;
//!   undated rows are never inside a window
//! - **Sectors and states**: bot stage codes map to sectors, state names map to UF codes
//!
//! ## Example
//!
//! ```rust,ignore
//! use sales_lead_kpis::*;
//!
//! let config = BackendConfig::from_env()?;
//! let service = KpiService::from_config(PostgrestClient::new(&config), &config);
//!
//! let overview = service.load_overview().await;
//! if let Some(warning) = &overview.config_warning {
//!     eprintln!("{}", warning);
//! }
//! let sales = overview.sales.map(|s| s.value_or_default()).unwrap_or_default();
//! println!("Sales in the last 7 days: {:.2}", sales.last7_total);
//! ```

pub mod config;
pub mod dashboard;
pub mod engine;
pub mod error;
pub mod filter;
pub mod ingestion;
pub mod mapping;
pub mod normalize;
pub mod schema;
pub mod source;
pub mod utils;

#[cfg(feature = "backend")]
pub mod backend;

#[cfg(feature = "backend")]
pub use backend::PostgrestClient;
pub use config::BackendConfig;
pub use dashboard::KpiService;
pub use engine::{is_attended, is_qualified, is_reposicao, KpiAggregator};
pub use error::{KpiError, Result};
pub use filter::{default_retention_cutoff, within_retention, within_window, KpiClock};
pub use ingestion::*;
pub use mapping::{map_sector, normalize_state};
pub use normalize::{
    parse_amount_brl, parse_phone, row_amount, row_date, row_name, row_number, FieldMatch,
    FieldRule, MatchSource,
};
pub use schema::*;
pub use source::{RowSource, StaticSource};
pub use utils::parse_flexible_date;

use log::info;

/// Every KPI of the dashboard computed from one set of table snapshots.
///
/// Convenience for callers that already hold the rows.
pub fn compute_all(
    aggregator: &KpiAggregator,
    leads_google: &[Row],
    leads_atacado: &[Row],
    vendas_atacado: &[Row],
) -> DashboardSnapshot {
    info!(
        "Computing KPIs for {} leads, {} wholesale leads, {} sales anchored at {}",
        leads_google.len(),
        leads_atacado.len(),
        vendas_atacado.len(),
        aggregator.clock().anchor()
    );

    DashboardSnapshot {
        page: DashboardPage::Overview,
        attended_by_sector: Some(KpiOutcome::Ready(
            aggregator.attended_by_sector(leads_google),
        )),
        qualified: Some(KpiOutcome::Ready(aggregator.qualified_totals(leads_google))),
        new_leads: Some(KpiOutcome::Ready(aggregator.new_leads_kpis(leads_google))),
        sales: Some(KpiOutcome::Ready(aggregator.sales_kpis(vendas_atacado))),
        clients_by_state: Some(KpiOutcome::Ready(
            aggregator.clients_by_state(leads_atacado),
        )),
        config_warning: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate};
    use serde_json::json;

    fn rows(values: Vec<serde_json::Value>) -> Vec<Row> {
        values
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn test_end_to_end_processing() {
        let aggregator = KpiAggregator::with_default_cutoff(KpiClock::at_midnight(
            NaiveDate::from_ymd_opt(2025, 10, 20).unwrap(),
            FixedOffset::east_opt(0).unwrap(),
        ));

        let leads_google = rows(vec![
            json!({"nome": "Ana", "bot_stage": 2, "created_at": "2025-10-19T09:00:00Z"}),
            json!({"nome": "Bia", "bot_stage": 3, "qualified": true, "created_at": "2025-10-18T09:00:00Z"}),
            json!({"nome": "Caio", "bot_stage": 4, "created_at": "2025-09-01T09:00:00Z"}),
        ]);
        let leads_atacado = rows(vec![
            json!({"company_state": "Bahia", "reposicao": true}),
            json!({"company_state": "BA"}),
        ]);
        let vendas = rows(vec![
            json!({"created_at": "2025-10-19T10:00:00Z", "valor": "R$ 2.500,00"}),
            json!({"created_at": "2025-10-01T10:00:00Z", "valor": "R$ 500,00"}),
        ]);

        let snapshot = compute_all(&aggregator, &leads_google, &leads_atacado, &vendas);
        assert!(!snapshot.has_failures());

        let attended = snapshot.attended_by_sector.unwrap().value_or_default();
        assert_eq!(attended.private_label, 1);
        assert_eq!(attended.exportacao, 0);

        assert_eq!(snapshot.qualified.unwrap().value_or_default().total_qualified, 1);

        let leads = snapshot.new_leads.unwrap().value_or_default();
        assert_eq!(leads.today, 1);
        assert_eq!(leads.last30, 1);

        let sales = snapshot.sales.unwrap().value_or_default();
        assert_eq!(sales.today_total, 2500.0);
        assert_eq!(sales.last30_total, 3000.0);

        let states = snapshot.clients_by_state.unwrap().value_or_default();
        assert_eq!(states.get("BA"), Some(&StateTally { total: 2, reposicao: 1 }));
    }
}
