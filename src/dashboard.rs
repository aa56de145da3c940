use crate::config::BackendConfig;
use crate::engine::KpiAggregator;
use crate::error::Result;
use crate::filter::{default_retention_cutoff, KpiClock};
use crate::ingestion::{basic_leads, basic_leads_atacado, BasicLead, BasicLeadAtacado};
use crate::schema::*;
use crate::source::RowSource;
use chrono::{DateTime, Utc};
use log::{debug, error, warn};

/// Fetches each source table and turns it into dashboard KPIs.
///
/// Every operation re-fetches its table and pins its own clock, so calls are
/// independent and may run concurrently. Nothing is cached between calls.
pub struct KpiService<S> {
    source: S,
    retention_cutoff: DateTime<Utc>,
    fixed_clock: Option<KpiClock>,
}

impl<S: RowSource> KpiService<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            retention_cutoff: default_retention_cutoff(),
            fixed_clock: None,
        }
    }

    pub fn from_config(source: S, config: &BackendConfig) -> Self {
        Self::new(source).with_retention_cutoff(config.retention_cutoff)
    }

    pub fn with_retention_cutoff(mut self, cutoff: DateTime<Utc>) -> Self {
        self.retention_cutoff = cutoff;
        self
    }

    /// Uses `clock` for every call instead of today's local midnight.
    pub fn with_clock(mut self, clock: KpiClock) -> Self {
        self.fixed_clock = Some(clock);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn configuration_warning(&self) -> Option<String> {
        self.source.configuration_warning()
    }

    fn aggregator(&self) -> KpiAggregator {
        let clock = self.fixed_clock.unwrap_or_else(KpiClock::now);
        KpiAggregator::new(clock, self.retention_cutoff)
    }

    async fn fetch(&self, table: SourceTable) -> Result<Vec<Row>> {
        let rows = self.source.fetch_rows(table).await?;
        debug!("Loaded {} rows from {}", rows.len(), table);
        Ok(rows)
    }

    pub async fn qualified_totals(&self) -> Result<QualifiedTotals> {
        let aggregator = self.aggregator();
        let rows = self.fetch(SourceTable::LeadsGoogle).await?;
        Ok(aggregator.qualified_totals(&rows))
    }

    pub async fn qualified_by_sector(&self) -> Result<SectorCounts> {
        let aggregator = self.aggregator();
        let rows = self.fetch(SourceTable::LeadsGoogle).await?;
        Ok(aggregator.qualified_by_sector(&rows))
    }

    pub async fn attended_by_sector(&self) -> Result<SectorCounts> {
        let aggregator = self.aggregator();
        let rows = self.fetch(SourceTable::LeadsGoogle).await?;
        Ok(aggregator.attended_by_sector(&rows))
    }

    pub async fn new_leads_kpis(&self) -> Result<LeadWindowCounts> {
        let aggregator = self.aggregator();
        let rows = self.fetch(SourceTable::LeadsGoogle).await?;
        Ok(aggregator.new_leads_kpis(&rows))
    }

    pub async fn sales_kpis(&self) -> Result<SalesWindowTotals> {
        let aggregator = self.aggregator();
        let rows = self.fetch(SourceTable::VendasAtacado).await?;
        Ok(aggregator.sales_kpis(&rows))
    }

    pub async fn clients_by_state(&self) -> Result<StateAggregate> {
        let aggregator = self.aggregator();
        let rows = self.fetch(SourceTable::LeadsCloserAtacado).await?;
        Ok(aggregator.clients_by_state(&rows))
    }

    pub async fn leads_google_basic(&self, limit: usize) -> Result<Vec<BasicLead>> {
        let aggregator = self.aggregator();
        let rows = self.fetch(SourceTable::LeadsGoogle).await?;
        Ok(basic_leads(aggregator.retained(&rows), limit))
    }

    pub async fn leads_atacado_basic(&self, limit: usize) -> Result<Vec<BasicLeadAtacado>> {
        let aggregator = self.aggregator();
        let rows = self.fetch(SourceTable::LeadsCloserAtacado).await?;
        Ok(basic_leads_atacado(aggregator.retained(&rows), limit))
    }

    /// Count and sample columns of every table, one at a time. Failures are
    /// reported inside the matching `TableMeta`.
    pub async fn inspect_tables(&self) -> Vec<TableMeta> {
        let mut metas = Vec::with_capacity(SourceTable::ALL.len());
        for table in SourceTable::ALL {
            let meta = match self.source.inspect_table(table).await {
                Ok(meta) => meta,
                Err(e) => {
                    warn!("Could not inspect table {}: {}", table, e);
                    TableMeta::failed(table, e.to_string())
                }
            };
            metas.push(meta);
        }
        metas
    }

    pub async fn load_page(&self, page: DashboardPage) -> DashboardSnapshot {
        let mut snapshot = DashboardSnapshot::empty(page);
        snapshot.config_warning = self.configuration_warning();

        match page {
            DashboardPage::Overview => {
                let (attended, sales, leads) = futures::join!(
                    self.attended_by_sector(),
                    self.sales_kpis(),
                    self.new_leads_kpis()
                );
                snapshot.attended_by_sector = Some(settle("attended by sector", attended));
                snapshot.sales = Some(settle("sales windows", sales));
                snapshot.new_leads = Some(settle("new lead windows", leads));
            }
            DashboardPage::Sales => {
                let (sales, states) = futures::join!(self.sales_kpis(), self.clients_by_state());
                snapshot.sales = Some(settle("sales windows", sales));
                snapshot.clients_by_state = Some(settle("clients by state", states));
            }
            DashboardPage::Leads => {
                let (leads, attended, qualified) = futures::join!(
                    self.new_leads_kpis(),
                    self.attended_by_sector(),
                    self.qualified_totals()
                );
                snapshot.new_leads = Some(settle("new lead windows", leads));
                snapshot.attended_by_sector = Some(settle("attended by sector", attended));
                snapshot.qualified = Some(settle("qualified totals", qualified));
            }
        }

        snapshot
    }

    pub async fn load_overview(&self) -> DashboardSnapshot {
        self.load_page(DashboardPage::Overview).await
    }

    pub async fn load_sales_page(&self) -> DashboardSnapshot {
        self.load_page(DashboardPage::Sales).await
    }

    pub async fn load_leads_page(&self) -> DashboardSnapshot {
        self.load_page(DashboardPage::Leads).await
    }
}

/// Absorbs a KPI failure into its outcome, logging the cause.
fn settle<T>(label: &str, result: Result<T>) -> KpiOutcome<T> {
    if let Err(e) = &result {
        error!("Failed to load {}: {}", label, e);
    }
    KpiOutcome::from(result)
}
