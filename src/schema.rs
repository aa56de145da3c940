use crate::error::KpiError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A loosely-structured row as returned by the upstream tables.
///
/// Column order is preserved so heuristic key scans visit columns in the
/// order the backend sent them.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Sentinel used for names and phone numbers that could not be derived.
pub const MISSING_FIELD: &str = "—";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceTable {
    #[schemars(description = "Leads captured from Google campaigns and worked by the qualification bot")]
    LeadsGoogle,

    #[schemars(description = "Wholesale leads handed to the closer, with state and reposition flags")]
    LeadsCloserAtacado,

    #[schemars(description = "Wholesale sales with free-form amount and date columns")]
    VendasAtacado,
}

impl SourceTable {
    pub const ALL: [SourceTable; 3] = [
        SourceTable::LeadsGoogle,
        SourceTable::LeadsCloserAtacado,
        SourceTable::VendasAtacado,
    ];

    /// Name of the table on the backend.
    pub fn table_name(&self) -> &'static str {
        match self {
            SourceTable::LeadsGoogle => "leads-google",
            SourceTable::LeadsCloserAtacado => "leads-closer-atacado",
            SourceTable::VendasAtacado => "vendas_atacado",
        }
    }
}

impl fmt::Display for SourceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SectorKey {
    PrivateLabel,
    Atacado,
    Exportacao,
    ConsumoProprio,
    Nenhum,
}

impl SectorKey {
    pub const ALL: [SectorKey; 5] = [
        SectorKey::PrivateLabel,
        SectorKey::Atacado,
        SectorKey::Exportacao,
        SectorKey::ConsumoProprio,
        SectorKey::Nenhum,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectorKey::PrivateLabel => "private_label",
            SectorKey::Atacado => "atacado",
            SectorKey::Exportacao => "exportacao",
            SectorKey::ConsumoProprio => "consumo_proprio",
            SectorKey::Nenhum => "nenhum",
        }
    }

    /// Display label used by the dashboard tables.
    pub fn label(&self) -> &'static str {
        match self {
            SectorKey::PrivateLabel => "Private Label",
            SectorKey::Atacado => "Atacado",
            SectorKey::Exportacao => "Exportação",
            SectorKey::ConsumoProprio => "Consumo Próprio",
            SectorKey::Nenhum => "Nenhum",
        }
    }
}

impl fmt::Display for SectorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lead counts per sector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SectorCounts {
    pub private_label: u64,
    pub atacado: u64,
    pub exportacao: u64,
    pub consumo_proprio: u64,
    pub nenhum: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SectorShare {
    pub sector: SectorKey,
    pub label: String,
    pub count: u64,
    #[schemars(description = "Share of the sector in the total, 0.0 to 100.0")]
    pub percentage: f64,
}

impl SectorCounts {
    pub fn increment(&mut self, sector: SectorKey) {
        *self.slot_mut(sector) += 1;
    }

    pub fn get(&self, sector: SectorKey) -> u64 {
        match sector {
            SectorKey::PrivateLabel => self.private_label,
            SectorKey::Atacado => self.atacado,
            SectorKey::Exportacao => self.exportacao,
            SectorKey::ConsumoProprio => self.consumo_proprio,
            SectorKey::Nenhum => self.nenhum,
        }
    }

    pub fn total(&self) -> u64 {
        SectorKey::ALL.iter().map(|s| self.get(*s)).sum()
    }

    /// Count and percentage of each sector, in `SectorKey::ALL` order.
    pub fn shares(&self) -> Vec<SectorShare> {
        let total = self.total();
        SectorKey::ALL
            .iter()
            .map(|sector| {
                let count = self.get(*sector);
                let percentage = if total > 0 {
                    count as f64 / total as f64 * 100.0
                } else {
                    0.0
                };
                SectorShare {
                    sector: *sector,
                    label: sector.label().to_string(),
                    count,
                    percentage,
                }
            })
            .collect()
    }

    fn slot_mut(&mut self, sector: SectorKey) -> &mut u64 {
        match sector {
            SectorKey::PrivateLabel => &mut self.private_label,
            SectorKey::Atacado => &mut self.atacado,
            SectorKey::Exportacao => &mut self.exportacao,
            SectorKey::ConsumoProprio => &mut self.consumo_proprio,
            SectorKey::Nenhum => &mut self.nenhum,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct QualifiedTotals {
    pub total_qualified: u64,
}

/// The fixed trailing windows reported by every time-series KPI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum KpiWindow {
    Today,
    Last7,
    Last15,
    Last30,
}

impl KpiWindow {
    pub const ALL: [KpiWindow; 4] = [
        KpiWindow::Today,
        KpiWindow::Last7,
        KpiWindow::Last15,
        KpiWindow::Last30,
    ];

    pub fn days(&self) -> u32 {
        match self {
            KpiWindow::Today => 1,
            KpiWindow::Last7 => 7,
            KpiWindow::Last15 => 15,
            KpiWindow::Last30 => 30,
        }
    }
}

/// New (non-qualified) lead counts per trailing window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LeadWindowCounts {
    pub today: u64,
    pub last7: u64,
    pub last15: u64,
    pub last30: u64,
}

impl LeadWindowCounts {
    pub fn from_fn(mut count: impl FnMut(KpiWindow) -> u64) -> Self {
        Self {
            today: count(KpiWindow::Today),
            last7: count(KpiWindow::Last7),
            last15: count(KpiWindow::Last15),
            last30: count(KpiWindow::Last30),
        }
    }

    pub fn get(&self, window: KpiWindow) -> u64 {
        match window {
            KpiWindow::Today => self.today,
            KpiWindow::Last7 => self.last7,
            KpiWindow::Last15 => self.last15,
            KpiWindow::Last30 => self.last30,
        }
    }
}

/// Wholesale sales amounts (BRL) per trailing window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SalesWindowTotals {
    pub today_total: f64,
    pub last7_total: f64,
    pub last15_total: f64,
    pub last30_total: f64,
}

impl SalesWindowTotals {
    pub fn from_fn(mut sum: impl FnMut(KpiWindow) -> f64) -> Self {
        Self {
            today_total: sum(KpiWindow::Today),
            last7_total: sum(KpiWindow::Last7),
            last15_total: sum(KpiWindow::Last15),
            last30_total: sum(KpiWindow::Last30),
        }
    }

    pub fn get(&self, window: KpiWindow) -> f64 {
        match window {
            KpiWindow::Today => self.today_total,
            KpiWindow::Last7 => self.last7_total,
            KpiWindow::Last15 => self.last15_total,
            KpiWindow::Last30 => self.last30_total,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StateTally {
    pub total: u64,
    pub reposicao: u64,
}

impl StateTally {
    /// Percentage of clients in reposition, 0.0 when the state has none.
    pub fn reposition_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.reposicao as f64 / self.total as f64 * 100.0
    }
}

/// Client counts keyed by two-letter UF code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct StateAggregate(BTreeMap<String, StateTally>);

impl StateAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, uf: &str, reposicao: bool) {
        let tally = self.0.entry(uf.to_string()).or_default();
        tally.total += 1;
        if reposicao {
            tally.reposicao += 1;
        }
    }

    pub fn get(&self, uf: &str) -> Option<&StateTally> {
        self.0.get(uf)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &StateTally)> {
        self.0.iter()
    }

    /// States ordered by total descending, ties broken by code.
    pub fn ranked(&self) -> Vec<(&str, StateTally)> {
        let mut ranked: Vec<(&str, StateTally)> =
            self.0.iter().map(|(uf, t)| (uf.as_str(), *t)).collect();
        ranked.sort_by(|a, b| b.1.total.cmp(&a.1.total).then_with(|| a.0.cmp(b.0)));
        ranked
    }
}

/// Row count and sample columns of one backend table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TableMeta {
    pub name: String,
    pub count: Option<u64>,
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TableMeta {
    pub fn failed(table: SourceTable, error: impl Into<String>) -> Self {
        Self {
            name: table.table_name().to_string(),
            count: None,
            columns: Vec::new(),
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Configuration,
    Transport,
    Status,
    Payload,
    Source,
}

/// Why a KPI could not be computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct KpiFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&KpiError> for KpiFailure {
    fn from(err: &KpiError) -> Self {
        let kind = match err {
            KpiError::Config(_) => FailureKind::Configuration,
            #[cfg(feature = "backend")]
            KpiError::Http(_) => FailureKind::Transport,
            KpiError::BackendStatus { .. } => FailureKind::Status,
            KpiError::UnexpectedPayload { .. } | KpiError::SerializationError(_) => {
                FailureKind::Payload
            }
            KpiError::SourceUnavailable(_) => FailureKind::Source,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

/// A KPI value, or the typed reason it is missing.
///
/// Lets consumers tell a genuine zero from a failed fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum KpiOutcome<T> {
    Ready(T),
    Failed(KpiFailure),
}

impl<T> KpiOutcome<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, KpiOutcome::Ready(_))
    }

    pub fn failure(&self) -> Option<&KpiFailure> {
        match self {
            KpiOutcome::Ready(_) => None,
            KpiOutcome::Failed(failure) => Some(failure),
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            KpiOutcome::Ready(value) => Some(value),
            KpiOutcome::Failed(_) => None,
        }
    }
}

impl<T: Clone + Default> KpiOutcome<T> {
    /// The value, or the zeroed default the dashboard shows on failure.
    pub fn value_or_default(&self) -> T {
        self.ready().cloned().unwrap_or_default()
    }
}

impl<T> From<crate::error::Result<T>> for KpiOutcome<T> {
    fn from(result: crate::error::Result<T>) -> Self {
        match result {
            Ok(value) => KpiOutcome::Ready(value),
            Err(err) => KpiOutcome::Failed(KpiFailure::from(&err)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DashboardPage {
    #[schemars(description = "Landing page: attended leads by sector, sales windows, new lead windows")]
    Overview,

    #[schemars(description = "Wholesale sales page: sales windows and clients by state")]
    Sales,

    #[schemars(description = "Lead qualification page: new lead windows, attended by sector, qualified totals")]
    Leads,
}

/// Everything one dashboard page renders. KPIs the page does not show are absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DashboardSnapshot {
    pub page: DashboardPage,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attended_by_sector: Option<KpiOutcome<SectorCounts>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualified: Option<KpiOutcome<QualifiedTotals>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_leads: Option<KpiOutcome<LeadWindowCounts>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales: Option<KpiOutcome<SalesWindowTotals>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clients_by_state: Option<KpiOutcome<StateAggregate>>,

    #[schemars(description = "Human-readable diagnostic when the backend is not configured")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_warning: Option<String>,
}

impl DashboardSnapshot {
    pub fn empty(page: DashboardPage) -> Self {
        Self {
            page,
            attended_by_sector: None,
            qualified: None,
            new_leads: None,
            sales: None,
            clients_by_state: None,
            config_warning: None,
        }
    }

    /// True when any KPI on the page failed.
    pub fn has_failures(&self) -> bool {
        let failed = [
            self.attended_by_sector.as_ref().map(KpiOutcome::is_ready),
            self.qualified.as_ref().map(KpiOutcome::is_ready),
            self.new_leads.as_ref().map(KpiOutcome::is_ready),
            self.sales.as_ref().map(KpiOutcome::is_ready),
            self.clients_by_state.as_ref().map(KpiOutcome::is_ready),
        ];
        failed.iter().any(|ready| *ready == Some(false))
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(DashboardSnapshot)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
