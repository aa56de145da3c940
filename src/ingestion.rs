use crate::engine::is_reposicao;
use crate::normalize::{flag, row_name, row_number};
use crate::schema::Row;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LISTING_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BasicLead {
    pub name: String,
    #[schemars(description = "Digits with an optional leading '+', or '—' when unknown")]
    pub number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BasicLeadAtacado {
    #[serde(flatten)]
    pub lead: BasicLead,
    pub reposicao: bool,
    pub active: bool,
}

impl From<&Row> for BasicLead {
    fn from(row: &Row) -> Self {
        Self {
            name: row_name(row),
            number: row_number(row),
        }
    }
}

impl From<&Row> for BasicLeadAtacado {
    fn from(row: &Row) -> Self {
        Self {
            lead: BasicLead::from(row),
            reposicao: is_reposicao(row),
            active: flag(row, "active"),
        }
    }
}

/// The first `limit` rows as name/number pairs.
pub fn basic_leads<'a>(rows: impl IntoIterator<Item = &'a Row>, limit: usize) -> Vec<BasicLead> {
    rows.into_iter().take(limit).map(BasicLead::from).collect()
}

pub fn basic_leads_atacado<'a>(
    rows: impl IntoIterator<Item = &'a Row>,
    limit: usize,
) -> Vec<BasicLeadAtacado> {
    rows.into_iter()
        .take(limit)
        .map(BasicLeadAtacado::from)
        .collect()
}
