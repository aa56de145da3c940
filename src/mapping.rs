use crate::schema::{Row, SectorKey};
use serde_json::Value;

/// Bot stage codes and the sector each one stands for.
pub const SECTOR_TABLE: [(i64, SectorKey); 5] = [
    (1, SectorKey::Nenhum),
    (2, SectorKey::PrivateLabel),
    (3, SectorKey::Atacado),
    (4, SectorKey::Exportacao),
    (5, SectorKey::ConsumoProprio),
];

/// Stages that mean the bot attended the lead.
pub const ATTENDED_STAGES: [i64; 4] = [2, 3, 4, 5];

pub const STATE_FIELDS: [&str; 4] = ["company_state", "state", "estado", "uf"];

/// Upper-case state names, with and without diacritics, to UF codes.
const UF_BY_NAME: &[(&str, &str)] = &[
    ("ACRE", "AC"),
    ("ALAGOAS", "AL"),
    ("AMAPÁ", "AP"),
    ("AMAPA", "AP"),
    ("AMAZONAS", "AM"),
    ("BAHIA", "BA"),
    ("CEARÁ", "CE"),
    ("CEARA", "CE"),
    ("DISTRITO FEDERAL", "DF"),
    ("ESPÍRITO SANTO", "ES"),
    ("ESPIRITO SANTO", "ES"),
    ("GOIÁS", "GO"),
    ("GOIAS", "GO"),
    ("MARANHÃO", "MA"),
    ("MARANHAO", "MA"),
    ("MATO GROSSO", "MT"),
    ("MATO GROSSO DO SUL", "MS"),
    ("MINAS GERAIS", "MG"),
    ("PARÁ", "PA"),
    ("PARA", "PA"),
    ("PARAÍBA", "PB"),
    ("PARAIBA", "PB"),
    ("PARANÁ", "PR"),
    ("PARANA", "PR"),
    ("PERNAMBUCO", "PE"),
    ("PIAUÍ", "PI"),
    ("PIAUI", "PI"),
    ("RIO DE JANEIRO", "RJ"),
    ("RIO GRANDE DO NORTE", "RN"),
    ("RIO GRANDE DO SUL", "RS"),
    ("RONDÔNIA", "RO"),
    ("RONDONIA", "RO"),
    ("RORAIMA", "RR"),
    ("SANTA CATARINA", "SC"),
    ("SÃO PAULO", "SP"),
    ("SAO PAULO", "SP"),
    ("SERGIPE", "SE"),
    ("TOCANTINS", "TO"),
];

pub fn map_sector(code: i64) -> SectorKey {
    SECTOR_TABLE
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, sector)| *sector)
        .unwrap_or(SectorKey::Nenhum)
}

/// Integer stage from a number or a numeric string. Fractions are not stages.
pub fn stage_code(value: &Value) -> Option<i64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if n.fract() != 0.0 || !n.is_finite() {
        return None;
    }
    Some(n as i64)
}

pub fn row_stage(row: &Row) -> Option<i64> {
    row.get("bot_stage").and_then(stage_code)
}

/// Sector of a lead row; rows without a usable stage are `nenhum`.
pub fn row_sector(row: &Row) -> SectorKey {
    row_stage(row).map(map_sector).unwrap_or(SectorKey::Nenhum)
}

pub fn is_attended_stage(row: &Row) -> bool {
    row_stage(row).is_some_and(|code| ATTENDED_STAGES.contains(&code))
}

/// UF code for a state name or code, `None` when unrecognized.
///
/// Two-character input is taken as a code and only upper-cased.
pub fn normalize_state(input: &str) -> Option<String> {
    let s = input.trim().to_uppercase();
    if s.is_empty() {
        return None;
    }
    if s.chars().count() == 2 {
        return Some(s);
    }
    UF_BY_NAME
        .iter()
        .find(|(name, _)| *name == s)
        .map(|(_, uf)| (*uf).to_string())
}

pub fn row_state(row: &Row) -> Option<String> {
    STATE_FIELDS
        .iter()
        .filter_map(|key| row.get(*key).and_then(Value::as_str))
        .find_map(normalize_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeSet;

    #[test]
    fn test_map_sector_is_total() {
        assert_eq!(map_sector(1), SectorKey::Nenhum);
        assert_eq!(map_sector(2), SectorKey::PrivateLabel);
        assert_eq!(map_sector(3), SectorKey::Atacado);
        assert_eq!(map_sector(4), SectorKey::Exportacao);
        assert_eq!(map_sector(5), SectorKey::ConsumoProprio);
        for code in [i64::MIN, -1, 0, 6, 42, i64::MAX] {
            assert_eq!(map_sector(code), SectorKey::Nenhum);
        }
    }

    #[test]
    fn test_stage_code_coercion() {
        assert_eq!(stage_code(&json!(3)), Some(3));
        assert_eq!(stage_code(&json!(" 4 ")), Some(4));
        assert_eq!(stage_code(&json!(2.0)), Some(2));
        assert_eq!(stage_code(&json!(2.5)), None);
        assert_eq!(stage_code(&json!("dois")), None);
        assert_eq!(stage_code(&json!(null)), None);
        assert_eq!(stage_code(&json!(true)), None);
    }

    #[test]
    fn test_normalize_state() {
        assert_eq!(normalize_state("São Paulo").as_deref(), Some("SP"));
        assert_eq!(normalize_state("SAO PAULO").as_deref(), Some("SP"));
        assert_eq!(normalize_state("sp").as_deref(), Some("SP"));
        assert_eq!(normalize_state("  rio grande do sul ").as_deref(), Some("RS"));
        assert_eq!(normalize_state("Paraíba").as_deref(), Some("PB"));
        assert_eq!(normalize_state("xx").as_deref(), Some("XX"));
        assert_eq!(normalize_state("Atlantis"), None);
        assert_eq!(normalize_state(""), None);
    }

    #[test]
    fn test_all_federative_units_covered() {
        let codes: BTreeSet<&str> = UF_BY_NAME.iter().map(|(_, uf)| *uf).collect();
        assert_eq!(codes.len(), 27);
    }

    #[test]
    fn test_row_state_and_sector() {
        let row = json!({"company_state": "Minas Gerais", "bot_stage": "3"})
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(row_state(&row).as_deref(), Some("MG"));
        assert_eq!(row_sector(&row), SectorKey::Atacado);
        assert!(is_attended_stage(&row));

        let row = json!({"company_state": "Nárnia", "uf": "ba", "bot_stage": 1})
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(row_state(&row).as_deref(), Some("BA"));
        assert!(!is_attended_stage(&row));

        let row = json!({"bot_stage": null}).as_object().cloned().unwrap();
        assert_eq!(row_state(&row), None);
        assert_eq!(row_sector(&row), SectorKey::Nenhum);
    }
}
