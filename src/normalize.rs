//! Field extraction for rows whose column names vary between tables and over time.
//!
//! Every attribute is described by a [`FieldRule`]: an ordered list of exact
//! column names, then a pattern matched against every column name in row order.
//! Extraction never fails; callers get `None` and pick their own default.

use crate::schema::{Row, MISSING_FIELD};
use crate::utils::parse_flexible_date;
use chrono::{DateTime, FixedOffset, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static NAME_KEYS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)name|nome|client|company|fantasia|razao").expect("valid name key regex")
});
static PHONE_KEYS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)phone|whats|tel|cel").expect("valid phone key regex"));
static DATE_KEYS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)date|data|_at|created|updated|timestamp").expect("valid date key regex")
});
static AMOUNT_KEYS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)valor|total|amount|price").expect("valid amount key regex"));

static CURRENCY_SYMBOL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[Rr]\$\s?").expect("valid currency regex"));
static DECIMAL_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?(?:\d+(?:\.\d*)?|\.\d+)").expect("valid decimal regex"));

/// Where a field value was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    Candidate,
    Pattern,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldMatch<T> {
    pub key: String,
    pub value: T,
    pub source: MatchSource,
}

/// Exact column names tried first, then a pattern over all column names.
pub struct FieldRule {
    pub candidates: &'static [&'static str],
    pub pattern: &'static Lazy<Regex>,
}

pub static NAME_RULE: FieldRule = FieldRule {
    candidates: &[
        "name",
        "nome",
        "client",
        "cliente",
        "company",
        "company_name",
        "fantasia",
        "razao_social",
        "lead_name",
        "contact_name",
    ],
    pattern: &NAME_KEYS,
};

pub static PHONE_RULE: FieldRule = FieldRule {
    candidates: &[
        "number",
        "phone",
        "telefone",
        "whatsapp",
        "contact",
        "contato",
        "celular",
        "msisdn",
        "numero",
        "número",
        "phone_number",
    ],
    pattern: &PHONE_KEYS,
};

pub static DATE_RULE: FieldRule = FieldRule {
    candidates: &[
        "created_at",
        "timestamp",
        "date",
        "inserted_at",
        "data",
        "data_venda",
        "dataVenda",
        "dt_venda",
        "data_pedido",
        "pedido_data",
    ],
    pattern: &DATE_KEYS,
};

pub static AMOUNT_RULE: FieldRule = FieldRule {
    candidates: &[
        "valor",
        "value",
        "amount",
        "total",
        "price",
        "valor_total",
        "valorPedido",
        "valor_pedido",
    ],
    pattern: &AMOUNT_KEYS,
};

impl FieldRule {
    /// Returns the first value `parse` accepts, candidates before pattern matches.
    pub fn extract<T>(
        &self,
        row: &Row,
        mut parse: impl FnMut(&Value) -> Option<T>,
    ) -> Option<FieldMatch<T>> {
        for key in self.candidates {
            if let Some(value) = row.get(*key).and_then(&mut parse) {
                return Some(FieldMatch {
                    key: (*key).to_string(),
                    value,
                    source: MatchSource::Candidate,
                });
            }
        }

        let pattern: &Regex = self.pattern;
        for (key, raw) in row {
            if !pattern.is_match(key) {
                continue;
            }
            if let Some(value) = parse(raw) {
                return Some(FieldMatch {
                    key: key.clone(),
                    value,
                    source: MatchSource::Pattern,
                });
            }
        }

        None
    }
}

/// Scalar coercion to text, `None` for null, arrays and objects.
pub fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// True only when `key` holds the boolean `true`.
pub fn flag(row: &Row, key: &str) -> bool {
    matches!(row.get(key), Some(Value::Bool(true)))
}

fn non_blank_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

pub fn row_name(row: &Row) -> String {
    if let Some(found) = NAME_RULE.extract(row, non_blank_text) {
        return found.value;
    }

    let combo = ["nome", "company_name", "fantasia"]
        .iter()
        .filter_map(|key| row.get(*key))
        .filter(|value| is_truthy(value))
        .filter_map(value_as_text)
        .collect::<Vec<_>>()
        .join(" ");
    let combo = combo.trim();

    if combo.is_empty() {
        MISSING_FIELD.to_string()
    } else {
        combo.to_string()
    }
}

/// Canonical phone text: messaging suffix and separators removed, digits
/// and `+` kept, leading zeros dropped unless the number starts with `+`.
pub fn canonicalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    let local = trimmed.split('@').next().unwrap_or_default();
    let kept: String = local
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();

    let canonical = if kept.starts_with('+') {
        kept.as_str()
    } else {
        kept.trim_start_matches('0')
    };

    if canonical.is_empty() {
        MISSING_FIELD.to_string()
    } else {
        canonical.to_string()
    }
}

pub fn parse_phone(raw: &Value) -> String {
    match raw {
        Value::Null => MISSING_FIELD.to_string(),
        Value::Number(n) => n.to_string(),
        other => value_as_text(other)
            .map(|s| canonicalize_phone(&s))
            .unwrap_or_else(|| MISSING_FIELD.to_string()),
    }
}

pub fn row_number(row: &Row) -> String {
    PHONE_RULE
        .extract(row, |value| match value {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            other => Some(parse_phone(other)),
        })
        .map(|found| found.value)
        .unwrap_or_else(|| MISSING_FIELD.to_string())
}

/// Parses a BRL amount from a number or a formatted string, 0.0 when unparsable.
///
/// `"R$ 1.234,56"` is 1234.56. When the last comma follows the last dot the
/// comma is the decimal separator and dots group thousands. Anything else is
/// read up to its first non-numeric character, so `"1,234.50"` is 1.0.
pub fn parse_amount_brl(input: &Value) -> f64 {
    match input {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => parse_amount_str(s),
        _ => 0.0,
    }
}

pub fn parse_amount_str(input: &str) -> f64 {
    let without_symbol = CURRENCY_SYMBOL.replace_all(input.trim(), "");
    let mut s: String = without_symbol
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();

    if let Some(comma) = s.rfind(',') {
        if s.rfind('.').map_or(true, |dot| comma > dot) {
            s = s.replace('.', "").replacen(',', ".", 1);
        }
    }

    DECIMAL_PREFIX
        .find(&s)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}

/// First non-zero amount in the row, 0.0 when none.
pub fn row_amount(row: &Row) -> f64 {
    AMOUNT_RULE
        .extract(row, |value| {
            if value.is_null() {
                return None;
            }
            Some(parse_amount_brl(value)).filter(|n| *n != 0.0)
        })
        .map(|found| found.value)
        .unwrap_or(0.0)
}

pub fn row_date(row: &Row, offset: &FixedOffset) -> Option<DateTime<Utc>> {
    row_date_match(row, offset).map(|found| found.value)
}

pub fn row_date_match(row: &Row, offset: &FixedOffset) -> Option<FieldMatch<DateTime<Utc>>> {
    DATE_RULE.extract(row, |value| parse_flexible_date(value, offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn test_parse_amount_brl() {
        assert_eq!(parse_amount_brl(&json!("R$ 1.234,56")), 1234.56);
        assert_eq!(parse_amount_brl(&json!("")), 0.0);
        assert_eq!(parse_amount_brl(&json!(1500)), 1500.0);
        assert_eq!(parse_amount_brl(&json!("r$99,9")), 99.9);
        assert_eq!(parse_amount_brl(&json!("1.234.567,00")), 1_234_567.0);
        assert_eq!(parse_amount_brl(&json!("1,234.50")), 1.0);
        assert_eq!(parse_amount_brl(&json!("2,5.10")), 2.0);
        assert_eq!(parse_amount_brl(&json!("250.75")), 250.75);
        assert_eq!(parse_amount_brl(&json!("-R$ 10,00")), -10.0);
        assert_eq!(parse_amount_brl(&json!("a combinar")), 0.0);
        assert_eq!(parse_amount_brl(&json!(null)), 0.0);
        assert_eq!(parse_amount_brl(&json!(true)), 0.0);
    }

    #[test]
    fn test_parse_phone() {
        assert_eq!(
            parse_phone(&json!("5511999998888@s.whatsapp.net")),
            "5511999998888"
        );
        assert_eq!(parse_phone(&json!("011 999-998888")), "11999998888");
        assert_eq!(parse_phone(&json!("+55 (11) 99999-8888")), "+5511999998888");
        assert_eq!(parse_phone(&json!("+0055 11")), "+005511");
        assert_eq!(parse_phone(&json!(5511999998888_i64)), "5511999998888");
        assert_eq!(parse_phone(&json!(null)), MISSING_FIELD);
        assert_eq!(parse_phone(&json!("sem telefone")), MISSING_FIELD);
        assert_eq!(parse_phone(&json!("000")), MISSING_FIELD);
    }

    #[test]
    fn test_row_number_candidates_then_pattern() {
        let r = row(json!({"whatsapp": "5511988887777@s.whatsapp.net", "phone": "1133334444"}));
        assert_eq!(row_number(&r), "1133334444");

        let r = row(json!({"id": 4, "cel_contato": "(21) 97777-6666"}));
        assert_eq!(row_number(&r), "21977776666");

        let r = row(json!({"id": 4, "email": "x@y.com"}));
        assert_eq!(row_number(&r), MISSING_FIELD);
    }

    #[test]
    fn test_row_name() {
        let r = row(json!({"nome": "  ", "cliente": " Padaria Sol ", "name": null}));
        assert_eq!(row_name(&r), "Padaria Sol");

        let r = row(json!({"nome_responsavel": "Joana"}));
        assert_eq!(row_name(&r), "Joana");

        let r = row(json!({"nome": 42, "fantasia": 0}));
        assert_eq!(row_name(&r), "42");

        let r = row(json!({"id": 1}));
        assert_eq!(row_name(&r), MISSING_FIELD);
    }

    #[test]
    fn test_row_amount_skips_zero_candidates() {
        let r = row(json!({"valor": 0, "total": "R$ 80,00"}));
        assert_eq!(row_amount(&r), 80.0);

        let r = row(json!({"id": 9, "preco_valor_final": "12,5"}));
        assert_eq!(row_amount(&r), 12.5);

        let r = row(json!({"id": 9, "descricao": "caixa"}));
        assert_eq!(row_amount(&r), 0.0);
    }

    #[test]
    fn test_row_date_candidate_and_pattern() {
        let r = row(json!({"created_at": "lixo", "data_venda": "05/10/2025"}));
        let found = row_date_match(&r, &utc()).unwrap();
        assert_eq!(found.key, "data_venda");
        assert_eq!(found.source, MatchSource::Candidate);
        assert_eq!(found.value, Utc.with_ymd_and_hms(2025, 10, 5, 0, 0, 0).unwrap());

        let r = row(json!({"id": 3, "fechado_em": "x", "updatedAt": "2025-10-07T10:00:00Z"}));
        let found = row_date_match(&r, &utc()).unwrap();
        assert_eq!(found.key, "updatedAt");
        assert_eq!(found.source, MatchSource::Pattern);

        let r = row(json!({"id": 3, "nome": "Sem data"}));
        assert_eq!(row_date(&r, &utc()), None);
    }

    #[test]
    fn test_flag_is_strict() {
        let r = row(json!({"a": true, "b": "true", "c": 1, "d": false}));
        assert!(flag(&r, "a"));
        assert!(!flag(&r, "b"));
        assert!(!flag(&r, "c"));
        assert!(!flag(&r, "d"));
        assert!(!flag(&r, "missing"));
    }
}
