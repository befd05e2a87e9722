//! The category classifier: maps a detailed category label, as it appears in the `Categorias`
//! column, to its principal category and flow type.

use serde::{Deserialize, Serialize};

/// Whether money comes in or goes out.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum FlowType {
    Income,
    #[default]
    Expense,
}

serde_plain::derive_display_from_serialize!(FlowType);
serde_plain::derive_fromstr_from_deserialize!(FlowType);

/// The principal category and flow type that a detailed label maps to.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct Classification {
    pub principal: &'static str,
    pub flow: FlowType,
}

/// The label that marks income rows.
pub const INCOME_LABEL: &str = "Receita";

/// The principal category of labels missing from the table.
pub const OTHER: &str = "Other";

const INCOME: &str = "Income";
const HOUSING: &str = "Housing/Bills";
const TRANSPORT: &str = "Transport";
const HEALTH: &str = "Health";
const EDUCATION: &str = "Leisure/Education";
const LEISURE: &str = "Leisure/Other";
const DEBT: &str = "Finance/Debt";

/// Detailed label -> (principal category, flow type). Labels are stored normalized.
const CATEGORY_TABLE: &[(&str, &str, FlowType)] = &[
    (INCOME_LABEL, INCOME, FlowType::Income),
    ("Despesa Casa", HOUSING, FlowType::Expense),
    ("Luz", HOUSING, FlowType::Expense),
    ("Agua", HOUSING, FlowType::Expense),
    ("Grafnet", HOUSING, FlowType::Expense),
    ("Claro", HOUSING, FlowType::Expense),
    ("Plano", HOUSING, FlowType::Expense),
    ("Despesa Moto", TRANSPORT, FlowType::Expense),
    ("Despesa Combustivel", TRANSPORT, FlowType::Expense),
    ("Despesa Remedio", HEALTH, FlowType::Expense),
    ("Dentista", HEALTH, FlowType::Expense),
    ("Faculdade", EDUCATION, FlowType::Expense),
    ("Outros Laser/Festa/Reforma", LEISURE, FlowType::Expense),
    ("Nubank", DEBT, FlowType::Expense),
];

const FALLBACK: Classification = Classification {
    principal: OTHER,
    flow: FlowType::Expense,
};

/// Classifies a category label. The label is normalized first, so raw cell text is fine.
///
/// Every label has a classification: anything missing from the table is `("Other", Expense)`.
pub fn classify(label: &str) -> Classification {
    let label = normalize_label(label);
    CATEGORY_TABLE
        .iter()
        .find(|(known, _, _)| *known == label)
        .map(|(_, principal, flow)| Classification {
            principal: *principal,
            flow: *flow,
        })
        .unwrap_or(FALLBACK)
}

/// Trims and title-cases a label: the first letter of every run of letters is upper-cased and
/// the rest lower-cased, so `"  despesa CASA"` becomes `"Despesa Casa"` and `"a/b"` becomes
/// `"A/B"`.
pub fn normalize_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut in_word = false;
    for c in label.trim().chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_labels() {
        let c = classify("Receita");
        assert_eq!(c.principal, "Income");
        assert_eq!(c.flow, FlowType::Income);

        let c = classify("Despesa Casa");
        assert_eq!(c.principal, "Housing/Bills");
        assert_eq!(c.flow, FlowType::Expense);

        assert_eq!(classify("Nubank").principal, "Finance/Debt");
    }

    #[test]
    fn test_classify_normalizes_first() {
        assert_eq!(classify("  despesa COMBUSTIVEL ").principal, "Transport");
        assert_eq!(classify("outros laser/festa/reforma").principal, "Leisure/Other");
        assert_eq!(classify("RECEITA").flow, FlowType::Income);
    }

    #[test]
    fn test_classify_unknown_falls_back() {
        let c = classify("Foobar");
        assert_eq!(c.principal, "Other");
        assert_eq!(c.flow, FlowType::Expense);
        assert_eq!(classify(""), FALLBACK);
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("  despesa CASA"), "Despesa Casa");
        assert_eq!(normalize_label("a/b"), "A/B");
        assert_eq!(normalize_label("água"), "Água");
        assert_eq!(normalize_label("plano 2"), "Plano 2");
    }

    #[test]
    fn test_flow_type_strings() {
        assert_eq!(FlowType::Income.to_string(), "Income");
        assert_eq!("Expense".parse::<FlowType>().unwrap(), FlowType::Expense);
    }
}
