//! Aggregations over the cleaned transaction table.
//!
//! Every function here is total: an empty table, or a filter that matches nothing, yields zeros
//! or an empty list.

use crate::model::{FlowType, MonthBucket, Transaction, Transactions};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The month selection that means "every month".
pub const ALL_MONTHS: &str = "Saldo Atual";

/// Income, expense and their difference over some set of rows.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub income: Decimal,
    pub expense: Decimal,
    pub balance: Decimal,
}

impl Balance {
    fn of<'a>(rows: impl IntoIterator<Item = &'a Transaction>) -> Self {
        let mut income = Decimal::ZERO;
        let mut expense = Decimal::ZERO;
        for t in rows {
            match t.flow() {
                FlowType::Income => income += t.amount().value(),
                FlowType::Expense => expense += t.amount().value(),
            }
        }
        Self {
            income,
            expense,
            balance: income - expense,
        }
    }
}

/// Which rows a monthly balance is computed over.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonthSelection {
    /// Every row, labelled `Saldo Atual`.
    #[default]
    All,
    Month(MonthBucket),
}

impl fmt::Display for MonthSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonthSelection::All => f.write_str(ALL_MONTHS),
            MonthSelection::Month(m) => fmt::Display::fmt(m, f),
        }
    }
}

impl FromStr for MonthSelection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == ALL_MONTHS {
            Ok(MonthSelection::All)
        } else {
            Ok(MonthSelection::Month(s.parse()?))
        }
    }
}

/// One row of the monthly trend table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyTrend {
    pub month: MonthBucket,
    pub income: Decimal,
    pub expense: Decimal,
    pub balance: Decimal,
}

/// Sum of amounts whose flow type is Income.
pub fn total_income(table: &Transactions) -> Decimal {
    balance(table).income
}

/// Sum of amounts whose flow type is Expense. Unmapped categories count here.
pub fn total_expense(table: &Transactions) -> Decimal {
    balance(table).expense
}

/// Income, expense and balance over the whole table.
pub fn balance(table: &Transactions) -> Balance {
    Balance::of(table.iter())
}

/// Income, expense and balance over one month, or over everything for `MonthSelection::All`.
pub fn monthly_balance(table: &Transactions, selection: MonthSelection) -> Balance {
    match selection {
        MonthSelection::All => balance(table),
        MonthSelection::Month(month) => Balance::of(table.iter().filter(|t| t.month() == month)),
    }
}

/// The month selector's options: `Saldo Atual` first, then every month present, newest first.
pub fn available_months(table: &Transactions) -> Vec<MonthSelection> {
    let months: Vec<MonthBucket> = months_present(table);
    std::iter::once(MonthSelection::All)
        .chain(months.into_iter().rev().map(MonthSelection::Month))
        .collect()
}

/// The plain mean of the amounts of every row with this category label.
pub fn category_average(table: &Transactions, category: &str) -> Decimal {
    let amounts: Vec<Decimal> = matching(table, category)
        .map(|t| t.amount().value())
        .collect();
    mean(&amounts)
}

/// Rows with this category label are summed per month, then those monthly sums are averaged over
/// the months that have at least one such row.
pub fn detailed_category_monthly_average(table: &Transactions, category: &str) -> Decimal {
    let mut per_month: BTreeMap<MonthBucket, Decimal> = BTreeMap::new();
    for t in matching(table, category) {
        *per_month.entry(t.month()).or_default() += t.amount().value();
    }
    let sums: Vec<Decimal> = per_month.into_values().collect();
    mean(&sums)
}

/// Income, expense and balance for every month present, oldest first.
pub fn monthly_trend(table: &Transactions) -> Vec<MonthlyTrend> {
    let mut per_month: BTreeMap<MonthBucket, Vec<&Transaction>> = BTreeMap::new();
    for t in table.iter() {
        per_month.entry(t.month()).or_default().push(t);
    }
    per_month
        .into_iter()
        .map(|(month, rows)| {
            let b = Balance::of(rows);
            MonthlyTrend {
                month,
                income: b.income,
                expense: b.expense,
                balance: b.balance,
            }
        })
        .collect()
}

/// Expense totals per principal category, largest first. Ties are ordered by name.
pub fn expense_by_principal(table: &Transactions) -> Vec<(String, Decimal)> {
    let mut totals: BTreeMap<&str, Decimal> = BTreeMap::new();
    for t in table.iter().filter(|t| t.flow() == FlowType::Expense) {
        *totals.entry(t.principal()).or_default() += t.amount().value();
    }
    let mut out: Vec<(String, Decimal)> = totals
        .into_iter()
        .map(|(name, total)| (name.to_string(), total))
        .collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}

/// The distinct category labels in the table, sorted.
pub fn category_labels(table: &Transactions) -> Vec<String> {
    let mut labels: Vec<String> = table.iter().map(|t| t.category().to_string()).collect();
    labels.sort();
    labels.dedup();
    labels
}

fn months_present(table: &Transactions) -> Vec<MonthBucket> {
    let mut months: Vec<MonthBucket> = table.iter().map(|t| t.month()).collect();
    months.sort();
    months.dedup();
    months
}

fn matching<'a>(table: &'a Transactions, category: &'a str) -> impl Iterator<Item = &'a Transaction> {
    let category = crate::model::category::normalize_label(category);
    table.iter().filter(move |t| t.category() == category)
}

fn mean(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    let sum: Decimal = values.iter().sum();
    sum / Decimal::from(values.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn table(rows: &[(&str, &str, &str)]) -> Transactions {
        let mut sheet = vec![vec!["Data".to_string(), "Categorias".into(), "Valor".into()]];
        for (date, category, amount) in rows {
            sheet.push(vec![date.to_string(), category.to_string(), amount.to_string()]);
        }
        Transactions::parse(sheet)
    }

    fn scenario() -> Transactions {
        table(&[
            ("01/01/24", "Receita", "1000,00"),
            ("05/01/24", "Despesa Casa", "300,00"),
            ("10/02/24", "Receita", "1000,00"),
            ("12/02/24", "Despesa Casa", "400,00"),
        ])
    }

    #[test]
    fn test_scenario_trend_and_balance() {
        let t = scenario();
        let trend = monthly_trend(&t);
        assert_eq!(
            trend,
            vec![
                MonthlyTrend {
                    month: "Jan/2024".parse().unwrap(),
                    income: dec("1000"),
                    expense: dec("300"),
                    balance: dec("700"),
                },
                MonthlyTrend {
                    month: "Feb/2024".parse().unwrap(),
                    income: dec("1000"),
                    expense: dec("400"),
                    balance: dec("600"),
                },
            ]
        );
        assert_eq!(balance(&t).balance, dec("1300"));
        assert_eq!(total_income(&t), dec("2000"));
        assert_eq!(total_expense(&t), dec("700"));
    }

    #[test]
    fn test_trend_is_chronological_not_insertion_order() {
        let t = table(&[
            ("03/02/24", "Luz", "10,00"),
            ("03/12/23", "Luz", "20,00"),
            ("03/01/24", "Luz", "30,00"),
        ]);
        let months: Vec<String> = monthly_trend(&t).iter().map(|r| r.month.to_string()).collect();
        assert_eq!(months, vec!["Dec/2023", "Jan/2024", "Feb/2024"]);
    }

    #[test]
    fn test_empty_table_is_neutral() {
        let t = Transactions::default();
        assert_eq!(balance(&t), Balance::default());
        assert_eq!(category_average(&t, "Despesa Casa"), Decimal::ZERO);
        assert_eq!(detailed_category_monthly_average(&t, "Despesa Casa"), Decimal::ZERO);
        assert!(monthly_trend(&t).is_empty());
        assert!(expense_by_principal(&t).is_empty());
        assert_eq!(available_months(&t), vec![MonthSelection::All]);
        let jan: MonthBucket = "Jan/2024".parse().unwrap();
        assert_eq!(monthly_balance(&t, MonthSelection::Month(jan)), Balance::default());
    }

    #[test]
    fn test_all_months_equals_balance() {
        let t = scenario();
        assert_eq!(monthly_balance(&t, MonthSelection::All), balance(&t));
        let selection: MonthSelection = ALL_MONTHS.parse().unwrap();
        assert_eq!(monthly_balance(&t, selection), balance(&t));
    }

    #[test]
    fn test_monthly_balance_filters() {
        let t = scenario();
        let feb: MonthSelection = "Feb/2024".parse().unwrap();
        let b = monthly_balance(&t, feb);
        assert_eq!(b.income, dec("1000"));
        assert_eq!(b.expense, dec("400"));
        assert_eq!(b.balance, dec("600"));
        let mar: MonthSelection = "Mar/2024".parse().unwrap();
        assert_eq!(monthly_balance(&t, mar), Balance::default());
    }

    #[test]
    fn test_unmapped_category_counts_as_expense() {
        let t = table(&[("01/01/24", "Receita", "100,00"), ("02/01/24", "Foobar", "40,00")]);
        assert_eq!(total_income(&t), dec("100"));
        assert_eq!(total_expense(&t), dec("40"));
        assert_eq!(expense_by_principal(&t), vec![("Other".to_string(), dec("40"))]);
    }

    #[test]
    fn test_oversized_cells_count_as_zero() {
        let huge = "50000000000000000000000000000";
        let t = table(&[
            ("01/01/24", "Receita", huge),
            ("02/01/24", "Receita", huge),
            ("03/01/24", "Luz", huge),
            ("04/01/24", "Luz", huge),
            ("05/01/24", "Luz", "10,00"),
        ]);
        assert_eq!(
            balance(&t),
            Balance {
                income: Decimal::ZERO,
                expense: dec("10"),
                balance: dec("-10"),
            }
        );
        assert_eq!(monthly_trend(&t).len(), 1);
        assert_eq!(detailed_category_monthly_average(&t, "Luz"), dec("10"));
        assert_eq!(expense_by_principal(&t), vec![("Housing/Bills".to_string(), dec("10"))]);
    }

    #[test]
    fn test_category_average() {
        let t = table(&[
            ("01/01/24", "Despesa Combustivel", "100,00"),
            ("15/01/24", "Despesa Combustivel", "50,00"),
            ("01/02/24", "Despesa Combustivel", "30,00"),
            ("01/02/24", "Luz", "999,00"),
        ]);
        assert_eq!(category_average(&t, "Despesa Combustivel"), dec("60"));
        assert_eq!(category_average(&t, "despesa combustivel"), dec("60"));
        assert_eq!(category_average(&t, "Dentista"), Decimal::ZERO);
    }

    #[test]
    fn test_detailed_category_monthly_average() {
        let t = table(&[
            ("01/01/24", "Despesa Remedio", "100,00"),
            ("15/01/24", "Despesa Remedio", "50,00"),
            ("01/03/24", "Despesa Remedio", "30,00"),
        ]);
        // Jan = 150, Mar = 30; February has no rows and does not count
        assert_eq!(detailed_category_monthly_average(&t, "Despesa Remedio"), dec("90"));

        let single = table(&[("01/01/24", "Despesa Moto", "70,00"), ("09/01/24", "Despesa Moto", "5,00")]);
        assert_eq!(detailed_category_monthly_average(&single, "Despesa Moto"), dec("75"));
    }

    #[test]
    fn test_available_months_newest_first() {
        let t = scenario();
        let labels: Vec<String> = available_months(&t).iter().map(|m| m.to_string()).collect();
        assert_eq!(labels, vec!["Saldo Atual", "Feb/2024", "Jan/2024"]);
    }

    #[test]
    fn test_expense_by_principal_sorted() {
        let t = table(&[
            ("01/01/24", "Luz", "10,00"),
            ("01/01/24", "Agua", "15,00"),
            ("01/01/24", "Dentista", "200,00"),
            ("01/01/24", "Receita", "5000,00"),
        ]);
        assert_eq!(
            expense_by_principal(&t),
            vec![
                ("Health".to_string(), dec("200")),
                ("Housing/Bills".to_string(), dec("25")),
            ]
        );
    }

    #[test]
    fn test_category_labels() {
        let t = table(&[
            ("01/01/24", "Luz", "10,00"),
            ("01/01/24", "agua", "15,00"),
            ("02/01/24", "Luz", "10,00"),
        ]);
        assert_eq!(category_labels(&t), vec!["Agua", "Luz"]);
    }

    #[test]
    fn test_month_selection_parse() {
        assert_eq!("".parse::<MonthSelection>().unwrap(), MonthSelection::All);
        assert!("nope".parse::<MonthSelection>().is_err());
    }
}
