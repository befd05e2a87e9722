use crate::model::category::{classify, normalize_label};
use crate::model::date::{format_sheet_date, parse_sheet_date};
use crate::model::{Amount, FlowType, MonthBucket};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub(crate) const DATE_STR: &str = "Data";
pub(crate) const CATEGORY_STR: &str = "Categorias";
pub(crate) const AMOUNT_STR: &str = "Valor";
pub(crate) const DESCRIPTION_STR: &str = "Descrição";

/// The worksheet's column headers, in the order the append path writes them.
pub const SHEET_HEADERS: [&str; 4] = [DATE_STR, CATEGORY_STR, AMOUNT_STR, DESCRIPTION_STR];

/// The cleaned transaction table.
///
/// Built from the raw rows of the worksheet: the first row is the header row, and every row whose
/// date cannot be parsed is dropped. Row order is the sheet's order.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Transactions {
    data: Vec<Transaction>,
    /// The number of data rows that were dropped because their date was unparsable.
    dropped: usize,
}

impl Transactions {
    /// Cleans raw sheet rows into a table. Never fails: a sheet without a header row, or without
    /// one of the required columns, produces an empty table.
    pub fn parse<S, R>(sheet_data: impl IntoIterator<Item = R>) -> Self
    where
        S: AsRef<str>,
        R: IntoIterator<Item = S>,
    {
        let mut rows = sheet_data.into_iter();
        let columns = match rows.next() {
            Some(header_row) => {
                let headers: Vec<String> = header_row
                    .into_iter()
                    .map(|s| s.as_ref().trim().to_string())
                    .collect();
                match Columns::find(&headers) {
                    Some(columns) => columns,
                    None => {
                        warn!(
                            "The header row {headers:?} is missing one of the columns \
                            '{DATE_STR}', '{CATEGORY_STR}' or '{AMOUNT_STR}'"
                        );
                        return Self::default();
                    }
                }
            }
            None => return Self::default(),
        };

        let mut data = Vec::new();
        let mut dropped = 0;
        for row in rows {
            let values: Vec<S> = row.into_iter().collect();
            if values.iter().all(|v| v.as_ref().trim().is_empty()) {
                continue;
            }
            match Transaction::from_row(&columns, &values) {
                Some(transaction) => data.push(transaction),
                None => dropped += 1,
            }
        }
        if dropped > 0 {
            debug!("Dropped {dropped} rows with unparsable dates");
        }
        Self { data, dropped }
    }

    /// Builds a table from already-cleaned transactions.
    pub fn from_data(data: Vec<Transaction>) -> Self {
        Self { data, dropped: 0 }
    }

    pub fn data(&self) -> &[Transaction] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.data.iter()
    }

    /// The first `n` rows.
    pub fn head(&self, n: usize) -> &[Transaction] {
        &self.data[..n.min(self.data.len())]
    }

    /// The last `n` rows.
    pub fn tail(&self, n: usize) -> &[Transaction] {
        &self.data[self.data.len().saturating_sub(n)..]
    }
}

/// The column positions of the fields we use.
#[derive(Debug, Clone, Copy)]
struct Columns {
    date: usize,
    category: usize,
    amount: usize,
    description: Option<usize>,
}

impl Columns {
    fn find(headers: &[String]) -> Option<Self> {
        let position = |name: &str| headers.iter().position(|h| h == name);
        Some(Self {
            date: position(DATE_STR)?,
            category: position(CATEGORY_STR)?,
            amount: position(AMOUNT_STR)?,
            description: position(DESCRIPTION_STR),
        })
    }
}

/// A single cleaned row of the sheet.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Transaction {
    date: NaiveDate,
    category: String,
    amount: Amount,
    description: Option<String>,
    principal: String,
    flow: FlowType,
    month: MonthBucket,
}

impl Transaction {
    /// Creates a transaction, normalizing the category and deriving the classification and
    /// month-bucket.
    pub fn new(
        date: NaiveDate,
        category: impl AsRef<str>,
        amount: Amount,
        description: Option<String>,
    ) -> Self {
        let category = normalize_label(category.as_ref());
        let classification = classify(&category);
        Self {
            date,
            principal: classification.principal.to_string(),
            flow: classification.flow,
            month: MonthBucket::of(date),
            category,
            amount,
            description: description.filter(|d| !d.trim().is_empty()),
        }
    }

    /// Returns `None` when the date cell is missing or unparsable. Short rows are fine: missing
    /// cells are treated as empty.
    fn from_row<S: AsRef<str>>(columns: &Columns, values: &[S]) -> Option<Self> {
        let cell = |ix: usize| values.get(ix).map(|v| v.as_ref());
        let date = parse_sheet_date(cell(columns.date)?)?;
        let category = cell(columns.category).unwrap_or_default();
        let amount = Amount::normalize(cell(columns.amount));
        let description = columns
            .description
            .and_then(cell)
            .map(|s| s.trim().to_string());
        Some(Self::new(date, category, amount, description))
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn flow(&self) -> FlowType {
        self.flow
    }

    pub fn month(&self) -> MonthBucket {
        self.month
    }
}

/// A row submitted through the entry form, not yet validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub category: String,
    pub amount: Amount,
    pub description: String,
}

/// Why a submitted row was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    MissingCategory,
    NonPositiveAmount,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MissingCategory => write!(f, "Selecione uma categoria."),
            ValidationError::NonPositiveAmount => write!(f, "O valor deve ser maior que zero."),
        }
    }
}

impl std::error::Error for ValidationError {}

impl NewTransaction {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.category.trim().is_empty() {
            return Err(ValidationError::MissingCategory);
        }
        if !self.amount.is_positive() {
            return Err(ValidationError::NonPositiveAmount);
        }
        Ok(())
    }

    /// The cells written to the sheet: `[DD/MM/YYYY, category, 1234,56, description]`.
    pub fn to_sheet_row(&self) -> Vec<String> {
        vec![
            format_sheet_date(self.date),
            self.category.trim().to_string(),
            self.amount.to_sheet_string(),
            self.description.trim().to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_cleans_rows() {
        let table = Transactions::parse(vec![
            vec!["Data", "Categorias", "Valor", "Descrição"],
            vec!["01/01/24", "receita", "R$ 1.000,00", "salary"],
            vec!["05/01/24", " Despesa Casa ", "300,00", ""],
            vec!["bad date", "Luz", "10,00", ""],
            vec!["10/02/24", "Foobar", "abc", "mystery"],
        ]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.dropped(), 1);

        let first = &table.data()[0];
        assert_eq!(first.date(), ymd(2024, 1, 1));
        assert_eq!(first.category(), "Receita");
        assert_eq!(first.flow(), FlowType::Income);
        assert_eq!(first.amount().value(), Decimal::from_str("1000.00").unwrap());
        assert_eq!(first.description(), Some("salary"));
        assert_eq!(first.month().to_string(), "Jan/2024");

        let second = &table.data()[1];
        assert_eq!(second.category(), "Despesa Casa");
        assert_eq!(second.principal(), "Housing/Bills");
        assert_eq!(second.description(), None);

        let third = &table.data()[2];
        assert_eq!(third.principal(), "Other");
        assert_eq!(third.flow(), FlowType::Expense);
        assert!(third.amount().is_zero());
    }

    #[test]
    fn test_parse_columns_in_any_order() {
        let table = Transactions::parse(vec![
            vec!["Valor", "Extra", "Data", "Categorias"],
            vec!["12,50", "x", "03/03/24", "Luz"],
        ]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.data()[0].category(), "Luz");
        assert_eq!(table.data()[0].description(), None);
    }

    #[test]
    fn test_parse_short_rows_and_blank_rows() {
        let table = Transactions::parse(vec![
            vec!["Data", "Categorias", "Valor", "Descrição"],
            vec!["03/03/24", "Luz"],
            vec!["", "", "", ""],
        ]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.dropped(), 0);
        assert!(table.data()[0].amount().is_zero());
    }

    #[test]
    fn test_parse_missing_columns_is_empty() {
        let table = Transactions::parse(vec![vec!["Date", "Category"], vec!["01/01/24", "Luz"]]);
        assert!(table.is_empty());
        let table = Transactions::parse(Vec::<Vec<&str>>::new());
        assert!(table.is_empty());
    }

    #[test]
    fn test_head_and_tail() {
        let rows: Vec<Vec<String>> = std::iter::once(
            SHEET_HEADERS.iter().map(|s| s.to_string()).collect(),
        )
        .chain((1..=5).map(|d| {
            vec![
                format!("0{d}/01/24"),
                "Luz".to_string(),
                format!("{d},00"),
                String::new(),
            ]
        }))
        .collect();
        let table = Transactions::parse(rows);
        assert_eq!(table.head(2).len(), 2);
        assert_eq!(table.head(10).len(), 5);
        assert_eq!(table.tail(2)[1].date(), ymd(2024, 1, 5));
        assert_eq!(table.tail(10).len(), 5);
    }

    #[test]
    fn test_new_transaction_validate() {
        let mut row = NewTransaction {
            date: ymd(2024, 5, 1),
            category: "Luz".to_string(),
            amount: Amount::from_str("10,00").unwrap(),
            description: String::new(),
        };
        assert!(row.validate().is_ok());

        row.category = "  ".to_string();
        assert_eq!(row.validate(), Err(ValidationError::MissingCategory));

        row.category = "Luz".to_string();
        row.amount = Amount::ZERO;
        assert_eq!(row.validate(), Err(ValidationError::NonPositiveAmount));
    }

    #[test]
    fn test_new_transaction_sheet_row_parses_back() {
        let row = NewTransaction {
            date: ymd(2024, 5, 9),
            category: "Dentista".to_string(),
            amount: Amount::from_str("1.250,75").unwrap(),
            description: " cleaning ".to_string(),
        };
        let cells = row.to_sheet_row();
        assert_eq!(cells, vec!["09/05/2024", "Dentista", "1250,75", "cleaning"]);

        let table = Transactions::parse(vec![SHEET_HEADERS.map(String::from).to_vec(), cells]);
        let parsed = &table.data()[0];
        assert_eq!(parsed.date(), row.date);
        assert_eq!(parsed.category(), "Dentista");
        assert_eq!(parsed.amount(), row.amount);
        assert_eq!(parsed.description(), Some("cleaning"));
    }
}
