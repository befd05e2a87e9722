use crate::api::Mode;
use crate::commands::{load_config, Out};
use crate::error::{ErrorType, IntoResult};
use crate::model::Amount;
use crate::report::{self, Balance, MonthSelection};
use crate::source::DataSource;
use crate::Result;
use serde::Serialize;
use std::path::Path;
use std::str::FromStr;

/// The structured output of `household summary`.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub month: String,
    pub totals: Balance,
    pub transactions: usize,
    pub dropped: usize,
}

/// Fetches the sheet and reports income, expense and balance for `month`, or for all months when
/// `month` is `None` or `Saldo Atual`.
pub async fn summary(household_home: &Path, mode: Mode, month: Option<&str>) -> Result<Out<Summary>> {
    let selection = MonthSelection::from_str(month.unwrap_or_default())
        .pub_result(ErrorType::Validation)?;
    let config = load_config(household_home).await?;
    let source = DataSource::new(config, mode);
    let table = source.fetch().await?;

    let totals = report::monthly_balance(&table, selection);
    let message = format!(
        "{selection}: receitas {}, despesas {}, saldo {}",
        Amount::from(totals.income),
        Amount::from(totals.expense),
        Amount::from(totals.balance)
    );
    let summary = Summary {
        month: selection.to_string(),
        totals,
        transactions: table.len(),
        dropped: table.dropped(),
    };
    Ok(Out::new(message, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_summary_all_months_matches_balance() {
        let env = TestEnv::new().await;
        env.set_rows(&[
            &["Data", "Categorias", "Valor"],
            &["01/01/24", "Receita", "1.000,00"],
            &["05/01/24", "Despesa Casa", "300,00"],
            &["10/02/24", "Receita", "1.000,00"],
            &["12/02/24", "Despesa Casa", "400,00"],
        ]);
        let root = env.config().root().to_path_buf();

        let out = summary(&root, Mode::Test, None).await.unwrap();
        let all = out.structure().unwrap();
        assert_eq!(all.month, "Saldo Atual");
        assert_eq!(all.totals.balance, Decimal::from(1300));
        assert_eq!(all.transactions, 4);
        assert!(out.message().contains("R$ 1.300,00"));

        let out = summary(&root, Mode::Test, Some("Feb/2024")).await.unwrap();
        let feb = out.structure().unwrap();
        assert_eq!(feb.totals.income, Decimal::from(1000));
        assert_eq!(feb.totals.expense, Decimal::from(400));
    }

    #[tokio::test]
    async fn test_summary_rejects_bad_month() {
        let env = TestEnv::new().await;
        let err = summary(env.config().root(), Mode::Test, Some("Fevereiro"))
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Validation);
    }
}
