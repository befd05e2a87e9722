//! Implements the `Sheet` trait using in-memory data for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without using Google Sheets. Set `HOUSEHOLD_IN_TEST_MODE` to use it.
//!
//! State lives in a process-wide map keyed by spreadsheet ID, so every `TestSheet` created for the
//! same spreadsheet sees the same rows, just like separate clients of a real sheet would.

use crate::api::Sheet;
use crate::error::Res;
use anyhow::Context;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Mutex, MutexGuard, OnceLock};
use tracing::trace;

/// The rows of every worksheet of one spreadsheet, keyed by worksheet name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct TestSheetState {
    pub(crate) worksheets: HashMap<String, Vec<Vec<String>>>,
    /// When set, every call fails as if the network were down.
    pub(crate) offline: bool,
}

fn states() -> MutexGuard<'static, HashMap<String, TestSheetState>> {
    static STATES: OnceLock<Mutex<HashMap<String, TestSheetState>>> = OnceLock::new();
    let mutex = STATES.get_or_init(|| Mutex::new(HashMap::new()));
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// An implementation of the `Sheet` trait that does not use Google sheets. A worksheet that has
/// never been written is seeded with the rows in this module.
pub(crate) struct TestSheet {
    spreadsheet_id: String,
}

impl TestSheet {
    pub(crate) fn new(spreadsheet_id: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
        }
    }

    pub(crate) fn get_state(&self) -> TestSheetState {
        states()
            .get(&self.spreadsheet_id)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn set_state(&self, state: TestSheetState) {
        states().insert(self.spreadsheet_id.clone(), state);
    }

    fn with_worksheet<T>(
        &self,
        worksheet: &str,
        f: impl FnOnce(&mut Vec<Vec<String>>) -> T,
    ) -> Res<T> {
        let mut states = states();
        let state = states.entry(self.spreadsheet_id.clone()).or_default();
        anyhow::ensure!(
            !state.offline,
            "Unable to reach spreadsheet '{}'",
            self.spreadsheet_id
        );
        let rows = match state.worksheets.entry(worksheet.to_string()) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(e) => e.insert(seed_rows()?),
        };
        Ok(f(rows))
    }
}

#[async_trait::async_trait]
impl Sheet for TestSheet {
    async fn get(&mut self, worksheet: &str) -> Res<Vec<Vec<String>>> {
        trace!("get for {worksheet} from the test sheet");
        self.with_worksheet(worksheet, |rows| rows.clone())
    }

    async fn append(&mut self, worksheet: &str, row: &[String]) -> Res<()> {
        trace!("append to {worksheet} in the test sheet: {row:?}");
        self.with_worksheet(worksheet, |rows| rows.push(row.to_vec()))
    }
}

/// The seed rows, header first.
pub(crate) fn seed_rows() -> Res<Vec<Vec<String>>> {
    load_csv(TRANSACTION_DATA)
}

/// Loads data from a CSV-formatted string.
fn load_csv(csv_data: &str) -> Res<Vec<Vec<String>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(Cursor::new(csv_data.as_bytes()));

    let mut rows: Vec<Vec<String>> = Vec::new();
    for result in rdr.records() {
        let record = result.context("Invalid seed CSV")?;
        rows.push(record.iter().map(|field| field.to_string()).collect());
    }
    Ok(rows)
}

/// Seed transaction data. Includes one row with an unparsable date and one unmapped category.
const TRANSACTION_DATA: &str = r##"Data,Categorias,Valor,Descrição
05/01/24,Receita,"R$ 4.500,00",Salário
08/01/24,Despesa Casa,"R$ 1.200,00",Aluguel
10/01/24,Luz,"R$ 187,45",
12/01/24,Agua,"R$ 92,10",
15/01/24,Despesa Combustivel,"R$ 250,00",Posto
20/01/24,Nubank,"R$ 830,77",Fatura
05/02/24,Receita,"R$ 4.500,00",Salário
08/02/24,Despesa Casa,"R$ 1.200,00",Aluguel
11/02/24,Luz,"R$ 201,90",
14/02/24,Claro,"R$ 119,99",Celular
18/02/24,Despesa Remedio,"R$ 64,30",Farmácia
22/02/24,Faculdade,"R$ 690,00",Mensalidade
05/03/24,Receita,"R$ 4.500,00",Salário
08/03/24,Despesa Casa,"R$ 1.200,00",Aluguel
09/03/24,Grafnet,"R$ 99,90",Internet
10/03/24,Luz,"R$ 176,20",
16/03/24,Outros Laser/Festa/Reforma,"R$ 420,00",Aniversário
21/03/24,Despesa Moto,"R$ 310,00",Revisão
05/04/24,Receita,"R$ 4.650,00",Salário
08/04/24,Despesa Casa,"R$ 1.200,00",Aluguel
12/04/24,Dentista,"R$ 350,00",Limpeza
15/04/24,Plano,"R$ 289,00",Plano de saúde
19/04/24,Feira,"R$ 143,60",Sem categoria
31/04/24,Luz,"R$ 190,00",Data inválida
05/05/24,Receita,"R$ 4.650,00",Salário
08/05/24,Despesa Casa,"R$ 1.200,00",Aluguel
13/05/24,Despesa Combustivel,"R$ 265,40",Posto
20/05/24,Nubank,"R$ 912,33",Fatura
"##;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Transactions;

    #[test]
    fn test_seed_rows_parse() {
        let rows = seed_rows().unwrap();
        assert_eq!(rows[0], vec!["Data", "Categorias", "Valor", "Descrição"]);
        let table = Transactions::parse(rows);
        assert_eq!(table.len(), 27);
        assert_eq!(table.dropped(), 1);
    }

    #[tokio::test]
    async fn test_append_is_shared_between_clients() {
        let id = uuid::Uuid::new_v4().to_string();
        let mut first = TestSheet::new(&id);
        let mut second = TestSheet::new(&id);

        let before = first.get("Dados").await.unwrap().len();
        let row: Vec<String> = ["01/06/2024", "Luz", "10,00", "x"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        first.append("Dados", &row).await.unwrap();

        let after = second.get("Dados").await.unwrap();
        assert_eq!(after.len(), before + 1);
        assert_eq!(after.last(), Some(&row));
    }

    #[tokio::test]
    async fn test_offline_state_fails() {
        let id = uuid::Uuid::new_v4().to_string();
        let mut sheet = TestSheet::new(&id);
        sheet.set_state(TestSheetState {
            offline: true,
            ..Default::default()
        });
        assert!(sheet.get("Dados").await.is_err());
        assert!(sheet.append("Dados", &[]).await.is_err());
    }
}
