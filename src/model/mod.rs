//! Types that represent the core data model: the cleaned `Transaction` table and the normalizers
//! and classifier it is built with.
mod amount;
pub mod category;
pub mod date;
mod transaction;

pub use amount::{Amount, AmountError};
pub use category::{classify, Classification, FlowType};
pub use date::MonthBucket;
pub use transaction::{NewTransaction, Transaction, Transactions, ValidationError, SHEET_HEADERS};
