//! Types that represent the core data model, such as `Transaction`, `Category` and `Amount`.
mod amount;
mod category;
mod transaction;

pub use amount::{Amount, AmountError};
pub use category::Category;
pub use transaction::{
    generate_id, parse_date, signed_amount, sort_by_date_desc, DeletePayload, Draft, Transaction,
    TransactionPayload, DATE_FORMAT,
};
