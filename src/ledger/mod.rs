pub mod question_ledger;
pub mod url_ledger;

pub use question_ledger::QuestionLedger;
pub use url_ledger::{UrlLedger, UrlRecord};
