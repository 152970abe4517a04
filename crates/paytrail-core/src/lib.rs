pub mod currency;
pub mod dates;
pub mod extract;
pub mod interest;
pub mod ledger;
pub mod names;
pub mod options;
pub mod run;

pub use currency::{parse_amount, parse_currency};
pub use dates::{parse_date, parse_date_value};
pub use extract::{DonorSummary, extract_payment};
pub use interest::{Category, Field, FieldValues, InterestRecord, Member, MemberRef, ScalarValue};
pub use ledger::{ExtractedPayment, InterestRow, NewPayer, NewPayment, Payer, PayerType};
pub use names::{normalize_name, normalize_party};
pub use options::SyncOptions;
pub use run::{RunError, RunStage, RunStateError, RunStats, SyncRun};
