//! C9 — policy/filter plane: authentication, AET/path allow-listing,
//! transfer-syntax filtering, and scripted predicates.

pub mod aet_filter;
pub mod auth;
pub mod script;
pub mod transfer_syntax;

pub use aet_filter::AllowList;
pub use script::{FindRequestFacts, HttpRequestFacts, NullScriptHost, ReceivedInstanceFacts, ScriptHost, ScriptedRule};
pub use transfer_syntax::TransferSyntaxFilter;
