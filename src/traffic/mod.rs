//! Tail-number traffic restrictions.

pub mod checker;
pub mod source;
pub mod types;

pub use checker::TrafficChecker;
pub use source::{parse_rules_response, HttpRuleSource, RuleSource, DEFAULT_RULES_URL};
pub use types::{is_limited_text, tail_number, PlateRestriction, TrafficRule};
