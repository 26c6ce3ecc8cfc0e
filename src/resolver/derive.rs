//! Permit status state machine.
//!
//! Inputs are the upstream state code, the state text and the validity
//! window. An end date before today yields `Expired` regardless of the other
//! inputs.

use super::types::PermitState;
use chrono::NaiveDate;

pub const APPROVED_MARKER: &str = "审核通过";
pub const ACTIVE_MARKER: &str = "生效中";
pub const AWAITING_MARKER: &str = "待生效";
pub const REVIEW_MARKER: &str = "审核中";

const CODE_APPROVED: &str = "1";
const CODE_PENDING: &str = "0";
const CODE_AWAITING_EFFECT: &str = "6";

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

pub fn derive_status(
    code: &str,
    text: &str,
    valid_start: &str,
    valid_end: &str,
    today: NaiveDate,
) -> PermitState {
    if valid_end.trim().is_empty() {
        return PermitState::Invalid;
    }
    let Some(end) = parse_date(valid_end) else {
        return PermitState::Invalid;
    };
    if end < today {
        return PermitState::Expired;
    }

    let code = code.trim();
    let approved = text.contains(APPROVED_MARKER);

    if code == CODE_APPROVED && approved && text.contains(ACTIVE_MARKER) {
        return PermitState::Valid;
    }

    if code == CODE_AWAITING_EFFECT && approved && text.contains(AWAITING_MARKER) {
        let started = parse_date(valid_start).is_some_and(|start| start <= today);
        return if started {
            PermitState::Valid
        } else {
            PermitState::Pending
        };
    }

    if code == CODE_PENDING || text.contains(REVIEW_MARKER) {
        return PermitState::Pending;
    }

    PermitState::Invalid
}
