//! Upstream response parsing.
//!
//! A response lists every vehicle visible to the account under
//! `data.bzclxx`, each with active (`bzxx`) and pending-effective (`ecbzxx`)
//! permit records.

use super::types::AccountRecord;
use crate::error::{AlertError, AlertResult};
use serde_json::Value;
use tracing::warn;

fn text_field(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn int_field(value: &Value, key: &str) -> Option<u32> {
    match value.get(key)? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn error_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Extract every permit record from one account's response.
///
/// A top-level `error`, or a body without `data.bzclxx` that carries a
/// `msg`/`message`, is a response-level failure. A body with neither is an
/// account with no vehicles.
pub fn parse_account_response(account: &str, response: &Value) -> AlertResult<Vec<AccountRecord>> {
    if let Some(error) = response.get("error") {
        return Err(AlertError::api(error_text(error)));
    }

    let Some(vehicles) = response
        .get("data")
        .and_then(|data| data.get("bzclxx"))
        .and_then(Value::as_array)
    else {
        if let Some(message) = response.get("msg").or_else(|| response.get("message")) {
            return Err(AlertError::api(error_text(message)));
        }
        warn!(account, "Response has no data.bzclxx, treating as empty");
        return Ok(Vec::new());
    };

    let mut records = Vec::new();
    for vehicle in vehicles {
        let plate = text_field(vehicle, "hphm");
        if plate.trim().is_empty() {
            continue;
        }
        let remaining = Some(text_field(vehicle, "sycs")).filter(|s| !s.is_empty());

        for list in ["bzxx", "ecbzxx"] {
            let Some(entries) = vehicle.get(list).and_then(Value::as_array) else {
                continue;
            };
            records.extend(entries.iter().map(|entry| AccountRecord {
                account: account.to_string(),
                plate: plate.clone(),
                state_code: text_field(entry, "blzt"),
                state_text: text_field(entry, "blztmc"),
                apply_time: text_field(entry, "sqsj"),
                valid_start: text_field(entry, "yxqs"),
                valid_end: text_field(entry, "yxqz"),
                days_remaining: int_field(entry, "sxsyts"),
                remaining_applications: remaining.clone(),
                permit_type: text_field(entry, "jjzzlmc"),
            }));
        }
    }
    Ok(records)
}
