use super::types::{is_limited_text, TrafficRule};
use crate::error::{AlertError, AlertResult};
use crate::http::HttpClient;
use crate::resolver::DataSource;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_RULES_URL: &str = "https://yw.jtgl.beijing.gov.cn/jgjxx/services/getRuleWithWeek";
const RULE_DATE_FORMAT: &str = "%Y年%m月%d日";

/// Upstream publisher of the weekly restriction rules.
#[async_trait]
pub trait RuleSource: Send + Sync {
    async fn fetch_rules(&self) -> AlertResult<Vec<TrafficRule>>;
}

pub struct HttpRuleSource {
    http: Arc<dyn HttpClient>,
    url: String,
    timeout: Duration,
}

impl HttpRuleSource {
    pub fn new(http: Arc<dyn HttpClient>, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http,
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl RuleSource for HttpRuleSource {
    async fn fetch_rules(&self) -> AlertResult<Vec<TrafficRule>> {
        let response = self.http.get_json(&self.url, self.timeout).await?;
        let rules = parse_rules_response(&response)?;
        if rules.is_empty() {
            return Err(AlertError::Traffic("empty rule list".to_string()));
        }
        info!(count = rules.len(), "🚦 Traffic rules fetched");
        Ok(rules)
    }
}

/// Parse `{"state": "success", "result": [{limitedTime, limitedNumber, description}]}`.
///
/// Entries with a missing or malformed date are skipped.
pub fn parse_rules_response(response: &Value) -> AlertResult<Vec<TrafficRule>> {
    let state = response.get("state").and_then(Value::as_str);
    let Some(entries) = response.get("result").and_then(Value::as_array).filter(|_| state == Some("success"))
    else {
        let message = response
            .get("resultMsg")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(AlertError::Traffic(format!("rule endpoint returned an error: {message}")));
    };

    let mut rules = Vec::with_capacity(entries.len());
    for entry in entries {
        let limited_time = entry.get("limitedTime").and_then(Value::as_str).unwrap_or_default();
        let Ok(date) = NaiveDate::parse_from_str(limited_time, RULE_DATE_FORMAT) else {
            warn!(limited_time, "Skipping traffic rule with unparseable date");
            continue;
        };
        let limited_numbers = entry
            .get("limitedNumber")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        rules.push(TrafficRule {
            date,
            is_limited: is_limited_text(&limited_numbers),
            limited_numbers,
            limited_time: limited_time.to_string(),
            description: entry
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
            data_source: DataSource::Api,
            cached_at: None,
        });
    }
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_weekly_rules() {
        let body = json!({
            "state": "success",
            "result": [
                {"limitedTime": "2025年08月15日", "limitedNumber": "1和6", "description": "工作日"},
                {"limitedTime": "2025年08月16日", "limitedNumber": "不限行"},
                {"limitedTime": "bogus", "limitedNumber": "2和7"}
            ]
        });
        let rules = parse_rules_response(&body).unwrap();
        assert_eq!(rules.len(), 2);
        assert!(rules[0].is_limited);
        assert_eq!(rules[0].restricted_digits(), vec!["1", "6"]);
        assert_eq!(rules[0].description.as_deref(), Some("工作日"));
        assert!(!rules[1].is_limited);
    }

    #[test]
    fn test_failed_state_is_error() {
        let err = parse_rules_response(&json!({"state": "fail", "resultMsg": "维护中"})).unwrap_err();
        assert!(err.message().contains("维护中"));
    }
}
