use crate::resolver::DataSource;
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};

const UNRESTRICTED: &str = "不限行";
const DIGIT_SEPARATOR: char = '和';

/// Restriction rule for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficRule {
    pub date: NaiveDate,
    /// Restricted tail digits as published, e.g. `1和6` or `不限行`.
    pub limited_numbers: String,
    pub limited_time: String,
    pub is_limited: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub data_source: DataSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<Local>>,
}

impl TrafficRule {
    pub fn new(date: NaiveDate, limited_numbers: impl Into<String>) -> Self {
        let limited_numbers = limited_numbers.into();
        Self {
            date,
            is_limited: is_limited_text(&limited_numbers),
            limited_time: date.format("%Y年%m月%d日").to_string(),
            limited_numbers,
            description: None,
            data_source: DataSource::Api,
            cached_at: None,
        }
    }

    pub fn restricted_digits(&self) -> Vec<String> {
        if !self.is_limited {
            return Vec::new();
        }
        self.limited_numbers
            .split(DIGIT_SEPARATOR)
            .map(str::trim)
            .filter(|digit| !digit.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn restricts(&self, tail: &str) -> bool {
        self.restricted_digits().iter().any(|digit| digit == tail)
    }
}

pub fn is_limited_text(limited_numbers: &str) -> bool {
    let trimmed = limited_numbers.trim();
    !(trimmed.is_empty() || trimmed == UNRESTRICTED || trimmed.eq_ignore_ascii_case("none"))
}

/// Last character when it is an ASCII digit, otherwise `"0"`.
pub fn tail_number(plate: &str) -> String {
    match plate.trim().chars().last() {
        Some(c) if c.is_ascii_digit() => c.to_string(),
        _ => "0".to_string(),
    }
}

/// Restriction status of one plate on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlateRestriction {
    pub plate: String,
    pub date: NaiveDate,
    pub is_limited: bool,
    pub tail_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<TrafficRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl PlateRestriction {
    pub fn from_rule(plate: &str, date: NaiveDate, rule: TrafficRule) -> Self {
        let tail = tail_number(plate);
        Self {
            plate: plate.to_string(),
            date,
            is_limited: rule.restricts(&tail),
            tail_number: tail,
            rule: Some(rule),
            error_message: None,
        }
    }

    pub fn unknown(plate: &str, date: NaiveDate, error: impl Into<String>) -> Self {
        Self {
            plate: plate.to_string(),
            date,
            is_limited: false,
            tail_number: tail_number(plate),
            rule: None,
            error_message: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 15).unwrap()
    }

    #[test]
    fn test_restriction_matches_tail_digit() {
        let rule = TrafficRule::new(date(), "1和6");
        assert!(rule.is_limited);
        assert_eq!(rule.limited_time, "2025年08月15日");

        assert!(PlateRestriction::from_rule("京A12346", date(), rule.clone()).is_limited);
        assert!(!PlateRestriction::from_rule("京A12345", date(), rule.clone()).is_limited);
        // letter tails count as 0
        assert_eq!(tail_number("京A1234X"), "0");
        assert!(!PlateRestriction::from_rule("京A1234X", date(), rule).is_limited);
    }

    #[test]
    fn test_unrestricted_day() {
        for text in ["不限行", "", "none"] {
            let rule = TrafficRule::new(date(), text);
            assert!(!rule.is_limited);
            assert!(rule.restricted_digits().is_empty());
        }
    }

    proptest! {
        #[test]
        fn tail_number_is_last_digit_or_zero(prefix in "[京津冀A-Z]{1,2}[A-Z0-9]{0,5}", last in any::<char>()) {
            let plate = format!("{prefix}{last}");
            let tail = tail_number(&plate);
            if last.is_ascii_digit() {
                prop_assert_eq!(tail, last.to_string());
            } else if !last.is_whitespace() {
                prop_assert_eq!(tail, "0");
            } else {
                prop_assert_eq!(tail.len(), 1);
            }
        }
    }
}
