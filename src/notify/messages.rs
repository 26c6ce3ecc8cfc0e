//! User-facing message text.

use crate::notify::result::DEFAULT_MESSAGE_TYPE;
use crate::notify::PushPriority;
use crate::resolver::{PermitState, PermitStatus};

pub const NEXT_DAY_REMINDER_TYPE: &str = "next_day_reminder";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestrictionDay {
    Today,
    Tomorrow,
}

impl RestrictionDay {
    fn prefix(&self) -> &'static str {
        match self {
            RestrictionDay::Today => "【⚠️今日限行】",
            RestrictionDay::Tomorrow => "【⚠️明日限行】",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedMessage {
    pub title: String,
    pub body: String,
    pub priority: PushPriority,
    pub message_type: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MessageComposer;

fn or_unknown(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("未知")
}

fn remaining_applications(status: &PermitStatus) -> String {
    status
        .remaining_applications
        .as_deref()
        .map(|count| format!("六环内进京证剩余 {count} 次。"))
        .unwrap_or_default()
}

impl MessageComposer {
    /// Status message for one recipient. `restricted` adds the restriction prefix.
    pub fn status_message(
        &self,
        display_name: &str,
        status: &PermitStatus,
        restricted: Option<RestrictionDay>,
    ) -> ComposedMessage {
        let permit_type = status.permit_type_label();
        let (body, priority) = match status.status {
            PermitState::Valid => {
                let days = status
                    .days_remaining
                    .map(|days| format!("，剩余 {days} 天。"))
                    .unwrap_or_else(|| "。".to_string());
                (
                    format!(
                        "车牌{display_name}的进京证({permit_type})状态：{}，有效期 {} 至 {}{days}{}",
                        status.state_label(),
                        or_unknown(status.valid_start.as_deref()),
                        or_unknown(status.valid_end.as_deref()),
                        remaining_applications(status),
                    ),
                    PushPriority::Normal,
                )
            }
            PermitState::Expired => (
                format!(
                    "车牌 {display_name} 的进京证 已过期，请及时续办。{}",
                    remaining_applications(status)
                ),
                PushPriority::High,
            ),
            PermitState::Pending => (
                format!(
                    "车牌{display_name}的进京证({permit_type})状态：审核中，申请时间 {}。请关注审核进度。",
                    or_unknown(status.apply_time.as_deref())
                ),
                PushPriority::High,
            ),
            other => (
                format!(
                    "车牌{display_name}的进京证({permit_type})状态：{}。{}",
                    other.description(),
                    status.error_message.as_deref().unwrap_or_default()
                ),
                PushPriority::Normal,
            ),
        };

        let body = match restricted {
            Some(day) => format!("{}{body}", day.prefix()),
            None => body,
        };

        ComposedMessage {
            title: display_name.to_string(),
            body,
            priority,
            message_type: DEFAULT_MESSAGE_TYPE.to_string(),
        }
    }

    pub fn next_day_reminder(&self, display_name: &str) -> ComposedMessage {
        ComposedMessage {
            title: display_name.to_string(),
            body: format!("车牌 {display_name} 明日尚未查询到进京证信息，请注意及时办理进京证。"),
            priority: PushPriority::High,
            message_type: NEXT_DAY_REMINDER_TYPE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::AccountRecord;

    fn valid() -> PermitStatus {
        let record = AccountRecord {
            plate: "京A12345".into(),
            state_code: "1".into(),
            state_text: "审核通过(生效中)".into(),
            valid_start: "2025-08-10".into(),
            valid_end: "2025-08-16".into(),
            days_remaining: Some(2),
            remaining_applications: Some("8".into()),
            permit_type: "进京证(六环外)".into(),
            ..Default::default()
        };
        PermitStatus::from_record("京A12345", &record, PermitState::Valid)
    }

    #[test]
    fn test_valid_message() {
        let msg = MessageComposer.status_message("家用车", &valid(), None);
        assert_eq!(msg.priority, PushPriority::Normal);
        assert_eq!(msg.title, "家用车");
        assert_eq!(
            msg.body,
            "车牌家用车的进京证(六环外)状态：生效中，有效期 2025-08-10 至 2025-08-16，剩余 2 天。六环内进京证剩余 8 次。"
        );
    }

    #[test]
    fn test_restriction_prefix_and_priority() {
        let msg = MessageComposer.status_message("家用车", &valid(), Some(RestrictionDay::Tomorrow));
        assert!(msg.body.starts_with("【⚠️明日限行】车牌家用车"));

        let mut expired = valid();
        expired.status = PermitState::Expired;
        let msg = MessageComposer.status_message("家用车", &expired, Some(RestrictionDay::Today));
        assert_eq!(msg.priority, PushPriority::High);
        assert_eq!(msg.body, "【⚠️今日限行】车牌 家用车 的进京证 已过期，请及时续办。六环内进京证剩余 8 次。");
    }

    #[test]
    fn test_next_day_reminder() {
        let msg = MessageComposer.next_day_reminder("京A12345");
        assert_eq!(msg.priority, PushPriority::High);
        assert_eq!(msg.message_type, NEXT_DAY_REMINDER_TYPE);
        assert_eq!(msg.body, "车牌 京A12345 明日尚未查询到进京证信息，请注意及时办理进京证。");
    }
}
