use super::channel::{ChannelConfig, Recipient};
use super::dispatcher::{DispatchOptions, PushDispatcher};
use super::PushPriority;
use crate::error::{AlertError, AlertResult};
use crate::resilience::AdminSink;
use async_trait::async_trait;
use std::sync::Arc;

pub const ADMIN_RECIPIENT: &str = "ADMIN";
pub const ADMIN_MESSAGE_TYPE: &str = "admin_alert";
const ADMIN_DISPLAY_NAME: &str = "管理员";
const ADMIN_ICON: &str = "https://cdn-icons-png.flaticon.com/512/1077/1077114.png";

/// Delivers admin alerts through the regular dispatcher to the admin channels.
pub struct AdminChannel {
    dispatcher: Arc<PushDispatcher>,
    recipient: Recipient,
}

impl AdminChannel {
    pub fn new(dispatcher: Arc<PushDispatcher>, channels: Vec<ChannelConfig>) -> Self {
        Self {
            dispatcher,
            recipient: Recipient::new(ADMIN_RECIPIENT, channels)
                .with_display_name(ADMIN_DISPLAY_NAME)
                .with_icon(ADMIN_ICON),
        }
    }
}

#[async_trait]
impl AdminSink for AdminChannel {
    async fn notify(&self, title: &str, message: &str, priority: PushPriority) -> AlertResult<()> {
        if self.recipient.notifications.is_empty() {
            return Err(AlertError::Configuration("no admin channels configured".to_string()));
        }

        let outcome = self
            .dispatcher
            .dispatch(
                &self.recipient,
                title,
                message,
                priority,
                &DispatchOptions::of_type(ADMIN_MESSAGE_TYPE),
            )
            .await;

        if outcome.success {
            Ok(())
        } else {
            Err(AlertError::Push(outcome.errors.join("; ")))
        }
    }
}
