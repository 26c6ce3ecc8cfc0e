//! Throttled admin alerts.
//!
//! At most one alert per throttle key (the error kind name) is sent per
//! interval. The last-notified map lives in memory for the process lifetime.

use crate::clock::{elapsed_since, SharedClock};
use crate::error::{AlertError, AlertResult};
use crate::notify::PushPriority;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

pub const DEFAULT_NOTIFY_INTERVAL: Duration = Duration::from_secs(3600);
const ALERT_TITLE: &str = "🚨 JJZ系统错误告警";

/// Where admin alerts are delivered.
#[async_trait]
pub trait AdminSink: Send + Sync {
    async fn notify(&self, title: &str, message: &str, priority: PushPriority) -> AlertResult<()>;
}

#[derive(Clone)]
pub struct ThrottledAdminNotifier {
    sink: Arc<dyn AdminSink>,
    interval: Duration,
    clock: SharedClock,
    last_notified: Arc<Mutex<HashMap<String, DateTime<Local>>>>,
}

impl std::fmt::Debug for ThrottledAdminNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThrottledAdminNotifier")
            .field("interval", &self.interval)
            .field("keys", &self.last_notified.lock().len())
            .finish()
    }
}

impl ThrottledAdminNotifier {
    pub fn new(sink: Arc<dyn AdminSink>, interval: Duration, clock: SharedClock) -> Self {
        Self {
            sink,
            interval,
            clock,
            last_notified: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn is_throttled(&self, key: &str) -> bool {
        self.last_notified
            .lock()
            .get(key)
            .map(|at| elapsed_since(self.clock.as_ref(), *at) < self.interval)
            .unwrap_or(false)
    }

    /// Send `message` unless an alert with the same key went out within the interval.
    ///
    /// Returns whether the alert was delivered. The timestamp is recorded only
    /// after a successful delivery.
    pub async fn notify_keyed(
        &self,
        key: &str,
        title: &str,
        message: &str,
        priority: PushPriority,
    ) -> bool {
        if self.is_throttled(key) {
            debug!(key, "Admin alert throttled");
            return false;
        }

        match self.sink.notify(title, message, priority).await {
            Ok(()) => {
                self.last_notified
                    .lock()
                    .insert(key.to_string(), self.clock.now());
                info!(key, "📣 Admin alert sent");
                true
            }
            Err(e) => {
                error!(key, error = %e, "Failed to send admin alert");
                false
            }
        }
    }

    pub async fn notify_error(&self, error: &AlertError, context: &str) -> bool {
        let message = self.build_error_message(error, context);
        self.notify_keyed(error.kind().as_str(), ALERT_TITLE, &message, PushPriority::High)
            .await
    }

    pub fn build_error_message(&self, error: &AlertError, context: &str) -> String {
        let mut lines = vec![
            format!("⚠️ 系统错误类型: {}", error.kind()),
            format!("📝 错误描述: {}", error.message()),
        ];

        if !context.is_empty() {
            lines.push(format!("🔍 错误上下文: {context}"));
        }

        lines.push(format!("🔢 错误代码: {}", error.error_code()));

        let details = error.details();
        if !details.is_empty() {
            let rendered: Vec<String> = details.iter().map(|(k, v)| format!("{k}={v}")).collect();
            lines.push(format!("📋 详细信息: {}", rendered.join(", ")));
        }

        lines.push(format!(
            "⏰ 发生时间: {}",
            self.clock.now().format("%Y-%m-%d %H:%M:%S")
        ));
        lines.push(format!("💡 建议: {}", error.kind().suggestion()));

        lines.join("\n")
    }
}
