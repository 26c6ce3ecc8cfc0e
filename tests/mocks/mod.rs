//! Collaborator fakes shared by the integration tests.
//!
//! Nothing here touches the network: HTTP answers come from scripted
//! queues keyed by URL, and every other collaborator records what it was
//! handed so tests can assert on it afterwards.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use jjz_alert::bootstrap::Collaborators;
use jjz_alert::clock::{ManualClock, SharedClock};
use jjz_alert::error::{AlertError, AlertResult};
use jjz_alert::http::HttpClient;
use jjz_alert::notify::notifier::{is_valid_service_url, INVALID_TARGET, NO_VALID_TARGETS};
use jjz_alert::notify::{mask_target, ChannelKind, Notifier, NotifierOutcome, PushPriority, TargetResult};
use jjz_alert::resilience::AdminSink;
use jjz_alert::resolver::PermitStatus;
use jjz_alert::traffic::PlateRestriction;
use jjz_alert::workflow::{DownstreamSync, SyncReport};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const ACCOUNT_URL: &str = "https://jjz.test/pro/applyRecordController/stateList";
pub const BACKUP_ACCOUNT_URL: &str = "https://jjz-backup.test/pro/applyRecordController/stateList";
pub const RULES_URL: &str = "https://rules.test/getRuleWithWeek";
pub const APPRISE_URL: &str = "http://apprise.test";
pub const APPRISE_NOTIFY_URL: &str = "http://apprise.test/notify/";
pub const ADMIN_HOOK_URL: &str = "https://admin.test/hook";

// =============================================================================
// HTTP
// =============================================================================

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

#[derive(Debug, Default, Clone, Copy)]
struct InFlight {
    current: usize,
    peak: usize,
}

/// Answers requests from per-URL queues. The last queued answer repeats.
#[derive(Debug, Default)]
pub struct ScriptedHttp {
    routes: Mutex<HashMap<String, VecDeque<AlertResult<Value>>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    delays: Mutex<HashMap<String, Duration>>,
    in_flight: Mutex<HashMap<String, InFlight>>,
}

impl ScriptedHttp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, url: &str, response: AlertResult<Value>) -> &Self {
        self.routes
            .lock()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
        self
    }

    /// Replace every queued answer for `url`.
    pub fn reset(&self, url: &str, response: AlertResult<Value>) -> &Self {
        self.routes
            .lock()
            .insert(url.to_string(), VecDeque::from([response]));
        self
    }

    pub fn requests_to(&self, url: &str) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.url == url)
            .cloned()
            .collect()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests_to(url).len()
    }

    /// Hold every request to `url` open for `delay` before answering.
    pub fn delay(&self, url: &str, delay: Duration) -> &Self {
        self.delays.lock().insert(url.to_string(), delay);
        self
    }

    /// Most requests to a delayed `url` that were open at the same time.
    pub fn peak_in_flight(&self, url: &str) -> usize {
        self.in_flight.lock().get(url).map_or(0, |f| f.peak)
    }

    async fn hold(&self, url: &str) {
        let delay = self.delays.lock().get(url).copied();
        let Some(delay) = delay else {
            return;
        };
        {
            let mut in_flight = self.in_flight.lock();
            let entry = in_flight.entry(url.to_string()).or_default();
            entry.current += 1;
            entry.peak = entry.peak.max(entry.current);
        }
        tokio::time::sleep(delay).await;
        if let Some(entry) = self.in_flight.lock().get_mut(url) {
            entry.current -= 1;
        }
    }

    fn answer(&self, method: &'static str, url: &str, headers: &[(String, String)], body: &Value) -> AlertResult<Value> {
        self.requests.lock().push(RecordedRequest {
            method,
            url: url.to_string(),
            headers: headers.to_vec(),
            body: body.clone(),
        });

        let mut routes = self.routes.lock();
        match routes.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue
                .pop_front()
                .unwrap_or_else(|| Err(AlertError::Internal("empty script".into()))),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(AlertError::Internal("empty script".into()))),
            None => Err(AlertError::Network(format!("no scripted response for {url}"))),
        }
    }
}

#[async_trait]
impl HttpClient for ScriptedHttp {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &Value,
        _timeout: Duration,
    ) -> AlertResult<Value> {
        self.hold(url).await;
        self.answer("POST", url, headers, body)
    }

    async fn get_json(&self, url: &str, _timeout: Duration) -> AlertResult<Value> {
        self.hold(url).await;
        self.answer("GET", url, &[], &Value::Null)
    }
}

// =============================================================================
// Notifier
// =============================================================================

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub targets: Vec<String>,
    pub title: String,
    pub body: String,
    pub priority: PushPriority,
}

/// Notifier that records each send and succeeds unless told to fail.
#[derive(Debug)]
pub struct RecordingNotifier {
    kind: ChannelKind,
    failing: AtomicBool,
    sent: Mutex<Vec<SentMessage>>,
}

impl RecordingNotifier {
    pub fn new(kind: ChannelKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            failing: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn send(
        &self,
        targets: &[String],
        _headers: &[(String, String)],
        title: &str,
        body: &str,
        priority: PushPriority,
    ) -> NotifierOutcome {
        let (valid, invalid): (Vec<&String>, Vec<&String>) =
            targets.iter().partition(|t| is_valid_service_url(t));
        let mut target_results: Vec<TargetResult> = invalid
            .iter()
            .map(|t| TargetResult {
                target: mask_target(t),
                valid: false,
                success: false,
                error: Some(INVALID_TARGET.to_string()),
            })
            .collect();

        if valid.is_empty() {
            return NotifierOutcome {
                invalid_targets: invalid.len(),
                target_results,
                ..NotifierOutcome::failed(NO_VALID_TARGETS)
            };
        }

        self.sent.lock().push(SentMessage {
            targets: valid.iter().map(|t| t.to_string()).collect(),
            title: title.to_string(),
            body: body.to_string(),
            priority,
        });

        let success = !self.failing.load(Ordering::SeqCst);
        let error = (!success).then(|| "scripted failure".to_string());
        target_results.extend(valid.iter().map(|t| TargetResult {
            target: mask_target(t),
            valid: true,
            success,
            error: error.clone(),
        }));

        NotifierOutcome {
            success,
            valid_targets: valid.len(),
            invalid_targets: invalid.len(),
            target_results,
            error,
        }
    }
}

// =============================================================================
// Downstream sync and admin sink
// =============================================================================

#[derive(Debug, Default)]
pub struct RecordingSync {
    calls: Mutex<Vec<Vec<String>>>,
}

impl RecordingSync {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Sorted plates handed over in each call.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl DownstreamSync for RecordingSync {
    async fn sync(
        &self,
        statuses: &HashMap<String, PermitStatus>,
        _restrictions: &HashMap<String, PlateRestriction>,
    ) -> AlertResult<SyncReport> {
        let mut plates: Vec<String> = statuses.keys().cloned().collect();
        plates.sort();
        self.calls.lock().push(plates.clone());
        Ok(SyncReport::from_results(
            plates.into_iter().map(|p| (p, true)).collect(),
            Vec::new(),
        ))
    }
}

#[derive(Debug, Clone)]
pub struct AdminAlert {
    pub title: String,
    pub message: String,
    pub priority: PushPriority,
}

#[derive(Debug, Default)]
pub struct RecordingAdminSink {
    alerts: Mutex<Vec<AdminAlert>>,
}

impl RecordingAdminSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn alerts(&self) -> Vec<AdminAlert> {
        self.alerts.lock().clone()
    }
}

#[async_trait]
impl AdminSink for RecordingAdminSink {
    async fn notify(&self, title: &str, message: &str, priority: PushPriority) -> AlertResult<()> {
        self.alerts.lock().push(AdminAlert {
            title: title.to_string(),
            message: message.to_string(),
            priority,
        });
        Ok(())
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn local_time(day: NaiveDate, h: u32, min: u32) -> NaiveDateTime {
    day.and_hms_opt(h, min, 0).unwrap()
}

pub fn manual_clock(day: NaiveDate, h: u32, min: u32) -> Arc<ManualClock> {
    Arc::new(ManualClock::at_local(local_time(day, h, min)).unwrap())
}

pub fn collaborators(http: Arc<ScriptedHttp>, clock: Arc<ManualClock>, sync: Arc<dyn DownstreamSync>) -> Collaborators {
    let clock: SharedClock = clock;
    Collaborators {
        http,
        clock,
        sync,
        accounts: None,
    }
}

/// One active-permit record as the upstream portal returns it.
pub fn permit_record(code: &str, text: &str, apply_time: &str, start: NaiveDate, end: NaiveDate) -> Value {
    json!({
        "blzt": code,
        "blztmc": text,
        "sqsj": apply_time,
        "yxqs": start.format("%Y-%m-%d").to_string(),
        "yxqz": end.format("%Y-%m-%d").to_string(),
        "sxsyts": (end - start).num_days(),
        "jjzzlmc": "进京证（六环外）",
    })
}

pub fn account_response(plate: &str, records: Vec<Value>) -> Value {
    vehicles_response(vec![(plate, records)])
}

/// One account holding several vehicles.
pub fn vehicles_response(vehicles: Vec<(&str, Vec<Value>)>) -> Value {
    let vehicles: Vec<Value> = vehicles
        .into_iter()
        .map(|(plate, records)| json!({"hphm": plate, "sycs": "8", "bzxx": records, "ecbzxx": []}))
        .collect();
    json!({"code": 200, "data": {"bzclxx": vehicles}})
}

pub fn empty_account_response() -> Value {
    json!({"code": 200, "data": {"bzclxx": []}})
}

/// Weekly rules starting at `first`, one entry per `numbers` element.
pub fn rules_response(first: NaiveDate, numbers: &[&str]) -> Value {
    let result: Vec<Value> = numbers
        .iter()
        .enumerate()
        .map(|(offset, limited)| {
            let day = first + chrono::Duration::days(offset as i64);
            json!({
                "limitedTime": day.format("%Y年%m月%d日").to_string(),
                "limitedNumber": limited,
                "description": "工作日限行",
            })
        })
        .collect();
    json!({"state": "success", "result": result})
}

pub fn now_of(clock: &ManualClock) -> DateTime<Local> {
    jjz_alert::clock::Clock::now(clock)
}
