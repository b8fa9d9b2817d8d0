use async_trait::async_trait;
use logoscope_core::{AppError, ReportSection};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::fixtures::section_json;
use crate::notify::{Notification, Notifier};
use crate::payments::{CheckoutSession, CheckoutSessionRequest, PaymentGateway};
use crate::pipeline::ContentProvider;

/// Records every checkout request and answers with a predictable session.
#[derive(Clone, Default)]
pub struct FakeGateway {
    requests: Arc<Mutex<Vec<CheckoutSessionRequest>>>,
    failing: Arc<Mutex<bool>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<CheckoutSessionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, AppError> {
        if *self.failing.lock().unwrap() {
            return Err(AppError::external("payments", "gateway unavailable"));
        }
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        let id = format!("cs_test_{}", requests.len());
        Ok(CheckoutSession {
            url: format!("https://checkout.test/pay/{}", id),
            id,
        })
    }
}

/// Keeps every notification instead of sending it.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    failing: Arc<Mutex<bool>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), AppError> {
        if *self.failing.lock().unwrap() {
            return Err(AppError::external("smtp", "connection refused"));
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

#[derive(Default)]
struct ProviderState {
    describe_fails: bool,
    describe_hangs: bool,
    describe_delay: Option<Duration>,
    describe_calls: usize,
    extract_queue: HashMap<ReportSection, VecDeque<Result<Value, AppError>>>,
    hanging: HashSet<ReportSection>,
    extract_calls: HashMap<ReportSection, usize>,
    last_description: HashMap<ReportSection, String>,
}

/// Content provider with scripted answers. Unscripted extraction calls return a
/// valid section.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    state: Arc<Mutex<ProviderState>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next answer for `section`.
    pub fn push_extract(&self, section: ReportSection, answer: Result<Value, AppError>) {
        self.state
            .lock()
            .unwrap()
            .extract_queue
            .entry(section)
            .or_default()
            .push_back(answer);
    }

    /// Extraction calls for `section` never return.
    pub fn hang_on(&self, section: ReportSection) {
        self.state.lock().unwrap().hanging.insert(section);
    }

    pub fn hang_describe(&self) {
        self.state.lock().unwrap().describe_hangs = true;
    }

    pub fn fail_describe(&self) {
        self.state.lock().unwrap().describe_fails = true;
    }

    pub fn set_describe_delay(&self, delay: Duration) {
        self.state.lock().unwrap().describe_delay = Some(delay);
    }

    pub fn describe_calls(&self) -> usize {
        self.state.lock().unwrap().describe_calls
    }

    pub fn extract_calls(&self, section: ReportSection) -> usize {
        self.state
            .lock()
            .unwrap()
            .extract_calls
            .get(&section)
            .copied()
            .unwrap_or(0)
    }

    pub fn last_description(&self, section: ReportSection) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .last_description
            .get(&section)
            .cloned()
    }
}

#[async_trait]
impl ContentProvider for ScriptedProvider {
    async fn describe(&self, _image: &[u8], _media_type: &str) -> Result<String, AppError> {
        let (fails, hangs, delay) = {
            let mut state = self.state.lock().unwrap();
            state.describe_calls += 1;
            (state.describe_fails, state.describe_hangs, state.describe_delay)
        };

        if hangs {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fails {
            return Err(AppError::external("anthropic", "status 500: scripted failure"));
        }
        Ok("A bold geometric monogram in deep blue with generous negative space.".to_string())
    }

    async fn extract(
        &self,
        section: ReportSection,
        description: &str,
    ) -> Result<Value, AppError> {
        let (hangs, scripted) = {
            let mut state = self.state.lock().unwrap();
            *state.extract_calls.entry(section).or_default() += 1;
            state
                .last_description
                .insert(section, description.to_string());
            let scripted = state
                .extract_queue
                .get_mut(&section)
                .and_then(|queue| queue.pop_front());
            (state.hanging.contains(&section), scripted)
        };

        if hangs {
            std::future::pending::<()>().await;
        }
        scripted.unwrap_or_else(|| Ok(section_json(section)))
    }
}
