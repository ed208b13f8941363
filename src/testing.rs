//! In-memory portal for exercising the session and extraction flow without a browser.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::browser::{js_string, PortalBrowser, PortalPage};
use crate::config::{PortalConfig, Selectors};
use crate::error::PortalError;

/// Portal config pointing at fake hosts, with no settle wait.
pub fn fake_config() -> PortalConfig {
    PortalConfig {
        sso_prefix: "https://sso.test/".into(),
        personal_data_url: "https://portal.test/dados-gerais".into(),
        real_estate_url: "https://portal.test/patrimonio".into(),
        settle_wait: Duration::ZERO,
        ..PortalConfig::default()
    }
}

#[derive(Default)]
struct FakeState {
    url: String,
    authenticated: bool,
    pending: Option<String>,
    visited: Vec<String>,
    typed: Vec<(String, String)>,
    submits: usize,
    /// Accepted login still redirecting: target URL and when it arrives.
    redirect: Option<(Instant, String)>,
}

impl FakeState {
    fn finish_redirect(&mut self) {
        if let Some((at, target)) = self.redirect.take() {
            if Instant::now() >= at {
                self.authenticated = true;
                self.url = target;
            } else {
                self.redirect = Some((at, target));
            }
        }
    }
}

/// Scripted portal: every page redirects to the SSO host until the right
/// password is submitted; evaluations answer by which selector the script uses.
pub struct FakePortal {
    sso_prefix: String,
    selectors: Selectors,
    password: String,
    login_error: Option<String>,
    login_delay: Duration,
    personal_snapshot: Value,
    records: Value,
    state: Mutex<FakeState>,
}

impl FakePortal {
    pub fn new(config: &PortalConfig, password: &str) -> Self {
        Self {
            sso_prefix: config.sso_prefix.clone(),
            selectors: config.selectors.clone(),
            password: password.to_string(),
            login_error: None,
            login_delay: Duration::ZERO,
            personal_snapshot: json!({ "error": null }),
            records: json!([]),
            state: Mutex::new(FakeState::default()),
        }
    }

    pub fn with_login_error(mut self, message: &str) -> Self {
        self.login_error = Some(message.to_string());
        self
    }

    /// Delay between an accepted submit and the page leaving the SSO host.
    pub fn with_login_delay(mut self, delay: Duration) -> Self {
        self.login_delay = delay;
        self
    }

    pub fn with_personal_snapshot(mut self, snapshot: Value) -> Self {
        self.personal_snapshot = snapshot;
        self
    }

    pub fn with_records(mut self, records: Value) -> Self {
        self.records = records;
        self
    }

    pub fn mark_authenticated(&self) {
        self.state.lock().unwrap().authenticated = true;
    }

    pub fn url(&self) -> String {
        self.state.lock().unwrap().url.clone()
    }

    pub fn visited(&self) -> Vec<String> {
        self.state.lock().unwrap().visited.clone()
    }

    pub fn typed(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().typed.clone()
    }

    pub fn submit_count(&self) -> usize {
        self.state.lock().unwrap().submits
    }
}

#[async_trait]
impl PortalPage for FakePortal {
    async fn goto(&self, url: &str) -> Result<(), PortalError> {
        let mut state = self.state.lock().unwrap();
        state.visited.push(url.to_string());
        if state.authenticated {
            state.url = url.to_string();
        } else {
            state.url = format!("{}v2/loginForm?partID=PFAP", self.sso_prefix);
            state.pending = Some(url.to_string());
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String, PortalError> {
        let mut state = self.state.lock().unwrap();
        state.finish_redirect();
        Ok(state.url.clone())
    }

    async fn type_into(&self, selector: &str, text: &str) -> Result<(), PortalError> {
        let mut state = self.state.lock().unwrap();
        state.typed.push((selector.to_string(), text.to_string()));
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), PortalError> {
        if selector != self.selectors.submit {
            return Err(PortalError::Browser(format!("no element {selector}")));
        }
        let mut state = self.state.lock().unwrap();
        state.submits += 1;
        let accepted = state
            .typed
            .iter()
            .rev()
            .find(|(sel, _)| *sel == self.selectors.password)
            .is_some_and(|(_, typed)| *typed == self.password);
        if accepted {
            if let Some(target) = state.pending.take() {
                state.redirect = Some((Instant::now() + self.login_delay, target));
            }
            state.finish_redirect();
        }
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value, PortalError> {
        let uses = |selector: &str| script.contains(&js_string(selector));
        if uses(&self.selectors.login_error) {
            Ok(self.login_error.clone().map(Value::String).unwrap_or(Value::Null))
        } else if uses(&self.selectors.error_box) {
            Ok(self.personal_snapshot.clone())
        } else if uses(&self.selectors.record_collection) {
            Ok(self.records.clone())
        } else {
            Ok(Value::Null)
        }
    }
}

/// Counts `close` calls on a [`FakeBrowser`] after it has been moved into a run.
#[derive(Clone, Default)]
pub struct CloseCounter(Arc<AtomicUsize>);

impl CloseCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct FakeBrowser {
    portal: Arc<FakePortal>,
    closes: CloseCounter,
}

impl FakeBrowser {
    pub fn new(portal: FakePortal) -> Self {
        Self {
            portal: Arc::new(portal),
            closes: CloseCounter::default(),
        }
    }

    pub fn close_counter(&self) -> CloseCounter {
        self.closes.clone()
    }
}

#[async_trait]
impl PortalBrowser for FakeBrowser {
    type Page = Arc<FakePortal>;

    async fn new_page(&self) -> Result<Arc<FakePortal>, PortalError> {
        Ok(Arc::clone(&self.portal))
    }

    async fn close(self) -> Result<(), PortalError> {
        self.closes.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
