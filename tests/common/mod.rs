//! Scripted stand-in for the renewal portal.
//!
//! Pages are static element sets; clicks and form submits move between them through a
//! transition table. Every session opened from a [`SimulatedPortal`] reports into one
//! shared [`Recorder`] so tests can count opens and closes and inspect interactions.
//! A transition may be delayed, in which case the old page stays up until it lands.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use action_primitives::Timings;
use async_trait::async_trait;
use cdp_adapter::{
    AdapterError, AdapterErrorKind, ElementHandle, ElementSession, SessionFactory, SessionId,
};
use plate_renewal::diagnostics::Diagnostics;
use plate_renewal::renewal::selectors as sel;
use plate_renewal::renewal::{FeeLine, PaymentRequest, RenewalContext, RenewalRequest};

pub const PORTAL_URL: &str = "https://portal.test/renew";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Interaction {
    Navigate(String),
    Type(String, String),
    Click(String),
    Select(String, String),
    Submit(String),
    EnterFrame(String),
    DefaultContent,
    AlertAccepted(String),
    Screenshot,
}

#[derive(Clone, Debug, Default)]
pub struct Page {
    pub url: String,
    pub elements: HashSet<String>,
    pub options: HashMap<String, Vec<String>>,
    pub texts: HashMap<String, String>,
    /// Elements inside the `#iframe` document.
    pub frame_elements: HashSet<String>,
    pub frame_options: HashMap<String, Vec<String>>,
}

impl Page {
    pub fn at(path: &str) -> Self {
        Self {
            url: format!("{}{}", PORTAL_URL, path),
            ..Self::default()
        }
    }

    pub fn with(mut self, selectors: &[&str]) -> Self {
        self.elements.extend(selectors.iter().map(|s| s.to_string()));
        self
    }

    pub fn options(mut self, selector: &str, labels: &[&str]) -> Self {
        self.elements.insert(selector.to_string());
        self.options.insert(
            selector.to_string(),
            labels.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn text(mut self, selector: impl Into<String>, value: &str) -> Self {
        let selector = selector.into();
        self.elements.insert(selector.clone());
        self.texts.insert(selector, value.to_string());
        self
    }

    pub fn frame(mut self, selectors: &[&str]) -> Self {
        self.frame_elements
            .extend(selectors.iter().map(|s| s.to_string()));
        self
    }

    pub fn frame_options(mut self, selector: &str, labels: &[&str]) -> Self {
        self.frame_elements.insert(selector.to_string());
        self.frame_options.insert(
            selector.to_string(),
            labels.iter().map(|s| s.to_string()).collect(),
        );
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct Transition {
    pub to: Option<String>,
    pub alert: Option<String>,
    /// Time between the click and the new page being shown.
    pub delay: Duration,
}

#[derive(Clone, Debug)]
pub struct Script {
    pub start: String,
    pub pages: HashMap<String, Page>,
    /// Keyed by (page, selector clicked or submitted).
    pub transitions: HashMap<(String, String), Transition>,
    /// Submit clicks answered with the validation banner before the form goes through.
    pub validation_failures: usize,
    pub panic_on: Option<String>,
    pub stall_on: Option<String>,
    pub screenshot_fails: bool,
}

impl Script {
    pub fn new(start: &str) -> Self {
        Self {
            start: start.to_string(),
            pages: HashMap::new(),
            transitions: HashMap::new(),
            validation_failures: 0,
            panic_on: None,
            stall_on: None,
            screenshot_fails: false,
        }
    }

    pub fn page(mut self, name: &str, page: Page) -> Self {
        self.pages.insert(name.to_string(), page);
        self
    }

    pub fn on(mut self, page: &str, selector: &str, to: &str) -> Self {
        self.transitions.insert(
            (page.to_string(), selector.to_string()),
            Transition {
                to: Some(to.to_string()),
                ..Transition::default()
            },
        );
        self
    }

    pub fn alert_on(mut self, page: &str, selector: &str, alert: &str) -> Self {
        self.transitions.insert(
            (page.to_string(), selector.to_string()),
            Transition {
                alert: Some(alert.to_string()),
                ..Transition::default()
            },
        );
        self
    }

    /// Makes an existing transition land `delay` after the triggering action.
    pub fn delayed(mut self, page: &str, selector: &str, delay: Duration) -> Self {
        if let Some(transition) = self
            .transitions
            .get_mut(&(page.to_string(), selector.to_string()))
        {
            transition.delay = delay;
        }
        self
    }

    /// Plate search, then the street number lookup, then the price page.
    pub fn price_after_street() -> Self {
        Script::new("search")
            .page("search", search_page())
            .page("street", street_page())
            .page("price", price_page())
            .page("confirmation", Page::at("/confirmation"))
            .on("search", sel::EXPRESS_RENEW_FORM, "street")
            .on("street", sel::STREET_SEARCH_BUTTON, "price")
            .on("price", sel::PAYMENT_SUBMIT, "confirmation")
    }

    /// Plate search, contact form, post-zip county picker, price page.
    pub fn full_form() -> Self {
        Script::new("search")
            .page("search", search_page())
            .page("form", form_page())
            .page("county", county_page())
            .page("price", price_page())
            .page("confirmation", Page::at("/confirmation"))
            .on("search", sel::EXPRESS_RENEW_FORM, "form")
            .on("form", sel::FORM_SUBMIT_BUTTON, "county")
            .on("county", sel::COUNTY_SUBMIT_BUTTON, "price")
            .on("price", sel::PAYMENT_SUBMIT, "confirmation")
    }
}

pub fn search_page() -> Page {
    Page::at("")
        .with(&[sel::PLATE_SEARCH_INPUT, sel::EXPRESS_RENEW_FORM])
        .options(
            sel::BEGINNING_COUNTY_DROPDOWN,
            &["-- Select --", "DAVIDSON COUNTY", "KNOX COUNTY"],
        )
}

pub fn street_page() -> Page {
    Page::at("/street").with(&[
        sel::STREET_NUMBER_INPUT,
        sel::STREET_PAGE_PLATE_INPUT,
        sel::STREET_SEARCH_BUTTON,
    ])
}

pub fn form_page() -> Page {
    Page::at("/details").with(&[
        sel::NAME_INPUT,
        sel::ADDRESS_INPUT,
        sel::CITY_INPUT,
        sel::STATE_INPUT,
        sel::PHONE_INPUTS[0],
        sel::PHONE_INPUTS[1],
        sel::PHONE_INPUTS[2],
        sel::EMAIL_INPUT,
        sel::ZIP_INPUT,
        sel::CONFIRM_EMAIL_INPUT,
        sel::FORM_SUBMIT_BUTTON,
    ])
}

pub fn county_page() -> Page {
    Page::at("/county")
        .with(&[sel::COUNTY_SUBMIT_BUTTON])
        .options(sel::COUNTY_DROPDOWN, &["Anderson", "Davidson", "Knox"])
}

pub fn price_page() -> Page {
    let mut page = Page::at("/price")
        .with(&[sel::ACCEPT_TERMS, sel::PAYMENT_FRAME])
        .frame(&[sel::PAYMENT_ACCOUNT, sel::PAYMENT_CV, sel::PAYMENT_SUBMIT])
        .frame_options(sel::PAYMENT_EXP_MONTH, &["01", "02", "09", "12"])
        .frame_options(sel::PAYMENT_EXP_YEAR, &["26", "27", "28"]);
    let values = [
        (FeeLine::County, "DAVIDSON"),
        (FeeLine::License, "ABC123"),
        (FeeLine::Make, "TOYT"),
        (FeeLine::Year, "2019"),
        (FeeLine::ExpDate, "10/31/2026"),
        (FeeLine::Registration, "$26.50"),
        (FeeLine::OnlineFee, "$1.00"),
        (FeeLine::CountyWheelTax, "$25.00"),
        (FeeLine::MailFee, "$0.00"),
        (FeeLine::Subtotal, "$52.50"),
        (FeeLine::ProcessingFee, "$0.25"),
        (FeeLine::Total, "$52.75"),
    ];
    for (line, value) in values {
        page = page.text(line.selector(), value);
    }
    page
}

pub fn renewal_request(county: &str) -> RenewalRequest {
    RenewalRequest {
        plate_number: "ABC123".into(),
        county: county.into(),
        name: "JANE DOE".into(),
        address_line: "742 Evergreen Terrace".into(),
        city: "Nashville".into(),
        state: "TN".into(),
        zip: "37201".into(),
        home_phone0: "615".into(),
        home_phone1: "555".into(),
        home_phone2: "0100".into(),
        email: "jane@example.com".into(),
        confirm_email: "jane@example.com".into(),
    }
}

pub fn payment_request(county: &str) -> PaymentRequest {
    PaymentRequest {
        renewal: renewal_request(county),
        account: "4111111111111111".into(),
        exp_month: "09".into(),
        exp_year: "2027".into(),
        cv: "123".into(),
    }
}

pub fn context() -> RenewalContext {
    RenewalContext::new(PORTAL_URL, Timings::immediate(), Diagnostics::disabled())
}

/// What every session of one portal reported.
#[derive(Debug, Default)]
pub struct Recorder {
    pub opens: usize,
    pub closes: usize,
    pub log: Vec<Interaction>,
    /// The same interactions with the (tokio) time they happened.
    pub timeline: Vec<(Instant, Interaction)>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Clone)]
pub struct SimulatedPortal {
    script: Arc<Script>,
    recorder: Arc<Mutex<Recorder>>,
    fail_open: bool,
}

impl SimulatedPortal {
    pub fn new(script: Script) -> Self {
        Self {
            script: Arc::new(script),
            recorder: Arc::new(Mutex::new(Recorder::default())),
            fail_open: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            fail_open: true,
            ..Self::new(Script::new("none"))
        }
    }

    pub fn opens(&self) -> usize {
        lock(&self.recorder).opens
    }

    pub fn closes(&self) -> usize {
        lock(&self.recorder).closes
    }

    pub fn log(&self) -> Vec<Interaction> {
        lock(&self.recorder).log.clone()
    }

    pub fn count(&self, wanted: &Interaction) -> usize {
        lock(&self.recorder)
            .log
            .iter()
            .filter(|entry| *entry == wanted)
            .count()
    }

    /// When the first write to `selector` happened.
    pub fn typed_at(&self, selector: &str) -> Option<Instant> {
        lock(&self.recorder)
            .timeline
            .iter()
            .find(|(_, entry)| matches!(entry, Interaction::Type(s, _) if s == selector))
            .map(|(at, _)| *at)
    }

    /// A session not tied to the factory's open counter.
    pub fn session(&self) -> SimSession {
        SimSession::new(self.script.clone(), self.recorder.clone())
    }
}

#[async_trait]
impl SessionFactory for SimulatedPortal {
    async fn open(&self) -> Result<Box<dyn ElementSession>, AdapterError> {
        if self.fail_open {
            return Err(AdapterError::io("browser failed to launch"));
        }
        lock(&self.recorder).opens += 1;
        Ok(Box::new(self.session()))
    }
}

#[derive(Debug)]
struct SimState {
    page: String,
    in_frame: bool,
    banner: bool,
    failures_left: usize,
    alert: Option<String>,
    values: HashMap<String, String>,
    /// Page a delayed transition is heading to, and when it lands.
    pending: Option<(String, Instant)>,
    closed: bool,
}

pub struct SimSession {
    id: SessionId,
    script: Arc<Script>,
    recorder: Arc<Mutex<Recorder>>,
    state: Mutex<SimState>,
}

impl SimSession {
    fn new(script: Arc<Script>, recorder: Arc<Mutex<Recorder>>) -> Self {
        let state = SimState {
            page: "blank".to_string(),
            in_frame: false,
            banner: false,
            failures_left: script.validation_failures,
            alert: None,
            values: HashMap::new(),
            pending: None,
            closed: false,
        };
        Self {
            id: SessionId::new(),
            script,
            recorder,
            state: Mutex::new(state),
        }
    }

    /// Starts the session on a named page instead of the blank one.
    pub fn on_page(self, page: &str) -> Self {
        self.state().page = page.to_string();
        self
    }

    pub fn in_frame(&self) -> bool {
        self.state().in_frame
    }

    pub fn value(&self, selector: &str) -> Option<String> {
        self.state().values.get(selector).cloned()
    }

    /// Session state with any due delayed transition applied.
    fn state(&self) -> MutexGuard<'_, SimState> {
        let mut state = lock(&self.state);
        let due = matches!(&state.pending, Some((_, at)) if Instant::now() >= *at);
        if due {
            if let Some((to, _)) = state.pending.take() {
                state.page = to;
                state.values.clear();
            }
        }
        state
    }

    fn record(&self, entry: Interaction) {
        let mut recorder = lock(&self.recorder);
        recorder.timeline.push((Instant::now(), entry.clone()));
        recorder.log.push(entry);
    }

    fn present(&self, selector: &str) -> bool {
        let state = self.state();
        if state.banner
            && (selector == sel::VALIDATION_BANNER || selector == sel::VALIDATION_ACK_BUTTON)
        {
            return true;
        }
        match self.script.pages.get(&state.page) {
            Some(page) if state.in_frame => page.frame_elements.contains(selector),
            Some(page) => page.elements.contains(selector),
            None => false,
        }
    }

    fn require(&self, element: &ElementHandle) -> Result<(), AdapterError> {
        if self.present(&element.selector) {
            Ok(())
        } else {
            Err(AdapterError::not_found(&element.selector))
        }
    }

    fn fire(&self, selector: &str) {
        let mut state = self.state();
        let key = (state.page.clone(), selector.to_string());
        if let Some(transition) = self.script.transitions.get(&key) {
            if let Some(to) = &transition.to {
                if transition.delay.is_zero() {
                    state.page = to.clone();
                    state.values.clear();
                } else {
                    state.pending = Some((to.clone(), Instant::now() + transition.delay));
                }
            }
            if let Some(alert) = &transition.alert {
                state.alert = Some(alert.clone());
            }
        }
    }

    async fn hooks(&self, selector: &str) {
        if self.script.panic_on.as_deref() == Some(selector) {
            panic!("simulated portal crashed on {}", selector);
        }
        if self.script.stall_on.as_deref() == Some(selector) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
    }
}

#[async_trait]
impl ElementSession for SimSession {
    fn id(&self) -> SessionId {
        self.id
    }

    async fn navigate(&self, url: &str) -> Result<(), AdapterError> {
        self.record(Interaction::Navigate(url.to_string()));
        let mut state = self.state();
        if url.trim_end_matches('/') == PORTAL_URL {
            state.page = self.script.start.clone();
            state.in_frame = false;
            state.pending = None;
            Ok(())
        } else {
            Err(AdapterError::new(AdapterErrorKind::NavTimeout).with_hint(url.to_string()))
        }
    }

    async fn current_url(&self) -> Result<String, AdapterError> {
        let state = self.state();
        Ok(self
            .script
            .pages
            .get(&state.page)
            .map(|page| page.url.clone())
            .unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn find_one(&self, selector: &str) -> Result<Option<ElementHandle>, AdapterError> {
        self.hooks(selector).await;
        Ok(self
            .present(selector)
            .then(|| ElementHandle::first(selector)))
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<ElementHandle>, AdapterError> {
        Ok(self.find_one(selector).await?.into_iter().collect())
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), AdapterError> {
        self.require(element)?;
        self.record(Interaction::Click(element.selector.clone()));
        let selector = element.selector.as_str();
        {
            let mut state = self.state();
            if selector == sel::VALIDATION_ACK_BUTTON {
                state.banner = false;
                return Ok(());
            }
            if selector == sel::FORM_SUBMIT_BUTTON && state.failures_left > 0 {
                state.failures_left -= 1;
                state.banner = true;
                return Ok(());
            }
        }
        self.fire(selector);
        Ok(())
    }

    async fn type_text(&self, element: &ElementHandle, text: &str) -> Result<(), AdapterError> {
        self.require(element)?;
        self.record(Interaction::Type(element.selector.clone(), text.to_string()));
        self.state()
            .values
            .entry(element.selector.clone())
            .or_default()
            .push_str(text);
        Ok(())
    }

    async fn select_by_text(
        &self,
        element: &ElementHandle,
        visible_text: &str,
    ) -> Result<(), AdapterError> {
        let labels = self.option_labels(element).await?;
        if !labels.iter().any(|label| label == visible_text) {
            return Err(AdapterError::new(AdapterErrorKind::OptionNotFound)
                .with_hint(format!("{} has no option {}", element.selector, visible_text)));
        }
        self.record(Interaction::Select(
            element.selector.clone(),
            visible_text.to_string(),
        ));
        Ok(())
    }

    async fn option_labels(&self, element: &ElementHandle) -> Result<Vec<String>, AdapterError> {
        self.require(element)?;
        let state = self.state();
        let page = self.script.pages.get(&state.page);
        let options = match page {
            Some(page) if state.in_frame => page.frame_options.get(&element.selector),
            Some(page) => page.options.get(&element.selector),
            None => None,
        };
        Ok(options.cloned().unwrap_or_default())
    }

    async fn text(&self, element: &ElementHandle) -> Result<String, AdapterError> {
        self.require(element)?;
        let state = self.state();
        Ok(self
            .script
            .pages
            .get(&state.page)
            .and_then(|page| page.texts.get(&element.selector))
            .cloned()
            .unwrap_or_default())
    }

    async fn submit_form(&self, form: &ElementHandle) -> Result<(), AdapterError> {
        self.require(form)?;
        self.record(Interaction::Submit(form.selector.clone()));
        self.fire(&form.selector);
        Ok(())
    }

    async fn switch_to_frame(&self, frame: &ElementHandle) -> Result<(), AdapterError> {
        self.require(frame)?;
        self.record(Interaction::EnterFrame(frame.selector.clone()));
        self.state().in_frame = true;
        Ok(())
    }

    async fn switch_to_default_content(&self) -> Result<(), AdapterError> {
        self.record(Interaction::DefaultContent);
        self.state().in_frame = false;
        Ok(())
    }

    async fn accept_alert(&self, _timeout: Duration) -> Result<Option<String>, AdapterError> {
        let alert = self.state().alert.take();
        if let Some(text) = &alert {
            self.record(Interaction::AlertAccepted(text.clone()));
        }
        Ok(alert)
    }

    async fn screenshot(&self) -> Result<Vec<u8>, AdapterError> {
        if self.script.screenshot_fails {
            return Err(AdapterError::io("capture failed"));
        }
        self.record(Interaction::Screenshot);
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }

    async fn close(&self) -> Result<(), AdapterError> {
        {
            let mut state = self.state();
            if state.closed {
                return Err(AdapterError::new(AdapterErrorKind::SessionClosed));
            }
            state.closed = true;
        }
        lock(&self.recorder).closes += 1;
        Ok(())
    }
}
