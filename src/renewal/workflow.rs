//! Renewal state machine.
//!
//! A run starts at the portal root and moves through explicit [`WorkflowState`] values.
//! Each transition reads the page only as far as it needs to pick the next state.

use std::time::Instant;

use action_primitives::{Primitives, Timings};
use cdp_adapter::ElementSession;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::diagnostics::Diagnostics;
use crate::errors::RenewalError;
use crate::metrics;
use crate::renewal::county::{beginning_county_selection, county_selection_element};
use crate::renewal::fees::collect_fee_summary;
use crate::renewal::filler::{fill_form_page, fill_street_number_page};
use crate::renewal::inspector::classify;
use crate::renewal::model::{
    FeeSummary, PageState, PaymentOutcome, PaymentRequest, RenewalRequest, Workflow,
    WorkflowState,
};
use crate::renewal::payment::handle_payment_processing;
use crate::renewal::selectors;

/// Settings shared by every run.
#[derive(Clone, Debug)]
pub struct RenewalContext {
    pub portal_url: String,
    pub timings: Timings,
    pub diagnostics: Diagnostics,
}

impl RenewalContext {
    pub fn new(portal_url: impl Into<String>, timings: Timings, diagnostics: Diagnostics) -> Self {
        Self {
            portal_url: portal_url.into(),
            timings,
            diagnostics,
        }
    }
}

/// Runs the quote flow and returns the fee summary.
pub async fn quote(
    session: &dyn ElementSession,
    ctx: &RenewalContext,
    request: &RenewalRequest,
) -> Result<FeeSummary, RenewalError> {
    RenewalRun::quote(session, ctx, request).run().await
}

/// Runs the full flow including payment and returns the fee summary that was paid.
pub async fn complete(
    session: &dyn ElementSession,
    ctx: &RenewalContext,
    request: &PaymentRequest,
) -> Result<FeeSummary, RenewalError> {
    RenewalRun::complete(session, ctx, request).run().await
}

/// One run against one session.
pub struct RenewalRun<'a> {
    prims: Primitives<'a>,
    ctx: &'a RenewalContext,
    renewal: &'a RenewalRequest,
    payment: Option<&'a PaymentRequest>,
}

impl<'a> RenewalRun<'a> {
    pub fn quote(
        session: &'a dyn ElementSession,
        ctx: &'a RenewalContext,
        request: &'a RenewalRequest,
    ) -> Self {
        Self {
            prims: Primitives::new(session, ctx.timings),
            ctx,
            renewal: request,
            payment: None,
        }
    }

    pub fn complete(
        session: &'a dyn ElementSession,
        ctx: &'a RenewalContext,
        request: &'a PaymentRequest,
    ) -> Self {
        Self {
            prims: Primitives::new(session, ctx.timings),
            ctx,
            renewal: &request.renewal,
            payment: Some(request),
        }
    }

    pub fn workflow(&self) -> Workflow {
        if self.payment.is_some() {
            Workflow::Complete
        } else {
            Workflow::Quote
        }
    }

    pub async fn run(&self) -> Result<FeeSummary, RenewalError> {
        let span = info_span!(
            "renewal",
            plate = %self.renewal.plate_number,
            workflow = %self.workflow()
        );
        self.drive().instrument(span).await
    }

    async fn drive(&self) -> Result<FeeSummary, RenewalError> {
        let started = Instant::now();
        let session = self.prims.session();
        let plate = self.renewal.plate_number.as_str();
        let workflow = self.workflow().as_str();

        let mut state = WorkflowState::Start;
        while !state.is_terminal() {
            state = self.advance(state).await;
            info!(state = state.name(), "workflow transition");
            if !state.is_terminal() {
                self.ctx
                    .diagnostics
                    .capture_step(session, plate, state.name())
                    .await;
            }
        }

        match state {
            WorkflowState::Completed(summary) => {
                metrics::record_workflow(workflow, "success", started.elapsed());
                info!(total = summary.total(), "workflow completed");
                Ok(summary)
            }
            WorkflowState::Failed(err) => {
                warn!(error = %err, fault = ?err.fault(), "workflow failed");
                self.ctx
                    .diagnostics
                    .capture_failure(session, plate, "failed")
                    .await;
                metrics::record_workflow(workflow, err.outcome_label(), started.elapsed());
                Err(err)
            }
            other => Err(RenewalError::Aborted(format!(
                "workflow stopped in state {}",
                other.name()
            ))),
        }
    }

    /// Performs the transition out of `state`. Terminal states are returned unchanged.
    pub async fn advance(&self, state: WorkflowState) -> WorkflowState {
        let next = match state {
            WorkflowState::Start => self
                .search_plate()
                .await
                .map(|()| WorkflowState::CountySelected),
            WorkflowState::CountySelected => self
                .resolve_street_number()
                .await
                .map(|()| WorkflowState::StreetNumberResolved),
            WorkflowState::StreetNumberResolved => self.fill_or_shortcut().await,
            WorkflowState::FormSubmitted => self.collect_fees().await.map(WorkflowState::FeeCollected),
            WorkflowState::FeeCollected(summary) => match self.payment {
                None => Ok(WorkflowState::Completed(summary)),
                Some(payment) => self
                    .pay(payment, summary)
                    .await
                    .map(WorkflowState::PaymentSubmitted),
            },
            WorkflowState::PaymentSubmitted(summary) => {
                self.confirm(summary).await.map(WorkflowState::Completed)
            }
            terminal @ (WorkflowState::Completed(_) | WorkflowState::Failed(_)) => {
                return terminal
            }
        };
        next.unwrap_or_else(WorkflowState::Failed)
    }

    async fn search_plate(&self) -> Result<(), RenewalError> {
        let session = self.prims.session();
        session.navigate(&self.ctx.portal_url).await?;

        let input = self.prims.wait_present(selectors::PLATE_SEARCH_INPUT).await?;
        session
            .type_text(&input, &self.renewal.plate_number)
            .await?;
        beginning_county_selection(&self.prims, &self.renewal.county).await;

        let alert = self.prims.take_alert().await;
        let location = session.current_url().await?;
        if same_location(&location, &self.ctx.portal_url) {
            return Err(RenewalError::plate_rejected(alert.as_deref()));
        }
        if let Some(text) = alert {
            debug!(alert = %text, "alert after plate search accepted");
        }
        Ok(())
    }

    async fn resolve_street_number(&self) -> Result<(), RenewalError> {
        let page = classify(&self.prims).await;
        if page != PageState::StreetNumberPage {
            debug!(?page, "no street number lookup required");
            return Ok(());
        }
        match fill_street_number_page(&self.prims, self.renewal).await {
            Some(alert) => Err(RenewalError::StreetNumberRejected(alert)),
            None => Ok(()),
        }
    }

    async fn fill_or_shortcut(&self) -> Result<WorkflowState, RenewalError> {
        match classify(&self.prims).await {
            PageState::PricePage => {
                info!("price shown without contact form");
                self.collect_fees().await.map(WorkflowState::FeeCollected)
            }
            PageState::CountySelectionPage => {
                county_selection_element(&self.prims, &self.renewal.county).await;
                Ok(WorkflowState::FormSubmitted)
            }
            page => {
                debug!(?page, "filling contact form");
                fill_form_page(&self.prims, self.renewal).await;
                county_selection_element(&self.prims, &self.renewal.county).await;
                Ok(WorkflowState::FormSubmitted)
            }
        }
    }

    /// Reads the fee breakdown once the price page has rendered.
    ///
    /// The county submit click returns before navigation, so the total display is waited
    /// for first; a missing display falls through to extraction, which reports the failure.
    async fn collect_fees(&self) -> Result<FeeSummary, RenewalError> {
        if let Err(err) = self.prims.wait_present(&selectors::price_display()).await {
            debug!(error = %err, "price display not shown within element wait");
        }
        collect_fee_summary(&self.prims)
            .await
            .ok_or(RenewalError::FeeSummaryUnavailable)
    }

    async fn pay(
        &self,
        payment: &PaymentRequest,
        summary: FeeSummary,
    ) -> Result<FeeSummary, RenewalError> {
        match handle_payment_processing(&self.prims, payment, summary).await? {
            PaymentOutcome::Accepted { summary } => Ok(summary),
            PaymentOutcome::Rejected { reason } => Err(RenewalError::PaymentRejected(reason)),
        }
    }

    async fn confirm(&self, summary: FeeSummary) -> Result<FeeSummary, RenewalError> {
        match classify(&self.prims).await {
            PageState::SuccessfulPayment => Ok(summary),
            other => Err(RenewalError::PaymentNotConfirmed(other)),
        }
    }
}

fn same_location(current: &str, portal: &str) -> bool {
    current.trim_end_matches('/') == portal.trim_end_matches('/')
}
