//! Contact form and street-number page population, plus the bounded submit retry.

use action_primitives::{settle, FieldWrite, FillReport, Primitives};
use tracing::{debug, info, warn};

use crate::renewal::model::RenewalRequest;
use crate::renewal::selectors;

/// How a submission ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// Number of submit clicks issued.
    pub submissions: usize,
    /// False when the validation banner was still up after the last allowed resubmission
    /// or the submit control was missing.
    pub validation_cleared: bool,
}

fn contact_fields(prims: &Primitives<'_>, request: &RenewalRequest) -> Vec<FieldWrite> {
    let mut writes = vec![
        FieldWrite::new(selectors::NAME_INPUT, &request.name),
        FieldWrite::new(selectors::ADDRESS_INPUT, &request.address_line),
        FieldWrite::new(selectors::CITY_INPUT, &request.city),
        FieldWrite::new(selectors::STATE_INPUT, &request.state),
    ];
    let phones = [
        &request.home_phone0,
        &request.home_phone1,
        &request.home_phone2,
    ];
    for (selector, value) in selectors::PHONE_INPUTS.iter().zip(phones) {
        writes.push(FieldWrite::new(*selector, value));
    }
    writes.push(FieldWrite::new(selectors::EMAIL_INPUT, &request.email));
    writes.push(
        FieldWrite::new(selectors::ZIP_INPUT, &request.zip).with_settle(prims.timings().zip_settle()),
    );
    writes
}

/// Fills the contact form field by field and submits it.
pub async fn fill_form_page(prims: &Primitives<'_>, request: &RenewalRequest) -> FillReport {
    match prims
        .click_if_present(selectors::ADDRESS_VERIFIED_CHECKBOX)
        .await
    {
        Ok(true) => debug!("address verification checkbox ticked"),
        Ok(false) => {}
        Err(err) => debug!(error = %err, "address verification checkbox not clickable"),
    }

    let mut writes = contact_fields(prims, request);
    writes.push(FieldWrite::new(
        selectors::CONFIRM_EMAIL_INPUT,
        &request.confirm_email,
    ));
    let report = prims.fill_fields(&writes).await;
    info!(
        written = report.written.len(),
        skipped = report.skipped.len(),
        "contact form filled"
    );

    submit_with_retry(prims).await;
    report
}

/// Clicks submit and resubmits while the validation banner shows, at most
/// [`selectors::MAX_ATTEMPTS`] times. Never fails; callers re-inspect the page.
pub async fn submit_with_retry(prims: &Primitives<'_>) -> SubmitOutcome {
    let mut submissions = 0;
    for attempt in 0..=selectors::MAX_ATTEMPTS {
        match prims.click_if_present(selectors::FORM_SUBMIT_BUTTON).await {
            Ok(true) => submissions += 1,
            Ok(false) => {
                debug!(attempt, "submit control absent");
                return SubmitOutcome {
                    submissions,
                    validation_cleared: false,
                };
            }
            Err(err) => {
                debug!(attempt, error = %err, "submit click failed");
                return SubmitOutcome {
                    submissions,
                    validation_cleared: false,
                };
            }
        }
        settle(prims.timings().submit_settle()).await;

        if !prims.is_present(selectors::VALIDATION_BANNER).await {
            return SubmitOutcome {
                submissions,
                validation_cleared: true,
            };
        }
        if attempt == selectors::MAX_ATTEMPTS {
            warn!(submissions, "validation error persists, giving up on resubmission");
            break;
        }

        debug!(attempt, "validation banner shown, acknowledging");
        match prims
            .click_if_present(selectors::VALIDATION_ACK_BUTTON)
            .await
        {
            Ok(true) => {}
            Ok(false) | Err(_) => {
                debug!("validation banner has no acknowledgement control");
                break;
            }
        }
    }
    SubmitOutcome {
        submissions,
        validation_cleared: false,
    }
}

/// Fills the street-number lookup and returns the alert it raised, if any.
pub async fn fill_street_number_page(
    prims: &Primitives<'_>,
    request: &RenewalRequest,
) -> Option<String> {
    let report = prims
        .fill_fields(&[
            FieldWrite::new(selectors::STREET_NUMBER_INPUT, request.street_number()),
            FieldWrite::new(selectors::STREET_PAGE_PLATE_INPUT, &request.plate_number),
        ])
        .await;
    if !report.is_complete() {
        debug!(skipped = report.skipped.len(), "street number page partially filled");
    }

    match prims.click_if_present(selectors::STREET_SEARCH_BUTTON).await {
        Ok(true) => {}
        Ok(false) => debug!("street number search button absent"),
        Err(err) => debug!(error = %err, "street number search click failed"),
    }
    prims.take_alert().await
}
