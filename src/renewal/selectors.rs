//! CSS selectors and fixed constants of the renewal portal.

use crate::renewal::model::FeeLine;

/// Resubmissions allowed while the portal keeps reporting validation errors.
pub const MAX_ATTEMPTS: usize = 3;

/// URL fragment of the page shown after a successful payment.
pub const CONFIRMATION_URL_PATTERN: &str = "confirmation";

// Initial plate search
pub const PLATE_SEARCH_INPUT: &str = "input[name='plateNumber']";
pub const BEGINNING_COUNTY_DROPDOWN: &str = "select[name='county']";
pub const EXPRESS_RENEW_FORM: &str = "form[name^='expressRenew']";

// Street number page
pub const STREET_NUMBER_INPUT: &str = "#streetnum";
pub const STREET_PAGE_PLATE_INPUT: &str = "#plateFields > div > input[name='platenum']";
pub const STREET_SEARCH_BUTTON: &str = "#Searchbutton";

// Contact form
pub const NAME_INPUT: &str = "#name";
pub const ADDRESS_INPUT: &str = "#addressTwo";
pub const CITY_INPUT: &str = "#city";
pub const STATE_INPUT: &str = "#state";
pub const PHONE_INPUTS: [&str; 3] = ["#homePhone0", "#homePhone1", "#homePhone2"];
pub const EMAIL_INPUT: &str = "#email";
pub const ZIP_INPUT: &str = "#zip";
pub const CONFIRM_EMAIL_INPUT: &str = "#confirmemail";
pub const ADDRESS_VERIFIED_CHECKBOX: &str = "#addressVerified";
pub const FORM_SUBMIT_BUTTON: &str = "#payrenewal_None";
pub const VALIDATION_BANNER: &str = "div.swal2-header";
pub const VALIDATION_ACK_BUTTON: &str = "button.swal2-confirm.swal2-styled";

// Later-stage county picker
pub const COUNTY_DROPDOWN: &str = "#newCountyID";
pub const COUNTY_SUBMIT_BUTTON: &str = "#zipCodeSubmit";

// Payment frame
pub const ACCEPT_TERMS: &str = "#acceptTerms";
pub const PAYMENT_FRAME: &str = "#iframe";
pub const PAYMENT_ACCOUNT: &str = "#payment-account";
pub const PAYMENT_EXP_MONTH: &str = "#payment-expmonth-label > select";
pub const PAYMENT_EXP_YEAR: &str = "#payment-expyear-label > select";
pub const PAYMENT_CV: &str = "#payment-cv-label > input[type=text]";
pub const PAYMENT_SUBMIT: &str = "#payment-submit-button";

/// Where a fee line is rendered.
///
/// Descriptive lines live in the vehicle summary row, one column each. Monetary lines
/// are addressed by an id made from the label, with spaces escaped.
pub fn fee_field(line: FeeLine) -> String {
    let column = match line {
        FeeLine::County => Some(2),
        FeeLine::License => Some(3),
        FeeLine::Make => Some(4),
        FeeLine::Year => Some(5),
        FeeLine::ExpDate => Some(6),
        _ => None,
    };
    match column {
        Some(n) => format!(".row > .col-md-2:nth-child({}) div:nth-child(2)", n),
        None => format!("#{}\\ Display", line.label().replace(' ', "\\ ")),
    }
}

/// Price display whose presence marks the price page.
pub fn price_display() -> String {
    fee_field(FeeLine::Total)
}
