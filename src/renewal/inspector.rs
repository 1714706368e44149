use action_primitives::Primitives;
use tracing::{debug, warn};

use crate::renewal::model::PageState;
use crate::renewal::selectors;

/// DOM observations the classifier decides on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageSignals {
    pub url: Option<String>,
    pub street_number_input: bool,
    pub price_display: bool,
    pub county_dropdown: bool,
    pub contact_form: bool,
}

impl PageSignals {
    /// Priority order: confirmation URL, street number, price, county picker, form.
    pub fn classify(&self) -> PageState {
        let Some(url) = self.url.as_deref() else {
            return PageState::Unknown;
        };
        if url.contains(selectors::CONFIRMATION_URL_PATTERN) {
            PageState::SuccessfulPayment
        } else if self.street_number_input {
            PageState::StreetNumberPage
        } else if self.price_display {
            PageState::PricePage
        } else if self.county_dropdown && !self.contact_form {
            PageState::CountySelectionPage
        } else {
            PageState::FormPage
        }
    }
}

/// Inspects the live page. Never fails; an unreadable location yields [`PageState::Unknown`].
pub async fn classify(prims: &Primitives<'_>) -> PageState {
    let url = match prims.session().current_url().await {
        Ok(url) => url,
        Err(err) => {
            warn!(error = %err, "page location unavailable");
            return PageState::Unknown;
        }
    };
    if url.contains(selectors::CONFIRMATION_URL_PATTERN) {
        return PageState::SuccessfulPayment;
    }

    let signals = PageSignals {
        url: Some(url),
        street_number_input: prims.is_present(selectors::STREET_NUMBER_INPUT).await,
        price_display: prims.is_present(&selectors::price_display()).await,
        county_dropdown: prims.is_present(selectors::COUNTY_DROPDOWN).await,
        contact_form: prims.is_present(selectors::NAME_INPUT).await,
    };
    let state = signals.classify();
    debug!(?state, ?signals, "page classified");
    state
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(url: &str) -> PageSignals {
        PageSignals {
            url: Some(url.to_string()),
            ..PageSignals::default()
        }
    }

    #[test]
    fn confirmation_url_beats_every_element() {
        let signals = PageSignals {
            street_number_input: true,
            price_display: true,
            county_dropdown: true,
            ..at("https://portal.example/renew/confirmation?id=9")
        };
        assert_eq!(signals.classify(), PageState::SuccessfulPayment);
    }

    #[test]
    fn street_number_beats_price() {
        let signals = PageSignals {
            street_number_input: true,
            price_display: true,
            ..at("https://portal.example/renew")
        };
        assert_eq!(signals.classify(), PageState::StreetNumberPage);
    }

    #[test]
    fn county_picker_only_without_contact_form() {
        let picker = PageSignals {
            county_dropdown: true,
            ..at("https://portal.example/renew")
        };
        assert_eq!(picker.classify(), PageState::CountySelectionPage);

        let form = PageSignals {
            contact_form: true,
            ..picker
        };
        assert_eq!(form.classify(), PageState::FormPage);
    }

    #[test]
    fn defaults() {
        assert_eq!(at("https://portal.example").classify(), PageState::FormPage);
        assert_eq!(PageSignals::default().classify(), PageState::Unknown);
    }
}
