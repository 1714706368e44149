//! County pickers. The portal renders two structurally different ones: a dropdown on the
//! plate search form and a separate picker after zip entry.

use action_primitives::{OptionMatch, Primitives};
use tracing::{debug, info};

use crate::renewal::selectors;

/// What a resolver managed to do.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CountyResolution {
    pub selected: Option<String>,
    pub submitted: bool,
}

/// Selects the county on the plate search form (case-insensitive substring, first match)
/// and submits the express renewal form.
pub async fn beginning_county_selection(prims: &Primitives<'_>, county: &str) -> CountyResolution {
    let selected = match prims
        .select_matching(
            selectors::BEGINNING_COUNTY_DROPDOWN,
            county,
            OptionMatch::ContainsIgnoreCase,
        )
        .await
    {
        Ok(selected) => selected,
        Err(err) => {
            debug!(county, error = %err, "beginning county dropdown unusable");
            None
        }
    };
    if let Some(label) = &selected {
        info!(county, option = %label, "county preselected");
    }

    let submitted = match prims.session().find_one(selectors::EXPRESS_RENEW_FORM).await {
        Ok(Some(form)) => match prims.session().submit_form(&form).await {
            Ok(()) => true,
            Err(err) => {
                debug!(error = %err, "express renewal form submit failed");
                false
            }
        },
        Ok(None) => {
            debug!("no express renewal form on page");
            false
        }
        Err(err) => {
            debug!(error = %err, "express renewal form lookup failed");
            false
        }
    };
    CountyResolution {
        selected,
        submitted,
    }
}

/// Selects the county on the post-zip picker (case-sensitive substring, first match)
/// and clicks its submit control. Skipped entirely when the picker never appears.
pub async fn county_selection_element(prims: &Primitives<'_>, county: &str) -> CountyResolution {
    if let Err(err) = prims.wait_present(selectors::COUNTY_DROPDOWN).await {
        debug!(error = %err, "county picker not shown");
        return CountyResolution::default();
    }

    let selected = match prims
        .select_matching(selectors::COUNTY_DROPDOWN, county, OptionMatch::Contains)
        .await
    {
        Ok(selected) => selected,
        Err(err) => {
            debug!(county, error = %err, "county picker selection failed");
            None
        }
    };
    match &selected {
        Some(label) => info!(county, option = %label, "county selected"),
        None => debug!(county, "no county option matched"),
    }

    let submitted = match prims.click_if_present(selectors::COUNTY_SUBMIT_BUTTON).await {
        Ok(clicked) => clicked,
        Err(err) => {
            debug!(error = %err, "county submit click failed");
            false
        }
    };
    CountyResolution {
        selected,
        submitted,
    }
}
