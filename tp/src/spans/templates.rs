//! Per-service-kind price lookup templates
//!
//! Each kind maps span details onto a fixed method, path and query shape.
//! Rendering is total: absent optional details are left out, required ones
//! are guaranteed by schema validation upstream. The rendered URL is the path
//! only; the booking provider joins it onto its configured base URL.

use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::{ApiSpec, ServiceClass, ServiceKind, SpanDetails};

/// Which detail feeds a query parameter
#[derive(Debug, Clone, Copy)]
enum Field {
    Location,
    Origin,
    Destination,
    Date,
    Checkin,
    Checkout,
    Passengers,
    Guests,
    Class,
}

struct Template {
    method: &'static str,
    path: &'static str,
    params: &'static [(&'static str, Field)],
}

const HOTEL: Template = Template {
    method: "GET",
    path: "/hotels/quote",
    params: &[
        ("location", Field::Location),
        ("checkin", Field::Checkin),
        ("checkout", Field::Checkout),
        ("guests", Field::Guests),
    ],
};

const FLIGHT: Template = Template {
    method: "GET",
    path: "/flights/quote",
    params: &[
        ("origin", Field::Origin),
        ("destination", Field::Destination),
        ("date", Field::Date),
        ("passengers", Field::Passengers),
        ("class", Field::Class),
    ],
};

const TRAIN: Template = Template {
    method: "GET",
    path: "/trains/quote",
    params: &[
        ("origin", Field::Origin),
        ("destination", Field::Destination),
        ("date", Field::Date),
        ("passengers", Field::Passengers),
        ("class", Field::Class),
    ],
};

const CAR: Template = Template {
    method: "GET",
    path: "/cars/quote",
    params: &[
        ("location", Field::Location),
        ("pickup", Field::Date),
        ("dropoff", Field::Checkout),
    ],
};

fn template_for(kind: ServiceKind) -> &'static Template {
    match kind {
        ServiceKind::Hotel => &HOTEL,
        ServiceKind::Flight => &FLIGHT,
        ServiceKind::Train => &TRAIN,
        ServiceKind::Car => &CAR,
    }
}

fn field_value(field: Field, details: &SpanDetails) -> Option<String> {
    match field {
        Field::Location => details
            .location
            .clone()
            .or_else(|| details.route.as_ref().map(|r| r.from.clone())),
        Field::Origin => details.route.as_ref().map(|r| r.from.clone()),
        Field::Destination => details.route.as_ref().map(|r| r.to.clone()),
        Field::Date => details.primary_date().map(|d| d.to_string()),
        Field::Checkin => details.checkin.map(|d| d.to_string()),
        Field::Checkout => details.checkout.map(|d| d.to_string()),
        Field::Passengers => Some(details.passengers.unwrap_or(1).to_string()),
        Field::Guests => Some(details.guests.or(details.passengers).unwrap_or(1).to_string()),
        Field::Class => Some(details.class.unwrap_or(ServiceClass::Economy).as_str().to_string()),
    }
}

/// Renders source-independent call specifications
#[derive(Debug, Clone, Default)]
pub struct ApiTemplates;

impl ApiTemplates {
    pub fn new() -> Self {
        Self
    }

    /// Substitute span details into the template for `kind`
    pub fn render(&self, kind: ServiceKind, details: &SpanDetails) -> ApiSpec {
        debug!(%kind, "ApiTemplates::render: called");
        let template = template_for(kind);
        let query: BTreeMap<String, String> = template
            .params
            .iter()
            .filter_map(|(name, field)| field_value(*field, details).map(|v| (name.to_string(), v)))
            .collect();

        let mut headers = BTreeMap::new();
        headers.insert("Accept".to_string(), "application/json".to_string());

        ApiSpec {
            method: template.method.to_string(),
            url: template.path.to_string(),
            headers,
            query,
            body: None,
        }
    }
}
