//! Trip planning request

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::preferences::{Interest, LanguagePreference, Pace, PhysicalConstraint, TripPurpose};

/// Reasons a planning request is rejected before any provider call
#[derive(Debug, Error, PartialEq)]
pub enum RequestError {
    #[error("location must not be empty")]
    MissingLocation,

    #[error("budget must be a non-negative number, got {0}")]
    InvalidBudget(f64),

    #[error("end date {end} is before start date {start}")]
    DateOrder { start: NaiveDate, end: NaiveDate },

    #[error("destinationCity is required when fixCity is set")]
    MissingDestinationCity,

    #[error("destinationCountry is required when fixCountry is set")]
    MissingDestinationCountry,

    #[error("fixCity and fixCountry cannot both be set")]
    ConflictingScope,
}

/// A free-form planning request. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripPlanRequest {
    /// Total budget, a planning reference rather than a hard cap
    pub budget: f64,

    pub start_date: NaiveDate,

    pub end_date: NaiveDate,

    /// Main destination (city or country)
    pub location: String,

    /// Free-text travel style, e.g. "food and architecture"
    #[serde(default)]
    pub style: String,

    /// Where the trip starts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_location: Option<String>,

    /// Stay within a single city
    #[serde(default)]
    pub fix_city: bool,

    /// Stay within a single country
    #[serde(default)]
    pub fix_country: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_city: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_country: Option<String>,

    #[serde(default)]
    pub physical_constraints: Vec<PhysicalConstraint>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_preference: Option<LanguagePreference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trip_purpose: Option<TripPurpose>,

    #[serde(default)]
    pub interests: Vec<Interest>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pace: Option<Pace>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_notes: Option<String>,
}

impl TripPlanRequest {
    /// Minimal request with no optional preferences
    pub fn new(location: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate, budget: f64) -> Self {
        Self {
            budget,
            start_date,
            end_date,
            location: location.into(),
            style: String::new(),
            from_location: None,
            fix_city: false,
            fix_country: false,
            destination_city: None,
            destination_country: None,
            physical_constraints: Vec::new(),
            language_preference: None,
            trip_purpose: None,
            interests: Vec::new(),
            pace: None,
            additional_notes: None,
        }
    }

    /// Check field consistency
    pub fn validate(&self) -> Result<(), RequestError> {
        debug!(location = %self.location, "TripPlanRequest::validate: called");
        if self.location.trim().is_empty() {
            return Err(RequestError::MissingLocation);
        }
        if !self.budget.is_finite() || self.budget < 0.0 {
            return Err(RequestError::InvalidBudget(self.budget));
        }
        if self.end_date < self.start_date {
            return Err(RequestError::DateOrder {
                start: self.start_date,
                end: self.end_date,
            });
        }
        if self.fix_city && self.fix_country {
            return Err(RequestError::ConflictingScope);
        }
        if self.fix_city && is_blank(&self.destination_city) {
            return Err(RequestError::MissingDestinationCity);
        }
        if self.fix_country && is_blank(&self.destination_country) {
            return Err(RequestError::MissingDestinationCountry);
        }
        Ok(())
    }

    /// One line describing how far the trip may roam
    pub fn trip_scope_description(&self) -> String {
        if self.fix_city {
            format!(
                "Explore within {} city only",
                self.destination_city.as_deref().unwrap_or(&self.location)
            )
        } else if self.fix_country {
            format!(
                "Explore multiple cities within {} country",
                self.destination_country.as_deref().unwrap_or(&self.location)
            )
        } else {
            format!(
                "Multi-country trip starting from {} and visiting nearby countries",
                self.destination_country.as_deref().unwrap_or(&self.location)
            )
        }
    }

    /// Every calendar day of the trip, inclusive
    pub fn daily_dates(&self) -> Vec<NaiveDate> {
        self.start_date.iter_days().take_while(|d| *d <= self.end_date).collect()
    }

    /// Number of nights between start and end
    pub fn nights(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(|v| v.trim().is_empty()).unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn request() -> TripPlanRequest {
        TripPlanRequest::new("Portugal", date(2025, 5, 1), date(2025, 5, 4), 2500.0)
    }

    #[test]
    fn test_valid_request() {
        assert_eq!(request().validate(), Ok(()));
    }

    #[test]
    fn test_date_order() {
        let mut req = request();
        req.end_date = date(2025, 4, 30);
        assert!(matches!(req.validate(), Err(RequestError::DateOrder { .. })));
    }

    #[test]
    fn test_budget_and_location() {
        let mut req = request();
        req.budget = -1.0;
        assert_eq!(req.validate(), Err(RequestError::InvalidBudget(-1.0)));

        let mut req = request();
        req.location = "  ".to_string();
        assert_eq!(req.validate(), Err(RequestError::MissingLocation));
    }

    #[test]
    fn test_scope_rules() {
        let mut req = request();
        req.fix_city = true;
        assert_eq!(req.validate(), Err(RequestError::MissingDestinationCity));
        req.destination_city = Some("Lisbon".to_string());
        assert_eq!(req.validate(), Ok(()));
        assert_eq!(req.trip_scope_description(), "Explore within Lisbon city only");

        req.fix_country = true;
        assert_eq!(req.validate(), Err(RequestError::ConflictingScope));

        let mut req = request();
        req.fix_country = true;
        assert_eq!(req.validate(), Err(RequestError::MissingDestinationCountry));
        req.destination_country = Some("Portugal".to_string());
        assert_eq!(req.trip_scope_description(), "Explore multiple cities within Portugal country");
    }

    #[test]
    fn test_daily_dates_inclusive() {
        let req = request();
        let days = req.daily_dates();
        assert_eq!(days.len(), 4);
        assert_eq!(days[0], date(2025, 5, 1));
        assert_eq!(days[3], date(2025, 5, 4));
        assert_eq!(req.nights(), 3);
    }

    #[test]
    fn test_deserialize_camel_case() {
        let json = r#"{
            "budget": 1200,
            "startDate": "2025-09-10",
            "endDate": "2025-09-12",
            "location": "Kyoto",
            "style": "temples and food",
            "fixCity": true,
            "destinationCity": "Kyoto",
            "interests": ["MUSEUMS_ART", "PHOTOGRAPHY"],
            "pace": "RELAXED"
        }"#;
        let req: TripPlanRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.location, "Kyoto");
        assert!(req.fix_city);
        assert_eq!(req.interests, vec![Interest::MuseumsArt, Interest::Photography]);
        assert_eq!(req.pace, Some(Pace::Relaxed));
        assert!(req.physical_constraints.is_empty());
        assert_eq!(req.validate(), Ok(()));
    }
}
