//! Plan output schema
//!
//! Two layers: `Raw*` types mirror the JSON the model writes (everything
//! optional and stringly typed), and `validate` turns them into typed plan
//! options or a list of every violation found. Nothing half-valid escapes.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::error::OutputError;
use crate::domain::{Activity, DayPlan, Route, ServiceClass, ServiceKind, SpanDetails, activity_id, parse_date};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOption {
    title: Option<String>,
    summary: Option<String>,
    #[serde(default)]
    days: Vec<RawDay>,
    #[serde(default)]
    booking_needed: Vec<RawBooking>,
}

#[derive(Debug, Deserialize)]
struct RawDay {
    date: Option<String>,
    #[serde(default)]
    activities: Vec<RawActivity>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawActivity {
    name: Option<String>,
    description: Option<String>,
    location: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBooking {
    span_id: Option<String>,
    service: Option<String>,
    location: Option<String>,
    from: Option<String>,
    to: Option<String>,
    checkin: Option<String>,
    checkout: Option<String>,
    date: Option<String>,
    passengers: Option<i64>,
    class: Option<String>,
    guests: Option<i64>,
}

/// A validated "booking needed" entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingNeed {
    /// Id proposed by the model, honoured when unique
    pub span_id: Option<String>,
    pub kind: ServiceKind,
    pub details: SpanDetails,
}

/// One validated trip option
#[derive(Debug, Clone, PartialEq)]
pub struct PlanOption {
    pub title: String,
    pub summary: Option<String>,
    pub days: Vec<DayPlan>,
    pub booking_needed: Vec<BookingNeed>,
}

/// Schema-valid model output
#[derive(Debug, Clone, PartialEq)]
pub struct PlanOutput {
    pub options: Vec<PlanOption>,
}

impl PlanOutput {
    /// The recommended option and the number of alternatives
    pub fn into_primary(mut self) -> Option<(PlanOption, usize)> {
        if self.options.is_empty() {
            return None;
        }
        let alternatives = self.options.len() - 1;
        Some((self.options.swap_remove(0), alternatives))
    }
}

/// Parse and validate a JSON payload
///
/// Accepts `{"options": [...]}` or a bare array of options.
pub fn parse_plan(json: &str) -> Result<PlanOutput, OutputError> {
    debug!(len = json.len(), "parse_plan: called");
    let value: Value = serde_json::from_str(json)?;
    let options_value = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => map
            .remove("options")
            .ok_or_else(|| OutputError::Schema(vec!["missing \"options\"".to_string()]))?,
        _ => return Err(OutputError::Schema(vec!["top level must be an object or array".to_string()])),
    };

    let raw: Vec<RawOption> = serde_json::from_value(options_value)
        .map_err(|e| OutputError::Schema(vec![format!("options: {}", e)]))?;
    validate(raw)
}

fn validate(raw: Vec<RawOption>) -> Result<PlanOutput, OutputError> {
    let mut problems = Vec::new();
    if raw.is_empty() {
        problems.push("options must contain at least one option".to_string());
    }

    let mut options = Vec::with_capacity(raw.len());
    for (i, option) in raw.into_iter().enumerate() {
        let path = format!("options[{}]", i);
        if let Some(option) = validate_option(&path, option, &mut problems) {
            options.push(option);
        }
    }

    if problems.is_empty() {
        Ok(PlanOutput { options })
    } else {
        debug!(count = problems.len(), "validate: schema violations");
        Err(OutputError::Schema(problems))
    }
}

fn validate_option(path: &str, raw: RawOption, problems: &mut Vec<String>) -> Option<PlanOption> {
    let before = problems.len();

    let title = non_empty(raw.title);
    if title.is_none() {
        problems.push(format!("{}.title is required", path));
    }
    if raw.days.is_empty() {
        problems.push(format!("{}.days must contain at least one day", path));
    }

    let mut days = Vec::with_capacity(raw.days.len());
    for (d, day) in raw.days.into_iter().enumerate() {
        let day_path = format!("{}.days[{}]", path, d);
        let date = match day.date.as_deref().and_then(parse_date) {
            Some(date) => date,
            None => {
                problems.push(format!("{}.date must be YYYY-MM-DD, got {:?}", day_path, day.date));
                continue;
            }
        };
        let mut activities = Vec::with_capacity(day.activities.len());
        for (a, activity) in day.activities.into_iter().enumerate() {
            let Some(name) = non_empty(activity.name) else {
                problems.push(format!("{}.activities[{}].name is required", day_path, a));
                continue;
            };
            let location = non_empty(activity.location);
            let category = non_empty(activity.category).unwrap_or_else(|| "general".to_string());
            activities.push(Activity {
                activity_id: activity_id(&name, location.as_deref().unwrap_or(""), &category),
                name,
                description: non_empty(activity.description),
                location,
                start_time: non_empty(activity.start_time),
                end_time: non_empty(activity.end_time),
                category,
            });
        }
        days.push(DayPlan { date, activities });
    }

    let mut booking_needed = Vec::with_capacity(raw.booking_needed.len());
    for (b, booking) in raw.booking_needed.into_iter().enumerate() {
        let booking_path = format!("{}.bookingNeeded[{}]", path, b);
        if let Some(need) = validate_booking(&booking_path, booking, problems) {
            booking_needed.push(need);
        }
    }

    if problems.len() > before {
        return None;
    }
    Some(PlanOption {
        title: title.unwrap_or_default(),
        summary: non_empty(raw.summary),
        days,
        booking_needed,
    })
}

fn validate_booking(path: &str, raw: RawBooking, problems: &mut Vec<String>) -> Option<BookingNeed> {
    let before = problems.len();

    let kind = match raw.service.as_deref().map(str::parse::<ServiceKind>) {
        Some(Ok(kind)) => Some(kind),
        Some(Err(_)) => {
            problems.push(format!(
                "{}.service must be one of hotel, flight, train, car, got {:?}",
                path, raw.service
            ));
            None
        }
        None => {
            problems.push(format!("{}.service is required", path));
            None
        }
    };

    let mut date_field = |name: &str, value: &Option<String>| match value.as_deref() {
        None => None,
        Some(s) => match parse_date(s) {
            Some(d) => Some(d),
            None => {
                problems.push(format!("{}.{} must be YYYY-MM-DD, got {:?}", path, name, s));
                None
            }
        },
    };
    let checkin = date_field("checkin", &raw.checkin);
    let checkout = date_field("checkout", &raw.checkout);
    let date = date_field("date", &raw.date);

    if let (Some(checkin), Some(checkout)) = (checkin, checkout) {
        if checkout < checkin {
            problems.push(format!("{}.checkout is before checkin", path));
        }
    }

    let passengers = count_field(path, "passengers", raw.passengers, problems);
    let guests = count_field(path, "guests", raw.guests, problems);

    let class = match raw.class.as_deref() {
        None => None,
        Some(s) => match s.parse::<ServiceClass>() {
            Ok(class) => Some(class),
            Err(_) => {
                problems.push(format!(
                    "{}.class must be one of economy, business, first, sleeper, premium, got {:?}",
                    path, s
                ));
                None
            }
        },
    };

    let location = non_empty(raw.location);
    let from = non_empty(raw.from);
    let to = non_empty(raw.to);

    let kind = kind?;
    match kind {
        ServiceKind::Hotel => {
            require(path, "location", location.is_some(), problems);
            require(path, "checkin", checkin.is_some() || raw.checkin.is_some(), problems);
            require(path, "checkout", checkout.is_some() || raw.checkout.is_some(), problems);
        }
        ServiceKind::Flight | ServiceKind::Train => {
            require(path, "from", from.is_some(), problems);
            require(path, "to", to.is_some(), problems);
            require(path, "date", date.is_some() || raw.date.is_some(), problems);
        }
        ServiceKind::Car => {
            require(path, "location", location.is_some() || from.is_some(), problems);
            require(path, "date", date.is_some() || checkin.is_some(), problems);
        }
    }

    if problems.len() > before {
        return None;
    }

    // a car picked up at `from` with no location is collected there
    let location = location.or_else(|| if kind == ServiceKind::Car { from.clone() } else { None });
    let route = match (from, to) {
        (Some(from), Some(to)) => Some(Route { from, to }),
        _ => None,
    };

    Some(BookingNeed {
        span_id: non_empty(raw.span_id),
        kind,
        details: SpanDetails {
            location,
            route,
            checkin,
            checkout,
            date,
            passengers,
            class,
            guests,
        },
    })
}

fn count_field(path: &str, name: &str, value: Option<i64>, problems: &mut Vec<String>) -> Option<u32> {
    match value {
        None => None,
        Some(n) if n >= 1 && n <= u32::MAX as i64 => Some(n as u32),
        Some(n) => {
            problems.push(format!("{}.{} must be at least 1, got {}", path, name, n));
            None
        }
    }
}

fn require(path: &str, field: &str, present: bool, problems: &mut Vec<String>) {
    if !present {
        problems.push(format!("{}.{} is required", path, field));
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const VALID: &str = r#"{
      "options": [
        {
          "title": "Lisbon and Porto",
          "summary": "Two cities, one river.",
          "days": [
            {"date": "2025-05-01", "activities": [
              {"name": "Belem Tower", "location": "Lisbon", "category": "sightseeing", "startTime": "09:00"}
            ]},
            {"date": "2025-05-02T00:00:00Z", "activities": []}
          ],
          "bookingNeeded": [
            {"service": "hotel", "location": "Lisbon", "checkin": "2025-05-01", "checkout": "2025-05-02", "guests": 2},
            {"service": "train", "from": "Lisbon", "to": "Porto", "date": "2025-05-02", "class": "first", "passengers": 2},
            {"spanId": "car-porto", "service": "car", "location": "Porto", "date": "2025-05-02"}
          ]
        },
        {"title": "Lisbon only", "days": [{"date": "2025-05-01", "activities": []}]}
      ]
    }"#;

    #[test]
    fn test_valid_plan() {
        let output = parse_plan(VALID).unwrap();
        assert_eq!(output.options.len(), 2);

        let (primary, alternatives) = output.into_primary().unwrap();
        assert_eq!(alternatives, 1);
        assert_eq!(primary.title, "Lisbon and Porto");
        assert_eq!(primary.days.len(), 2);
        assert_eq!(primary.days[1].date, NaiveDate::from_ymd_opt(2025, 5, 2).unwrap());
        assert!(primary.days[0].activities[0].activity_id.starts_with("act-"));
        assert_eq!(primary.booking_needed.len(), 3);

        let train = &primary.booking_needed[1];
        assert_eq!(train.kind, ServiceKind::Train);
        assert_eq!(train.details.class, Some(ServiceClass::First));
        assert_eq!(train.details.route.as_ref().unwrap().to, "Porto");
        assert_eq!(primary.booking_needed[2].span_id.as_deref(), Some("car-porto"));
    }

    #[test]
    fn test_bare_array_accepted() {
        let json = r#"[{"title": "A", "days": [{"date": "2025-01-01"}]}]"#;
        let output = parse_plan(json).unwrap();
        assert_eq!(output.options[0].title, "A");
        assert!(output.options[0].booking_needed.is_empty());
    }

    #[test]
    fn test_empty_options_rejected() {
        assert!(matches!(parse_plan(r#"{"options": []}"#), Err(OutputError::Schema(_))));
        assert!(matches!(parse_plan(r#"{"plans": []}"#), Err(OutputError::Schema(_))));
        assert!(matches!(parse_plan(r#""text""#), Err(OutputError::Schema(_))));
    }

    #[test]
    fn test_collects_every_violation() {
        let json = r#"{"options": [{
            "title": "",
            "days": [],
            "bookingNeeded": [
                {"service": "bus", "location": "X"},
                {"service": "hotel", "location": "Rome", "checkin": "2025-05-03", "checkout": "2025-05-01"},
                {"service": "flight", "from": "A", "to": "B", "date": "soon", "passengers": 0, "class": "coach"}
            ]
        }]}"#;

        let Err(OutputError::Schema(problems)) = parse_plan(json) else {
            panic!("expected schema error");
        };
        let all = problems.join("\n");
        assert!(all.contains("options[0].title is required"));
        assert!(all.contains("options[0].days must contain at least one day"));
        assert!(all.contains("bookingNeeded[0].service must be one of"));
        assert!(all.contains("bookingNeeded[1].checkout is before checkin"));
        assert!(all.contains("bookingNeeded[2].date must be YYYY-MM-DD"));
        assert!(all.contains("bookingNeeded[2].passengers must be at least 1"));
        assert!(all.contains("bookingNeeded[2].class must be one of"));
    }

    #[test]
    fn test_missing_required_fields_per_kind() {
        let json = r#"[{"title": "A", "days": [{"date": "2025-01-01"}], "bookingNeeded": [
            {"service": "hotel", "location": "Rome"},
            {"service": "flight", "from": "Rome"},
            {"service": "car"}
        ]}]"#;
        let Err(OutputError::Schema(problems)) = parse_plan(json) else {
            panic!("expected schema error");
        };
        assert!(problems.iter().any(|p| p == "options[0].bookingNeeded[0].checkin is required"));
        assert!(problems.iter().any(|p| p == "options[0].bookingNeeded[1].to is required"));
        assert!(problems.iter().any(|p| p == "options[0].bookingNeeded[2].location is required"));
    }

    #[test]
    fn test_wrong_types_are_schema_errors() {
        let json = r#"{"options": [{"title": "A", "days": "monday"}]}"#;
        assert!(matches!(parse_plan(json), Err(OutputError::Schema(_))));
    }

    #[test]
    fn test_syntax_error() {
        assert!(matches!(parse_plan("{\"options\": [}"), Err(OutputError::Syntax(_))));
    }
}
