//! Trip preference vocabularies
//!
//! Each preference value carries a human-readable detail line that is fed to
//! the planning prompt and shown by `tp preferences`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declares a preference enum with its wire label and detail line
macro_rules! preference_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $category:literal {
            $($variant:ident => $label:literal, $details:literal;)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            /// Every value, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Category name used in listings
            pub const CATEGORY: &'static str = $category;

            /// Wire label, e.g. `NO_CONSTRAINTS`
            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            /// Human-readable description used in prompts
            pub fn details(&self) -> &'static str {
                match self {
                    $($name::$variant => $details,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
                match wanted.as_str() {
                    $($label => Ok($name::$variant),)+
                    _ => Err(format!("Unknown {} '{}'", $category, s)),
                }
            }
        }
    };
}

preference_enum! {
    /// Accessibility needs of the travellers
    PhysicalConstraint, "physical constraint" {
        MobilityAssistance => "MOBILITY_ASSISTANCE", "Requires wheelchair accessibility and mobility assistance";
        HearingImpairment => "HEARING_IMPAIRMENT", "Hearing impairment, needs visual aids and written communication";
        VisualImpairment => "VISUAL_IMPAIRMENT", "Visual impairment, needs audio descriptions and accessible formats";
        NoConstraints => "NO_CONSTRAINTS", "No physical limitations";
    }
}

preference_enum! {
    LanguagePreference, "language preference" {
        EnglishPreferred => "ENGLISH_PREFERRED", "English-speaking guides and services preferred";
        NativeLanguageRequired => "NATIVE_LANGUAGE_REQUIRED", "Local language immersion and native language speakers required";
        MultilingualOk => "MULTILINGUAL_OK", "Multiple language options available, flexible with languages";
    }
}

preference_enum! {
    TripPurpose, "trip purpose" {
        Leisure => "LEISURE", "Relaxation and enjoyment focused trip";
        Business => "BUSINESS", "Business meetings, conferences, and work-related activities";
        Bleisure => "BLEISURE", "Mix of business and leisure activities";
        Relocation => "RELOCATION", "Moving to a new location, exploring potential new home";
    }
}

preference_enum! {
    Interest, "interest" {
        ScubaDiving => "SCUBA_DIVING", "Underwater exploration and diving experiences";
        MuseumsArt => "MUSEUMS_ART", "Cultural experiences, art galleries, and museums";
        Shopping => "SHOPPING", "Shopping destinations, local markets, and retail experiences";
        Nightlife => "NIGHTLIFE", "Nightlife, entertainment, bars, and evening activities";
        WildlifeSafari => "WILDLIFE_SAFARI", "Wildlife viewing, safari experiences, and nature conservation";
        SportsActivities => "SPORTS_ACTIVITIES", "Sports, outdoor activities, and adventure experiences";
        Photography => "PHOTOGRAPHY", "Photography opportunities, scenic locations, and photo tours";
        FestivalsEvents => "FESTIVALS_EVENTS", "Local festivals, cultural events, and celebrations";
    }
}

preference_enum! {
    /// How full each day should be
    Pace, "pace" {
        Relaxed => "RELAXED", "Leisurely pace with plenty of rest time and minimal rushing";
        Balanced => "BALANCED", "Balanced mix of activities and rest periods";
        Packed => "PACKED", "Fast-paced itinerary with many activities and minimal downtime";
    }
}

/// One labelled option for listings
#[derive(Debug, Clone, Serialize)]
pub struct PreferenceOption {
    pub label: &'static str,
    pub details: &'static str,
}

/// All vocabularies, grouped by category
#[derive(Debug, Clone, Serialize)]
pub struct PreferenceCatalog {
    pub physical_constraints: Vec<PreferenceOption>,
    pub language_preferences: Vec<PreferenceOption>,
    pub trip_purposes: Vec<PreferenceOption>,
    pub interests: Vec<PreferenceOption>,
    pub pace: Vec<PreferenceOption>,
}

impl PreferenceCatalog {
    pub fn build() -> Self {
        Self {
            physical_constraints: PhysicalConstraint::ALL.iter().map(|v| option(v.label(), v.details())).collect(),
            language_preferences: LanguagePreference::ALL.iter().map(|v| option(v.label(), v.details())).collect(),
            trip_purposes: TripPurpose::ALL.iter().map(|v| option(v.label(), v.details())).collect(),
            interests: Interest::ALL.iter().map(|v| option(v.label(), v.details())).collect(),
            pace: Pace::ALL.iter().map(|v| option(v.label(), v.details())).collect(),
        }
    }

    /// (category, options) pairs in display order
    pub fn sections(&self) -> Vec<(&'static str, &[PreferenceOption])> {
        vec![
            ("physical_constraints", self.physical_constraints.as_slice()),
            ("language_preferences", self.language_preferences.as_slice()),
            ("trip_purposes", self.trip_purposes.as_slice()),
            ("interests", self.interests.as_slice()),
            ("pace", self.pace.as_slice()),
        ]
    }
}

fn option(label: &'static str, details: &'static str) -> PreferenceOption {
    PreferenceOption { label, details }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_round_trip_through_serde() {
        let json = serde_json::to_string(&Interest::MuseumsArt).unwrap();
        assert_eq!(json, "\"MUSEUMS_ART\"");
        let back: Interest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Interest::MuseumsArt);
    }

    #[test]
    fn test_from_str_is_lenient() {
        assert_eq!("relaxed".parse::<Pace>().unwrap(), Pace::Relaxed);
        assert_eq!("scuba-diving".parse::<Interest>().unwrap(), Interest::ScubaDiving);
        assert_eq!(
            "native language required".parse::<LanguagePreference>().unwrap(),
            LanguagePreference::NativeLanguageRequired
        );
        assert!("sleepy".parse::<Pace>().is_err());
    }

    #[test]
    fn test_details() {
        assert_eq!(PhysicalConstraint::NoConstraints.details(), "No physical limitations");
        assert!(Pace::Relaxed.details().starts_with("Leisurely pace"));
    }

    #[test]
    fn test_catalog_covers_every_value() {
        let catalog = PreferenceCatalog::build();
        assert_eq!(catalog.physical_constraints.len(), 4);
        assert_eq!(catalog.language_preferences.len(), 3);
        assert_eq!(catalog.trip_purposes.len(), 4);
        assert_eq!(catalog.interests.len(), 8);
        assert_eq!(catalog.pace.len(), 3);
        assert_eq!(catalog.sections().len(), 5);
    }
}
