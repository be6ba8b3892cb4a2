use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    AsRefStr,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum AreaCategory {
    Toilet,
    Kitchen,
    Office,
    MeetingRoom,
    Reception,
    Corridor,
    Stairwell,
    Lift,
    ChangingRoom,
    CarPark,
    BinStore,
    External,
    General,
}

/// Areas whose printed label is known to be misleading, keyed by customer.
const CUSTOMER_OVERRIDES: &[(&str, &str, AreaCategory)] = &[
    ("harbour offices", "level 3 tea point", AreaCategory::Kitchen),
    ("harbour offices", "the hub", AreaCategory::MeetingRoom),
    ("northgate retail park", "unit 4 back of house", AreaCategory::BinStore),
    ("northgate retail park", "staff welfare", AreaCategory::ChangingRoom),
    ("st. anne's medical centre", "sluice room", AreaCategory::Toilet),
    ("riverside academy", "the street", AreaCategory::Corridor),
];

/// Checked top to bottom, first hit wins. "Kitchen lift" is a lift, "meeting room corridor" is a corridor
/// only if nothing more specific matched first.
static RULES: Lazy<Vec<(AreaCategory, Regex)>> = Lazy::new(|| {
    let table: &[(AreaCategory, &str)] = &[
        (
            AreaCategory::Toilet,
            r"\b(toilets?|wc|washrooms?|restrooms?|lavatory|loos?|gents|ladies|bathrooms?|accessible\s+wc|urinals?)\b",
        ),
        (AreaCategory::ChangingRoom, r"\b(changing|locker\s*rooms?|showers?)\b"),
        (AreaCategory::Lift, r"\b(lifts?|elevators?)\b"),
        (AreaCategory::Stairwell, r"\b(stairs?|stairwells?|staircases?)\b"),
        (
            AreaCategory::Kitchen,
            r"\b(kitchens?|kitchenettes?|tea\s*points?|pantry|canteen|break\s*out|breakout|cafe|café)\b",
        ),
        (
            AreaCategory::MeetingRoom,
            r"\b(meeting|boardroom|board\s+room|conference|training\s+room)\b",
        ),
        (AreaCategory::Reception, r"\b(reception|lobby|foyer|entrance)\b"),
        (AreaCategory::Corridor, r"\b(corridors?|hallways?|landings?|walkways?)\b"),
        (AreaCategory::CarPark, r"\b(car\s*park|parking|garage)\b"),
        (AreaCategory::BinStore, r"\b(bins?|bin\s*store|refuse|waste|recycling)\b"),
        (AreaCategory::External, r"\b(external|outside|courtyard|yard|smoking\s+shelter)\b"),
        (AreaCategory::Office, r"\b(office|desks?|open\s*plan|workstations?|studio)\b"),
    ];

    table
        .iter()
        .filter_map(|(category, pattern)| {
            match Regex::new(&format!("(?i){pattern}")) {
                Ok(re) => Some((*category, re)),
                Err(e) => {
                    tracing::error!(error = %e, ?category, "Invalid area rule");
                    None
                }
            }
        })
        .collect()
});

fn normalize(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn override_for(customer: Option<&str>, label: &str) -> Option<AreaCategory> {
    let customer = normalize(customer?);
    let label = normalize(label);

    CUSTOMER_OVERRIDES
        .iter()
        .find(|(c, l, _)| *c == customer && *l == label)
        .map(|(_, _, category)| *category)
}

pub fn classify(customer: Option<&str>, label: &str) -> AreaCategory {
    if let Some(category) = override_for(customer, label) {
        return category;
    }

    RULES
        .iter()
        .find(|(_, re)| re.is_match(label))
        .map(|(category, _)| *category)
        .unwrap_or(AreaCategory::General)
}

/// An explicit category printed on the code beats the label heuristics.
pub fn resolve(customer: Option<&str>, label: &str, printed: Option<&str>) -> AreaCategory {
    printed
        .and_then(|raw| raw.trim().replace([' ', '-'], "_").parse::<AreaCategory>().ok())
        .unwrap_or_else(|| classify(customer, label))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_pick_categories() {
        assert_eq!(classify(None, "Ground Floor Gents"), AreaCategory::Toilet);
        assert_eq!(classify(None, "2nd floor kitchenette"), AreaCategory::Kitchen);
        assert_eq!(classify(None, "Boardroom A"), AreaCategory::MeetingRoom);
        assert_eq!(classify(None, "Main LOBBY"), AreaCategory::Reception);
        assert_eq!(classify(None, "Stairwell 2"), AreaCategory::Stairwell);
        assert_eq!(classify(None, "Basement car park"), AreaCategory::CarPark);
        assert_eq!(classify(None, "Open plan east"), AreaCategory::Office);
    }

    #[test]
    fn more_specific_rules_win() {
        assert_eq!(classify(None, "Reception toilets"), AreaCategory::Toilet);
        assert_eq!(classify(None, "Goods lift by kitchen"), AreaCategory::Lift);
    }

    #[test]
    fn words_are_matched_whole() {
        // "binder" must not look like a bin store
        assert_eq!(classify(None, "Binder storage"), AreaCategory::General);
    }

    #[test]
    fn customer_override_beats_keywords() {
        assert_eq!(
            classify(Some("Harbour  Offices"), "Level 3 Tea Point"),
            AreaCategory::Kitchen
        );
        assert_eq!(classify(Some("Harbour Offices"), "The Hub"), AreaCategory::MeetingRoom);
        // other customers get the generic rules
        assert_eq!(classify(Some("Acme"), "The Hub"), AreaCategory::General);
        assert_eq!(
            classify(Some("St. Anne's Medical Centre"), "Sluice room"),
            AreaCategory::Toilet
        );
    }

    #[test]
    fn printed_category_is_trusted() {
        assert_eq!(
            resolve(None, "Room 12", Some("meeting room")),
            AreaCategory::MeetingRoom
        );
        assert_eq!(resolve(None, "Room 12", Some("nonsense")), AreaCategory::General);
    }
}
