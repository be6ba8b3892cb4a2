//! Reconciles attendance/tracking rows with the cleaner roster.
//!
//! Rows written by older clients only carry whatever the worker typed
//! (a name, sometimes a mobile), so each row is matched against the roster
//! with progressively looser rules. A rule that matches more than one
//! cleaner is skipped rather than guessed.

use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanerIdentity {
    pub id: u64,
    pub name: String,
    pub mobile: Option<String>,
}

/// What a row knows about who wrote it.
#[derive(Debug, Clone, Default)]
pub struct IdentityHint<'a> {
    pub cleaner_id: Option<u64>,
    pub name: Option<&'a str>,
    pub mobile: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Id,
    Mobile,
    ExactName,
    NameTokens,
    FirstNameInitial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub cleaner_id: u64,
    pub kind: MatchKind,
}

/// Digits only, UK international prefixes folded to the national `0`, last 10 digits kept.
pub fn normalize_mobile(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    let national = if let Some(rest) = digits.strip_prefix("0044") {
        format!("0{rest}")
    } else if let Some(rest) = digits.strip_prefix("44").filter(|_| digits.len() == 12) {
        format!("0{rest}")
    } else {
        digits
    };

    if national.len() < 7 {
        return None;
    }

    let start = national.len().saturating_sub(10);
    Some(national[start..].to_string())
}

pub fn name_tokens(raw: &str) -> Vec<String> {
    raw.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .map(|t| t.trim_matches('\'').to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

pub fn normalize_name(raw: &str) -> String {
    name_tokens(raw).join(" ")
}

fn unique<'r>(mut hits: impl Iterator<Item = &'r CleanerIdentity>) -> Option<u64> {
    let first = hits.next()?;
    match hits.next() {
        Some(_) => None,
        None => Some(first.id),
    }
}

fn tokens_contained(a: &[String], b: &[String]) -> bool {
    let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    !shorter.is_empty() && shorter.iter().all(|t| longer.contains(t))
}

/// "Jane S" / "Jane Smith": same first name and the surname initial agrees.
fn first_and_initial(a: &[String], b: &[String]) -> bool {
    let (Some(a_first), Some(b_first)) = (a.first(), b.first()) else {
        return false;
    };
    let (Some(a_last), Some(b_last)) = (a.last(), b.last()) else {
        return false;
    };
    if a.len() < 2 || b.len() < 2 || a_first != b_first {
        return false;
    }

    match (a_last.chars().next(), b_last.chars().next()) {
        (Some(x), Some(y)) => x == y && (a_last.len() == 1 || b_last.len() == 1),
        _ => false,
    }
}

pub fn resolve(hint: &IdentityHint<'_>, roster: &[CleanerIdentity]) -> Option<Match> {
    let found = |cleaner_id, kind| Some(Match { cleaner_id, kind });

    if let Some(id) = hint.cleaner_id {
        if roster.iter().any(|c| c.id == id) {
            return found(id, MatchKind::Id);
        }
    }

    if let Some(mobile) = hint.mobile.and_then(normalize_mobile) {
        let hits = roster.iter().filter(|c| {
            c.mobile
                .as_deref()
                .and_then(normalize_mobile)
                .is_some_and(|m| m == mobile)
        });
        if let Some(id) = unique(hits) {
            return found(id, MatchKind::Mobile);
        }
    }

    let tokens = name_tokens(hint.name.unwrap_or_default());
    if tokens.is_empty() {
        return None;
    }
    let wanted = tokens.join(" ");

    if let Some(id) = unique(roster.iter().filter(|c| normalize_name(&c.name) == wanted)) {
        return found(id, MatchKind::ExactName);
    }

    if let Some(id) = unique(
        roster
            .iter()
            .filter(|c| tokens_contained(&tokens, &name_tokens(&c.name))),
    ) {
        return found(id, MatchKind::NameTokens);
    }

    unique(
        roster
            .iter()
            .filter(|c| first_and_initial(&tokens, &name_tokens(&c.name))),
    )
    .and_then(|id| found(id, MatchKind::FirstNameInitial))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Vec<CleanerIdentity> {
        vec![
            CleanerIdentity {
                id: 1,
                name: "Maria Silva".to_string(),
                mobile: Some("07700 900123".to_string()),
            },
            CleanerIdentity {
                id: 2,
                name: "Maria Costa".to_string(),
                mobile: Some("+44 7700 900456".to_string()),
            },
            CleanerIdentity {
                id: 3,
                name: "John O'Neill".to_string(),
                mobile: None,
            },
            CleanerIdentity {
                id: 4,
                name: "Ade Bakare Johnson".to_string(),
                mobile: None,
            },
        ]
    }

    fn hint<'a>(id: Option<u64>, name: Option<&'a str>, mobile: Option<&'a str>) -> IdentityHint<'a> {
        IdentityHint {
            cleaner_id: id,
            name,
            mobile,
        }
    }

    #[test]
    fn mobile_normalisation_folds_uk_prefixes() {
        assert_eq!(normalize_mobile("+44 7700 900456").as_deref(), Some("7700900456"));
        assert_eq!(normalize_mobile("0044-7700-900456"), normalize_mobile("07700900456"));
        assert_eq!(normalize_mobile("12"), None);
    }

    #[test]
    fn id_wins_when_known() {
        let m = resolve(&hint(Some(3), Some("Somebody Else"), None), &roster()).unwrap();
        assert_eq!(m, Match { cleaner_id: 3, kind: MatchKind::Id });
    }

    #[test]
    fn unknown_id_falls_back_to_mobile() {
        let m = resolve(&hint(Some(99), None, Some("447700900456")), &roster()).unwrap();
        assert_eq!(m, Match { cleaner_id: 2, kind: MatchKind::Mobile });
    }

    #[test]
    fn names_match_ignoring_case_and_punctuation() {
        let m = resolve(&hint(None, Some("  john o'neill "), None), &roster()).unwrap();
        assert_eq!(m.kind, MatchKind::ExactName);
        assert_eq!(m.cleaner_id, 3);
    }

    #[test]
    fn partial_names_match_by_tokens() {
        let m = resolve(&hint(None, Some("Ade Johnson"), None), &roster()).unwrap();
        assert_eq!(m, Match { cleaner_id: 4, kind: MatchKind::NameTokens });
    }

    #[test]
    fn surname_initial_disambiguates() {
        let m = resolve(&hint(None, Some("Maria C"), None), &roster()).unwrap();
        assert_eq!(m, Match { cleaner_id: 2, kind: MatchKind::FirstNameInitial });
    }

    #[test]
    fn ambiguous_names_do_not_match() {
        assert_eq!(resolve(&hint(None, Some("Maria"), None), &roster()), None);
        assert_eq!(resolve(&hint(None, None, None), &roster()), None);
    }
}
