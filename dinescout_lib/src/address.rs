//! Free-text US address normalization.
//!
//! Turns the single address line scraped from a listing card into street,
//! city, state and zip components. This is a heuristic parser, not a
//! grammar: segments that match no pattern are left unclassified and the
//! function never fails.

use std::sync::OnceLock;

use dinescout_api::types::CleanedAddress;
use regex::{Captures, Regex};

/// Full state names (50 states + DC) and their postal abbreviations.
pub const STATE_ABBREVIATIONS: &[(&str, &str)] = &[
    ("Alabama", "AL"),
    ("Alaska", "AK"),
    ("Arizona", "AZ"),
    ("Arkansas", "AR"),
    ("California", "CA"),
    ("Colorado", "CO"),
    ("Connecticut", "CT"),
    ("Delaware", "DE"),
    ("District of Columbia", "DC"),
    ("Florida", "FL"),
    ("Georgia", "GA"),
    ("Hawaii", "HI"),
    ("Idaho", "ID"),
    ("Illinois", "IL"),
    ("Indiana", "IN"),
    ("Iowa", "IA"),
    ("Kansas", "KS"),
    ("Kentucky", "KY"),
    ("Louisiana", "LA"),
    ("Maine", "ME"),
    ("Maryland", "MD"),
    ("Massachusetts", "MA"),
    ("Michigan", "MI"),
    ("Minnesota", "MN"),
    ("Mississippi", "MS"),
    ("Missouri", "MO"),
    ("Montana", "MT"),
    ("Nebraska", "NE"),
    ("Nevada", "NV"),
    ("New Hampshire", "NH"),
    ("New Jersey", "NJ"),
    ("New Mexico", "NM"),
    ("New York", "NY"),
    ("North Carolina", "NC"),
    ("North Dakota", "ND"),
    ("Ohio", "OH"),
    ("Oklahoma", "OK"),
    ("Oregon", "OR"),
    ("Pennsylvania", "PA"),
    ("Rhode Island", "RI"),
    ("South Carolina", "SC"),
    ("South Dakota", "SD"),
    ("Tennessee", "TN"),
    ("Texas", "TX"),
    ("Utah", "UT"),
    ("Vermont", "VT"),
    ("Virginia", "VA"),
    ("Washington", "WA"),
    ("West Virginia", "WV"),
    ("Wisconsin", "WI"),
    ("Wyoming", "WY"),
];

/// Washington DC listings report "WA" as their city.
const DC_CITY: &str = "WA";

struct Patterns {
    state_name: Regex,
    space_before_comma: Regex,
    space_after_comma: Regex,
    dc_zip: Regex,
    state_zip: Regex,
    zip: Regex,
    number_range: Regex,
    unit: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        // Longest names first so "West Virginia" wins over "Virginia".
        let mut names: Vec<&str> = STATE_ABBREVIATIONS.iter().map(|(name, _)| *name).collect();
        names.sort_by_key(|name| std::cmp::Reverse(name.len()));
        let alternation = names
            .iter()
            .map(|name| regex::escape(name).replace(' ', r"\s+"))
            .collect::<Vec<_>>()
            .join("|");

        Patterns {
            state_name: Regex::new(&format!(r"(?i)\b(?:{})\b", alternation))
                .expect("state name pattern is valid"),
            space_before_comma: Regex::new(r"\s+,").expect("static pattern is valid"),
            space_after_comma: Regex::new(r",\s+").expect("static pattern is valid"),
            dc_zip: Regex::new(r"^D\.C\.\s*(\d{5}(?:-\d{4})?)$").expect("static pattern is valid"),
            state_zip: Regex::new(r"^([A-Z]{2})\s*(\d{5}(?:-\d{4})?)$")
                .expect("static pattern is valid"),
            zip: Regex::new(r"\b(\d{5}(?:-\d{4})?)\b").expect("static pattern is valid"),
            number_range: Regex::new(r"(\d+)\s*&\s*(\d+[A-Za-z]?)")
                .expect("static pattern is valid"),
            unit: Regex::new(r"(?i)(?:\b(?:floor|fl|ste|suite)\b\.?|#)\s*(\d+)")
                .expect("static pattern is valid"),
        }
    })
}

/// Abbreviation for a full state name, matched case-insensitively.
pub fn state_abbreviation(name: &str) -> Option<&'static str> {
    let wanted = name.split_whitespace().collect::<Vec<_>>().join(" ");
    STATE_ABBREVIATIONS
        .iter()
        .find(|(full, _)| full.eq_ignore_ascii_case(&wanted))
        .map(|(_, abbrev)| *abbrev)
}

fn is_state_token(s: &str) -> bool {
    s.len() == 2 && s.chars().all(|c| c.is_ascii_uppercase())
}

/// Splits a raw address into street, city, state and zip.
///
/// Empty input yields four empty strings.
pub fn normalize(raw: &str) -> CleanedAddress {
    let p = patterns();
    let mut out = CleanedAddress::default();
    if raw.trim().is_empty() {
        return out;
    }

    let replaced = p.state_name.replace_all(raw, |caps: &Captures| {
        state_abbreviation(&caps[0])
            .map(str::to_string)
            .unwrap_or_else(|| caps[0].to_string())
    });
    let tightened = p.space_before_comma.replace_all(&replaced, ",");
    let spaced = p.space_after_comma.replace_all(&tightened, ", ");

    let mut parts: Vec<&str> = spaced
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();

    if let Some(last) = parts.last().copied() {
        if let Some(caps) = p.dc_zip.captures(last) {
            out.city = DC_CITY.to_string();
            out.state = "DC".to_string();
            out.zip = caps[1].to_string();
            parts.pop();
        } else if let Some(caps) = p.state_zip.captures(last) {
            out.state = caps[1].to_string();
            out.zip = caps[2].to_string();
            parts.pop();
        } else if let Some(caps) = p.zip.captures(last) {
            let zip = caps[1].to_string();
            let remainder = last.replacen(&zip, "", 1);
            let remainder = remainder.trim();
            if is_state_token(remainder) {
                out.state = remainder.to_string();
            }
            out.zip = zip;
            parts.pop();
        } else if is_state_token(last) {
            out.state = last.to_string();
            parts.pop();
        }
    }

    if parts.len() > 1 {
        if let Some(city) = parts.pop() {
            out.city = city.to_string();
        }
    }

    if out.state == "DC" && out.city.is_empty() {
        out.city = DC_CITY.to_string();
    }

    let street = parts.join(", ");
    let street = p.number_range.replace_all(&street, "$1-$2");
    out.street = p.unit.replace_all(&street, "#$1").into_owned();

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(raw: &str) -> (String, String, String, String) {
        let a = normalize(raw);
        (a.street, a.city, a.state, a.zip)
    }

    #[test]
    fn standard_address() {
        assert_eq!(
            parts("123 Main St, Austin, TX 78701"),
            (
                "123 Main St".into(),
                "Austin".into(),
                "TX".into(),
                "78701".into()
            )
        );
    }

    #[test]
    fn washington_dc_address() {
        assert_eq!(
            parts("123 Main St, Washington, D.C. 20001"),
            (
                "123 Main St".into(),
                "WA".into(),
                "DC".into(),
                "20001".into()
            )
        );
    }

    #[test]
    fn dc_state_without_city_gets_washington() {
        let a = normalize("1100 Pennsylvania Ave NW, DC 20004");
        assert_eq!(a.state, "DC");
        assert_eq!(a.city, "WA");
        assert_eq!(a.zip, "20004");
        assert_eq!(a.street, "1100 PA Ave NW");
    }

    #[test]
    fn empty_input_is_all_empty() {
        assert_eq!(normalize(""), CleanedAddress::default());
        assert_eq!(normalize("   "), CleanedAddress::default());
    }

    #[test]
    fn only_commas_is_all_empty() {
        assert_eq!(normalize(" , ,, "), CleanedAddress::default());
    }

    #[test]
    fn full_state_name_is_abbreviated() {
        let a = normalize("500 Pine St, Seattle, washington 98101");
        assert_eq!(a.state, "WA");
        assert_eq!(a.zip, "98101");
        assert_eq!(a.city, "Seattle");
    }

    #[test]
    fn multi_word_state_prefers_longest_name() {
        let a = normalize("10 Capitol St, Charleston, West Virginia 25301");
        assert_eq!(a.state, "WV");
        assert_eq!(a.city, "Charleston");
    }

    #[test]
    fn state_name_inside_word_is_left_alone() {
        let a = normalize("9 Kansasville Rd, Topeka, KS 66603");
        assert_eq!(a.street, "9 Kansasville Rd");
    }

    #[test]
    fn zip_plus_four() {
        let a = normalize("77 Lake Dr, Chicago, IL 60601-1234");
        assert_eq!(a.state, "IL");
        assert_eq!(a.zip, "60601-1234");
    }

    #[test]
    fn whitespace_around_commas_collapses() {
        let a = normalize("12 Oak St ,Denver ,  CO 80202");
        assert_eq!(a.street, "12 Oak St");
        assert_eq!(a.city, "Denver");
        assert_eq!(a.state, "CO");
    }

    #[test]
    fn zip_without_state_token() {
        let a = normalize("4 Bay Rd, Miami, 33101");
        assert_eq!(a.zip, "33101");
        assert_eq!(a.state, "");
        assert_eq!(a.city, "Miami");
        assert_eq!(a.street, "4 Bay Rd");
    }

    #[test]
    fn zip_with_noise_keeps_zip_only() {
        let a = normalize("4 Bay Rd, Miami, Florida State 33101");
        assert_eq!(a.zip, "33101");
        assert_eq!(a.state, "");
    }

    #[test]
    fn bare_state_segment_without_zip() {
        let a = normalize("22 Elm St, Boise, ID");
        assert_eq!(a.state, "ID");
        assert_eq!(a.zip, "");
        assert_eq!(a.city, "Boise");
    }

    #[test]
    fn single_segment_is_street_only() {
        let a = normalize("Pier 39");
        assert_eq!(a.street, "Pier 39");
        assert_eq!(a.city, "");
        assert_eq!(a.state, "");
        assert_eq!(a.zip, "");
    }

    #[test]
    fn unparseable_tail_stays_in_street() {
        let a = normalize("Ferry Building, Embarcadero, somewhere");
        assert_eq!(a.zip, "");
        assert_eq!(a.state, "");
        assert_eq!(a.city, "somewhere");
        assert_eq!(a.street, "Ferry Building, Embarcadero");
    }

    #[test]
    fn ampersand_house_numbers_become_range() {
        let a = normalize("12 & 14A Market St, Boston, MA 02108");
        assert_eq!(a.street, "12-14A Market St");
    }

    #[test]
    fn unit_designators_become_hash() {
        assert_eq!(
            normalize("100 Main St, Suite 200, Dallas, TX 75201").street,
            "100 Main St, #200"
        );
        assert_eq!(
            normalize("100 Main St Fl 3, Dallas, TX 75201").street,
            "100 Main St #3"
        );
        assert_eq!(
            normalize("100 Main St Ste. 4, Dallas, TX 75201").street,
            "100 Main St #4"
        );
        assert_eq!(
            normalize("100 Main St # 5, Dallas, TX 75201").street,
            "100 Main St #5"
        );
        assert_eq!(
            normalize("100 Main St FLOOR 2, Dallas, TX 75201").street,
            "100 Main St #2"
        );
    }

    #[test]
    fn unit_words_inside_other_words_untouched() {
        assert_eq!(
            normalize("8 Flatbush Ave, Brooklyn, NY 11217").street,
            "8 Flatbush Ave"
        );
    }

    #[test]
    fn recognizable_zip_always_yields_zip_and_known_state() {
        let samples = [
            "1 A St, Reno, Nevada 89501",
            "2 B St, Reno, NV 89501",
            "3 C St, Portland, Oregon 97201-0001",
            "4 D St, New York, New York 10001",
            "5 E St, Providence, rhode island 02903",
        ];
        let abbrevs: Vec<&str> = STATE_ABBREVIATIONS.iter().map(|(_, a)| *a).collect();
        for raw in samples {
            let a = normalize(raw);
            assert!(!a.zip.is_empty(), "no zip for {}", raw);
            assert!(abbrevs.contains(&a.state.as_str()), "bad state for {}", raw);
        }
    }

    #[test]
    fn state_abbreviation_lookup() {
        assert_eq!(state_abbreviation("new  york"), Some("NY"));
        assert_eq!(state_abbreviation("District of Columbia"), Some("DC"));
        assert_eq!(state_abbreviation("Ontario"), None);
        assert_eq!(STATE_ABBREVIATIONS.len(), 51);
    }
}
