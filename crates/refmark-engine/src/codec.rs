//! Marker names: `RM_cite<serial>_<variant>_<key>[,<key>...]`.
//!
//! The serial is empty for the first marker of a given key list and variant,
//! then `0`, `1`, ... for later ones. Page info and other payload never go
//! into the name.

use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::InvariantError;
use crate::model::VariantTag;

pub const MARKER_PREFIX: &str = "RM_cite";

fn marker_regex() -> &'static Regex {
    static MARKER_REGEX: OnceLock<Regex> = OnceLock::new();
    MARKER_REGEX
        .get_or_init(|| Regex::new(r"^RM_cite(\d*)_(\d+)_(.*)$").expect("Invalid marker regex"))
}

/// Decoded form of a citation marker name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerName {
    pub serial: Option<u32>,
    pub variant: VariantTag,
    pub keys: Vec<String>,
}

impl fmt::Display for MarkerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MARKER_PREFIX)?;
        if let Some(serial) = self.serial {
            write!(f, "{serial}")?;
        }
        write!(f, "_{}_{}", self.variant.tag(), self.keys.join(","))
    }
}

/// Keys that could not survive a trip through a marker name
fn check_key(key: &str) -> Result<(), String> {
    if key.is_empty() {
        Err("empty citation key".to_string())
    } else if key.contains(',') {
        Err(format!("citation key {key:?} contains a comma"))
    } else if key.chars().any(char::is_whitespace) {
        Err(format!("citation key {key:?} contains whitespace"))
    } else {
        Ok(())
    }
}

/// Build a marker name not present in `used`.
///
/// Serials are tried in order (none, then 0, 1, ...) against the names in use
/// right now.
pub fn encode<S: AsRef<str>>(
    keys: &[S],
    variant: VariantTag,
    used: &HashSet<String>,
) -> Result<String, InvariantError> {
    let keys: Vec<String> = keys.iter().map(|k| k.as_ref().to_string()).collect();
    let malformed = |reason: String| InvariantError::MalformedMarkerName {
        name: keys.join(","),
        reason,
    };
    if keys.is_empty() {
        return Err(malformed("no citation keys".to_string()));
    }
    for key in &keys {
        check_key(key).map_err(&malformed)?;
    }

    let mut candidate = MarkerName {
        serial: None,
        variant,
        keys,
    };
    loop {
        let name = candidate.to_string();
        if !used.contains(&name) {
            return Ok(name);
        }
        candidate.serial = Some(match candidate.serial {
            None => 0,
            Some(n) => n + 1,
        });
    }
}

/// Parse a marker name.
///
/// `Ok(None)` for names this codec does not own (other tools, the bibliography
/// marker). A name with our shape but broken structure is an error.
pub fn parse(name: &str) -> Result<Option<MarkerName>, InvariantError> {
    let Some(captures) = marker_regex().captures(name) else {
        return Ok(None);
    };
    let malformed = |reason: &str| InvariantError::MalformedMarkerName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let serial = match &captures[1] {
        "" => None,
        digits if digits.len() > 1 && digits.starts_with('0') => {
            return Err(malformed("serial has leading zeros"));
        }
        digits => Some(
            digits
                .parse::<u32>()
                .map_err(|_| malformed("serial out of range"))?,
        ),
    };

    let variant = captures[2]
        .parse::<u8>()
        .ok()
        .and_then(VariantTag::from_tag)
        .ok_or_else(|| malformed("unknown variant tag"))?;

    let keys: Vec<String> = captures[3].split(',').map(str::to_string).collect();
    if keys.iter().any(|k| k.is_empty()) {
        return Err(malformed("empty citation key"));
    }

    Ok(Some(MarkerName {
        serial,
        variant,
        keys,
    }))
}

/// Lenient decode: anything that does not parse is "not ours"
pub fn decode(name: &str) -> Option<MarkerName> {
    parse(name).ok().flatten()
}

pub fn is_recognized(name: &str) -> bool {
    marker_regex().is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_encode_first_name_has_no_serial() {
        let name = encode(&["smith2020", "jones2019"], VariantTag::Parenthetical, &HashSet::new())
            .unwrap();
        assert_eq!(name, "RM_cite_1_smith2020,jones2019");
    }

    #[test]
    fn test_repeated_encoding_advances_serials() {
        // Given an accumulating set of used names
        let mut used = HashSet::new();
        let mut serials = Vec::new();

        // When encoding the same keys three times
        for _ in 0..3 {
            let name = encode(&["a"], VariantTag::InText, &used).unwrap();
            serials.push(decode(&name).unwrap().serial);
            assert!(used.insert(name));
        }

        // Then serials are "", "0", "1"
        assert_eq!(serials, vec![None, Some(0), Some(1)]);
    }

    #[test]
    fn test_serial_skips_taken_gaps() {
        let used: HashSet<String> = ["RM_cite_2_a", "RM_cite0_2_a"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let name = encode(&["a"], VariantTag::Invisible, &used).unwrap();
        assert_eq!(name, "RM_cite1_2_a");
    }

    #[rstest]
    #[case(&["a"], VariantTag::InText)]
    #[case(&["smith2020", "doe:1999", "x-y"], VariantTag::Parenthetical)]
    #[case(&["k"], VariantTag::Invisible)]
    fn test_decode_inverts_encode(#[case] list: &[&str], #[case] variant: VariantTag) {
        let used: HashSet<String> = ["RM_cite_0_a".to_string()].into();
        let name = encode(list, variant, &used).unwrap();

        assert!(!used.contains(&name));
        let decoded = decode(&name).unwrap();
        assert_eq!(decoded.variant, variant);
        assert_eq!(decoded.keys, keys(list));
        assert_eq!(decoded.to_string(), name);
    }

    #[rstest]
    #[case::comma("a,b")]
    #[case::space("a b")]
    #[case::empty("")]
    fn test_encode_refuses_keys_that_cannot_round_trip(#[case] key: &str) {
        let result = encode(&[key], VariantTag::Parenthetical, &HashSet::new());
        assert!(matches!(
            result,
            Err(InvariantError::MalformedMarkerName { .. })
        ));
    }

    #[test]
    fn test_encode_refuses_empty_key_list() {
        let no_keys: [&str; 0] = [];
        assert!(encode(&no_keys, VariantTag::Parenthetical, &HashSet::new()).is_err());
    }

    #[rstest]
    #[case::foreign("Bookmark 1")]
    #[case::bibliography("RM_bibliography")]
    #[case::missing_variant("RM_cite_a")]
    #[case::prefix_only("RM_cite")]
    fn test_foreign_names_are_not_recognized(#[case] name: &str) {
        assert!(!is_recognized(name));
        assert_eq!(parse(name).unwrap(), None);
    }

    #[rstest]
    #[case::leading_zero("RM_cite01_1_a")]
    #[case::unknown_variant("RM_cite_7_a")]
    #[case::empty_key("RM_cite_1_a,,b")]
    #[case::no_keys("RM_cite_1_")]
    fn test_malformed_names_are_fatal(#[case] name: &str) {
        assert!(is_recognized(name));
        assert!(matches!(
            parse(name),
            Err(InvariantError::MalformedMarkerName { .. })
        ));
        assert_eq!(decode(name), None);
    }

    #[test]
    fn test_serial_zero_is_valid() {
        let decoded = parse("RM_cite0_0_a").unwrap().unwrap();
        assert_eq!(decoded.serial, Some(0));
        assert_eq!(decoded.variant, VariantTag::InText);
    }
}
