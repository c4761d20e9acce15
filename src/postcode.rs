/// UK postcode area-code extraction for lead routing.
///
/// Coverage matching between quotes and partner companies is keyed on the
/// 1-2 letter area code at the start of a UK postcode ("SW1A 2AA" -> "SW").
/// Addresses are free text, so extraction is best effort, in order of
/// preference:
///
/// 1. A full postcode anywhere in the string.
/// 2. A partial (outward-only) postcode at the end of the string.
/// 3. Any 1-2 letters immediately followed by a digit.
///
/// Returns `None` when nothing postcode-like is present; callers treat that
/// as "cannot route this lead", not as an error.
use regex::Regex;

/// Extract the postcode area code from a free-text address.
pub fn extract_area_code(address: &str) -> Option<String> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return None;
    }

    // 1. Full postcode anywhere: outward + inward, e.g. "SW1A 2AA", "NW1 6XE"
    let full = Regex::new(r"(?i)\b([A-Z]{1,2})[0-9][0-9A-Z]?\s*[0-9][A-Z]{2}\b").unwrap();
    if let Some(caps) = full.captures(trimmed) {
        return Some(caps[1].to_uppercase());
    }

    // 2. Partial outward code at the end of the address, e.g. "..., London NW1"
    let partial = Regex::new(r"(?i)\b([A-Z]{1,2})[0-9][0-9A-Z]?\s*$").unwrap();
    if let Some(caps) = partial.captures(trimmed) {
        return Some(caps[1].to_uppercase());
    }

    // 3. Last resort: any letter pair (or single letter) followed by a digit
    let loose = Regex::new(r"(?i)\b([A-Z]{1,2})[0-9]").unwrap();
    if let Some(caps) = loose.captures(trimmed) {
        return Some(caps[1].to_uppercase());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_postcode_anywhere() {
        assert_eq!(
            extract_area_code("10 Downing St, London SW1A 2AA"),
            Some("SW".to_string())
        );
        assert_eq!(
            extract_area_code("221B Baker Street, NW1 6XE"),
            Some("NW".to_string())
        );
        // Full postcode mid-string, with trailing text
        assert_eq!(
            extract_area_code("Flat 2, E1 6AN, above the shop"),
            Some("E".to_string())
        );
    }

    #[test]
    fn test_partial_postcode_at_end() {
        assert_eq!(
            extract_area_code("14 Camden Road, London NW1"),
            Some("NW".to_string())
        );
        assert_eq!(extract_area_code("Croydon CR0"), Some("CR".to_string()));
        assert_eq!(extract_area_code("London SW1A"), Some("SW".to_string()));
    }

    #[test]
    fn test_loose_letter_digit_match() {
        // Not at the end, not a full postcode, but still postcode-like
        assert_eq!(
            extract_area_code("Leeds LS6 area please"),
            Some("LS".to_string())
        );
        // First match wins when several candidates are present
        assert_eq!(
            extract_area_code("near the M1, Leeds LS6 area please"),
            Some("M".to_string())
        );
    }

    #[test]
    fn test_lowercase_input_uppercased() {
        assert_eq!(
            extract_area_code("22 acacia avenue, london sw16 3xx"),
            Some("SW".to_string())
        );
        assert_eq!(extract_area_code("manchester m1"), Some("M".to_string()));
    }

    #[test]
    fn test_no_postcode_returns_none() {
        assert_eq!(extract_area_code("Ten Green Bottles Lane"), None);
        assert_eq!(extract_area_code(""), None);
        assert_eq!(extract_area_code("   "), None);
        assert_eq!(extract_area_code("The Old Vicarage, Dibley"), None);
    }

    #[test]
    fn test_numbers_alone_do_not_match() {
        assert_eq!(extract_area_code("221 555 0199"), None);
    }

    #[test]
    fn test_preference_order_full_wins() {
        // A full postcode earlier in the string wins over a trailing partial
        assert_eq!(
            extract_area_code("From E1 6AN towards NW1"),
            Some("E".to_string())
        );
    }
}
