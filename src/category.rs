//! Category code mapping
//!
//! Raw category codes are mapped to one of four labels:
//! - `"S"`: the click happened in the context of a promotion or special offer
//! - `"1"` to `"12"`: a regular category (sport, ...)
//! - a brand code: the value starts with a parenthesis or a 7-digit run
//! - `"0"` or `"nan"`: missing
//!
//! Anything else stays unclassified (`None`).

use crate::types::{CategoryLabel, Clickstream};
use lazy_static::lazy_static;
use regex::Regex;

/// Label of the mapped category column
pub const CATEGORY_MAP: &str = "category_map";

lazy_static! {
    // Anchored at the start only: "1234567890" and "(Nike)" are both brands
    static ref BRAND_CODE: Regex = Regex::new(r"^(?:\(|\)|\d{7})").unwrap();
}

const REGULAR_CODES: [&str; 12] = [
    "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12",
];

impl CategoryLabel {
    /// Classify a raw category code. First matching rule wins.
    ///
    /// A null code is treated like `"nan"`.
    pub fn classify(code: Option<&str>) -> Option<CategoryLabel> {
        let code = code.unwrap_or("nan");

        if code == "S" {
            Some(CategoryLabel::SpecialOffer)
        } else if REGULAR_CODES.contains(&code) {
            Some(CategoryLabel::Regular)
        } else if BRAND_CODE.is_match(code) {
            Some(CategoryLabel::Brand)
        } else if code == "0" || code == "nan" {
            Some(CategoryLabel::Missing)
        } else {
            None
        }
    }
}

/// Map every clickstream row's category, parallel to the input rows
pub fn category_map(clickstream: &Clickstream) -> Vec<Option<CategoryLabel>> {
    clickstream
        .records
        .iter()
        .map(|r| CategoryLabel::classify(r.category.as_deref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClickRecord;

    fn classify(code: &str) -> Option<CategoryLabel> {
        CategoryLabel::classify(Some(code))
    }

    #[test]
    fn test_special_offer() {
        assert_eq!(classify("S"), Some(CategoryLabel::SpecialOffer));
        assert_eq!(classify("s"), None);
    }

    #[test]
    fn test_regular_range() {
        assert_eq!(classify("1"), Some(CategoryLabel::Regular));
        assert_eq!(classify("7"), Some(CategoryLabel::Regular));
        assert_eq!(classify("12"), Some(CategoryLabel::Regular));
        assert_eq!(classify("13"), None);
        assert_eq!(classify("01"), None);
    }

    #[test]
    fn test_brand_codes() {
        assert_eq!(classify("2053013"), Some(CategoryLabel::Brand));
        // Prefix match: longer codes still start with a 7-digit run
        assert_eq!(classify("2053013552"), Some(CategoryLabel::Brand));
        assert_eq!(classify("(123)"), Some(CategoryLabel::Brand));
        assert_eq!(classify(")x"), Some(CategoryLabel::Brand));
        assert_eq!(classify("123456"), None);
        assert_eq!(classify("x1234567"), None);
    }

    #[test]
    fn test_missing_values() {
        assert_eq!(classify("0"), Some(CategoryLabel::Missing));
        assert_eq!(classify("nan"), Some(CategoryLabel::Missing));
        assert_eq!(CategoryLabel::classify(None), Some(CategoryLabel::Missing));
    }

    #[test]
    fn test_unclassified() {
        assert_eq!(classify("xyz"), None);
        assert_eq!(classify(""), None);
    }

    #[test]
    fn test_category_map_is_parallel() {
        let clicks = Clickstream::new(
            ["S", "7", "xyz", "0"]
                .iter()
                .map(|c| ClickRecord {
                    session_id: "1".to_string(),
                    timestamp: None,
                    item_id: None,
                    category: Some(c.to_string()),
                })
                .collect(),
        );

        assert_eq!(
            category_map(&clicks),
            vec![
                Some(CategoryLabel::SpecialOffer),
                Some(CategoryLabel::Regular),
                None,
                Some(CategoryLabel::Missing),
            ]
        );
    }
}
