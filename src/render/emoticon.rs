//! Emoticon code lookup.
//!
//! Emoticons arrive as textual codes (`image_emoticon25`, `ali_012`, ...).
//! A code is known when it matches one of the prefix/number rules below;
//! known codes map to a PNG in the mirrored mobile emoticon set.

use std::ops::RangeInclusive;

use regex::Regex;

use crate::constants::EMOTICON_URL_BASE;

struct EmoticonRule {
    pattern: Regex,
    /// Accepted numeric suffixes.
    range: RangeInclusive<u32>,
    /// Whether the bare prefix (no number) is itself a code.
    bare: bool,
}

static RULES: std::sync::LazyLock<Vec<EmoticonRule>> = std::sync::LazyLock::new(|| {
    vec![
        // Classic set; the bare code is the first smiley
        EmoticonRule {
            pattern: Regex::new(r"^image_emoticon(\d*)$").unwrap(),
            range: 1..=141,
            bare: true,
        },
        // Ali
        EmoticonRule {
            pattern: Regex::new(r"^ali_(\d{3})$").unwrap(),
            range: 1..=70,
            bare: false,
        },
        // Bear children
        EmoticonRule {
            pattern: Regex::new(r"^b(\d{2})$").unwrap(),
            range: 1..=62,
            bare: false,
        },
        // Tusiji
        EmoticonRule {
            pattern: Regex::new(r"^t_(\d{4})$").unwrap(),
            range: 1..=40,
            bare: false,
        },
        // Yang Zai
        EmoticonRule {
            pattern: Regex::new(r"^yz_(\d{3})$").unwrap(),
            range: 1..=46,
            bare: false,
        },
    ]
});

/// Source URI of a known emoticon code.
#[must_use]
pub fn emoticon_url(code: &str) -> Option<String> {
    let known = RULES.iter().any(|rule| {
        rule.pattern.captures(code).is_some_and(|caps| {
            let digits = caps.get(1).map_or("", |m| m.as_str());
            if digits.is_empty() {
                rule.bare
            } else {
                digits
                    .parse::<u32>()
                    .is_ok_and(|n| rule.range.contains(&n))
            }
        })
    });

    known.then(|| format!("{EMOTICON_URL_BASE}{code}.png"))
}
