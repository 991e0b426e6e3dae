//! City codes
//!
//! A city code is the three-letter segment that appears in customer and site
//! identifiers. It is a pure function of the city name.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cities whose code is not simply their first three letters
const CITY_CODE_OVERRIDES: &[(&str, &str)] = &[("raipur", "RPR")];

/// Three uppercase ASCII letters identifying a city inside identifiers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CityCode(String);

impl CityCode {
    /// Code used when a city name is missing or too short
    pub const UNKNOWN: &'static str = "XXX";

    /// Derives the code for a city name
    ///
    /// Lookup is case-insensitive and ignores surrounding or repeated
    /// whitespace. Names outside the override table use their first three
    /// ASCII letters, uppercased.
    pub fn from_city_name(name: &str) -> Self {
        let normalized = name
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        if let Some((_, code)) = CITY_CODE_OVERRIDES
            .iter()
            .find(|(city, _)| *city == normalized)
        {
            return Self((*code).to_string());
        }

        Self::first_three_letters(name)
    }

    /// Normalizes a code that was entered or stored directly
    ///
    /// Same rule as the name fallback, so `"del"` becomes `"DEL"` and an
    /// empty value becomes [`CityCode::UNKNOWN`].
    pub fn normalize(code: &str) -> Self {
        Self::first_three_letters(code)
    }

    /// The unknown-city placeholder
    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == Self::UNKNOWN
    }

    fn first_three_letters(text: &str) -> Self {
        let letters: String = text
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .take(3)
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if letters.len() < 3 {
            Self::unknown()
        } else {
            Self(letters)
        }
    }
}

impl fmt::Display for CityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CityCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derives a city code from an optional city name
pub fn city_code(name: Option<&str>) -> CityCode {
    name.map(CityCode::from_city_name).unwrap_or_else(CityCode::unknown)
}
