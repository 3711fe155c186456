//! Shared types used across the Awardgrid service.
//!
//! This module defines common newtypes and the search request/task tuples
//! that provide type safety and clear domain modeling.

use crate::error::AwardgridError;
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Newtype for airline identifiers with validation.
///
/// Airline IDs must be lowercase alphanumeric with hyphens, 3-50 characters
/// (e.g., "british-airways", "sim-airline-1").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AirlineId(String);

impl AirlineId {
    /// Create a new `AirlineId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID doesn't match the required format.
    pub fn new(id: impl Into<String>) -> Result<Self, AwardgridError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate airline ID format: lowercase alphanumeric with hyphens, 3-50 chars.
    fn validate(id: &str) -> Result<(), AwardgridError> {
        static AIRLINE_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = AIRLINE_REGEX
            .get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9-]{1,48}[a-z0-9]$").expect("valid regex"));

        if id.len() < 3 || id.len() > 50 {
            return Err(AwardgridError::Validation(format!(
                "invalid airline ID: must be 3-50 characters, got {} characters",
                id.len()
            )));
        }

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(AwardgridError::Validation(format!(
                "invalid airline ID: must be lowercase alphanumeric with hyphens, got '{id}'"
            )))
        }
    }
}

impl fmt::Display for AirlineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype for IATA airport codes.
///
/// Codes are three ASCII letters; input is uppercased before validation,
/// so `"lhr"` and `"LHR"` both produce `LHR`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AirportCode(String);

impl AirportCode {
    /// Create a new `AirportCode`, uppercasing the input.
    ///
    /// # Errors
    /// Returns error unless the input is exactly three ASCII letters.
    pub fn new(code: impl Into<String>) -> Result<Self, AwardgridError> {
        let code = code.into().trim().to_ascii_uppercase();

        if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(AwardgridError::Validation(format!(
                "invalid airport code: must be three letters, got '{code}'"
            )));
        }

        Ok(Self(code))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AirportCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity under which competing results are compared and merged.
///
/// One key per outbound/return date pair, formatted
/// `YYYY-MM-DD-YYYY-MM-DD`, shared by all airlines searching that pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatePairKey(String);

impl DatePairKey {
    /// Build the key for an outbound/return date pair.
    #[must_use]
    pub fn new(outbound: NaiveDate, return_date: NaiveDate) -> Self {
        Self(format!("{outbound}-{return_date}"))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatePairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated search request: route plus the center of the date grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Origin airport
    pub origin: AirportCode,
    /// Destination airport
    pub destination: AirportCode,
    /// Center date the grid of date combinations is built around
    pub center_date: NaiveDate,
}

/// Parameters for one concrete search task handed to an airline producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Origin airport
    pub origin: AirportCode,
    /// Destination airport
    pub destination: AirportCode,
    /// Outbound flight date
    pub outbound_date: NaiveDate,
    /// Return flight date, if a round trip
    pub return_date: Option<NaiveDate>,
}

impl SearchParams {
    /// The merge key for this task's date pair.
    ///
    /// One-way searches key on the outbound date twice so they still
    /// occupy a single grid cell.
    #[must_use]
    pub fn key(&self) -> DatePairKey {
        DatePairKey::new(
            self.outbound_date,
            self.return_date.unwrap_or(self.outbound_date),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_airline_id_valid() {
        let valid_ids = vec!["british-airways", "emirates", "sim-airline-1", "ba1"];

        for id in valid_ids {
            assert!(AirlineId::new(id).is_ok(), "Failed for: {id}");
        }
    }

    #[test]
    fn test_airline_id_invalid() {
        let too_long = "a".repeat(51);
        let invalid_ids = vec![
            "BA",              // Too short
            "British",         // Uppercase
            "british_airways", // Underscore
            "british airways", // Space
            "-ba-",            // Starts/ends with hyphen
            too_long.as_str(), // Too long
        ];

        for id in invalid_ids {
            assert!(AirlineId::new(id).is_err(), "Should fail for: {id}");
        }
    }

    #[test]
    fn test_airport_code_uppercases() {
        let code = AirportCode::new("lhr").expect("valid airport code");
        assert_eq!(code.as_str(), "LHR");
    }

    #[test]
    fn test_airport_code_invalid() {
        for code in ["LH", "LHRX", "L1R", "", "l h"] {
            assert!(AirportCode::new(code).is_err(), "Should fail for: {code}");
        }
    }

    #[test]
    fn test_date_pair_key_format() {
        let outbound = NaiveDate::from_ymd_opt(2026, 7, 14).expect("valid date");
        let ret = NaiveDate::from_ymd_opt(2026, 7, 18).expect("valid date");
        let key = DatePairKey::new(outbound, ret);
        assert_eq!(key.as_str(), "2026-07-14-2026-07-18");
    }

    #[test]
    fn test_search_params_key_round_trip() {
        let params = SearchParams {
            origin: AirportCode::new("LHR").expect("valid code"),
            destination: AirportCode::new("JFK").expect("valid code"),
            outbound_date: NaiveDate::from_ymd_opt(2026, 7, 14).expect("valid date"),
            return_date: Some(NaiveDate::from_ymd_opt(2026, 7, 18).expect("valid date")),
        };
        assert_eq!(params.key().as_str(), "2026-07-14-2026-07-18");
    }

    #[test]
    fn test_search_params_key_one_way() {
        let params = SearchParams {
            origin: AirportCode::new("LHR").expect("valid code"),
            destination: AirportCode::new("JFK").expect("valid code"),
            outbound_date: NaiveDate::from_ymd_opt(2026, 7, 14).expect("valid date"),
            return_date: None,
        };
        assert_eq!(params.key().as_str(), "2026-07-14-2026-07-14");
    }

    #[test]
    fn test_date_pair_key_serialization() {
        let key = DatePairKey::new(
            NaiveDate::from_ymd_opt(2026, 7, 14).expect("valid date"),
            NaiveDate::from_ymd_opt(2026, 7, 18).expect("valid date"),
        );
        let json = serde_json::to_string(&key).expect("serialize key");
        assert_eq!(json, "\"2026-07-14-2026-07-18\"");
    }
}
