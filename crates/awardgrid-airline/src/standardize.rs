//! Normalization tables for human-facing flight data.

use awardgrid_core::AirportCode;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Static facts about a known airport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AirportInfo {
    pub name: &'static str,
    pub city: &'static str,
    pub country: &'static str,
}

static AIRPORTS: Lazy<HashMap<&'static str, AirportInfo>> = Lazy::new(|| {
    HashMap::from([
        (
            "LHR",
            AirportInfo {
                name: "London Heathrow",
                city: "London",
                country: "UK",
            },
        ),
        (
            "JFK",
            AirportInfo {
                name: "John F. Kennedy International",
                city: "New York",
                country: "US",
            },
        ),
        (
            "LAX",
            AirportInfo {
                name: "Los Angeles International",
                city: "Los Angeles",
                country: "US",
            },
        ),
        (
            "CDG",
            AirportInfo {
                name: "Charles de Gaulle",
                city: "Paris",
                country: "FR",
            },
        ),
        (
            "DXB",
            AirportInfo {
                name: "Dubai International",
                city: "Dubai",
                country: "AE",
            },
        ),
        (
            "SYD",
            AirportInfo {
                name: "Sydney Kingsford Smith",
                city: "Sydney",
                country: "AU",
            },
        ),
        (
            "NRT",
            AirportInfo {
                name: "Narita International",
                city: "Tokyo",
                country: "JP",
            },
        ),
        (
            "SIN",
            AirportInfo {
                name: "Singapore Changi",
                city: "Singapore",
                country: "SG",
            },
        ),
        (
            "FRA",
            AirportInfo {
                name: "Frankfurt am Main",
                city: "Frankfurt",
                country: "DE",
            },
        ),
        (
            "AMS",
            AirportInfo {
                name: "Amsterdam Schiphol",
                city: "Amsterdam",
                country: "NL",
            },
        ),
    ])
});

static AIRCRAFT: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("B777", "Boeing 777"),
        ("B787", "Boeing 787"),
        ("B747", "Boeing 747"),
        ("A330", "Airbus A330"),
        ("A350", "Airbus A350"),
        ("A380", "Airbus A380"),
    ])
});

/// Look up static facts for a known airport; `None` for codes outside the
/// table.
#[must_use]
pub fn airport_info(code: &AirportCode) -> Option<&'static AirportInfo> {
    AIRPORTS.get(code.as_str())
}

/// Expand short aircraft type codes ("B777") to standardized names; unknown
/// input passes through trimmed.
#[must_use]
pub fn standardize_aircraft(raw: &str) -> String {
    let trimmed = raw.trim();
    AIRCRAFT
        .get(trimmed.to_ascii_uppercase().as_str())
        .map_or_else(|| trimmed.to_string(), |name| (*name).to_string())
}
