//! The flight result model every producer emits.
//!
//! Results are produced cheapest-first so downstream consumers can treat
//! `results[0]` as the best offer for that task.

use awardgrid_core::AirportCode;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One priced award-flight option for a date pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightResult {
    /// Display name of the producing airline
    pub airline: String,
    pub outbound_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub price: PriceQuote,
    pub outbound_segments: Vec<FlightSegment>,
    pub return_segments: Vec<FlightSegment>,
    /// Total journey duration, e.g. "8h 25m"
    pub duration: Option<String>,
    pub stops: u32,
    pub aircraft: Option<String>,
    pub booking_class: String,
    pub availability: Availability,
}

/// Award price: structured points plus optional cash components, and the
/// display string shown to users (e.g. `"75k + £345"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub points: Option<u64>,
    pub cash: Option<f64>,
    pub taxes: Option<f64>,
    pub display: String,
}

impl PriceQuote {
    /// Build a quote from a points total and optional taxes.
    #[must_use]
    pub fn from_points(points: u64, taxes: Option<f64>) -> Self {
        let display = match taxes {
            Some(taxes) => format!("{}k + £{taxes:.0}", points / 1000),
            None => format!("{}k", points / 1000),
        };
        Self {
            points: Some(points),
            cash: None,
            taxes,
            display,
        }
    }
}

/// One flight leg of a journey.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightSegment {
    pub flight_number: String,
    pub origin: AirportCode,
    pub destination: AirportCode,
    pub aircraft: Option<String>,
}

/// Seat availability as reported by the airline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    Waitlist,
    Unknown,
}

/// Order results cheapest-first; unpriced results sink to the end.
pub fn sort_cheapest_first(results: &mut [FlightResult]) {
    results.sort_by_key(|r| r.price.points.unwrap_or(u64::MAX));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with_points(points: Option<u64>) -> FlightResult {
        FlightResult {
            airline: "Test".to_string(),
            outbound_date: NaiveDate::from_ymd_opt(2026, 7, 14).expect("valid date"),
            return_date: None,
            price: PriceQuote {
                points,
                cash: None,
                taxes: None,
                display: String::new(),
            },
            outbound_segments: vec![],
            return_segments: vec![],
            duration: None,
            stops: 0,
            aircraft: None,
            booking_class: "Economy".to_string(),
            availability: Availability::Available,
        }
    }

    #[test]
    fn test_price_display_with_taxes() {
        let quote = PriceQuote::from_points(75_500, Some(345.67));
        assert_eq!(quote.display, "75k + £346");
        assert_eq!(quote.points, Some(75_500));
    }

    #[test]
    fn test_price_display_points_only() {
        let quote = PriceQuote::from_points(60_000, None);
        assert_eq!(quote.display, "60k");
    }

    #[test]
    fn test_sort_cheapest_first() {
        let mut results = vec![
            result_with_points(Some(95_000)),
            result_with_points(None),
            result_with_points(Some(60_000)),
        ];
        sort_cheapest_first(&mut results);
        assert_eq!(results[0].price.points, Some(60_000));
        assert_eq!(results[1].price.points, Some(95_000));
        assert_eq!(results[2].price.points, None);
    }

    #[test]
    fn test_result_serialization_uses_camel_case() {
        let result = result_with_points(Some(80_000));
        let json = serde_json::to_value(&result).expect("serialize result");
        assert!(json.get("outboundDate").is_some());
        assert!(json.get("bookingClass").is_some());
        assert_eq!(json["availability"], "available");
    }
}
