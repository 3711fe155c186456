//! The event vocabulary emitted over one search run.
//!
//! Events are append-only: per-key updates only ever improve, progress
//! counts only ever grow, and `complete` is always the last event of a run.
//! Consumers must tolerate event types they do not recognize.

use awardgrid_browser::PoolStats;
use awardgrid_core::DatePairKey;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// One event in a run's stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum SearchEvent {
    /// The run is starting.
    Status { message: String, timestamp: String },

    /// Scope of the run: how many combinations across how many airlines.
    Progress {
        message: String,
        total_combinations: usize,
        total_airlines: usize,
    },

    /// One producer started or finished its task list.
    ProducerStatus {
        airline: String,
        status: ProducerPhase,
        message: String,
    },

    /// A strictly better price was found for a date-pair key.
    ResultUpdate {
        key: DatePairKey,
        price: String,
        /// Comparison metric behind the price display
        points: Option<u64>,
        airline: String,
        outbound: String,
        #[serde(rename = "return")]
        return_label: String,
    },

    /// Task completion counter; monotonically non-decreasing.
    ProgressUpdate {
        completed: usize,
        total: usize,
        percentage: u32,
    },

    /// One task failed after retries, or the run degraded.
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        airline: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        key: Option<DatePairKey>,
        message: String,
    },

    /// Terminal event; nothing follows it.
    Complete {
        message: String,
        total_results: usize,
        timestamp: String,
        pool_stats: PoolStats,
    },
}

/// Where a producer is in its task list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProducerPhase {
    Starting,
    Completed,
}

impl SearchEvent {
    /// A timestamped `status` event.
    #[must_use]
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status {
            message: message.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    /// A timestamped terminal `complete` event.
    #[must_use]
    pub fn complete(total_results: usize, pool_stats: PoolStats) -> Self {
        Self::Complete {
            message: "All searches completed".to_string(),
            total_results,
            timestamp: Utc::now().to_rfc3339(),
            pool_stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn key() -> DatePairKey {
        DatePairKey::new(
            NaiveDate::from_ymd_opt(2026, 7, 14).expect("valid date"),
            NaiveDate::from_ymd_opt(2026, 7, 18).expect("valid date"),
        )
    }

    #[test]
    fn test_result_update_wire_format() {
        let event = SearchEvent::ResultUpdate {
            key: key(),
            price: "75k + £345".to_string(),
            points: Some(75_000),
            airline: "British Airways".to_string(),
            outbound: "Jul 14".to_string(),
            return_label: "Jul 18".to_string(),
        };
        let json = serde_json::to_value(&event).expect("serialize event");
        assert_eq!(json["type"], "result-update");
        assert_eq!(json["key"], "2026-07-14-2026-07-18");
        assert_eq!(json["return"], "Jul 18");
        assert_eq!(json["points"], 75_000);
    }

    #[test]
    fn test_event_tags() {
        let progress = SearchEvent::ProgressUpdate {
            completed: 3,
            total: 12,
            percentage: 25,
        };
        let json = serde_json::to_value(&progress).expect("serialize event");
        assert_eq!(json["type"], "progress-update");
        assert_eq!(json["completed"], 3);

        let status = SearchEvent::ProducerStatus {
            airline: "SimAirline1".to_string(),
            status: ProducerPhase::Starting,
            message: "SimAirline1: Starting search...".to_string(),
        };
        let json = serde_json::to_value(&status).expect("serialize event");
        assert_eq!(json["type"], "producer-status");
        assert_eq!(json["status"], "starting");
    }

    #[test]
    fn test_error_event_omits_empty_fields() {
        let event = SearchEvent::Error {
            airline: None,
            key: None,
            message: "search deadline exceeded".to_string(),
        };
        let json = serde_json::to_value(&event).expect("serialize event");
        assert!(json.get("airline").is_none());
        assert!(json.get("key").is_none());

        let event = SearchEvent::Error {
            airline: Some("SimAirline1".to_string()),
            key: Some(key()),
            message: "failed".to_string(),
        };
        let json = serde_json::to_value(&event).expect("serialize event");
        assert_eq!(json["airline"], "SimAirline1");
    }

    #[test]
    fn test_complete_event_carries_pool_stats() {
        let stats = PoolStats {
            browsers: 2,
            available_pages: 3,
            busy_pages: 1,
            queued_requests: 0,
        };
        let json = serde_json::to_value(SearchEvent::complete(7, stats)).expect("serialize event");
        assert_eq!(json["type"], "complete");
        assert_eq!(json["totalResults"], 7);
        assert_eq!(json["poolStats"]["availablePages"], 3);
        assert!(json["timestamp"].as_str().is_some());
    }
}
