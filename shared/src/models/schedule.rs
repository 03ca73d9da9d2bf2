//! Train timetable model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One stop of a train run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stop {
    pub station: String,
    /// Arrival time (UTC millis)
    pub arrival: i64,
    /// Departure time (UTC millis)
    pub departure: i64,
}

/// Timetable of one train on one service date.
///
/// Unique per `(train_no, date)`. Stops are stored in travel order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainSchedule {
    pub train_no: String,
    pub date: NaiveDate,
    pub stops: Vec<Stop>,
}

impl TrainSchedule {
    /// Locate a stop by station name (case-insensitive, surrounding
    /// whitespace ignored). Returns the stop index in travel order.
    pub fn find_stop(&self, station: &str) -> Option<(usize, &Stop)> {
        let wanted = station.trim();
        self.stops
            .iter()
            .enumerate()
            .find(|(_, stop)| stop.station.trim().eq_ignore_ascii_case(wanted))
    }

    /// Structural checks applied before a timetable is stored
    pub fn validate(&self) -> Result<(), String> {
        if self.train_no.trim().is_empty() {
            return Err("train_no must not be empty".to_string());
        }
        if self.stops.is_empty() {
            return Err("schedule must contain at least one stop".to_string());
        }
        for (i, stop) in self.stops.iter().enumerate() {
            if stop.station.trim().is_empty() {
                return Err(format!("stops[{i}].station must not be empty"));
            }
            if stop.departure < stop.arrival {
                return Err(format!("stops[{i}] departs before it arrives"));
            }
        }
        Ok(())
    }
}
