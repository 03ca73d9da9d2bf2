//! Kitchen readiness for train deliveries
//!
//! `expected_ready_at = arrival - prep - transit buffer - pickup buffer`.
//! A schedule that cannot be found, or a station that is not on the route,
//! is not an error: the order simply carries no readiness time.

use chrono::{DateTime, NaiveDate, Utc};
use shared::models::TrainSchedule;
use shared::order::ScheduleInfo;
use std::sync::Arc;

use crate::db::ScheduleProvider;

const MINUTE_MS: i64 = 60_000;

/// Station to pickup point
pub const TRANSIT_BUFFER_MINUTES: i64 = 5;
/// Handover slack before the train arrives
pub const PICKUP_BUFFER_MINUTES: i64 = 3;

/// Readiness for `station` on a known timetable
pub fn expected_ready_at(
    schedule: &TrainSchedule,
    station: &str,
    prep_minutes: u32,
) -> Option<ScheduleInfo> {
    let (index, stop) = schedule.find_stop(station)?;
    let lead_minutes = i64::from(prep_minutes) + TRANSIT_BUFFER_MINUTES + PICKUP_BUFFER_MINUTES;

    Some(ScheduleInfo {
        train_no: schedule.train_no.clone(),
        service_date: schedule.date,
        station: stop.station.clone(),
        station_index: u32::try_from(index).unwrap_or(u32::MAX),
        scheduled_arrival: stop.arrival,
        scheduled_depart: stop.departure,
        expected_ready_at: stop.arrival - lead_minutes * MINUTE_MS,
    })
}

/// UTC service date containing `at_millis`
pub fn service_date(at_millis: i64) -> NaiveDate {
    DateTime::<Utc>::from_timestamp_millis(at_millis)
        .unwrap_or_else(Utc::now)
        .date_naive()
}

#[derive(Clone)]
pub struct ReadinessCalculator {
    schedules: Arc<dyn ScheduleProvider>,
    prep_minutes: u32,
}

impl ReadinessCalculator {
    pub fn new(schedules: Arc<dyn ScheduleProvider>, prep_minutes: u32) -> Self {
        Self {
            schedules,
            prep_minutes,
        }
    }

    /// Today's timetable for `train_no`; lookup failures degrade to `None`
    pub async fn schedule_for(&self, train_no: &str, date: NaiveDate) -> Option<TrainSchedule> {
        match self.schedules.find_schedule(train_no, date).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(train_no, %date, error = %e, "Schedule lookup failed");
                None
            }
        }
    }

    pub async fn compute(&self, train_no: &str, station: &str, now_ms: i64) -> Option<ScheduleInfo> {
        let date = service_date(now_ms);
        let Some(schedule) = self.schedule_for(train_no, date).await else {
            tracing::warn!(train_no, %date, "No schedule for train, readiness unknown");
            return None;
        };

        let info = expected_ready_at(&schedule, station, self.prep_minutes);
        if info.is_none() {
            tracing::warn!(train_no, station, "Station not on route, readiness unknown");
        }
        info
    }
}
