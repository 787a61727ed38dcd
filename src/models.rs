//! Shared domain models: courses, schedules and trainees.
//!
//! These rows live in the externally provisioned Postgres database and are
//! read through the repository traits in [`crate::repo`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub const DEFAULT_SERIAL_PADDING: u32 = 6;

/// A training course. `serial_padding` is only consumed by the serial
/// allocator when zero-padding certificate ordinals.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Course {
    pub id: Uuid,
    pub name: String,
    pub serial_padding: u32,
}

/// How a schedule's "held on" date string is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleType {
    /// One contiguous start/end date pair.
    Regular,
    /// An ordered set of individual dates.
    Staggered,
}

impl ScheduleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleType::Regular => "regular",
            ScheduleType::Staggered => "staggered",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "regular" => Some(ScheduleType::Regular),
            "staggered" => Some(ScheduleType::Staggered),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Schedule {
    pub id: Uuid,
    pub course_id: Uuid,
    pub schedule_type: ScheduleType,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// A trainee's training record. The certificate serial is immutable once
/// assigned and is never recycled.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Trainee {
    pub id: Uuid,
    pub schedule_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub middle_initial: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
    pub certificate_serial: Option<String>,
    pub batch_number: Option<String>,
}

impl Trainee {
    /// Eligible for batch issuance: has both a serial and an email.
    pub fn is_deliverable(&self) -> bool {
        self.certificate_serial.is_some() && self.email.is_some()
    }
}
