//! Certificate serial allocation.
//!
//! Serials are derived, not stored as their own entity: `PSI-{code}-{ordinal}`
//! where the ordinal is the trainee's position among already-serialed trainees
//! of the course. Once written to the trainee row a serial is immutable.

use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::Course;
use crate::repo::{RepoError, TraineeRepo};

pub const SERIAL_PREFIX: &str = "PSI";
const COURSE_CODE_MAX_LEN: usize = 10;
const STOP_WORDS: [&str; 4] = ["TRAINING", "COURSE", "SAFETY", "PROGRAM"];

/// Derive the serial's course code from a course display name: uppercase,
/// drop the generic words, keep alphanumerics, cap at ten characters.
/// Deterministic for the same input.
pub fn course_code(course_name: &str) -> String {
    course_name
        .to_uppercase()
        .split_whitespace()
        .filter(|word| !STOP_WORDS.contains(word))
        .flat_map(|word| word.chars())
        .filter(|c| c.is_ascii_alphanumeric())
        .take(COURSE_CODE_MAX_LEN)
        .collect()
}

pub fn build_serial(course: &Course, ordinal: u64) -> String {
    format!(
        "{}-{}-{:0width$}",
        SERIAL_PREFIX,
        course_code(&course.name),
        ordinal,
        width = course.serial_padding as usize
    )
}

pub struct SerialAllocator {
    trainees: Arc<dyn TraineeRepo>,
}

impl SerialAllocator {
    pub fn new(trainees: Arc<dyn TraineeRepo>) -> Self {
        Self { trainees }
    }

    /// Assign the next serial of the course to one trainee. Idempotent: a
    /// trainee that already carries a serial gets it back unchanged.
    pub async fn allocate_one(
        &self,
        course: &Course,
        trainee_id: Uuid,
    ) -> Result<String, RepoError> {
        let trainee = self
            .trainees
            .find(trainee_id)
            .await?
            .ok_or_else(|| RepoError::Other(format!("trainee {} not found", trainee_id)))?;

        if let Some(existing) = trainee.certificate_serial {
            return Ok(existing);
        }

        let count = self.trainees.serial_count(course.id).await?;
        let serial = build_serial(course, count + 1);
        self.trainees.set_serial(trainee_id, &serial).await?;
        Ok(serial)
    }

    /// Assign consecutive serials to every serial-less trainee in the input,
    /// in input order. The existing count is read once, not per item, so one
    /// batch call always produces contiguous numbering.
    pub async fn allocate_batch(
        &self,
        course: &Course,
        trainee_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, String>, RepoError> {
        let mut next_ordinal = self.trainees.serial_count(course.id).await? + 1;
        let mut assigned = HashMap::with_capacity(trainee_ids.len());

        for &trainee_id in trainee_ids {
            let trainee = self
                .trainees
                .find(trainee_id)
                .await?
                .ok_or_else(|| RepoError::Other(format!("trainee {} not found", trainee_id)))?;

            let serial = match trainee.certificate_serial {
                Some(existing) => existing,
                None => {
                    let serial = build_serial(course, next_ordinal);
                    self.trainees.set_serial(trainee_id, &serial).await?;
                    next_ordinal += 1;
                    serial
                }
            };
            assigned.insert(trainee_id, serial);
        }

        Ok(assigned)
    }
}
