//! Student intake: validate, predict, persist.

use crate::service::OrientationService;
use log::info;
use orientation_data::{LabeledStudent, Result, StudentRecord, StudentStore};
use std::sync::Arc;

/// Enrolls students by labeling them with the predicted sector and storing them.
#[derive(Debug)]
pub struct StudentIntake<S> {
    service: Arc<OrientationService>,
    store: S,
}

impl<S: StudentStore> StudentIntake<S> {
    /// Create an intake over a service and a store.
    pub const fn new(service: Arc<OrientationService>, store: S) -> Self {
        Self { service, store }
    }

    /// Validate the record, predict its sector and persist the labeled student.
    ///
    /// # Errors
    /// [`orientation_data::DataError::InvalidValue`] for out-of-range values, or
    /// a store error. Prediction itself never fails.
    pub fn enroll(&self, record: StudentRecord) -> Result<LabeledStudent> {
        record.validate()?;
        let sector = self.service.predict_orientation(&record);
        let student = record.label(sector);
        let id = self.store.insert(&student)?;
        info!("Enrolled student {} in {}", id, student.sector);
        Ok(student.with_id(id))
    }

    /// Stored student by identifier.
    pub fn student(&self, id: i64) -> Result<LabeledStudent> {
        self.store.require(id)
    }

    /// Stored students, paginated.
    pub fn students(&self, skip: usize, limit: usize) -> Result<Vec<LabeledStudent>> {
        self.store.list(skip, limit)
    }

    /// The underlying store
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The prediction service
    pub const fn service(&self) -> &Arc<OrientationService> {
        &self.service
    }
}
