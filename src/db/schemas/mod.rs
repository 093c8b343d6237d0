//! Document schemas for the record store

pub mod field;
pub mod sheet;
pub mod submission;
pub mod user;

pub use field::{FieldDoc, FIELDS_COLLECTION};
pub use sheet::{SheetRegistration, SHEETS_COLLECTION};
pub use submission::{
    GeoPoint, PlantConditions, SubmissionDoc, TraitMeasurements, SUBMISSIONS_COLLECTION,
};
pub use user::{UserDoc, USERS_COLLECTION};
