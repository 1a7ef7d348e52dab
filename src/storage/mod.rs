use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{
    Appointment, AppointmentWithDetails, BarberWithUser, NewAppointment, NewReview, NewUser,
    Review, ReviewWithDetails, Service, User,
};

mod memory;
mod sqlite;

pub use memory::MemStorage;
pub use sqlite::SqliteStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence contract for the booking workflow. Backends are behaviorally
/// equivalent; handlers never see which one is wired in.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_user(&self, id: i64) -> Result<Option<User>, StorageError>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError>;

    /// Creates a user with a generated id, "customer" role when none is
    /// given, and a server-set creation timestamp. The password is expected
    /// to arrive already hashed.
    async fn create_user(&self, input: NewUser) -> Result<User, StorageError>;

    /// Active services only.
    async fn all_services(&self) -> Result<Vec<Service>, StorageError>;

    async fn services_by_category(&self, category: &str) -> Result<Vec<Service>, StorageError>;

    async fn get_service(&self, id: i64) -> Result<Option<Service>, StorageError>;

    /// Available barbers joined with their user record. Barbers whose linked
    /// user cannot be found are excluded rather than surfaced as errors.
    async fn all_barbers(&self) -> Result<Vec<BarberWithUser>, StorageError>;

    async fn get_barber(&self, id: i64) -> Result<Option<BarberWithUser>, StorageError>;

    async fn create_appointment(
        &self,
        input: NewAppointment,
    ) -> Result<Appointment, StorageError>;

    async fn get_appointment(&self, id: i64) -> Result<Option<Appointment>, StorageError>;

    /// A customer's appointments with full details, most recent first.
    async fn user_appointments(
        &self,
        user_id: i64,
    ) -> Result<Vec<AppointmentWithDetails>, StorageError>;

    /// A barber's appointments ascending by date, optionally restricted to a
    /// single calendar day (date component equality, time of day ignored).
    async fn barber_appointments(
        &self,
        barber_id: i64,
        date: Option<NaiveDate>,
    ) -> Result<Vec<AppointmentWithDetails>, StorageError>;

    /// Overwrites the status field. No transition checking is performed.
    async fn update_appointment_status(
        &self,
        id: i64,
        status: &str,
    ) -> Result<Option<Appointment>, StorageError>;

    /// Persists the review and, within the same transaction or lock,
    /// recomputes the barber's rating and review count from the full review
    /// set.
    async fn create_review(&self, input: NewReview) -> Result<Review, StorageError>;

    /// A barber's reviews with reviewer details, newest first.
    async fn barber_reviews(
        &self,
        barber_id: i64,
    ) -> Result<Vec<ReviewWithDetails>, StorageError>;
}

/// Mean of the given ratings formatted to one decimal place, the form the
/// rating travels in on the wire. An empty history yields the "0.0" a barber
/// starts out with.
pub(crate) fn average_rating(ratings: &[i64]) -> String {
    if ratings.is_empty() {
        return "0.0".to_string();
    }
    let sum: i64 = ratings.iter().sum();
    let average = sum as f64 / ratings.len() as f64;
    format!("{average:.1}")
}
