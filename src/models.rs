use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const ROLE_CUSTOMER: &str = "customer";
pub const ROLE_BARBER: &str = "barber";
pub const ROLE_ADMIN: &str = "admin";

pub const STATUS_SCHEDULED: &str = "scheduled";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_CANCELLED: &str = "cancelled";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: String,
    pub profile_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The slice of a user record exposed by the auth endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: String,
    pub profile_image_url: Option<String>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
            profile_image_url: user.profile_image_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: String,
    pub duration: i64,
    pub category: String,
    pub image_url: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Barber {
    pub id: i64,
    pub user_id: i64,
    pub specialty: Option<String>,
    pub experience: Option<i64>,
    /// Arithmetic mean of all review ratings, one decimal place. Derived;
    /// never set by clients.
    pub rating: String,
    pub review_count: i64,
    pub is_available: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BarberWithUser {
    #[serde(flatten)]
    pub barber: Barber,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: i64,
    pub customer_id: i64,
    pub barber_id: i64,
    pub service_id: i64,
    pub appointment_date: DateTime<Utc>,
    pub status: String,
    pub notes: Option<String>,
    /// Price snapshot captured at booking; later service price edits do not
    /// touch it.
    pub total_price: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentWithDetails {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub customer: User,
    pub barber: BarberWithUser,
    pub service: Service,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: i64,
    pub appointment_id: i64,
    pub customer_id: i64,
    pub barber_id: i64,
    pub rating: i64,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewWithDetails {
    #[serde(flatten)]
    pub review: Review,
    pub customer: User,
    pub barber: BarberWithUser,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub role: Option<String>,
    pub profile_image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAppointment {
    pub customer_id: i64,
    pub barber_id: i64,
    pub service_id: i64,
    pub appointment_date: DateTime<Utc>,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub total_price: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub appointment_id: i64,
    pub customer_id: i64,
    pub barber_id: i64,
    pub rating: i64,
    pub comment: Option<String>,
}
