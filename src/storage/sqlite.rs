use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use sqlx::SqlitePool;

use crate::models::{
    Appointment, AppointmentWithDetails, Barber, BarberWithUser, NewAppointment, NewReview,
    NewUser, Review, ReviewWithDetails, Service, User, ROLE_CUSTOMER, STATUS_SCHEDULED,
};

use super::{average_rating, Storage, StorageError};

/// SQLite backend. Denormalized views are assembled with SQL joins; rows
/// whose joined entities are missing fall out of the inner joins instead of
/// surfacing as partial errors.
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const APPOINTMENT_DETAIL_SELECT: &str = r#"
    SELECT a.id, a.customer_id, a.barber_id, a.service_id, a.appointment_date,
           a.status, a.notes, a.total_price, a.created_at,
           cu.first_name AS customer_first_name, cu.last_name AS customer_last_name,
           cu.email AS customer_email, cu.password AS customer_password,
           cu.role AS customer_role, cu.profile_image_url AS customer_profile_image_url,
           cu.created_at AS customer_created_at,
           b.user_id AS barber_user_id, b.specialty AS barber_specialty,
           b.experience AS barber_experience, b.rating AS barber_rating,
           b.review_count AS barber_review_count, b.is_available AS barber_is_available,
           bu.first_name AS barber_first_name, bu.last_name AS barber_last_name,
           bu.email AS barber_email, bu.password AS barber_password,
           bu.role AS barber_role, bu.profile_image_url AS barber_profile_image_url,
           bu.created_at AS barber_user_created_at,
           s.name AS service_name, s.description AS service_description,
           s.price AS service_price, s.duration AS service_duration,
           s.category AS service_category, s.image_url AS service_image_url,
           s.is_active AS service_is_active
    FROM appointments a
    JOIN users cu ON cu.id = a.customer_id
    JOIN barbers b ON b.id = a.barber_id
    JOIN users bu ON bu.id = b.user_id
    JOIN services s ON s.id = a.service_id
"#;

#[derive(sqlx::FromRow)]
struct AppointmentDetailRow {
    id: i64,
    customer_id: i64,
    barber_id: i64,
    service_id: i64,
    appointment_date: DateTime<Utc>,
    status: String,
    notes: Option<String>,
    total_price: String,
    created_at: DateTime<Utc>,
    customer_first_name: String,
    customer_last_name: String,
    customer_email: String,
    customer_password: String,
    customer_role: String,
    customer_profile_image_url: Option<String>,
    customer_created_at: DateTime<Utc>,
    barber_user_id: i64,
    barber_specialty: Option<String>,
    barber_experience: Option<i64>,
    barber_rating: String,
    barber_review_count: i64,
    barber_is_available: bool,
    barber_first_name: String,
    barber_last_name: String,
    barber_email: String,
    barber_password: String,
    barber_role: String,
    barber_profile_image_url: Option<String>,
    barber_user_created_at: DateTime<Utc>,
    service_name: String,
    service_description: String,
    service_price: String,
    service_duration: i64,
    service_category: String,
    service_image_url: Option<String>,
    service_is_active: bool,
}

impl From<AppointmentDetailRow> for AppointmentWithDetails {
    fn from(row: AppointmentDetailRow) -> Self {
        AppointmentWithDetails {
            appointment: Appointment {
                id: row.id,
                customer_id: row.customer_id,
                barber_id: row.barber_id,
                service_id: row.service_id,
                appointment_date: row.appointment_date,
                status: row.status,
                notes: row.notes,
                total_price: row.total_price,
                created_at: row.created_at,
            },
            customer: User {
                id: row.customer_id,
                first_name: row.customer_first_name,
                last_name: row.customer_last_name,
                email: row.customer_email,
                password: row.customer_password,
                role: row.customer_role,
                profile_image_url: row.customer_profile_image_url,
                created_at: row.customer_created_at,
            },
            barber: BarberWithUser {
                barber: Barber {
                    id: row.barber_id,
                    user_id: row.barber_user_id,
                    specialty: row.barber_specialty,
                    experience: row.barber_experience,
                    rating: row.barber_rating,
                    review_count: row.barber_review_count,
                    is_available: row.barber_is_available,
                },
                user: User {
                    id: row.barber_user_id,
                    first_name: row.barber_first_name,
                    last_name: row.barber_last_name,
                    email: row.barber_email,
                    password: row.barber_password,
                    role: row.barber_role,
                    profile_image_url: row.barber_profile_image_url,
                    created_at: row.barber_user_created_at,
                },
            },
            service: Service {
                id: row.service_id,
                name: row.service_name,
                description: row.service_description,
                price: row.service_price,
                duration: row.service_duration,
                category: row.service_category,
                image_url: row.service_image_url,
                is_active: row.service_is_active,
            },
        }
    }
}

#[derive(sqlx::FromRow)]
struct ReviewDetailRow {
    id: i64,
    appointment_id: i64,
    customer_id: i64,
    barber_id: i64,
    rating: i64,
    comment: Option<String>,
    created_at: DateTime<Utc>,
    customer_first_name: String,
    customer_last_name: String,
    customer_email: String,
    customer_password: String,
    customer_role: String,
    customer_profile_image_url: Option<String>,
    customer_created_at: DateTime<Utc>,
    barber_user_id: i64,
    barber_specialty: Option<String>,
    barber_experience: Option<i64>,
    barber_rating: String,
    barber_review_count: i64,
    barber_is_available: bool,
    barber_first_name: String,
    barber_last_name: String,
    barber_email: String,
    barber_password: String,
    barber_role: String,
    barber_profile_image_url: Option<String>,
    barber_user_created_at: DateTime<Utc>,
}

impl From<ReviewDetailRow> for ReviewWithDetails {
    fn from(row: ReviewDetailRow) -> Self {
        ReviewWithDetails {
            review: Review {
                id: row.id,
                appointment_id: row.appointment_id,
                customer_id: row.customer_id,
                barber_id: row.barber_id,
                rating: row.rating,
                comment: row.comment,
                created_at: row.created_at,
            },
            customer: User {
                id: row.customer_id,
                first_name: row.customer_first_name,
                last_name: row.customer_last_name,
                email: row.customer_email,
                password: row.customer_password,
                role: row.customer_role,
                profile_image_url: row.customer_profile_image_url,
                created_at: row.customer_created_at,
            },
            barber: BarberWithUser {
                barber: Barber {
                    id: row.barber_id,
                    user_id: row.barber_user_id,
                    specialty: row.barber_specialty,
                    experience: row.barber_experience,
                    rating: row.barber_rating,
                    review_count: row.barber_review_count,
                    is_available: row.barber_is_available,
                },
                user: User {
                    id: row.barber_user_id,
                    first_name: row.barber_first_name,
                    last_name: row.barber_last_name,
                    email: row.barber_email,
                    password: row.barber_password,
                    role: row.barber_role,
                    profile_image_url: row.barber_profile_image_url,
                    created_at: row.barber_user_created_at,
                },
            },
        }
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn get_user(&self, id: i64) -> Result<Option<User>, StorageError> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, first_name, last_name, email, password, role, profile_image_url, created_at
               FROM users WHERE id = ? LIMIT 1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, first_name, last_name, email, password, role, profile_image_url, created_at
               FROM users WHERE email = ? LIMIT 1"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, input: NewUser) -> Result<User, StorageError> {
        let role = input.role.unwrap_or_else(|| ROLE_CUSTOMER.to_string());
        let created_at = Utc::now();
        let result = sqlx::query(
            r#"INSERT INTO users (first_name, last_name, email, password, role, profile_image_url, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.email)
        .bind(&input.password)
        .bind(&role)
        .bind(&input.profile_image_url)
        .bind(created_at)
        .execute(&self.pool)
        .await;

        let result = match result {
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                return Err(StorageError::DuplicateEmail);
            }
            other => other?,
        };

        Ok(User {
            id: result.last_insert_rowid(),
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
            password: input.password,
            role,
            profile_image_url: input.profile_image_url,
            created_at,
        })
    }

    async fn all_services(&self) -> Result<Vec<Service>, StorageError> {
        let services = sqlx::query_as::<_, Service>(
            r#"SELECT id, name, description, price, duration, category, image_url, is_active
               FROM services WHERE is_active = 1 ORDER BY id"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(services)
    }

    async fn services_by_category(&self, category: &str) -> Result<Vec<Service>, StorageError> {
        let services = sqlx::query_as::<_, Service>(
            r#"SELECT id, name, description, price, duration, category, image_url, is_active
               FROM services WHERE is_active = 1 AND category = ? ORDER BY id"#,
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await?;
        Ok(services)
    }

    async fn get_service(&self, id: i64) -> Result<Option<Service>, StorageError> {
        let service = sqlx::query_as::<_, Service>(
            r#"SELECT id, name, description, price, duration, category, image_url, is_active
               FROM services WHERE id = ? LIMIT 1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(service)
    }

    async fn all_barbers(&self) -> Result<Vec<BarberWithUser>, StorageError> {
        let rows = sqlx::query_as::<_, BarberUserRow>(
            &format!("{BARBER_USER_SELECT} WHERE b.is_available = 1 ORDER BY b.id"),
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(BarberWithUser::from).collect())
    }

    async fn get_barber(&self, id: i64) -> Result<Option<BarberWithUser>, StorageError> {
        let row = sqlx::query_as::<_, BarberUserRow>(
            &format!("{BARBER_USER_SELECT} WHERE b.id = ? LIMIT 1"),
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(BarberWithUser::from))
    }

    async fn create_appointment(
        &self,
        input: NewAppointment,
    ) -> Result<Appointment, StorageError> {
        let status = input.status.unwrap_or_else(|| STATUS_SCHEDULED.to_string());
        let created_at = Utc::now();
        let result = sqlx::query(
            r#"INSERT INTO appointments
               (customer_id, barber_id, service_id, appointment_date, status, notes, total_price, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(input.customer_id)
        .bind(input.barber_id)
        .bind(input.service_id)
        .bind(input.appointment_date)
        .bind(&status)
        .bind(&input.notes)
        .bind(&input.total_price)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(Appointment {
            id: result.last_insert_rowid(),
            customer_id: input.customer_id,
            barber_id: input.barber_id,
            service_id: input.service_id,
            appointment_date: input.appointment_date,
            status,
            notes: input.notes,
            total_price: input.total_price,
            created_at,
        })
    }

    async fn get_appointment(&self, id: i64) -> Result<Option<Appointment>, StorageError> {
        let appointment = sqlx::query_as::<_, Appointment>(
            r#"SELECT id, customer_id, barber_id, service_id, appointment_date, status, notes, total_price, created_at
               FROM appointments WHERE id = ? LIMIT 1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(appointment)
    }

    async fn user_appointments(
        &self,
        user_id: i64,
    ) -> Result<Vec<AppointmentWithDetails>, StorageError> {
        let rows = sqlx::query_as::<_, AppointmentDetailRow>(&format!(
            "{APPOINTMENT_DETAIL_SELECT} WHERE a.customer_id = ? ORDER BY a.appointment_date DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(AppointmentWithDetails::from).collect())
    }

    async fn barber_appointments(
        &self,
        barber_id: i64,
        date: Option<NaiveDate>,
    ) -> Result<Vec<AppointmentWithDetails>, StorageError> {
        let rows = match date {
            Some(day) => {
                // Calendar-day window in UTC; bound values encode in the
                // same format as the stored timestamps, so the range
                // comparison is chronological.
                let start = day.and_hms_opt(0, 0, 0).expect("midnight is valid").and_utc();
                let end = start + Days::new(1);
                sqlx::query_as::<_, AppointmentDetailRow>(&format!(
                    "{APPOINTMENT_DETAIL_SELECT}
                     WHERE a.barber_id = ? AND a.appointment_date >= ? AND a.appointment_date < ?
                     ORDER BY a.appointment_date ASC"
                ))
                .bind(barber_id)
                .bind(start)
                .bind(end)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, AppointmentDetailRow>(&format!(
                    "{APPOINTMENT_DETAIL_SELECT} WHERE a.barber_id = ? ORDER BY a.appointment_date ASC"
                ))
                .bind(barber_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows.into_iter().map(AppointmentWithDetails::from).collect())
    }

    async fn update_appointment_status(
        &self,
        id: i64,
        status: &str,
    ) -> Result<Option<Appointment>, StorageError> {
        let result = sqlx::query("UPDATE appointments SET status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        let appointment = sqlx::query_as::<_, Appointment>(
            r#"SELECT id, customer_id, barber_id, service_id, appointment_date, status, notes, total_price, created_at
               FROM appointments WHERE id = ? LIMIT 1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(appointment)
    }

    async fn create_review(&self, input: NewReview) -> Result<Review, StorageError> {
        let created_at = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"INSERT INTO reviews (appointment_id, customer_id, barber_id, rating, comment, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(input.appointment_id)
        .bind(input.customer_id)
        .bind(input.barber_id)
        .bind(input.rating)
        .bind(&input.comment)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;
        let review_id = result.last_insert_rowid();

        // Recompute inside the same transaction so concurrent reviews cannot
        // publish a rating that misses one of them.
        let ratings: Vec<i64> =
            sqlx::query_scalar("SELECT rating FROM reviews WHERE barber_id = ?")
                .bind(input.barber_id)
                .fetch_all(&mut *tx)
                .await?;
        sqlx::query("UPDATE barbers SET rating = ?, review_count = ? WHERE id = ?")
            .bind(average_rating(&ratings))
            .bind(ratings.len() as i64)
            .bind(input.barber_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Review {
            id: review_id,
            appointment_id: input.appointment_id,
            customer_id: input.customer_id,
            barber_id: input.barber_id,
            rating: input.rating,
            comment: input.comment,
            created_at,
        })
    }

    async fn barber_reviews(
        &self,
        barber_id: i64,
    ) -> Result<Vec<ReviewWithDetails>, StorageError> {
        let rows = sqlx::query_as::<_, ReviewDetailRow>(
            r#"SELECT r.id, r.appointment_id, r.customer_id, r.barber_id, r.rating, r.comment, r.created_at,
                      cu.first_name AS customer_first_name, cu.last_name AS customer_last_name,
                      cu.email AS customer_email, cu.password AS customer_password,
                      cu.role AS customer_role, cu.profile_image_url AS customer_profile_image_url,
                      cu.created_at AS customer_created_at,
                      b.user_id AS barber_user_id, b.specialty AS barber_specialty,
                      b.experience AS barber_experience, b.rating AS barber_rating,
                      b.review_count AS barber_review_count, b.is_available AS barber_is_available,
                      bu.first_name AS barber_first_name, bu.last_name AS barber_last_name,
                      bu.email AS barber_email, bu.password AS barber_password,
                      bu.role AS barber_role, bu.profile_image_url AS barber_profile_image_url,
                      bu.created_at AS barber_user_created_at
               FROM reviews r
               JOIN users cu ON cu.id = r.customer_id
               JOIN barbers b ON b.id = r.barber_id
               JOIN users bu ON bu.id = b.user_id
               WHERE r.barber_id = ?
               ORDER BY r.created_at DESC, r.id DESC"#,
        )
        .bind(barber_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ReviewWithDetails::from).collect())
    }
}

const BARBER_USER_SELECT: &str = r#"
    SELECT b.id, b.user_id, b.specialty, b.experience, b.rating, b.review_count, b.is_available,
           u.first_name, u.last_name, u.email, u.password, u.role, u.profile_image_url,
           u.created_at AS user_created_at
    FROM barbers b
    JOIN users u ON u.id = b.user_id
"#;

#[derive(sqlx::FromRow)]
struct BarberUserRow {
    id: i64,
    user_id: i64,
    specialty: Option<String>,
    experience: Option<i64>,
    rating: String,
    review_count: i64,
    is_available: bool,
    first_name: String,
    last_name: String,
    email: String,
    password: String,
    role: String,
    profile_image_url: Option<String>,
    user_created_at: DateTime<Utc>,
}

impl From<BarberUserRow> for BarberWithUser {
    fn from(row: BarberUserRow) -> Self {
        BarberWithUser {
            barber: Barber {
                id: row.id,
                user_id: row.user_id,
                specialty: row.specialty,
                experience: row.experience,
                rating: row.rating,
                review_count: row.review_count,
                is_available: row.is_available,
            },
            user: User {
                id: row.user_id,
                first_name: row.first_name,
                last_name: row.last_name,
                email: row.email,
                password: row.password,
                role: row.role,
                profile_image_url: row.profile_image_url,
                created_at: row.user_created_at,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use sqlx::sqlite::SqlitePoolOptions;

    use crate::models::{ROLE_BARBER, STATUS_COMPLETED};

    use super::*;

    async fn store() -> SqliteStorage {
        // A pool wider than one connection would hand each connection its
        // own private in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::MIGRATOR.run(&pool).await.unwrap();

        sqlx::query(
            r#"INSERT INTO users (first_name, last_name, email, password, role, created_at)
               VALUES ('John', 'Doe', 'john@x.com', 'hash', 'customer', ?),
                      ('Mike', 'Johnson', 'mike@x.com', 'hash', ?, ?)"#,
        )
        .bind(Utc::now())
        .bind(ROLE_BARBER)
        .bind(Utc::now())
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO barbers (user_id, specialty, experience) VALUES (2, 'Classic cuts', 5)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            r#"INSERT INTO services (name, description, price, duration, category)
               VALUES ('Classic Cut', 'Traditional haircut', '25.00', 30, 'haircuts')"#,
        )
        .execute(&pool)
        .await
        .unwrap();

        SqliteStorage::new(pool)
    }

    fn booking(date: &str) -> NewAppointment {
        NewAppointment {
            customer_id: 1,
            barber_id: 1,
            service_id: 1,
            appointment_date: date.parse().unwrap(),
            status: None,
            notes: None,
            total_price: "25.00".to_string(),
        }
    }

    #[actix_web::test]
    async fn review_insert_recomputes_rating() {
        let store = store().await;
        for rating in [5, 3] {
            store
                .create_review(NewReview {
                    appointment_id: 1,
                    customer_id: 1,
                    barber_id: 1,
                    rating,
                    comment: None,
                })
                .await
                .unwrap();
        }
        let barber = store.get_barber(1).await.unwrap().unwrap();
        assert_eq!(barber.barber.rating, "4.0");
        assert_eq!(barber.barber.review_count, 2);
    }

    #[actix_web::test]
    async fn appointment_listings_join_and_sort() {
        let store = store().await;
        for date in ["2025-03-01T10:00:00Z", "2025-01-10T14:00:00Z"] {
            store.create_appointment(booking(date)).await.unwrap();
        }

        let mine = store.user_appointments(1).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine[0].appointment.appointment_date > mine[1].appointment.appointment_date);
        assert_eq!(mine[0].customer.first_name, "John");
        assert_eq!(mine[0].barber.user.first_name, "Mike");
        assert_eq!(mine[0].service.name, "Classic Cut");

        let theirs = store.barber_appointments(1, None).await.unwrap();
        assert!(theirs[0].appointment.appointment_date < theirs[1].appointment.appointment_date);
    }

    #[actix_web::test]
    async fn date_filter_is_a_utc_day_window() {
        let store = store().await;
        for date in [
            "2025-01-10T00:00:00Z",
            "2025-01-10T23:30:00Z",
            "2025-01-11T00:00:00Z",
        ] {
            store.create_appointment(booking(date)).await.unwrap();
        }
        let day = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap().date_naive();
        let appointments = store.barber_appointments(1, Some(day)).await.unwrap();
        assert_eq!(appointments.len(), 2);
    }

    #[actix_web::test]
    async fn dangling_references_are_accepted() {
        // Parity with the in-memory backend: writes never verify that the
        // referenced rows exist; joined reads omit unresolvable records.
        let store = store().await;
        let review = store
            .create_review(NewReview {
                appointment_id: 42,
                customer_id: 1,
                barber_id: 1,
                rating: 4,
                comment: None,
            })
            .await
            .unwrap();
        assert_eq!(review.appointment_id, 42);

        let appointment = store
            .create_appointment(NewAppointment {
                customer_id: 99,
                barber_id: 1,
                service_id: 1,
                appointment_date: "2025-01-10T14:00:00Z".parse().unwrap(),
                status: None,
                notes: None,
                total_price: "25.00".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(appointment.customer_id, 99);
        assert!(store.user_appointments(99).await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn duplicate_email_maps_to_conflict() {
        let store = store().await;
        let result = store
            .create_user(NewUser {
                first_name: "Jane".to_string(),
                last_name: "Doe".to_string(),
                email: "john@x.com".to_string(),
                password: "hash2".to_string(),
                role: None,
                profile_image_url: None,
            })
            .await;
        assert!(matches!(result, Err(StorageError::DuplicateEmail)));
    }

    #[actix_web::test]
    async fn status_update_overwrites_without_guard() {
        let store = store().await;
        store.create_appointment(booking("2025-01-10T14:00:00Z")).await.unwrap();
        store.update_appointment_status(1, STATUS_COMPLETED).await.unwrap();
        let reverted = store
            .update_appointment_status(1, STATUS_SCHEDULED)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reverted.status, STATUS_SCHEDULED);

        assert!(store
            .update_appointment_status(42, STATUS_COMPLETED)
            .await
            .unwrap()
            .is_none());
    }
}
