use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use crate::auth::hash_password;
use crate::models::{
    Appointment, AppointmentWithDetails, Barber, BarberWithUser, NewAppointment, NewReview,
    NewUser, Review, ReviewWithDetails, Service, User, ROLE_BARBER, ROLE_CUSTOMER,
    STATUS_SCHEDULED,
};

use super::{average_rating, Storage, StorageError};

/// Process-local backend backed by maps behind a single mutex. One guard
/// covers every operation, so the review insert and the rating recompute are
/// atomic with respect to each other.
pub struct MemStorage {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<i64, User>,
    services: HashMap<i64, Service>,
    barbers: HashMap<i64, Barber>,
    appointments: HashMap<i64, Appointment>,
    reviews: HashMap<i64, Review>,
    next_user_id: i64,
    next_service_id: i64,
    next_barber_id: i64,
    next_appointment_id: i64,
    next_review_id: i64,
}

impl Inner {
    fn new() -> Self {
        Self {
            next_user_id: 1,
            next_service_id: 1,
            next_barber_id: 1,
            next_appointment_id: 1,
            next_review_id: 1,
            ..Self::default()
        }
    }

    fn barber_with_user(&self, id: i64) -> Option<BarberWithUser> {
        let barber = self.barbers.get(&id)?;
        let user = self.users.get(&barber.user_id)?;
        Some(BarberWithUser {
            barber: barber.clone(),
            user: user.clone(),
        })
    }

    fn appointment_details(&self, appointment: &Appointment) -> Option<AppointmentWithDetails> {
        let customer = self.users.get(&appointment.customer_id)?;
        let barber = self.barber_with_user(appointment.barber_id)?;
        let service = self.services.get(&appointment.service_id)?;
        Some(AppointmentWithDetails {
            appointment: appointment.clone(),
            customer: customer.clone(),
            barber,
            service: service.clone(),
        })
    }
}

impl MemStorage {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::new()),
        }
    }

    /// Empty store preloaded with the demo catalog: three barbers with
    /// linked users, six services, and one demo customer.
    pub fn with_demo_data() -> Result<Self, argon2::password_hash::Error> {
        let store = Self::new();
        let password = hash_password("password123")?;
        {
            let mut inner = store.inner.lock().expect("storage mutex poisoned");
            inner.insert_user(
                "John",
                "Doe",
                "john@example.com",
                &password,
                ROLE_CUSTOMER,
                Some("https://images.unsplash.com/photo-1507003211169-0a1dd7228f2d"),
            );
            let mike = inner.insert_user(
                "Mike",
                "Johnson",
                "mike@barberpro.com",
                &password,
                ROLE_BARBER,
                Some("https://images.unsplash.com/photo-1472099645785-5658abf4ff4e"),
            );
            let alex = inner.insert_user(
                "Alex",
                "Thompson",
                "alex@barberpro.com",
                &password,
                ROLE_BARBER,
                Some("https://images.unsplash.com/photo-1438761681033-6461ffad8d80"),
            );
            let david = inner.insert_user(
                "David",
                "Rodriguez",
                "david@barberpro.com",
                &password,
                ROLE_BARBER,
                Some("https://images.unsplash.com/photo-1507003211169-0a1dd7228f2d"),
            );
            inner.insert_barber(mike, Some("Classic cuts and beard styling"), Some(5));
            inner.insert_barber(alex, Some("Modern styling and color"), Some(3));
            inner.insert_barber(david, Some("Traditional techniques and hot shaves"), Some(8));
            for entry in crate::db::SERVICE_CATALOG {
                inner.insert_service(
                    entry.name,
                    entry.description,
                    entry.price,
                    entry.duration,
                    entry.category,
                    Some(entry.image_url),
                );
            }
        }
        Ok(store)
    }
}

impl Default for MemStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn insert_user(
        &mut self,
        first_name: &str,
        last_name: &str,
        email: &str,
        password_hash: &str,
        role: &str,
        profile_image_url: Option<&str>,
    ) -> i64 {
        let id = self.next_user_id;
        self.next_user_id += 1;
        self.users.insert(
            id,
            User {
                id,
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                email: email.to_string(),
                password: password_hash.to_string(),
                role: role.to_string(),
                profile_image_url: profile_image_url.map(str::to_string),
                created_at: Utc::now(),
            },
        );
        id
    }

    fn insert_barber(&mut self, user_id: i64, specialty: Option<&str>, experience: Option<i64>) -> i64 {
        let id = self.next_barber_id;
        self.next_barber_id += 1;
        self.barbers.insert(
            id,
            Barber {
                id,
                user_id,
                specialty: specialty.map(str::to_string),
                experience,
                rating: "0.0".to_string(),
                review_count: 0,
                is_available: true,
            },
        );
        id
    }

    fn insert_service(
        &mut self,
        name: &str,
        description: &str,
        price: &str,
        duration: i64,
        category: &str,
        image_url: Option<&str>,
    ) -> i64 {
        let id = self.next_service_id;
        self.next_service_id += 1;
        self.services.insert(
            id,
            Service {
                id,
                name: name.to_string(),
                description: description.to_string(),
                price: price.to_string(),
                duration,
                category: category.to_string(),
                image_url: image_url.map(str::to_string),
                is_active: true,
            },
        );
        id
    }
}

#[async_trait]
impl Storage for MemStorage {
    async fn get_user(&self, id: i64) -> Result<Option<User>, StorageError> {
        let inner = self.inner.lock().expect("storage mutex poisoned");
        Ok(inner.users.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let inner = self.inner.lock().expect("storage mutex poisoned");
        Ok(inner.users.values().find(|user| user.email == email).cloned())
    }

    async fn create_user(&self, input: NewUser) -> Result<User, StorageError> {
        let mut inner = self.inner.lock().expect("storage mutex poisoned");
        if inner.users.values().any(|user| user.email == input.email) {
            return Err(StorageError::DuplicateEmail);
        }
        let id = inner.next_user_id;
        inner.next_user_id += 1;
        let user = User {
            id,
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
            password: input.password,
            role: input.role.unwrap_or_else(|| ROLE_CUSTOMER.to_string()),
            profile_image_url: input.profile_image_url,
            created_at: Utc::now(),
        };
        inner.users.insert(id, user.clone());
        Ok(user)
    }

    async fn all_services(&self) -> Result<Vec<Service>, StorageError> {
        let inner = self.inner.lock().expect("storage mutex poisoned");
        let mut services: Vec<Service> = inner
            .services
            .values()
            .filter(|service| service.is_active)
            .cloned()
            .collect();
        services.sort_by_key(|service| service.id);
        Ok(services)
    }

    async fn services_by_category(&self, category: &str) -> Result<Vec<Service>, StorageError> {
        let inner = self.inner.lock().expect("storage mutex poisoned");
        let mut services: Vec<Service> = inner
            .services
            .values()
            .filter(|service| service.is_active && service.category == category)
            .cloned()
            .collect();
        services.sort_by_key(|service| service.id);
        Ok(services)
    }

    async fn get_service(&self, id: i64) -> Result<Option<Service>, StorageError> {
        let inner = self.inner.lock().expect("storage mutex poisoned");
        Ok(inner.services.get(&id).cloned())
    }

    async fn all_barbers(&self) -> Result<Vec<BarberWithUser>, StorageError> {
        let inner = self.inner.lock().expect("storage mutex poisoned");
        let mut barbers: Vec<BarberWithUser> = inner
            .barbers
            .values()
            .filter(|barber| barber.is_available)
            .filter_map(|barber| inner.barber_with_user(barber.id))
            .collect();
        barbers.sort_by_key(|entry| entry.barber.id);
        Ok(barbers)
    }

    async fn get_barber(&self, id: i64) -> Result<Option<BarberWithUser>, StorageError> {
        let inner = self.inner.lock().expect("storage mutex poisoned");
        Ok(inner.barber_with_user(id))
    }

    async fn create_appointment(
        &self,
        input: NewAppointment,
    ) -> Result<Appointment, StorageError> {
        let mut inner = self.inner.lock().expect("storage mutex poisoned");
        let id = inner.next_appointment_id;
        inner.next_appointment_id += 1;
        let appointment = Appointment {
            id,
            customer_id: input.customer_id,
            barber_id: input.barber_id,
            service_id: input.service_id,
            appointment_date: input.appointment_date,
            status: input.status.unwrap_or_else(|| STATUS_SCHEDULED.to_string()),
            notes: input.notes,
            total_price: input.total_price,
            created_at: Utc::now(),
        };
        inner.appointments.insert(id, appointment.clone());
        Ok(appointment)
    }

    async fn get_appointment(&self, id: i64) -> Result<Option<Appointment>, StorageError> {
        let inner = self.inner.lock().expect("storage mutex poisoned");
        Ok(inner.appointments.get(&id).cloned())
    }

    async fn user_appointments(
        &self,
        user_id: i64,
    ) -> Result<Vec<AppointmentWithDetails>, StorageError> {
        let inner = self.inner.lock().expect("storage mutex poisoned");
        let mut appointments: Vec<AppointmentWithDetails> = inner
            .appointments
            .values()
            .filter(|appointment| appointment.customer_id == user_id)
            .filter_map(|appointment| inner.appointment_details(appointment))
            .collect();
        appointments.sort_by(|a, b| {
            b.appointment
                .appointment_date
                .cmp(&a.appointment.appointment_date)
        });
        Ok(appointments)
    }

    async fn barber_appointments(
        &self,
        barber_id: i64,
        date: Option<NaiveDate>,
    ) -> Result<Vec<AppointmentWithDetails>, StorageError> {
        let inner = self.inner.lock().expect("storage mutex poisoned");
        let mut appointments: Vec<AppointmentWithDetails> = inner
            .appointments
            .values()
            .filter(|appointment| appointment.barber_id == barber_id)
            .filter(|appointment| match date {
                Some(day) => appointment.appointment_date.date_naive() == day,
                None => true,
            })
            .filter_map(|appointment| inner.appointment_details(appointment))
            .collect();
        appointments.sort_by(|a, b| {
            a.appointment
                .appointment_date
                .cmp(&b.appointment.appointment_date)
        });
        Ok(appointments)
    }

    async fn update_appointment_status(
        &self,
        id: i64,
        status: &str,
    ) -> Result<Option<Appointment>, StorageError> {
        let mut inner = self.inner.lock().expect("storage mutex poisoned");
        match inner.appointments.get_mut(&id) {
            Some(appointment) => {
                appointment.status = status.to_string();
                Ok(Some(appointment.clone()))
            }
            None => Ok(None),
        }
    }

    async fn create_review(&self, input: NewReview) -> Result<Review, StorageError> {
        let mut inner = self.inner.lock().expect("storage mutex poisoned");
        let id = inner.next_review_id;
        inner.next_review_id += 1;
        let review = Review {
            id,
            appointment_id: input.appointment_id,
            customer_id: input.customer_id,
            barber_id: input.barber_id,
            rating: input.rating,
            comment: input.comment,
            created_at: Utc::now(),
        };
        inner.reviews.insert(id, review.clone());

        let ratings: Vec<i64> = inner
            .reviews
            .values()
            .filter(|entry| entry.barber_id == review.barber_id)
            .map(|entry| entry.rating)
            .collect();
        if let Some(barber) = inner.barbers.get_mut(&review.barber_id) {
            barber.rating = average_rating(&ratings);
            barber.review_count = ratings.len() as i64;
        }

        Ok(review)
    }

    async fn barber_reviews(
        &self,
        barber_id: i64,
    ) -> Result<Vec<ReviewWithDetails>, StorageError> {
        let inner = self.inner.lock().expect("storage mutex poisoned");
        let mut reviews: Vec<ReviewWithDetails> = inner
            .reviews
            .values()
            .filter(|review| review.barber_id == barber_id)
            .filter_map(|review| {
                let customer = inner.users.get(&review.customer_id)?;
                let barber = inner.barber_with_user(review.barber_id)?;
                Some(ReviewWithDetails {
                    review: review.clone(),
                    customer: customer.clone(),
                    barber,
                })
            })
            .collect();
        reviews.sort_by(|a, b| {
            b.review
                .created_at
                .cmp(&a.review.created_at)
                .then(b.review.id.cmp(&a.review.id))
        });
        Ok(reviews)
    }
}
