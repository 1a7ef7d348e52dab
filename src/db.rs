use std::{env, fs, path::Path};

use chrono::Utc;
use sqlx::SqlitePool;

use crate::auth::hash_password;
use crate::models::{ROLE_ADMIN, ROLE_BARBER, ROLE_CUSTOMER};

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}

pub fn ensure_sqlite_dir(db_url: &str) -> std::io::Result<()> {
    let path = if let Some(path) = db_url.strip_prefix("sqlite://") {
        Some(path)
    } else if let Some(path) = db_url.strip_prefix("sqlite:") {
        Some(path)
    } else {
        None
    };

    let Some(path) = path else {
        return Ok(());
    };

    let path = path.split('?').next().unwrap_or(path);
    if path == ":memory:" || path.is_empty() {
        return Ok(());
    }

    let path = path.strip_prefix("file:").unwrap_or(path);
    let db_path = Path::new(path);
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub struct SeedService {
    pub name: &'static str,
    pub description: &'static str,
    pub price: &'static str,
    pub duration: i64,
    pub category: &'static str,
    pub image_url: &'static str,
}

pub const SERVICE_CATALOG: &[SeedService] = &[
    SeedService {
        name: "Classic Cut",
        description: "Traditional haircut with precision and style. Includes wash and basic styling.",
        price: "25.00",
        duration: 30,
        category: "haircuts",
        image_url: "https://images.unsplash.com/photo-1503951914875-452162b0f3f1",
    },
    SeedService {
        name: "Beard Trim",
        description: "Expert beard trimming and shaping. Includes hot towel treatment and beard oil.",
        price: "20.00",
        duration: 25,
        category: "beard-care",
        image_url: "https://images.unsplash.com/photo-1621605815971-fbc98d665033",
    },
    SeedService {
        name: "Deluxe Package",
        description: "Complete grooming experience. Cut, beard trim, wash, style, and hot towel treatment.",
        price: "65.00",
        duration: 75,
        category: "packages",
        image_url: "https://images.unsplash.com/photo-1585747860715-2ba37e788b70",
    },
    SeedService {
        name: "Wash & Style",
        description: "Premium hair wash with scalp massage and professional styling.",
        price: "15.00",
        duration: 20,
        category: "styling",
        image_url: "https://images.unsplash.com/photo-1599351431202-1e0f0137899a",
    },
    SeedService {
        name: "Hot Towel Shave",
        description: "Traditional straight razor shave with hot towel preparation and aftercare.",
        price: "35.00",
        duration: 40,
        category: "styling",
        image_url: "https://images.unsplash.com/photo-1622296089863-eb7fc530daa8",
    },
    SeedService {
        name: "Hair Styling",
        description: "Professional styling for special occasions. Includes consultation and premium products.",
        price: "30.00",
        duration: 45,
        category: "styling",
        image_url: "https://images.unsplash.com/photo-1493256338651-d82f7acb2b38",
    },
];

const BARBER_SEED: &[(&str, &str, &str, &str, i64)] = &[
    (
        "Mike",
        "Johnson",
        "mike@barberpro.com",
        "Classic cuts and beard styling",
        5,
    ),
    (
        "Alex",
        "Thompson",
        "alex@barberpro.com",
        "Modern styling and color",
        3,
    ),
    (
        "David",
        "Rodriguez",
        "david@barberpro.com",
        "Traditional techniques and hot shaves",
        8,
    ),
];

pub async fn seed_defaults(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    seed_admin(pool).await?;
    seed_services(pool).await?;
    seed_barbers(pool).await?;
    seed_demo_customer(pool).await?;
    Ok(())
}

async fn seed_admin(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let existing = sqlx::query_as::<_, (i64,)>("SELECT id FROM users WHERE role = ? LIMIT 1")
        .bind(ROLE_ADMIN)
        .fetch_optional(pool)
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    let email = env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@barberpro.com".to_string());
    let password = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin".to_string());

    if password == "admin" {
        log::warn!("ADMIN_PASSWORD not set. Using default password 'admin'. Set ADMIN_PASSWORD in production.");
    }

    let password_hash = hash_password(&password)
        .map_err(|_| sqlx::Error::Protocol("password hash failed".into()))?;

    sqlx::query(
        r#"INSERT INTO users (first_name, last_name, email, password, role, created_at)
           VALUES ('Admin', 'User', ?, ?, ?, ?)"#,
    )
    .bind(email)
    .bind(password_hash)
    .bind(ROLE_ADMIN)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

async fn seed_services(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM services")
        .fetch_one(pool)
        .await?;
    if count > 0 {
        return Ok(());
    }

    for service in SERVICE_CATALOG {
        sqlx::query(
            r#"INSERT INTO services (name, description, price, duration, category, image_url, is_active)
               VALUES (?, ?, ?, ?, ?, ?, 1)"#,
        )
        .bind(service.name)
        .bind(service.description)
        .bind(service.price)
        .bind(service.duration)
        .bind(service.category)
        .bind(service.image_url)
        .execute(pool)
        .await?;
    }

    Ok(())
}

async fn seed_barbers(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM barbers")
        .fetch_one(pool)
        .await?;
    if count > 0 {
        return Ok(());
    }

    let password_hash = hash_password("password123")
        .map_err(|_| sqlx::Error::Protocol("password hash failed".into()))?;

    for (first_name, last_name, email, specialty, experience) in BARBER_SEED {
        let result = sqlx::query(
            r#"INSERT INTO users (first_name, last_name, email, password, role, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(first_name)
        .bind(last_name)
        .bind(email)
        .bind(&password_hash)
        .bind(ROLE_BARBER)
        .bind(Utc::now())
        .execute(pool)
        .await?;

        sqlx::query(
            r#"INSERT INTO barbers (user_id, specialty, experience, is_available)
               VALUES (?, ?, ?, 1)"#,
        )
        .bind(result.last_insert_rowid())
        .bind(specialty)
        .bind(experience)
        .execute(pool)
        .await?;
    }

    Ok(())
}

async fn seed_demo_customer(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let existing =
        sqlx::query_as::<_, (i64,)>("SELECT id FROM users WHERE email = 'john@example.com' LIMIT 1")
            .fetch_optional(pool)
            .await?;
    if existing.is_some() {
        return Ok(());
    }

    let password_hash = hash_password("password123")
        .map_err(|_| sqlx::Error::Protocol("password hash failed".into()))?;

    sqlx::query(
        r#"INSERT INTO users (first_name, last_name, email, password, role, created_at)
           VALUES ('John', 'Doe', 'john@example.com', ?, ?, ?)"#,
    )
    .bind(password_hash)
    .bind(ROLE_CUSTOMER)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}
