use actix_web::{dev::ServiceRequest, error::ErrorUnauthorized, web, Error, HttpMessage};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};

use crate::{models::User, state::AppState};

pub const TOKEN_TTL_DAYS: i64 = 7;

/// Authenticated caller, decoded from the bearer token and inserted into
/// request extensions by the validator.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub email: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

pub fn issue_token(user: &User, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        role: user.role.clone(),
        iat: now.timestamp(),
        exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

pub async fn bearer_validator(
    req: ServiceRequest,
    credentials: BearerAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    let Some(state) = req.app_data::<web::Data<AppState>>() else {
        return Err((ErrorUnauthorized("Unauthorized"), req));
    };
    match decode_token(credentials.token(), &state.jwt_secret) {
        Ok(claims) => {
            req.extensions_mut().insert(AuthUser {
                id: claims.sub,
                email: claims.email,
                role: claims.role,
            });
            Ok(req)
        }
        Err(_) => Err((ErrorUnauthorized("Invalid token"), req)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 7,
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            email: "john@x.com".to_string(),
            password: String::new(),
            role: "customer".to_string(),
            profile_image_url: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("secret1").unwrap();
        assert!(verify_password("secret1", &hash));
        assert!(!verify_password("secret2", &hash));
        assert!(!verify_password("secret1", "not-a-phc-string"));
    }

    #[test]
    fn token_round_trip_carries_identity() {
        let token = issue_token(&user(), "test-secret").unwrap();
        let claims = decode_token(&token, "test-secret").unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.email, "john@x.com");
        assert_eq!(claims.role, "customer");
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_DAYS * 24 * 60 * 60);
    }

    #[test]
    fn token_rejects_wrong_secret() {
        let token = issue_token(&user(), "test-secret").unwrap();
        assert!(decode_token(&token, "other-secret").is_err());
    }
}
