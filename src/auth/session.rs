use actix_web::cookie::{time, Cookie, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::error::AppError;

pub const SESSION_COOKIE: &str = "session";

/// Who a request is acting as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    Authenticated { username: String },
}

impl Identity {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::Authenticated { .. })
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Identity::Anonymous => None,
            Identity::Authenticated { username } => Some(username),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Username
    pub exp: i64,
    pub iat: i64,
}

/// Issues and checks the signed token stored in the session cookie.
pub struct SessionManager {
    secret: String,
    ttl_hours: i64,
    secure_cookie: bool,
}

impl SessionManager {
    pub fn new(secret: String, ttl_hours: i64, secure_cookie: bool) -> Self {
        Self {
            secret,
            ttl_hours,
            secure_cookie,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.session_secret.clone(),
            config.session_ttl_hours,
            config.cookie_secure,
        )
    }

    /// Token for an authenticated identity; anonymous identities get none.
    pub fn issue(&self, identity: &Identity) -> Result<Option<String>, AppError> {
        let Identity::Authenticated { username } = identity else {
            return Ok(None);
        };

        let now = Utc::now();
        let claims = Claims {
            sub: username.clone(),
            exp: (now + Duration::hours(self.ttl_hours)).timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;

        Ok(Some(token))
    }

    /// Identity carried by a token. Expired, tampered or malformed tokens are errors.
    pub fn resolve(&self, token: &str) -> Result<Identity, AppError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )?;

        Ok(Identity::Authenticated {
            username: data.claims.sub,
        })
    }

    pub fn login_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build(SESSION_COOKIE, token)
            .path("/")
            .http_only(true)
            .secure(self.secure_cookie)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::hours(self.ttl_hours))
            .finish()
    }

    /// Cookie that makes the browser drop its session. Revocation is
    /// client-side only: a token copied earlier stays valid until `exp`.
    pub fn logout_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build(SESSION_COOKIE, "")
            .path("/")
            .http_only(true)
            .secure(self.secure_cookie)
            .same_site(SameSite::Lax)
            .finish();
        cookie.make_removal();
        cookie
    }
}
