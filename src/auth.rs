use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, RequestParts};
use axum::headers::authorization::Bearer;
use axum::headers::Authorization;
use axum::{async_trait, Extension, Json, TypedHeader};
use chrono::Utc;
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::err::{Error, FieldErrors};
use crate::models::{AccessToken, StudentData};
use crate::validate::{Numeric, Text, Validator};
use crate::{breaks, created, proceeds, Payload};

const AVATAR_BASE: &str = "https://api.dicebear.com/7.x/avataaars/svg?seed=";
const BAD_CREDENTIALS: &str = "Les identifiants fournis sont incorrects.";

/// The student bound to the bearer token of the current request.
#[derive(Debug, Clone)]
pub struct AuthenticatedStudent {
    pub student: StudentData,
    pub token_id: i64,
}

#[async_trait]
impl<B> FromRequest<B> for AuthenticatedStudent
where
    B: Send,
{
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request(req)
                .await
                .map_err(|_| Error::unauthenticated())?;
        let Extension(pool) = Extension::<SqlitePool>::from_request(req)
            .await
            .map_err(|err| Error::InternalError {
                kind: "MissingExtension",
                message: err.to_string(),
            })?;

        ensure_authenticated(bearer.token(), &pool)
            .await?
            .ok_or_else(Error::unauthenticated)
    }
}

/// Resolves a plain bearer token. Expired tokens are deleted on sight.
pub async fn ensure_authenticated(
    token: &str,
    pool: &SqlitePool,
) -> Result<Option<AuthenticatedStudent>, Error> {
    if token.is_empty() {
        return Ok(None);
    }

    let session = sqlx::query_as::<_, AccessToken>(
        "SELECT * FROM access_tokens WHERE token_hash = ? LIMIT 1",
    )
    .bind(token_digest(token))
    .fetch_optional(pool)
    .await?;

    let session = match session {
        Some(session) => session,
        None => return Ok(None),
    };

    if Utc::now() >= session.expires_at {
        sqlx::query("DELETE FROM access_tokens WHERE id = ?")
            .bind(session.id)
            .execute(pool)
            .await?;
        return Ok(None);
    }

    let student = sqlx::query_as::<_, StudentData>("SELECT * FROM etudiants WHERE id = ? LIMIT 1")
        .bind(session.etudiant_id)
        .fetch_optional(pool)
        .await?;

    Ok(student.map(|student| AuthenticatedStudent {
        student,
        token_id: session.id,
    }))
}

/// Issues a new token for `student_id`; only its digest is stored.
pub async fn issue_token(pool: &SqlitePool, student_id: i64, config: &Config) -> Result<String, Error> {
    let ssid_bytes: [u8; 32] = thread_rng().gen();

    let mut hasher: Sha256 = Digest::new();
    hasher.update(ssid_bytes);
    let token = hex::encode(hasher.finalize());

    let now = Utc::now();
    let expires_at = now
        .checked_add_signed(config.token_ttl)
        .ok_or_else(|| Error::InternalError {
            kind: "TokenError",
            message: "Token lifetime is out of range!".to_string(),
        })?;
    let res = sqlx::query(
        "INSERT INTO access_tokens (etudiant_id, token_hash, created_at, expires_at) VALUES (?, ?, ?, ?)",
    )
    .bind(student_id)
    .bind(token_digest(&token))
    .bind(now)
    .bind(expires_at)
    .execute(pool)
    .await?;

    if res.rows_affected() < 1 {
        return Err(Error::InternalError {
            kind: "DatabaseError",
            message: "Could not store access token!".to_string(),
        });
    }
    Ok(token)
}

pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

pub fn hash_password(password: &str) -> Result<String, Error> {
    Ok(Pbkdf2
        .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))?
        .to_string())
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, Error> {
    let hash = PasswordHash::new(hash)?;
    Ok(Pbkdf2.verify_password(password.as_bytes(), &hash).is_ok())
}

fn avatar_url() -> String {
    let seed: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    format!("{}{}", AVATAR_BASE, seed)
}

pub async fn register_student(
    Extension(pool): Extension<SqlitePool>,
    Extension(config): Extension<Arc<Config>>,
    payload: Result<Json<RegisterStudent>, JsonRejection>,
) -> Payload<IssuedToken<RegisteredStudent>> {
    let Json(body) = payload?;

    let mut v = Validator::new();
    let name = v.string("name", body.name.as_ref(), 255);
    let email = v.email("email", body.email.as_ref(), 255);
    if let Some(email) = email {
        let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM etudiants WHERE email = ?")
            .bind(email)
            .fetch_one(&pool)
            .await?;
        v.unique("email", taken > 0);
    }
    let password = v.required("password", body.password.as_ref());
    if let Some(password) = password {
        v.min_chars("password", password, 8);
        v.confirmed(
            "password",
            password,
            body.password_confirmation.as_ref().and_then(Text::as_str),
        );
    }
    let latitude = v.number_between("latitude", body.latitude.as_ref(), -90.0, 90.0);
    let longitude = v.number_between("longitude", body.longitude.as_ref(), -180.0, 180.0);
    v.finish().map_err(Error::unprocessable)?;

    // every field is present once the validator passed
    let (Some(name), Some(email), Some(password), Some(latitude), Some(longitude)) =
        (name, email, password, latitude, longitude)
    else {
        return breaks(Error::unprocessable(Default::default()));
    };

    let now = Utc::now();
    let res = sqlx::query(
        "INSERT INTO etudiants (nom, email, login, password, note1, note2, moyenne, latitude, longitude, created_at, updated_at) \
         VALUES (?, ?, ?, ?, 0, 0, 0, ?, ?, ?, ?)",
    )
    .bind(name)
    .bind(email)
    .bind(email)
    .bind(hash_password(password)?)
    .bind(latitude)
    .bind(longitude)
    .bind(now)
    .bind(now)
    .execute(&pool)
    .await?;

    let student_id = res.last_insert_rowid();
    let token = issue_token(&pool, student_id, &config).await?;
    log::info!("Registered student #{} <{}>", student_id, email);

    created(IssuedToken {
        user: RegisteredStudent {
            id: student_id,
            name: name.to_string(),
            email: email.to_string(),
            avatar: avatar_url(),
            latitude,
            longitude,
        },
        token,
    })
}

pub async fn login_student(
    Extension(pool): Extension<SqlitePool>,
    Extension(config): Extension<Arc<Config>>,
    payload: Result<Json<LoginStudent>, JsonRejection>,
) -> Payload<IssuedToken<LoggedInStudent>> {
    let Json(login) = payload?;

    let mut v = Validator::new();
    let email = v.email("email", login.email.as_ref(), 255);
    let password = v.required("password", login.password.as_ref());
    v.finish().map_err(Error::unprocessable)?;
    let (Some(email), Some(password)) = (email, password) else {
        return breaks(Error::unprocessable(Default::default()));
    };

    let student = sqlx::query_as::<_, StudentData>("SELECT * FROM etudiants WHERE email = ? LIMIT 1")
        .bind(email)
        .fetch_optional(&pool)
        .await?;

    let student = match student {
        Some(student) => student,
        None => return breaks(bad_credentials(email)),
    };
    let matches = match &student.password {
        Some(hash) => verify_password(password, hash)?,
        None => false,
    };
    if !matches {
        return breaks(bad_credentials(email));
    }

    // one active session per student
    sqlx::query("DELETE FROM access_tokens WHERE etudiant_id = ?")
        .bind(student.id)
        .execute(&pool)
        .await?;
    let token = issue_token(&pool, student.id, &config).await?;
    log::info!("Student #{} logged in", student.id);

    proceeds(IssuedToken {
        user: LoggedInStudent::from(student),
        token,
    })
}

fn bad_credentials(email: &str) -> Error {
    log::warn!("Rejected credentials for <{}>", email);
    let mut errors = FieldErrors::new();
    errors.insert("email".to_string(), vec![BAD_CREDENTIALS.to_string()]);
    Error::unprocessable(errors)
}

pub async fn drop_session(
    AuthenticatedStudent { student, token_id }: AuthenticatedStudent,
    Extension(pool): Extension<SqlitePool>,
) -> Payload<SessionDropped> {
    sqlx::query("DELETE FROM access_tokens WHERE id = ?")
        .bind(token_id)
        .execute(&pool)
        .await
        .map_err(|err| Error::InternalError {
            kind: "LogoutError",
            message: format!("Erreur lors de la déconnexion: {}", err),
        })?;
    log::info!("Student #{} logged out", student.id);

    proceeds(SessionDropped {
        message: "Déconnexion réussie",
    })
}

pub async fn current_student(
    AuthenticatedStudent { student, .. }: AuthenticatedStudent,
) -> Payload<StudentProfile> {
    proceeds(StudentProfile::from(student))
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterStudent {
    pub name: Option<Text>,
    pub email: Option<Text>,
    pub password: Option<Text>,
    pub password_confirmation: Option<Text>,
    pub latitude: Option<Numeric>,
    pub longitude: Option<Numeric>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginStudent {
    pub email: Option<Text>,
    pub password: Option<Text>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken<U> {
    pub user: U,
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisteredStudent {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub avatar: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggedInStudent {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub login: String,
    pub note1: Option<f64>,
    pub note2: Option<f64>,
    pub moyenne: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl From<StudentData> for LoggedInStudent {
    fn from(student: StudentData) -> Self {
        Self {
            id: student.id,
            name: student.nom,
            email: student.email,
            login: student.login,
            note1: student.note1,
            note2: student.note2,
            moyenne: student.moyenne,
            latitude: student.latitude,
            longitude: student.longitude,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentProfile {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub login: String,
    pub note1: Option<f64>,
    pub note2: Option<f64>,
    pub moyenne: Option<f64>,
}

impl From<StudentData> for StudentProfile {
    fn from(student: StudentData) -> Self {
        Self {
            id: student.id,
            name: student.nom,
            email: student.email,
            login: student.login,
            note1: student.note1,
            note2: student.note2,
            moyenne: student.moyenne,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionDropped {
    pub message: &'static str,
}
