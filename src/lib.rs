pub mod auth;
pub mod config;
pub mod db;
pub mod err;
pub mod images;
pub mod models;
pub mod quiz;
pub mod students;
pub mod validate;

use std::sync::Arc;

use axum::handler::Handler;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Router};
use serde::Serialize;
use sqlx::SqlitePool;
use tower::ServiceBuilder;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

use crate::config::Config;
use crate::err::{Error, Reply};

pub type Payload<T> = Result<Reply<T>, Error>;

pub fn proceeds<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok(Reply::new(StatusCode::OK, value))
}

pub fn created<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok(Reply::new(StatusCode::CREATED, value))
}

pub fn breaks<V>(err: Error) -> Payload<V>
where
    V: Serialize,
{
    Err(err)
}

/// Any origin is mirrored back so browsers accept credentialed requests.
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|_, _| true))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn app(pool: SqlitePool, config: Arc<Config>) -> Router {
    Router::new()
        .route("/api/register", post(auth::register_student))
        .route("/api/login", post(auth::login_student))
        .route("/api/logout", post(auth::drop_session))
        .route("/api/user", get(auth::current_student))
        .route(
            "/api/students",
            get(students::list_students).post(students::create_student),
        )
        .route("/api/students/update-location", post(students::update_location))
        .route(
            "/api/images",
            get(images::list_images).post(images::store_image),
        )
        .route(
            "/api/images/:id",
            get(images::show_image).delete(images::destroy_image),
        )
        .route("/api/images/:id/serve", get(images::serve_image))
        .route("/api/quiz-results", post(quiz::submit_result))
        .fallback(err::handler404.into_service())
        .layer(
            ServiceBuilder::new()
                .layer(cors())
                .layer(Extension(pool))
                .layer(Extension(config)),
        )
}
