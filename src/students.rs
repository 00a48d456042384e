use axum::extract::rejection::JsonRejection;
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::err::Error;
use crate::models::{StudentData, StudentView};
use crate::validate::{Numeric, Text, Validator};
use crate::{breaks, created, proceeds, Payload};

/// Every student, in insertion order.
pub async fn list_students(
    Extension(pool): Extension<SqlitePool>,
) -> Result<Json<Vec<StudentView>>, Error> {
    let students = sqlx::query_as::<_, StudentData>("SELECT * FROM etudiants ORDER BY id")
        .fetch_all(&pool)
        .await?;
    Ok(Json(students.into_iter().map(StudentView::from).collect()))
}

pub async fn create_student(
    Extension(pool): Extension<SqlitePool>,
    payload: Result<Json<CreateStudent>, JsonRejection>,
) -> Payload<StudentSaved> {
    let Json(body) = payload?;

    let mut v = Validator::new();
    let nom = v.string("nom", body.nom.as_ref(), 20);
    // validated for the form's sake, there is no column for it
    v.string("prenom", body.prenom.as_ref(), 255);
    let cne = v.string("cne", body.cne.as_ref(), 20);
    if let Some(cne) = cne {
        let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM etudiants WHERE login = ?")
            .bind(cne)
            .fetch_one(&pool)
            .await?;
        v.unique("cne", taken > 0);
    }
    let note1 = v.optional_number_between("note1", body.note1.as_ref(), 0.0, 20.0);
    let note2 = v.optional_number_between("note2", body.note2.as_ref(), 0.0, 20.0);
    v.finish().map_err(Error::invalid)?;

    let (Some(nom), Some(cne)) = (nom, cne) else {
        return breaks(Error::invalid(Default::default()));
    };

    let now = Utc::now();
    let res = sqlx::query(
        "INSERT INTO etudiants (nom, login, note1, note2, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(nom)
    .bind(cne)
    .bind(note1)
    .bind(note2)
    .bind(now)
    .bind(now)
    .execute(&pool)
    .await?;

    let student = fetch_student(&pool, res.last_insert_rowid()).await?;
    log::info!("Added student #{} ({})", student.id, student.login);

    created(StudentSaved {
        message: "Étudiant ajouté avec succès",
        student: student.into(),
    })
}

pub async fn update_location(
    Extension(pool): Extension<SqlitePool>,
    payload: Result<Json<UpdateLocation>, JsonRejection>,
) -> Payload<StudentSaved> {
    let Json(body) = payload?;

    let mut v = Validator::new();
    let id = v.integer("id", body.id.as_ref());
    if let Some(id) = id {
        let found: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM etudiants WHERE id = ?")
            .bind(id)
            .fetch_one(&pool)
            .await?;
        v.exists("id", found > 0);
    }
    let latitude = v.number_between("latitude", body.latitude.as_ref(), -90.0, 90.0);
    let longitude = v.number_between("longitude", body.longitude.as_ref(), -180.0, 180.0);
    v.finish().map_err(Error::invalid)?;

    let (Some(id), Some(latitude), Some(longitude)) = (id, latitude, longitude) else {
        return breaks(Error::invalid(Default::default()));
    };

    sqlx::query("UPDATE etudiants SET latitude = ?, longitude = ?, updated_at = ? WHERE id = ?")
        .bind(latitude)
        .bind(longitude)
        .bind(Utc::now())
        .bind(id)
        .execute(&pool)
        .await?;

    proceeds(StudentSaved {
        message: "Position mise à jour avec succès",
        student: fetch_student(&pool, id).await?.into(),
    })
}

async fn fetch_student(pool: &SqlitePool, id: i64) -> Result<StudentData, Error> {
    sqlx::query_as::<_, StudentData>("SELECT * FROM etudiants WHERE id = ? LIMIT 1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound {
            message: format!("Student #{} does not exist!", id),
        })
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateStudent {
    pub nom: Option<Text>,
    pub prenom: Option<Text>,
    pub cne: Option<Text>,
    pub note1: Option<Numeric>,
    pub note2: Option<Numeric>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateLocation {
    pub id: Option<Numeric>,
    pub latitude: Option<Numeric>,
    pub longitude: Option<Numeric>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentSaved {
    pub message: &'static str,
    pub student: StudentView,
}
