mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::TestApp;

async fn add_student(app: &TestApp, cne: &str) -> (StatusCode, Value) {
    app.post(
        "/api/students",
        None,
        json!({
            "nom": "El Idrissi",
            "prenom": "Nadia",
            "cne": cne,
            "note1": 12,
            "note2": "15.5",
        }),
    )
    .await
}

#[tokio::test]
async fn created_students_show_up_in_the_directory() {
    let app = TestApp::new().await;

    let (status, body) = add_student(&app, "R130245789").await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["message"], "Étudiant ajouté avec succès");
    let student = &body["student"];
    assert_eq!(student["login"], "R130245789");
    assert_eq!(student["nom"], "El Idrissi");
    assert_eq!(student["note1"], json!(12.0));
    assert_eq!(student["note2"], json!(15.5));
    assert_eq!(student["moyenne"], Value::Null);
    assert_eq!(student["latitude"], Value::Null);
    assert!(student.get("prenom").is_none());
    assert!(student.get("password").is_none());

    let (status, list) = app.get("/api/students", None).await;
    assert_eq!(status, StatusCode::OK);
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["login"], "R130245789");
}

#[tokio::test]
async fn directory_never_exposes_password_hashes() {
    let app = TestApp::new().await;
    app.register("salma@campus.ma").await;

    let (_, list) = app.get("/api/students", None).await;
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert!(list[0].get("password").is_none());
    assert_eq!(list[0]["email"], "salma@campus.ma");
}

#[tokio::test]
async fn duplicate_cne_is_rejected_and_first_record_kept() {
    let app = TestApp::new().await;
    add_student(&app, "R130245789").await;

    let (status, body) = app
        .post(
            "/api/students",
            None,
            json!({ "nom": "Autre", "prenom": "Personne", "cne": "R130245789" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Erreur de validation");
    assert_eq!(body["errors"]["cne"][0], "The cne has already been taken.");

    let (_, list) = app.get("/api/students", None).await;
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["nom"], "El Idrissi");
}

#[tokio::test]
async fn create_validates_names_and_scores() {
    let app = TestApp::new().await;
    let (status, body) = app
        .post(
            "/api/students",
            None,
            json!({
                "nom": "Un nom beaucoup trop long pour la colonne",
                "cne": "R1",
                "note1": 25,
                "note2": "abc",
            }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let errors = body["errors"].as_object().unwrap();
    assert_eq!(errors["prenom"][0], "The prenom field is required.");
    assert_eq!(
        errors["nom"][0],
        "The nom field must not be greater than 20 characters."
    );
    assert_eq!(errors["note1"][0], "The note1 field must be between 0 and 20.");
    assert_eq!(errors["note2"][0], "The note2 field must be a number.");
    assert!(!errors.contains_key("cne"));
}

#[tokio::test]
async fn update_location_overwrites_position() {
    let app = TestApp::new().await;
    let (_, body) = add_student(&app, "R130245789").await;
    let id = body["student"]["id"].clone();

    let (status, body) = app
        .post(
            "/api/students/update-location",
            None,
            json!({ "id": id, "latitude": 31.63, "longitude": -8.0 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["message"], "Position mise à jour avec succès");
    assert_eq!(body["student"]["latitude"], json!(31.63));
    assert_eq!(body["student"]["longitude"], json!(-8.0));
}

#[tokio::test]
async fn out_of_range_latitude_leaves_position_untouched() {
    let app = TestApp::new().await;
    let (_, body) = add_student(&app, "R130245789").await;
    let id = body["student"]["id"].clone();
    app.post(
        "/api/students/update-location",
        None,
        json!({ "id": id, "latitude": 10.0, "longitude": 20.0 }),
    )
    .await;

    let (status, body) = app
        .post(
            "/api/students/update-location",
            None,
            json!({ "id": id, "latitude": 91, "longitude": 20.0 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["latitude"].is_array());

    let (_, list) = app.get("/api/students", None).await;
    assert_eq!(list[0]["latitude"], json!(10.0));
    assert_eq!(list[0]["longitude"], json!(20.0));
}

#[tokio::test]
async fn update_location_requires_a_known_student() {
    let app = TestApp::new().await;
    let (status, body) = app
        .post(
            "/api/students/update-location",
            None,
            json!({ "id": 404, "latitude": 0, "longitude": 0 }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"]["id"][0], "The selected id is invalid.");
}

#[tokio::test]
async fn wrongly_typed_fields_are_reported_per_field() {
    let app = TestApp::new().await;
    let (status, body) = app
        .post(
            "/api/students",
            None,
            json!({ "nom": 42, "prenom": "Nadia", "cne": "R130245789", "note1": true }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    assert_eq!(body["message"], "Erreur de validation");
    assert_eq!(body["errors"]["nom"][0], "The nom field must be a string.");
    assert_eq!(body["errors"]["note1"][0], "The note1 field must be a number.");

    let (_, created) = add_student(&app, "R130245789").await;
    let id = created["student"]["id"].clone();
    let (status, body) = app
        .post(
            "/api/students/update-location",
            None,
            json!({ "id": id, "latitude": true, "longitude": { "deg": 8 } }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    assert_eq!(body["errors"]["latitude"][0], "The latitude field must be a number.");
    assert_eq!(body["errors"]["longitude"][0], "The longitude field must be a number.");
}
