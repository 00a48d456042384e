use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StudentData {
    pub id: i64,
    pub nom: String,
    pub email: Option<String>,
    pub login: String,
    pub password: Option<String>,
    pub note1: Option<f64>,
    pub note2: Option<f64>,
    pub moyenne: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StudentData {
    /// Stores `score` in the note tracked by `quiz` and refreshes the average
    /// once both notes are known.
    pub fn record_score(&mut self, quiz: QuizType, score: f64) {
        match quiz {
            QuizType::Javascript => self.note1 = Some(score),
            QuizType::Php => self.note2 = Some(score),
        }
        if let Some(moyenne) = average(self.note1, self.note2) {
            self.moyenne = Some(moyenne);
        }
    }
}

pub fn average(note1: Option<f64>, note2: Option<f64>) -> Option<f64> {
    match (note1, note2) {
        (Some(a), Some(b)) => Some((a + b) / 2.0),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum QuizType {
    Javascript,
    Php,
}

impl QuizType {
    pub const NAMES: [&'static str; 2] = ["javascript", "php"];

    pub fn name(self) -> &'static str {
        match self {
            QuizType::Javascript => "javascript",
            QuizType::Php => "php",
        }
    }

    /// Column of `etudiants` the quiz writes to.
    pub fn column(self) -> &'static str {
        match self {
            QuizType::Javascript => "note1",
            QuizType::Php => "note2",
        }
    }
}

impl FromStr for QuizType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "javascript" => Ok(QuizType::Javascript),
            "php" => Ok(QuizType::Php),
            _ => Err(()),
        }
    }
}

/// Public shape of a student record. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct StudentView {
    pub id: i64,
    pub nom: String,
    pub email: Option<String>,
    pub login: String,
    pub note1: Option<f64>,
    pub note2: Option<f64>,
    pub moyenne: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<StudentData> for StudentView {
    fn from(student: StudentData) -> Self {
        Self {
            id: student.id,
            nom: student.nom,
            email: student.email,
            login: student.login,
            note1: student.note1,
            note2: student.note2,
            moyenne: student.moyenne,
            latitude: student.latitude,
            longitude: student.longitude,
            created_at: student.created_at,
            updated_at: student.updated_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccessToken {
    pub id: i64,
    pub etudiant_id: i64,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Image row without its payload.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ImageMeta {
    pub id: i64,
    pub name: String,
    pub mime_type: String,
    pub size: i64,
    pub alt_text: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ImagePayload {
    pub name: String,
    pub mime_type: String,
    pub image_data: String,
}
