use axum::extract::rejection::JsonRejection;
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::auth::AuthenticatedStudent;
use crate::err::Error;
use crate::models::QuizType;
use crate::validate::{Numeric, Text, Validator};
use crate::{breaks, proceeds, Payload};

/// Records a quiz score on the authenticated student. Only the quiz's own
/// note and, once both notes exist, the average are written back.
pub async fn submit_result(
    AuthenticatedStudent { mut student, .. }: AuthenticatedStudent,
    Extension(pool): Extension<SqlitePool>,
    payload: Result<Json<SubmitQuiz>, JsonRejection>,
) -> Payload<QuizSaved> {
    let Json(body) = payload?;

    let mut v = Validator::new();
    let score = v.number_between("score", body.score.as_ref(), 0.0, 20.0);
    let quiz = v
        .one_of("quiz_type", body.quiz_type.as_ref(), &QuizType::NAMES)
        .and_then(|name| name.parse::<QuizType>().ok());
    v.finish().map_err(Error::unprocessable)?;

    let (Some(score), Some(quiz)) = (score, quiz) else {
        return breaks(Error::unprocessable(Default::default()));
    };

    student.record_score(quiz, score);
    sqlx::query(&format!(
        "UPDATE etudiants SET {} = ?, moyenne = ?, updated_at = ? WHERE id = ?",
        quiz.column()
    ))
    .bind(score)
    .bind(student.moyenne)
    .bind(Utc::now())
    .bind(student.id)
    .execute(&pool)
    .await?;
    log::info!(
        "Student #{} scored {} on the {} quiz",
        student.id,
        score,
        quiz.name()
    );

    proceeds(QuizSaved {
        message: "Quiz result saved successfully!",
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitQuiz {
    pub score: Option<Numeric>,
    pub quiz_type: Option<Text>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizSaved {
    pub message: &'static str,
}
