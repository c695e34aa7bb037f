use serde::Serialize;
use serde_json::Value;

use crate::client::{SchoolClient, read_json};
use crate::error::ApiError;

/// Score submitted for one assignment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeSubmission {
    pub score: f64,
    pub letter_grade: String,
}

impl SchoolClient {
    /// `PUT /api/grades/{id}/submit_assignment/`.
    ///
    /// # Errors
    /// Any request/status/decode error.
    pub async fn submit_assignment(
        &self,
        grade_id: u64,
        submission: &GradeSubmission,
    ) -> Result<Value, ApiError> {
        let path = format!("/api/grades/{grade_id}/submit_assignment/");
        let response = self
            .gateway()
            .put(&path)
            .json(submission)?
            .send()
            .await?;
        read_json(response).await
    }
}
