use serde::Serialize;
use serde_json::Value;

use crate::client::{SchoolClient, read_json};
use crate::error::ApiError;

const ENROLL_PATH: &str = "/api/auth/enroll/";

#[derive(Serialize)]
struct EnrollRequest<'a> {
    course_id: &'a str,
}

impl SchoolClient {
    /// Enroll the current user in a course; returns the server's reply as is.
    ///
    /// # Errors
    /// Any request/status/decode error.
    pub async fn enroll(&self, course_id: &str) -> Result<Value, ApiError> {
        let response = self
            .gateway()
            .post(ENROLL_PATH)
            .json(&EnrollRequest { course_id })?
            .send()
            .await?;
        read_json(response).await
    }
}
