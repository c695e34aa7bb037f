use serde::Serialize;
use serde_json::Value;

use crate::client::{SchoolClient, read_json};
use crate::error::ApiError;

const BULK_ATTENDANCE_PATH: &str = "/api/students/bulk_attendance/";

#[derive(Serialize)]
struct BulkAttendance<'a, T> {
    attendance: &'a [T],
}

impl SchoolClient {
    /// Record attendance for many students at once.
    ///
    /// Records are sent verbatim under `{"attendance": [...]}`.
    ///
    /// # Errors
    /// Any request/status/decode error.
    pub async fn update_bulk_attendance<T: Serialize>(
        &self,
        records: &[T],
    ) -> Result<Value, ApiError> {
        let response = self
            .gateway()
            .post(BULK_ATTENDANCE_PATH)
            .json(&BulkAttendance {
                attendance: records,
            })?
            .send()
            .await?;
        read_json(response).await
    }
}
