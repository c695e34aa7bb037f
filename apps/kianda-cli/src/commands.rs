use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use kianda_auth::{
    AuthGateway, CredentialStore, FileCredentialStore, LOGIN_ROUTE, RenewalError,
};
use kianda_sdk::{GradeSubmission, SchoolClient};
use kianda_utils::SecretString;
use serde_json::Value;
use tokio::io::AsyncBufReadExt;

use crate::config::AppConfig;

#[derive(Args)]
pub struct LoginArgs {
    #[arg(short, long)]
    email: String,
    /// Password; read from stdin when omitted
    #[arg(long)]
    password: Option<String>,
}

#[derive(Args)]
pub struct GradeArgs {
    grade_id: u64,
    #[arg(long)]
    score: f64,
    #[arg(long)]
    letter_grade: String,
}

#[derive(Args)]
pub struct AttendanceArgs {
    /// JSON array of attendance records, or an object with an `attendance` array
    file: PathBuf,
}

#[derive(Args)]
pub struct RawRequestArgs {
    /// HTTP method, e.g. GET or POST
    method: String,
    /// Path under the base URL, e.g. /api/students/
    path: String,
    /// JSON request body
    #[arg(long)]
    data: Option<String>,
}

/// Gateway and client wired to the on-disk credential store.
pub struct Session {
    client: SchoolClient,
    store_path: PathBuf,
}

impl Session {
    pub fn open(config: &AppConfig) -> Result<Self> {
        let store = match &config.credentials.path {
            Some(path) => FileCredentialStore::new(path),
            None => FileCredentialStore::default_location()?,
        };
        let store_path = store.path().to_path_buf();
        let store: Arc<dyn CredentialStore> = Arc::new(store);

        let gateway = AuthGateway::builder(config.gateway_config()?)
            .store(store)
            .login_redirect(|reason: &RenewalError| {
                tracing::warn!(route = LOGIN_ROUTE, %reason, "session ended; login required");
            })
            .build()?;

        Ok(Self {
            client: SchoolClient::new(gateway),
            store_path,
        })
    }

    pub async fn login(&self, args: LoginArgs) -> Result<()> {
        let password = match args.password {
            Some(password) => SecretString::from(password),
            None => read_password().await?,
        };
        let user = self
            .client
            .login(&args.email, &password)
            .await
            .context("login failed")?;
        println!("Logged in as {} (id {})", user.display_name(), user.id);
        if let Some(role) = &user.role {
            println!("Role: {role}");
        }
        println!("Dashboard: {}", user.dashboard_path());
        Ok(())
    }

    pub async fn logout(&self) -> Result<()> {
        self.client.logout().await?;
        println!("Logged out");
        Ok(())
    }

    pub async fn whoami(&self) -> Result<()> {
        let user = self.client.current_user().await?;
        println!("{} (id {})", user.display_name(), user.id);
        if let Some(email) = &user.email {
            println!("Email: {email}");
        }
        if let Some(role) = &user.role {
            println!("Role: {role}");
        }
        Ok(())
    }

    pub async fn profile(&self) -> Result<()> {
        let profile = self.client.profile().await?;
        print_json(&serde_json::to_value(&profile)?)
    }

    pub async fn enroll(&self, course_id: &str) -> Result<()> {
        let reply = self.client.enroll(course_id).await?;
        print_json(&reply)
    }

    pub async fn submit_grade(&self, args: &GradeArgs) -> Result<()> {
        let submission = GradeSubmission {
            score: args.score,
            letter_grade: args.letter_grade.clone(),
        };
        let reply = self
            .client
            .submit_assignment(args.grade_id, &submission)
            .await?;
        print_json(&reply)
    }

    pub async fn attendance(&self, args: &AttendanceArgs) -> Result<()> {
        let raw = tokio::fs::read_to_string(&args.file)
            .await
            .with_context(|| format!("failed to read {}", args.file.display()))?;
        let records = attendance_records(serde_json::from_str(&raw)?)?;
        tracing::info!(records = records.len(), "submitting attendance");
        let reply = self.client.update_bulk_attendance(&records).await?;
        print_json(&reply)
    }

    pub async fn raw_request(&self, args: &RawRequestArgs) -> Result<()> {
        let method = http::Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
            .with_context(|| format!("invalid HTTP method: {}", args.method))?;

        let mut request = self.client.gateway().request(method, &args.path);
        if let Some(data) = &args.data {
            let body: Value = serde_json::from_str(data).context("--data is not valid JSON")?;
            request = request.json(&body)?;
        }
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        eprintln!("HTTP {status}");
        match serde_json::from_slice::<Value>(&body) {
            Ok(json) => print_json(&json)?,
            Err(_) => println!("{}", String::from_utf8_lossy(&body)),
        }
        if !status.is_success() {
            anyhow::bail!("request failed with HTTP {status}");
        }
        Ok(())
    }

    pub fn status(&self) -> Result<()> {
        let gateway = self.client.gateway();
        println!("Backend: {}", gateway.base_url());
        println!("Credentials: {}", self.store_path.display());
        let state = if gateway.is_authenticated()? {
            "stored"
        } else {
            "none"
        };
        println!("Session: {state}");
        Ok(())
    }
}

async fn read_password() -> Result<SecretString> {
    eprintln!("Password:");
    let mut line = String::new();
    tokio::io::BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("failed to read password from stdin")?;
    let password = SecretString::from(line.trim_end_matches(['\r', '\n']));
    if password.is_blank() {
        anyhow::bail!("empty password");
    }
    Ok(password)
}

fn attendance_records(value: Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(records) => Ok(records),
        Value::Object(mut object) => match object.remove("attendance") {
            Some(Value::Array(records)) => Ok(records),
            _ => anyhow::bail!("expected an `attendance` array"),
        },
        _ => anyhow::bail!("expected a JSON array of attendance records"),
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use clap::Parser;
    use serde_json::json;

    #[derive(Parser)]
    struct GradeCli {
        #[command(flatten)]
        args: GradeArgs,
    }

    #[test]
    fn attendance_accepts_array_or_wrapped_object() {
        let records = attendance_records(json!([{"student": 1}])).unwrap();
        assert_eq!(records.len(), 1);

        let records =
            attendance_records(json!({"attendance": [{"student": 1}, {"student": 2}]})).unwrap();
        assert_eq!(records.len(), 2);

        assert!(attendance_records(json!({"student": 1})).is_err());
        assert!(attendance_records(json!("present")).is_err());
    }

    #[test]
    fn grade_id_must_be_numeric() {
        let parsed =
            GradeCli::try_parse_from(["grade", "42", "--score", "88.5", "--letter-grade", "B+"])
                .unwrap();
        assert_eq!(parsed.args.grade_id, 42);

        for bad in ["1/../../auth/logout", "7?x=1", "-3"] {
            let result =
                GradeCli::try_parse_from(["grade", bad, "--score", "1", "--letter-grade", "F"]);
            assert!(result.is_err(), "{bad} accepted");
        }
    }
}
