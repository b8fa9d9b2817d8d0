use crate::auth::AccountContext;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::handlers::parse_tier;
use crate::state::{AnalysisState, SubmissionState};
use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use logoscope_core::{AnalysisView, AppError, DisplayMetadata, StagingReceipt};
use logoscope_services::StageRequest;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

fn multipart_error(err: MultipartError) -> HttpAppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return HttpAppError(AppError::PayloadTooLarge(
            "Upload exceeds the maximum allowed size".to_string(),
        ));
    }
    HttpAppError(AppError::Validation(format!(
        "Invalid multipart body: {}",
        err.body_text()
    )))
}

struct UploadedFile {
    filename: String,
    content_type: String,
    data: Vec<u8>,
}

#[derive(Default)]
struct SubmissionForm {
    file: Option<UploadedFile>,
    tier: Option<String>,
    session_token: Option<String>,
    name: Option<String>,
    author: Option<String>,
    category: Option<String>,
    email: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl SubmissionForm {
    async fn read(mut multipart: Multipart) -> Result<Self, HttpAppError> {
        let mut form = SubmissionForm::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    let filename = field.file_name().unwrap_or("upload").to_string();
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let data = field.bytes().await.map_err(multipart_error)?;
                    form.file = Some(UploadedFile {
                        filename,
                        content_type,
                        data: data.to_vec(),
                    });
                }
                "tier" => form.tier = Some(field.text().await.map_err(multipart_error)?),
                "session_token" => {
                    form.session_token = Some(field.text().await.map_err(multipart_error)?)
                }
                "name" => form.name = Some(field.text().await.map_err(multipart_error)?),
                "author" => form.author = Some(field.text().await.map_err(multipart_error)?),
                "category" => form.category = Some(field.text().await.map_err(multipart_error)?),
                "email" => form.email = Some(field.text().await.map_err(multipart_error)?),
                other => tracing::debug!(field = %other, "Ignoring unknown multipart field"),
            }
        }

        Ok(form)
    }

    fn into_request(self) -> Result<StageRequest, AppError> {
        let file = self
            .file
            .ok_or_else(|| AppError::Validation("Missing 'file' field".to_string()))?;
        let tier = self
            .tier
            .as_deref()
            .map(parse_tier)
            .transpose()?
            .ok_or_else(|| AppError::Validation("Missing 'tier' field".to_string()))?;
        let session_token = self
            .session_token
            .ok_or_else(|| AppError::Validation("Missing 'session_token' field".to_string()))?;
        let name = non_empty(self.name)
            .ok_or_else(|| AppError::Validation("Missing 'name' field".to_string()))?;

        Ok(StageRequest {
            session_token,
            tier,
            filename: file.filename,
            content_type: file.content_type,
            data: file.data,
            display: DisplayMetadata {
                name,
                author: non_empty(self.author),
                category: non_empty(self.category),
            },
            email: non_empty(self.email),
        })
    }
}

/// Stage a logo upload
///
/// Fields: `file`, `tier`, `session_token`, `name`, and optionally `author`,
/// `category` and `email`. The staged submission expires unless it is claimed (free
/// tier) or paid for.
#[utoipa::path(
    post,
    path = "/api/v0/submissions",
    tag = "submissions",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Submission staged", body = StagingReceipt),
        (status = 400, description = "Invalid upload", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 429, description = "Free analysis already used in the last 24 hours", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(submissions, multipart),
    fields(account_id = ?account.map(|a| a.account_id), operation = "stage_submission")
)]
pub async fn stage_submission(
    State(submissions): State<SubmissionState>,
    account: Option<AccountContext>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let request = SubmissionForm::read(multipart).await?.into_request()?;
    let requester = account.map(|a| a.requester());

    let staged = submissions
        .staging
        .stage(request, requester.as_ref())
        .await?;

    Ok((StatusCode::CREATED, Json(StagingReceipt::from(&staged))))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ClaimRequest {
    /// The browser session token the submission was staged with
    pub session_token: String,
}

/// Claim a free submission for the signed-in account
#[utoipa::path(
    post,
    path = "/api/v0/submissions/{id}/claim",
    tag = "submissions",
    params(("id" = Uuid, Path, description = "Staging ID")),
    request_body = ClaimRequest,
    responses(
        (status = 201, description = "Analysis created", body = AnalysisView),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "Session token mismatch", body = ErrorResponse),
        (status = 404, description = "Submission not found or expired", body = ErrorResponse),
        (status = 429, description = "Free analysis already used in the last 24 hours", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(submissions, analyses, body),
    fields(account_id = %account.account_id, staging_id = %id, operation = "claim_submission")
)]
pub async fn claim_submission(
    Path(id): Path<Uuid>,
    State(submissions): State<SubmissionState>,
    State(analyses): State<AnalysisState>,
    account: AccountContext,
    ValidatedJson(body): ValidatedJson<ClaimRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let requester = account.requester();
    let analysis = submissions
        .claims
        .claim(id, &body.session_token, &requester)
        .await?;
    let view = analyses.results.project(&analysis, Some(&requester)).await;

    Ok((StatusCode::CREATED, Json(view)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use logoscope_core::Tier;

    fn form() -> SubmissionForm {
        SubmissionForm {
            file: Some(UploadedFile {
                filename: "logo.png".to_string(),
                content_type: "image/png".to_string(),
                data: vec![1, 2, 3],
            }),
            tier: Some("Paid".to_string()),
            session_token: Some("sess".to_string()),
            name: Some("  Acme  ".to_string()),
            author: Some("".to_string()),
            category: None,
            email: Some(" buyer@example.com ".to_string()),
        }
    }

    #[test]
    fn test_form_into_request() {
        let request = form().into_request().unwrap();
        assert_eq!(request.tier, Tier::Paid);
        assert_eq!(request.display.name, "Acme");
        assert_eq!(request.display.author, None);
        assert_eq!(request.email.as_deref(), Some("buyer@example.com"));
    }

    #[test]
    fn test_form_requires_fields() {
        let mut missing_file = form();
        missing_file.file = None;
        assert!(matches!(
            missing_file.into_request(),
            Err(AppError::Validation(_))
        ));

        let mut blank_name = form();
        blank_name.name = Some("   ".to_string());
        assert!(matches!(blank_name.into_request(), Err(AppError::Validation(_))));

        let mut bad_tier = form();
        bad_tier.tier = Some("gold".to_string());
        assert!(matches!(bad_tier.into_request(), Err(AppError::InvalidTier(_))));
    }
}
