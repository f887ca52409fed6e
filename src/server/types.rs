use axum::body::Bytes;
use axum::http::StatusCode;
use axum_typed_multipart::{FieldData, TryFromMultipart};
use serde::Serialize;
use utoipa::ToSchema;

use super::page;
use crate::image::UploadError;
use crate::workflow::{ComparisonResult, FaceMatch, Outcome};

/// 比对请求参数
///
/// 字段本身不限大小，整个请求体受路由上的 12M 限制；单张图片的 5M 上限
/// 在 [`crate::ImagePayload::new`] 中检查，提示中带有实际大小。
#[derive(TryFromMultipart)]
pub struct CompareRequest {
    #[form_data(limit = "unlimited")]
    pub source: Option<FieldData<Bytes>>,
    #[form_data(limit = "unlimited")]
    pub target: Option<FieldData<Bytes>>,
}

/// 比对表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct CompareForm {
    /// 第一张图片（源图片），jpg / jpeg / png
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub source: String,
    /// 第二张图片（目标图片），jpg / jpeg / png
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub target: String,
}

/// 一次提交的处理结果
#[derive(Debug)]
pub enum Submission {
    /// 上传的文件未通过校验，没有发出请求
    Rejected(Vec<UploadError>),
    Finished(Outcome),
}

/// 比对响应
#[derive(Debug, Serialize, ToSchema)]
pub struct CompareResponse {
    /// `match`、`no_match`、`incomplete`、`rejected` 或 `error`
    pub status: String,
    /// 匹配列表，只有 `match` 时非空
    pub matches: Vec<FaceMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<&Outcome> for CompareResponse {
    fn from(outcome: &Outcome) -> Self {
        let (matches, message) = match outcome {
            Outcome::IncompleteInput => (vec![], Some(page::INCOMPLETE_NOTICE.to_string())),
            Outcome::Completed(ComparisonResult::Matches(matches)) => (matches.clone(), None),
            Outcome::Completed(ComparisonResult::NoMatch) => {
                (vec![], Some(page::NO_MATCH_NOTICE.to_string()))
            }
            Outcome::Completed(ComparisonResult::Failure(e)) => (vec![], Some(e.clone())),
        };
        Self { status: outcome.status().to_string(), matches, message }
    }
}

impl Submission {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Submission::Rejected(_) | Submission::Finished(Outcome::IncompleteInput) => {
                StatusCode::BAD_REQUEST
            }
            Submission::Finished(Outcome::Completed(ComparisonResult::Failure(_))) => {
                StatusCode::BAD_GATEWAY
            }
            Submission::Finished(Outcome::Completed(_)) => StatusCode::OK,
        }
    }

    pub fn to_response(&self) -> CompareResponse {
        match self {
            Submission::Rejected(errors) => CompareResponse {
                status: "rejected".to_string(),
                matches: vec![],
                message: Some(errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ")),
            },
            Submission::Finished(outcome) => CompareResponse::from(outcome),
        }
    }
}
