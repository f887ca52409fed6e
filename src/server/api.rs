use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum_typed_multipart::{FieldData, TypedMultipart, TypedMultipartError};
use log::{info, warn};

use super::MAX_UPLOAD_BYTES;
use super::error::{AppError, Result};
use super::page;
use super::state::AppState;
use super::types::*;
use crate::image::{ImagePayload, UploadError};
use crate::workflow::CompareSession;

/// 读取一个上传槽位，浏览器对未选择文件的输入框会提交空文件名和空内容
fn load_slot(
    slot: &str,
    field: Option<FieldData<Bytes>>,
) -> std::result::Result<Option<ImagePayload>, UploadError> {
    let Some(field) = field else {
        return Ok(None);
    };
    let name = field.metadata.file_name.filter(|s| !s.is_empty());
    if name.is_none() && field.contents.is_empty() {
        return Ok(None);
    }
    let name = name.unwrap_or_else(|| slot.to_string());
    ImagePayload::new(name, field.metadata.content_type.as_deref(), field.contents).map(Some)
}

/// 校验上传内容并执行一次比对，每个请求使用独立的会话
async fn run_comparison(state: &AppState, data: CompareRequest) -> Submission {
    let mut session = CompareSession::new(state.similarity_threshold);
    let mut errors = vec![];

    match load_slot("source", data.source) {
        Ok(Some(image)) => session.set_source(image),
        Ok(None) => {}
        Err(e) => errors.push(e),
    }
    match load_slot("target", data.target) {
        Ok(Some(image)) => session.set_target(image),
        Ok(None) => {}
        Err(e) => errors.push(e),
    }

    if !errors.is_empty() {
        for e in &errors {
            warn!("拒绝上传：{}", e);
        }
        return Submission::Rejected(errors);
    }

    Submission::Finished(session.submit(&state.comparator).await)
}

fn too_large() -> Submission {
    Submission::Rejected(vec![UploadError::RequestTooLarge { limit: MAX_UPLOAD_BYTES }])
}

/// 读取请求体时超出上限也算作上传被拒绝，其余解析错误原样返回
fn oversized(e: TypedMultipartError) -> std::result::Result<Submission, TypedMultipartError> {
    if e.get_status() == StatusCode::PAYLOAD_TOO_LARGE {
        warn!("拒绝上传：{}", e);
        Ok(too_large())
    } else {
        Err(e)
    }
}

/// 请求体在进入处理函数之前就被判定超限（`Content-Length` 过大）
pub async fn oversized_form(response: Response) -> Response {
    if response.status() != StatusCode::PAYLOAD_TOO_LARGE {
        return response;
    }
    warn!("拒绝上传：请求体超过 {} bytes", MAX_UPLOAD_BYTES);
    Html(page::render(Some(&too_large()))).into_response()
}

pub async fn oversized_api(response: Response) -> Response {
    if response.status() != StatusCode::PAYLOAD_TOO_LARGE {
        return response;
    }
    warn!("拒绝上传：请求体超过 {} bytes", MAX_UPLOAD_BYTES);
    let submission = too_large();
    (submission.status_code(), Json(submission.to_response())).into_response()
}

/// 上传表单页面
pub async fn index_handler() -> Html<String> {
    Html(page::render(None))
}

/// 表单提交，结果渲染在页面中，解析失败同样渲染为拒绝提示
pub async fn compare_form_handler(
    State(state): State<Arc<AppState>>,
    data: std::result::Result<TypedMultipart<CompareRequest>, TypedMultipartError>,
) -> Html<String> {
    let submission = match data {
        Ok(TypedMultipart(data)) => run_comparison(&state, data).await,
        Err(e) => oversized(e).unwrap_or_else(|e| {
            warn!("无法解析上传表单：{}", e);
            Submission::Rejected(vec![UploadError::Unreadable(e.to_string())])
        }),
    };
    Html(page::render(Some(&submission)))
}

/// 比对两张图片中的人脸
#[utoipa::path(
    post,
    path = "/api/compare",
    request_body(content = CompareForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = CompareResponse, description = "有匹配或没有匹配"),
        (status = 400, body = CompareResponse, description = "图片缺失、格式不支持或超过大小限制"),
        (status = 502, body = CompareResponse, description = "比对服务调用失败"),
    )
)]
pub async fn compare_api_handler(
    State(state): State<Arc<AppState>>,
    data: std::result::Result<TypedMultipart<CompareRequest>, TypedMultipartError>,
) -> Result<(StatusCode, Json<CompareResponse>)> {
    let submission = match data {
        Ok(TypedMultipart(data)) => run_comparison(&state, data).await,
        Err(e) => oversized(e).map_err(AppError::bad_request)?,
    };
    let status = submission.status_code();
    info!("API 比对结果：{}", status);
    Ok((status, Json(submission.to_response())))
}
