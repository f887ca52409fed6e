mod api;
mod error;
pub mod page;
mod state;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware::map_response;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use self::state::*;
pub use self::types::{CompareResponse, Submission};
use crate::workflow::{BoundingBox, FaceMatch};

#[derive(OpenApi)]
#[openapi(
    paths(api::compare_api_handler,),
    components(schemas(types::CompareForm, CompareResponse, FaceMatch, BoundingBox,),)
)]
pub struct ApiDoc;

/// 上传限制：两张图片加上表单开销，12M
pub const MAX_UPLOAD_BYTES: usize = 1024 * 1024 * 12;

/// 构建API服务器
pub fn create_app(state: Arc<AppState>) -> Router {
    let limit = RequestBodyLimitLayer::new(MAX_UPLOAD_BYTES);
    Router::new()
        .route("/", get(api::index_handler))
        // 超限的 413 也要渲染成页面，所以限制挂在路由上，外面再包一层转换
        .route(
            "/compare",
            post(api::compare_form_handler)
                .layer(limit.clone())
                .layer(map_response(api::oversized_form)),
        )
        .route(
            "/api/compare",
            post(api::compare_api_handler).layer(limit).layer(map_response(api::oversized_api)),
        )
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}
