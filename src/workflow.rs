use std::future::Future;
use std::time::Instant;

use log::{debug, info, warn};
use serde::Serialize;
use utoipa::ToSchema;

use crate::image::ImagePayload;
use crate::metrics;
use crate::rekognition::CompareError;

/// 默认相似度阈值（百分比）
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 80.0;

/// 人脸比对服务的调用边界
pub trait FaceComparator {
    /// 比对两张图片中的人脸，返回已校验过的匹配列表，列表可能为空
    fn compare_faces(
        &self,
        request: &ComparisonRequest<'_>,
    ) -> impl Future<Output = Result<Vec<FaceMatch>, CompareError>> + Send;
}

/// 一次比对请求，只有两张图片都存在时才会被构造
#[derive(Debug, Clone, Copy)]
pub struct ComparisonRequest<'a> {
    pub source: &'a ImagePayload,
    pub target: &'a ImagePayload,
    pub similarity_threshold: f32,
}

/// 目标图片中人脸的位置，各值为相对图片宽高的比例
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct BoundingBox {
    pub width: f64,
    pub height: f64,
    pub left: f64,
    pub top: f64,
}

/// 一条匹配记录
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FaceMatch {
    /// 相似度，范围 0 到 100
    pub similarity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    /// 人脸检测置信度
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ComparisonResult {
    /// 至少有一条匹配
    Matches(Vec<FaceMatch>),
    NoMatch,
    /// 服务调用失败，附带可读的错误信息
    Failure(String),
}

impl ComparisonResult {
    pub fn from_matches(matches: Vec<FaceMatch>) -> Self {
        if matches.is_empty() { Self::NoMatch } else { Self::Matches(matches) }
    }

    pub fn max_similarity(&self) -> Option<f64> {
        match self {
            Self::Matches(matches) => matches.iter().map(|m| m.similarity).reduce(f64::max),
            _ => None,
        }
    }
}

impl From<Result<Vec<FaceMatch>, CompareError>> for ComparisonResult {
    fn from(result: Result<Vec<FaceMatch>, CompareError>) -> Self {
        match result {
            Ok(matches) => Self::from_matches(matches),
            Err(err) => Self::Failure(err.to_string()),
        }
    }
}

/// 一次触发的最终结果
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// 图片不足两张，没有发出请求
    IncompleteInput,
    Completed(ComparisonResult),
}

impl Outcome {
    pub fn status(&self) -> &'static str {
        match self {
            Outcome::IncompleteInput => "incomplete",
            Outcome::Completed(ComparisonResult::Matches(_)) => "match",
            Outcome::Completed(ComparisonResult::NoMatch) => "no_match",
            Outcome::Completed(ComparisonResult::Failure(_)) => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    AwaitingUploads,
    ReadyToCompare,
    Comparing,
    ResultDisplayed,
}

impl WorkflowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::AwaitingUploads => "awaiting_uploads",
            WorkflowState::ReadyToCompare => "ready_to_compare",
            WorkflowState::Comparing => "comparing",
            WorkflowState::ResultDisplayed => "result_displayed",
        }
    }
}

/// 一个用户会话内的上传槽位与比对状态
///
/// 每次请求（或每次命令行调用）各自创建，不在会话之间共享。
#[derive(Debug)]
pub struct CompareSession {
    source: Option<ImagePayload>,
    target: Option<ImagePayload>,
    state: WorkflowState,
    similarity_threshold: f32,
}

impl Default for CompareSession {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

impl CompareSession {
    pub fn new(similarity_threshold: f32) -> Self {
        Self {
            source: None,
            target: None,
            state: WorkflowState::AwaitingUploads,
            similarity_threshold,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn set_source(&mut self, image: ImagePayload) {
        self.source = Some(image);
        self.refresh();
    }

    pub fn set_target(&mut self, image: ImagePayload) {
        self.target = Some(image);
        self.refresh();
    }

    fn transition(&mut self, next: WorkflowState) {
        if self.state != next {
            debug!("会话状态：{} -> {}", self.state.as_str(), next.as_str());
            self.state = next;
        }
    }

    /// 新的上传会开始新一轮比对
    fn refresh(&mut self) {
        let next = match (&self.source, &self.target) {
            (Some(_), Some(_)) => WorkflowState::ReadyToCompare,
            _ => WorkflowState::AwaitingUploads,
        };
        self.transition(next);
    }

    /// 用户触发比对
    ///
    /// 缺图时不会调用 `comparator`，直接返回 [`Outcome::IncompleteInput`]。
    /// 服务错误会被转换为 [`ComparisonResult::Failure`]，不会重试。
    pub async fn submit<C: FaceComparator>(&mut self, comparator: &C) -> Outcome {
        // 图片内容是引用计数的 `Bytes`，克隆开销很小
        let (Some(source), Some(target)) = (self.source.clone(), self.target.clone()) else {
            warn!("图片不足两张，跳过比对");
            metrics::inc_comparison(Outcome::IncompleteInput.status());
            return Outcome::IncompleteInput;
        };

        self.transition(WorkflowState::Comparing);
        let request = ComparisonRequest {
            source: &source,
            target: &target,
            similarity_threshold: self.similarity_threshold,
        };
        debug!(
            "比对 {} ({}, {} bytes) 与 {} ({}, {} bytes)，阈值 {}",
            source.name(),
            source.format(),
            source.len(),
            target.name(),
            target.format(),
            target.len(),
            request.similarity_threshold
        );

        let start = Instant::now();
        let result = ComparisonResult::from(comparator.compare_faces(&request).await);
        let elapsed = start.elapsed().as_secs_f32();
        self.transition(WorkflowState::ResultDisplayed);

        match &result {
            ComparisonResult::Matches(matches) => {
                info!("比对完成：{} 个匹配，耗时 {:.2}s", matches.len(), elapsed)
            }
            ComparisonResult::NoMatch => info!("比对完成：没有匹配，耗时 {:.2}s", elapsed),
            ComparisonResult::Failure(e) => warn!("比对失败：{}", e),
        }

        let outcome = Outcome::Completed(result);
        metrics::inc_comparison(outcome.status());
        if let Outcome::Completed(result) = &outcome {
            metrics::inc_compare_duration(elapsed);
            if let Some(score) = result.max_similarity() {
                metrics::inc_max_similarity(score);
            }
        }
        outcome
    }
}
