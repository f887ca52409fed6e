use std::sync::Arc;

use crate::RekognitionClient;

/// 应用状态，只保存只读配置，上传的图片不会跨请求保存
pub struct AppState {
    /// 人脸比对服务客户端
    pub comparator: RekognitionClient,
    /// 相似度阈值
    pub similarity_threshold: f32,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(comparator: RekognitionClient, similarity_threshold: f32) -> Arc<Self> {
        Arc::new(AppState { comparator, similarity_threshold })
    }
}
