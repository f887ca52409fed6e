use std::error::Error as _;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use anyhow::bail;
use log::{debug, error, info, warn};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RekognitionOptions;
use crate::profile::SharedConfig;
use crate::sigv4::{Credentials, Signer, SigningRequest, amz_date};
use crate::workflow::{BoundingBox, ComparisonRequest, FaceComparator, FaceMatch};

const SERVICE: &str = "rekognition";
const TARGET: &str = "RekognitionService.CompareFaces";
const CONTENT_TYPE_JSON: &str = "application/x-amz-json-1.1";
/// 自定义地址（本地模拟服务等）且未配置区域时用于签名的区域
const FALLBACK_REGION: &str = "us-east-1";

#[derive(Debug, Error)]
pub enum CompareError {
    /// 连接失败、超时等传输层错误
    #[error("failed to reach the face comparison service: {message}")]
    Transport {
        message: String,
        #[source]
        source: reqwest::Error,
    },
    /// 服务端返回的错误
    #[error("{code}: {message}")]
    Service { status: u16, code: String, message: String },
    #[error("malformed response from the face comparison service: {0}")]
    Malformed(String),
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for CompareError {
    fn from(err: reqwest::Error) -> Self {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        CompareError::Transport { message, source: err }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CompareFacesInput {
    source_image: ImageBlob,
    target_image: ImageBlob,
    similarity_threshold: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ImageBlob {
    /// base64 编码的图片内容
    bytes: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CompareFacesOutput {
    face_matches: Option<Vec<CompareFacesMatch>>,
    #[serde(default)]
    unmatched_faces: Vec<ComparedFace>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CompareFacesMatch {
    similarity: Option<f64>,
    face: Option<ComparedFace>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ComparedFace {
    bounding_box: Option<WireBoundingBox>,
    confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireBoundingBox {
    width: Option<f64>,
    height: Option<f64>,
    left: Option<f64>,
    top: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    #[serde(rename = "__type")]
    kind: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

impl WireBoundingBox {
    /// 四个值缺一则丢弃
    fn into_bounding_box(self) -> Option<BoundingBox> {
        Some(BoundingBox { width: self.width?, height: self.height?, left: self.left?, top: self.top? })
    }
}

impl CompareFacesOutput {
    /// 把服务返回的结构校验为固定的匹配列表
    fn into_matches(self) -> Result<Vec<FaceMatch>, CompareError> {
        let Some(face_matches) = self.face_matches else {
            return Err(CompareError::Malformed("missing FaceMatches".to_string()));
        };
        debug!("{} 个匹配，{} 个未匹配人脸", face_matches.len(), self.unmatched_faces.len());

        face_matches
            .into_iter()
            .map(|m| {
                let similarity = m
                    .similarity
                    .ok_or_else(|| CompareError::Malformed("match without Similarity".to_string()))?;
                if !(0.0..=100.0).contains(&similarity) {
                    return Err(CompareError::Malformed(format!(
                        "similarity {similarity} is out of range"
                    )));
                }
                let (bounding_box, confidence) = match m.face {
                    Some(face) => (
                        face.bounding_box.and_then(WireBoundingBox::into_bounding_box),
                        face.confidence,
                    ),
                    None => (None, None),
                };
                Ok(FaceMatch { similarity, bounding_box, confidence })
            })
            .collect()
    }
}

/// 解析服务端错误，`__type` 形如 `com.amazonaws.rekognition#InvalidParameterException`
fn service_error(status: StatusCode, body: &[u8]) -> CompareError {
    let parsed = serde_json::from_slice::<ServiceErrorBody>(body).ok();
    let code = parsed
        .as_ref()
        .and_then(|b| b.kind.as_deref())
        .map(|kind| {
            let kind = kind.rsplit('#').next().unwrap_or(kind);
            kind.split(':').next().unwrap_or(kind).to_string()
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("UnknownError").to_string());
    let message = parsed.and_then(|b| b.message).unwrap_or_else(|| {
        let text = String::from_utf8_lossy(body);
        text.chars().take(200).collect()
    });
    CompareError::Service { status: status.as_u16(), code, message }
}

/// `CompareFaces` 接口的 HTTP 客户端
#[derive(Debug, Clone)]
pub struct RekognitionClient {
    http: reqwest::Client,
    endpoint: Url,
    region: String,
    credentials: Option<Credentials>,
}

impl RekognitionClient {
    pub fn new(
        endpoint: Url,
        region: impl Into<String>,
        credentials: Option<Credentials>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, endpoint, region: region.into(), credentials })
    }

    /// 按命令行参数、环境变量与 `~/.aws` 下的配置文件创建客户端
    pub fn from_options(opts: &RekognitionOptions) -> anyhow::Result<Self> {
        let shared = SharedConfig::load(opts.profile.as_deref())?;
        Self::from_sources(opts, &shared, Credentials::from_env())
    }

    /// 环境变量中的凭证优先于配置文件
    ///
    /// 使用 AWS 官方地址时必须能确定区域与凭证，否则直接报错；
    /// 自定义地址允许不签名。
    pub fn from_sources(
        opts: &RekognitionOptions,
        shared: &SharedConfig,
        env_credentials: Option<Credentials>,
    ) -> anyhow::Result<Self> {
        let region = opts.region().or_else(|| shared.region());
        let credentials = match env_credentials {
            Some(credentials) => {
                debug!("使用环境变量中的 AWS 凭证");
                Some(credentials)
            }
            None => shared.credentials().inspect(|_| {
                info!("使用 profile {} 中的 AWS 凭证", shared.profile());
            }),
        };

        let (endpoint, region) = match (&opts.endpoint, region) {
            (Some(endpoint), region) => {
                (Url::parse(endpoint)?, region.unwrap_or_else(|| FALLBACK_REGION.to_string()))
            }
            (None, Some(region)) => {
                if credentials.is_none() {
                    bail!(
                        "未找到 AWS 凭证（profile {}），请设置 AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY 或 ~/.aws/credentials",
                        shared.profile()
                    );
                }
                (Url::parse(&format!("https://{SERVICE}.{region}.amazonaws.com/"))?, region)
            }
            (None, None) => bail!(
                "未配置 AWS 区域（profile {}），请使用 --region、AWS_REGION 或在 ~/.aws/config 中设置 region",
                shared.profile()
            ),
        };
        if credentials.is_none() {
            warn!("未找到 AWS 凭证，发往 {} 的请求将不会被签名", endpoint);
        }
        Self::new(endpoint, region, credentials, Duration::from_secs(opts.timeout))
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn is_signed(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn host(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    async fn send(&self, body: Vec<u8>) -> Result<(StatusCode, Vec<u8>), CompareError> {
        let mut builder = self
            .http
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
            .header("X-Amz-Target", TARGET);

        if let Some(credentials) = &self.credentials {
            let now = Utc::now();
            let host = self.host();
            let date = amz_date(now);
            let mut headers = vec![
                ("content-type", CONTENT_TYPE_JSON),
                ("host", host.as_str()),
                ("x-amz-date", date.as_str()),
                ("x-amz-target", TARGET),
            ];
            if let Some(token) = &credentials.session_token {
                headers.push(("x-amz-security-token", token.as_str()));
                builder = builder.header("X-Amz-Security-Token", token);
            }
            let signer = Signer { credentials, region: &self.region, service: SERVICE };
            let authorization = signer.authorization(
                &SigningRequest {
                    method: "POST",
                    path: self.endpoint.path(),
                    query: self.endpoint.query().unwrap_or_default(),
                    headers: &headers,
                    payload: &body,
                },
                now,
            );
            builder = builder.header("X-Amz-Date", &date).header(AUTHORIZATION, authorization);
        }

        let response = builder.body(body).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        Ok((status, bytes.to_vec()))
    }
}

impl FaceComparator for RekognitionClient {
    async fn compare_faces(
        &self,
        request: &ComparisonRequest<'_>,
    ) -> Result<Vec<FaceMatch>, CompareError> {
        let input = CompareFacesInput {
            source_image: ImageBlob { bytes: STANDARD.encode(request.source.bytes()) },
            target_image: ImageBlob { bytes: STANDARD.encode(request.target.bytes()) },
            similarity_threshold: request.similarity_threshold,
        };
        let body = serde_json::to_vec(&input)?;

        debug!("请求 {} ({} bytes)", self.endpoint, body.len());
        let (status, bytes) = self.send(body).await?;

        if !status.is_success() {
            let err = service_error(status, &bytes);
            error!("比对服务返回错误 {}: {}", status, err);
            return Err(err);
        }

        serde_json::from_slice::<CompareFacesOutput>(&bytes)
            .map_err(|e| CompareError::Malformed(e.to_string()))?
            .into_matches()
    }
}
