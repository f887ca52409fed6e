#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use serde_json::Value;
use tokio::net::TcpListener;

pub const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
pub const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00];

pub const ONE_MATCH: &str = r#"{
    "SourceImageFace": {"BoundingBox": {"Width": 0.5, "Height": 0.5, "Left": 0.2, "Top": 0.2}, "Confidence": 99.9},
    "FaceMatches": [{
        "Similarity": 97.5,
        "Face": {"BoundingBox": {"Width": 0.3, "Height": 0.4, "Left": 0.1, "Top": 0.2}, "Confidence": 99.7}
    }],
    "UnmatchedFaces": []
}"#;

pub const NO_MATCH: &str = r#"{"FaceMatches": [], "UnmatchedFaces": [{"Confidence": 99.1}]}"#;

pub const INVALID_PARAMETER: &str = r#"{
    "__type": "com.amazonaws.rekognition#InvalidParameterException",
    "Message": "Request has invalid parameters"
}"#;

/// 模拟 CompareFaces 接口，返回固定响应并记录收到的请求
pub struct FakeRekognition {
    status: StatusCode,
    body: &'static str,
    calls: AtomicUsize,
    last_body: Mutex<Option<Value>>,
    last_headers: Mutex<Option<HeaderMap>>,
}

impl FakeRekognition {
    pub fn new(status: StatusCode, body: &'static str) -> Arc<Self> {
        Arc::new(Self {
            status,
            body,
            calls: AtomicUsize::new(0),
            last_body: Mutex::new(None),
            last_headers: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_body(&self) -> Option<Value> {
        self.last_body.lock().unwrap().clone()
    }

    pub fn last_headers(&self) -> Option<HeaderMap> {
        self.last_headers.lock().unwrap().clone()
    }

    pub fn router(self: &Arc<Self>) -> Router {
        Router::new().route("/", post(handle)).with_state(self.clone())
    }
}

async fn handle(
    State(fake): State<Arc<FakeRekognition>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, [(&'static str, &'static str); 1], &'static str) {
    fake.calls.fetch_add(1, Ordering::SeqCst);
    *fake.last_body.lock().unwrap() = serde_json::from_slice(&body).ok();
    *fake.last_headers.lock().unwrap() = Some(headers);
    (fake.status, [("content-type", "application/x-amz-json-1.1")], fake.body)
}

/// 在当前运行时中启动服务，返回监听地址
pub async fn spawn(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    addr
}

/// 在独立线程的运行时中启动服务，供阻塞的命令行测试使用
pub fn spawn_in_thread(app: Router) -> SocketAddr {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });
    rx.recv().unwrap()
}

/// 返回一个当前没有服务监听的地址
pub fn closed_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}
