use clap::Parser;
use log::{error, info};
use prometheus::{BasicAuthentication, labels};
use tokio::net::TcpListener;
use tokio::task::spawn_blocking;
use tokio::time::{Duration, sleep};

use crate::cli::SubCommandExtend;
use crate::config::RekognitionOptions;
use crate::{Opts, RekognitionClient, server};

#[derive(Parser, Debug, Clone)]
pub struct ServerCommand {
    #[command(flatten)]
    pub rekognition: RekognitionOptions,
    /// 监听地址
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub addr: String,
    /// prometheus 主动推送地址
    #[arg(long, value_name = "URL")]
    pub prometheus_push: Option<String>,
    /// 自定义 instance 标签值
    #[arg(long, value_name = "NAME")]
    pub prometheus_instance: Option<String>,
    /// prometheus 认证信息，格式为 username:password
    #[arg(long, value_name = "AUTH", value_parser = parse_auth)]
    pub prometheus_auth: Option<(String, String)>,
}

impl SubCommandExtend for ServerCommand {
    async fn run(&self, _opts: &Opts) -> anyhow::Result<()> {
        let client = RekognitionClient::from_options(&self.rekognition)?;
        info!(
            "比对服务：{}（区域 {}，{}），相似度阈值：{}",
            client.endpoint(),
            client.region(),
            if client.is_signed() { "已签名" } else { "未签名" },
            self.rekognition.similarity_threshold
        );

        // 创建应用状态
        let state = server::AppState::new(client, self.rekognition.similarity_threshold);

        // 创建应用
        let app = server::create_app(state);

        if let Some(url) = self.prometheus_push.clone() {
            let instance = self.prometheus_instance.clone().unwrap_or_else(|| self.addr.clone());
            let auth = self.prometheus_auth.clone();
            tokio::spawn(async move {
                loop {
                    let metric_families = prometheus::gather();
                    let url = url.clone();
                    let instance = instance.clone();
                    let auth = auth.clone();
                    let r = spawn_blocking(move || {
                        prometheus::push_metrics(
                            "facecheck",
                            labels! {
                                "instance".to_string() => instance,
                            },
                            &url,
                            metric_families,
                            auth.map(|(username, password)| BasicAuthentication {
                                username,
                                password,
                            }),
                        )
                    })
                    .await;
                    match r {
                        Ok(Err(e)) => error!("推送指标失败: {e}"),
                        Err(e) => error!("推送任务异常退出: {e}"),
                        Ok(Ok(())) => {}
                    }
                    sleep(Duration::from_secs(30)).await;
                }
            });
        }

        // 启动服务器
        info!("服务器启动：http://{}", &self.addr);
        let listener = TcpListener::bind(&self.addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

fn parse_auth(s: &str) -> anyhow::Result<(String, String)> {
    let (username, password) =
        s.split_once(':').ok_or_else(|| anyhow::anyhow!("认证信息格式应为 username:password"))?;
    Ok((username.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_auth() {
        assert_eq!(parse_auth("user:p:w").unwrap(), ("user".to_string(), "p:w".to_string()));
        assert!(parse_auth("nopassword").is_err());
    }
}
