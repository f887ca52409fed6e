use clap::{Parser, Subcommand};

use crate::cli::*;
use crate::workflow::DEFAULT_SIMILARITY_THRESHOLD;

#[derive(Parser, Debug, Clone)]
pub struct RekognitionOptions {
    /// AWS 区域，未指定时依次读取 AWS_REGION、AWS_DEFAULT_REGION 与 ~/.aws/config
    #[arg(long, value_name = "REGION", env = "AWS_REGION")]
    pub region: Option<String>,
    /// ~/.aws/credentials 与 ~/.aws/config 中使用的 profile
    #[arg(long, value_name = "NAME", env = "AWS_PROFILE")]
    pub profile: Option<String>,
    /// 比对服务地址，默认为该区域的 Rekognition 地址
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,
    /// 相似度阈值，低于该值的人脸不会被报告为匹配
    #[arg(long, value_name = "PERCENT", default_value_t = DEFAULT_SIMILARITY_THRESHOLD, value_parser = parse_threshold)]
    pub similarity_threshold: f32,
    /// 请求超时时间，单位为秒
    #[arg(long, value_name = "SECONDS", default_value_t = 30)]
    pub timeout: u64,
}

impl RekognitionOptions {
    /// 命令行或环境变量中的区域，配置文件中的区域由调用方再行查找
    pub fn region(&self) -> Option<String> {
        self.region
            .clone()
            .filter(|r| !r.is_empty())
            .or_else(|| std::env::var("AWS_DEFAULT_REGION").ok())
            .filter(|r| !r.is_empty())
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "facecheck", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 启动图片上传比对的 HTTP 服务
    Server(ServerCommand),
    /// 在命令行比对两张图片
    Compare(CompareCommand),
}

fn parse_threshold(s: &str) -> anyhow::Result<f32> {
    let value: f32 = s.parse()?;
    if !(0.0..=100.0).contains(&value) {
        return Err(anyhow::anyhow!("阈值必须在 0 到 100 之间: {}", s));
    }
    Ok(value)
}
