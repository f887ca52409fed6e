//! AWS 共享配置文件：`~/.aws/credentials` 与 `~/.aws/config`
//!
//! 路径可以用 `AWS_SHARED_CREDENTIALS_FILE` / `AWS_CONFIG_FILE` 覆盖，
//! 使用的 profile 由 `--profile` 或 `AWS_PROFILE` 指定，默认为 `default`。

use std::path::{Path, PathBuf};

use anyhow::Context;
use directories::BaseDirs;
use ini::{Ini, Properties};
use log::debug;

use crate::sigv4::Credentials;

pub const DEFAULT_PROFILE: &str = "default";

#[derive(Debug, Default)]
pub struct SharedConfig {
    profile: String,
    credentials: Option<Ini>,
    config: Option<Ini>,
}

fn default_path(env: &str, file: &str) -> Option<PathBuf> {
    match std::env::var_os(env).filter(|v| !v.is_empty()) {
        Some(path) => Some(PathBuf::from(path)),
        None => BaseDirs::new().map(|dirs| dirs.home_dir().join(".aws").join(file)),
    }
}

/// 文件不存在时视为空配置，格式错误时报错
fn load_file(path: Option<&Path>) -> anyhow::Result<Option<Ini>> {
    let Some(path) = path.filter(|p| p.is_file()) else {
        return Ok(None);
    };
    debug!("读取 AWS 配置文件：{}", path.display());
    let ini =
        Ini::load_from_file(path).with_context(|| format!("无法解析 {}", path.display()))?;
    Ok(Some(ini))
}

impl SharedConfig {
    /// 按标准位置读取配置文件
    pub fn load(profile: Option<&str>) -> anyhow::Result<Self> {
        let credentials = default_path("AWS_SHARED_CREDENTIALS_FILE", "credentials");
        let config = default_path("AWS_CONFIG_FILE", "config");
        Self::from_files(credentials.as_deref(), config.as_deref(), profile)
    }

    pub fn from_files(
        credentials: Option<&Path>,
        config: Option<&Path>,
        profile: Option<&str>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            profile: profile.filter(|p| !p.is_empty()).unwrap_or(DEFAULT_PROFILE).to_string(),
            credentials: load_file(credentials)?,
            config: load_file(config)?,
        })
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// credentials 文件中的节名就是 profile 名
    fn credentials_section(&self) -> Option<&Properties> {
        self.credentials.as_ref()?.section(Some(self.profile.as_str()))
    }

    /// config 文件中除 `default` 外的节名带有 `profile ` 前缀
    fn config_section(&self) -> Option<&Properties> {
        let config = self.config.as_ref()?;
        if self.profile == DEFAULT_PROFILE {
            config.section(Some(DEFAULT_PROFILE))
        } else {
            config.section(Some(format!("profile {}", self.profile)))
        }
    }

    /// 先查 credentials 文件，再查 config 文件
    pub fn credentials(&self) -> Option<Credentials> {
        [self.credentials_section(), self.config_section()]
            .into_iter()
            .flatten()
            .find_map(read_credentials)
    }

    pub fn region(&self) -> Option<String> {
        let region = self.config_section()?.get("region")?.trim();
        (!region.is_empty()).then(|| region.to_string())
    }
}

fn read_credentials(section: &Properties) -> Option<Credentials> {
    let value = |key: &str| {
        let value = section.get(key)?.trim();
        (!value.is_empty()).then(|| value.to_string())
    };
    Some(Credentials {
        access_key_id: value("aws_access_key_id")?,
        secret_access_key: value("aws_secret_access_key")?,
        session_token: value("aws_session_token"),
    })
}
