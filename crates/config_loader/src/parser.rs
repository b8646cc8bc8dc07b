//! 配置解析模块
//!
//! `.toml` 为主要格式，`.json` 用于由其他工具生成的配置。格式只由扩展名决定。

use std::path::Path;

use contracts::{ContractError, PreparationConfig};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式 (不区分大小写)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// 从配置文件路径推断格式
    pub fn from_path(path: &Path) -> Result<Self, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse(format!(
                "cannot determine config format of '{}': no extension",
                path.display()
            ))
        })?;

        Self::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!(
                "unsupported config format: .{ext} (expected .toml or .json)"
            ))
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
        }
    }

    /// 解析为 `PreparationConfig`，缺省字段取默认值
    pub fn parse(self, content: &str) -> Result<PreparationConfig, ContractError> {
        let parsed = match self {
            Self::Toml => toml::from_str(content).map_err(|e| {
                let message = e.to_string().trim_end().to_string();
                (message, Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
            }),
            Self::Json => serde_json::from_str(content).map_err(|e| {
                let message = format!("{e}");
                (message, Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
            }),
        };

        parsed.map_err(|(message, source)| ContractError::ConfigParse {
            message: format!("{} parse error: {message}", self.name()),
            source: Some(source),
        })
    }
}
