//! 模型文件读写: 按扩展名在 JSON 与 RON 之间选择格式.
use std::fs;
use std::path::Path;

use ron::ser::PrettyConfig;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::net::core::Net;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ron error: {0}")]
    Ron(#[from] ron::Error),
    #[error("ron syntax error: {0}")]
    RonSyntax(#[from] ron::error::SpannedError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported model format `{0}`, expected .json or .ron")]
    UnknownFormat(String),
    #[error("net matrices do not match its place/transition counts")]
    Malformed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Ron,
}

impl Format {
    pub fn from_path(path: &Path) -> Result<Self, IoError> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "json" => Ok(Format::Json),
            "ron" => Ok(Format::Ron),
            _ => Err(IoError::UnknownFormat(ext)),
        }
    }
}

pub fn to_string<T: Serialize>(value: &T, format: Format) -> Result<String, IoError> {
    match format {
        Format::Json => Ok(serde_json::to_string_pretty(value)?),
        Format::Ron => {
            let pretty = PrettyConfig::default().new_line("\n".to_string());
            Ok(ron::ser::to_string_pretty(value, pretty)?)
        }
    }
}

pub fn from_str<T: DeserializeOwned>(content: &str, format: Format) -> Result<T, IoError> {
    match format {
        Format::Json => Ok(serde_json::from_str(content)?),
        Format::Ron => Ok(ron::from_str(content)?),
    }
}

pub fn read_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, IoError> {
    let path = path.as_ref();
    let format = Format::from_path(path)?;
    let content = fs::read_to_string(path)?;
    from_str(&content, format)
}

pub fn write_file<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<(), IoError> {
    let path = path.as_ref();
    let format = Format::from_path(path)?;
    fs::write(path, to_string(value, format)?)?;
    Ok(())
}

/// 读取网并校验矩阵维度.
pub fn read_net(path: impl AsRef<Path>) -> Result<Net, IoError> {
    let net: Net = read_file(path)?;
    if !net.is_well_formed() {
        return Err(IoError::Malformed);
    }
    Ok(net)
}
