//! # Error 模块
//!
//! 定义 scene-miner 中使用的错误类型。
//!
//! 场景内容本身的问题（JSON 损坏、找不到台词等）不会成为错误，
//! 而是降级为回退策略、诊断条目或计数器。这里只有配置层面的错误。

use std::path::PathBuf;

use thiserror::Error;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件读取失败
    #[error("配置文件 {path:?} 读取失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 配置文件解析失败
    #[error("配置解析失败: {0}")]
    Parse(#[from] serde_json::Error),

    /// 配置项取值无效
    #[error("配置验证失败: {0}")]
    Validation(String),
}

/// Result 类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
