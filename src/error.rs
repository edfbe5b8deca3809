//! 错误类型定义
//!
//! 提供统一的错误枚举与Result别名，以及简写宏

use thiserror::Error;

/// 统一Result别名
pub type QuickMongoResult<T> = Result<T, QuickMongoError>;

/// rat_quickmongo 错误类型
#[derive(Debug, Error)]
pub enum QuickMongoError {
    /// 连接相关错误（引导失败、工作器退出等）
    #[error("连接错误: {message}")]
    ConnectionError {
        /// 错误消息
        message: String,
    },
    /// 配置相关错误
    #[error("配置错误: {message}")]
    ConfigError {
        /// 错误消息
        message: String,
    },
    /// 查询/写入执行错误
    #[error("查询错误: {message}")]
    QueryError {
        /// 错误消息
        message: String,
    },
    /// 序列化/反序列化错误
    #[error("序列化错误: {message}")]
    SerializationError {
        /// 错误消息
        message: String,
    },
}

/// 错误构造简写宏
///
/// 用法：`mongo_error!(connection, format!("连接失败: {}", e))`
#[macro_export]
macro_rules! mongo_error {
    (connection, $msg:expr) => {
        $crate::error::QuickMongoError::ConnectionError {
            message: $msg.to_string(),
        }
    };
    (config, $msg:expr) => {
        $crate::error::QuickMongoError::ConfigError {
            message: $msg.to_string(),
        }
    };
    (query, $msg:expr) => {
        $crate::error::QuickMongoError::QueryError {
            message: $msg.to_string(),
        }
    };
    (serialization, $msg:expr) => {
        $crate::error::QuickMongoError::SerializationError {
            message: $msg.to_string(),
        }
    };
}
