//! rat_quickmongo - MongoDB便捷封装
//!
//! 单一对象懒连接数据库、确保配置的集合存在，并提供以关联令牌为键、
//! 经单次通道投递结果的异步CRUD操作，支持即发即弃模式

pub mod client;
pub mod dispatcher;
pub mod error;
pub mod session;
pub mod types;

pub use client::QuickMongo;
pub use dispatcher::{CrudReceiver, RequestToken, TokenDispatcher};
pub use error::{QuickMongoError, QuickMongoResult};
pub use session::{MongoSession, ReadyState, SessionBackend, SessionWorker};
pub use types::*;

// 条件编译调试宏 - 只有在 debug 模式下才输出调试信息
#[cfg(debug_assertions)]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        rat_logger::debug!($($arg)*);
    };
}

#[cfg(not(debug_assertions))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        // 在 release 模式下不输出调试信息
    };
}

/// 库版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 库名称
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// 获取库信息
pub fn get_info() -> String {
    format!("{} v{}", NAME, VERSION)
}
