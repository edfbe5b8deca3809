//! 类型定义
//!
//! 连接配置、操作消息与CRUD结果类型

pub mod config;
pub mod operations;

pub use config::{MongoConfig, MongoConnectionBuilder};
pub use operations::{
    build_update_document, document_from_json, normalize_id_field, CrudResponse, CrudResult, MongoOperation,
    MutateOptions, QuerySpec, RecordInput,
};
