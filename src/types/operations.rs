//! 操作请求与归一化
//!
//! 定义入队的操作消息、查询/写入选项及其归一化规则

use mongodb::bson::{doc, oid::ObjectId, Bson, Document};

use crate::dispatcher::RequestToken;
use crate::error::QuickMongoResult;
use crate::mongo_error;

/// 查询规格：查询条件与排序，缺省均为空文档
#[derive(Debug, Clone, Default)]
pub struct QuerySpec {
    /// 查询条件文档（空表示全量）
    pub query: Document,
    /// 排序文档（空表示不排序）
    pub sort: Document,
}

impl QuerySpec {
    /// 创建空的查询规格
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置查询条件
    pub fn with_query(mut self, query: Document) -> Self {
        self.query = query;
        self
    }

    /// 设置排序
    pub fn with_sort(mut self, sort: Document) -> Self {
        self.sort = sort;
        self
    }

    /// 归一化：查询条件中的 `_id` 字符串提升为 ObjectId
    pub fn normalized(mut self) -> Self {
        self.query = normalize_id_field(self.query);
        self
    }
}

/// 写操作选项：查询条件与单条/多条模式，缺省单条
#[derive(Debug, Clone, Default)]
pub struct MutateOptions {
    /// 匹配条件文档
    pub query: Document,
    /// 是否作用于全部匹配记录（默认仅第一条）
    pub many: bool,
}

impl MutateOptions {
    /// 创建默认写选项（空条件、单条模式）
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置匹配条件
    pub fn with_query(mut self, query: Document) -> Self {
        self.query = query;
        self
    }

    /// 设置多条模式
    pub fn many(mut self, many: bool) -> Self {
        self.many = many;
        self
    }

    /// 归一化：匹配条件中的 `_id` 字符串提升为 ObjectId
    pub fn normalized(mut self) -> Self {
        self.query = normalize_id_field(self.query);
        self
    }
}

/// 创建操作的输入：单条记录或记录序列
#[derive(Debug, Clone)]
pub enum RecordInput {
    /// 单条记录，执行单文档插入
    One(Document),
    /// 记录序列，执行批量插入
    Many(Vec<Document>),
}

impl From<Document> for RecordInput {
    fn from(record: Document) -> Self {
        Self::One(record)
    }
}

impl From<Vec<Document>> for RecordInput {
    fn from(records: Vec<Document>) -> Self {
        Self::Many(records)
    }
}

/// CRUD 结果
#[derive(Debug)]
pub enum CrudResponse {
    /// 查询命中的文档列表
    Found(Vec<Document>),
    /// 插入生成的ID列表（单条插入时恰好一个）
    Created(Vec<Bson>),
    /// 更新影响的记录数
    Updated(u64),
    /// 删除的记录数
    Deleted(u64),
    /// 目标集合不存在（正常结果，不是错误）
    MissingCollection,
}

/// CRUD 结果别名：驱动错误以 Err 形式经令牌通道投递
pub type CrudResult = QuickMongoResult<CrudResponse>;

/// 入队的操作消息，携带关联令牌
#[derive(Debug)]
pub enum MongoOperation {
    /// 查询数据
    Get {
        /// 目标集合
        collection: String,
        /// 查询规格
        spec: QuerySpec,
        /// 关联令牌
        token: RequestToken,
    },
    /// 创建数据（按输入形态分单条/批量）
    Create {
        /// 目标集合
        collection: String,
        /// 记录输入
        records: RecordInput,
        /// 关联令牌
        token: RequestToken,
    },
    /// 更新数据
    Update {
        /// 目标集合
        collection: String,
        /// 更新载荷（`_id` 会在归一化时剔除）
        record: Document,
        /// 写选项
        options: MutateOptions,
        /// 关联令牌
        token: RequestToken,
    },
    /// 删除数据
    Delete {
        /// 目标集合
        collection: String,
        /// 写选项
        options: MutateOptions,
        /// 关联令牌
        token: RequestToken,
    },
}

impl MongoOperation {
    /// 获取操作的关联令牌
    pub fn token(&self) -> RequestToken {
        match self {
            MongoOperation::Get { token, .. }
            | MongoOperation::Create { token, .. }
            | MongoOperation::Update { token, .. }
            | MongoOperation::Delete { token, .. } => *token,
        }
    }

    /// 获取操作的目标集合名
    pub fn collection(&self) -> &str {
        match self {
            MongoOperation::Get { collection, .. }
            | MongoOperation::Create { collection, .. }
            | MongoOperation::Update { collection, .. }
            | MongoOperation::Delete { collection, .. } => collection,
        }
    }
}

/// 将查询条件中的 `_id` 字符串提升为驱动原生的 ObjectId
///
/// 兼容 `ObjectId("xxx")` 包装格式；无法解析时保持原字符串
pub fn normalize_id_field(mut query: Document) -> Document {
    let coerced = match query.get("_id") {
        Some(Bson::String(id_str)) => {
            let raw = id_str
                .strip_prefix("ObjectId(\"")
                .and_then(|s| s.strip_suffix("\")"))
                .unwrap_or(id_str.as_str());
            ObjectId::parse_str(raw).ok()
        }
        _ => None,
    };
    if let Some(object_id) = coerced {
        query.insert("_id", object_id);
    }
    query
}

/// 构建更新文档：剔除 `_id` 后包装为 `$set`
pub fn build_update_document(record: &Document) -> Document {
    let mut set_doc = Document::new();
    for (key, value) in record {
        if key != "_id" {
            // MongoDB的_id字段不能更新
            set_doc.insert(key, value.clone());
        }
    }
    doc! { "$set": set_doc }
}

/// 从JSON字符串解析BSON文档，便于直接使用JSON编写查询条件
pub fn document_from_json(json: &str) -> QuickMongoResult<Document> {
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| mongo_error!(serialization, format!("JSON解析失败: {}", e)))?;
    mongodb::bson::to_document(&value)
        .map_err(|e| mongo_error!(serialization, format!("JSON转换为BSON失败: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_hex_id() {
        let query = doc! { "_id": "65f0aabbccddeeff00112233" };
        let normalized = normalize_id_field(query);
        assert!(matches!(normalized.get("_id"), Some(Bson::ObjectId(_))));
    }

    #[test]
    fn test_normalize_wrapped_object_id() {
        let query = doc! { "_id": "ObjectId(\"65f0aabbccddeeff00112233\")" };
        let normalized = normalize_id_field(query);
        let oid = match normalized.get("_id") {
            Some(Bson::ObjectId(oid)) => oid,
            other => panic!("期望ObjectId，实际: {:?}", other),
        };
        assert_eq!(oid.to_hex(), "65f0aabbccddeeff00112233");
    }

    #[test]
    fn test_normalize_keeps_non_hex_string() {
        let query = doc! { "_id": "custom-key-1" };
        let normalized = normalize_id_field(query);
        assert_eq!(
            normalized.get("_id"),
            Some(&Bson::String("custom-key-1".to_string()))
        );
    }

    #[test]
    fn test_normalize_without_id_field() {
        let query = doc! { "name": "Alice" };
        let normalized = normalize_id_field(query.clone());
        assert_eq!(normalized, query);
    }

    #[test]
    fn test_build_update_document_strips_id() {
        let record = doc! { "name": "Alice", "_id": "65f0aabbccddeeff00112233", "age": 30 };
        let update = build_update_document(&record);
        let set_doc = update.get_document("$set").unwrap();
        assert!(set_doc.get("_id").is_none());
        assert_eq!(set_doc.get_str("name").unwrap(), "Alice");
        assert_eq!(set_doc.get_i32("age").unwrap(), 30);
    }

    #[test]
    fn test_document_from_json() {
        let document = document_from_json(r#"{"status": "active", "age": {"$gte": 18}}"#).unwrap();
        assert_eq!(document.get_str("status").unwrap(), "active");
        assert_eq!(
            document.get_document("age").unwrap().get_i64("$gte").unwrap(),
            18
        );
    }

    #[test]
    fn test_document_from_json_invalid() {
        let result = document_from_json("not json");
        assert!(matches!(
            result,
            Err(crate::error::QuickMongoError::SerializationError { .. })
        ));
    }

    #[test]
    fn test_record_input_from_impls() {
        assert!(matches!(
            RecordInput::from(doc! { "a": 1 }),
            RecordInput::One(_)
        ));
        assert!(matches!(
            RecordInput::from(vec![doc! { "a": 1 }, doc! { "b": 2 }]),
            RecordInput::Many(records) if records.len() == 2
        ));
    }
}
