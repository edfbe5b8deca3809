//! 会话后端
//!
//! 对MongoDB驱动能力的最小抽象（集合列表/创建、查询、插入、更新、删除），
//! 以及基于 mongodb 驱动的默认实现

mod worker;

pub use worker::SessionWorker;

use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use mongodb::options::FindOptions;
use rat_logger::debug;

use crate::error::{QuickMongoError, QuickMongoResult};
use crate::types::MongoConfig;

/// 连接就绪状态（一次性敲定）
#[derive(Debug, Clone, PartialEq)]
pub enum ReadyState {
    /// 连接引导进行中
    Connecting,
    /// 会话句柄可用，集合引导已完成
    Ready,
    /// 连接引导失败（致命，无重试）
    Failed(String),
}

/// 会话后端能力
///
/// 工作器只依赖这组驱动能力；测试可注入模拟实现
#[async_trait]
pub trait SessionBackend: Send + Sync + 'static {
    /// 列出数据库中现有集合名
    async fn list_collections(&self) -> QuickMongoResult<Vec<String>>;

    /// 创建集合（已存在不视为错误）
    async fn create_collection(&self, name: &str) -> QuickMongoResult<()>;

    /// 按条件查询，返回全部命中文档
    async fn find(
        &self,
        collection: &str,
        query: Document,
        sort: Document,
    ) -> QuickMongoResult<Vec<Document>>;

    /// 插入单条记录，返回生成的ID
    async fn insert_one(&self, collection: &str, record: Document) -> QuickMongoResult<Bson>;

    /// 批量插入，返回按输入顺序排列的ID列表
    async fn insert_many(
        &self,
        collection: &str,
        records: Vec<Document>,
    ) -> QuickMongoResult<Vec<Bson>>;

    /// 按条件更新，返回实际修改的记录数
    async fn update(
        &self,
        collection: &str,
        query: Document,
        update: Document,
        many: bool,
    ) -> QuickMongoResult<u64>;

    /// 按条件删除，返回删除的记录数
    async fn delete(
        &self,
        collection: &str,
        query: Document,
        many: bool,
    ) -> QuickMongoResult<u64>;
}

/// 基于 mongodb 驱动的会话实现
pub struct MongoSession {
    db: mongodb::Database,
}

impl MongoSession {
    /// 建立到配置端点的连接并选择数据库
    ///
    /// 连接失败向上传播，由调用方按致命错误处理——无重试策略
    pub async fn connect(config: &MongoConfig) -> QuickMongoResult<Self> {
        let connection_uri = config.connection_uri();
        debug!("MongoDB连接URI: {}", connection_uri);

        let client = mongodb::Client::with_uri_str(&connection_uri)
            .await
            .map_err(|e| QuickMongoError::ConnectionError {
                message: format!("MongoDB连接失败: {}", e),
            })?;

        Ok(Self {
            db: client.database(&config.database),
        })
    }
}

#[async_trait]
impl SessionBackend for MongoSession {
    async fn list_collections(&self) -> QuickMongoResult<Vec<String>> {
        self.db
            .list_collection_names(None)
            .await
            .map_err(|e| QuickMongoError::QueryError {
                message: format!("查询MongoDB集合列表失败: {}", e),
            })
    }

    async fn create_collection(&self, name: &str) -> QuickMongoResult<()> {
        debug!("创建MongoDB集合: {}", name);
        match self.db.create_collection(name, None).await {
            Ok(_) => Ok(()),
            Err(e) => {
                // 并发创建时集合可能已经存在，忽略该错误
                if e.to_string().contains("already exists") {
                    Ok(())
                } else {
                    Err(QuickMongoError::QueryError {
                        message: format!("创建MongoDB集合失败: {}", e),
                    })
                }
            }
        }
    }

    async fn find(
        &self,
        collection: &str,
        query: Document,
        sort: Document,
    ) -> QuickMongoResult<Vec<Document>> {
        let mut find_options = FindOptions::default();
        if !sort.is_empty() {
            find_options.sort = Some(sort);
        }

        debug!("执行MongoDB查询: 集合={}, 条件={:?}", collection, query);

        let mut cursor = self
            .db
            .collection::<Document>(collection)
            .find(query, find_options)
            .await
            .map_err(|e| QuickMongoError::QueryError {
                message: format!("MongoDB查询失败: {}", e),
            })?;

        let mut results = Vec::new();
        while cursor.advance().await.map_err(|e| QuickMongoError::QueryError {
            message: format!("MongoDB游标遍历失败: {}", e),
        })? {
            let document =
                cursor
                    .deserialize_current()
                    .map_err(|e| QuickMongoError::QueryError {
                        message: format!("MongoDB文档反序列化失败: {}", e),
                    })?;
            results.push(document);
        }

        Ok(results)
    }

    async fn insert_one(&self, collection: &str, record: Document) -> QuickMongoResult<Bson> {
        debug!("执行MongoDB单条插入: 集合={}", collection);

        let result = self
            .db
            .collection::<Document>(collection)
            .insert_one(record, None)
            .await
            .map_err(|e| QuickMongoError::QueryError {
                message: format!("MongoDB插入失败: {}", e),
            })?;

        Ok(result.inserted_id)
    }

    async fn insert_many(
        &self,
        collection: &str,
        records: Vec<Document>,
    ) -> QuickMongoResult<Vec<Bson>> {
        debug!(
            "执行MongoDB批量插入: 集合={}, 记录数={}",
            collection,
            records.len()
        );

        let result = self
            .db
            .collection::<Document>(collection)
            .insert_many(records, None)
            .await
            .map_err(|e| QuickMongoError::QueryError {
                message: format!("MongoDB批量插入失败: {}", e),
            })?;

        // inserted_ids 以下标为键，恢复为输入顺序
        let mut indexed: Vec<(usize, Bson)> = result.inserted_ids.into_iter().collect();
        indexed.sort_by_key(|(index, _)| *index);
        Ok(indexed.into_iter().map(|(_, id)| id).collect())
    }

    async fn update(
        &self,
        collection: &str,
        query: Document,
        update: Document,
        many: bool,
    ) -> QuickMongoResult<u64> {
        debug!(
            "执行MongoDB更新: 集合={}, 条件={:?}, 多条={}",
            collection, query, many
        );

        let handle = self.db.collection::<Document>(collection);
        let result = if many {
            handle.update_many(query, update, None).await
        } else {
            handle.update_one(query, update, None).await
        }
        .map_err(|e| QuickMongoError::QueryError {
            message: format!("MongoDB更新失败: {}", e),
        })?;

        Ok(result.modified_count)
    }

    async fn delete(
        &self,
        collection: &str,
        query: Document,
        many: bool,
    ) -> QuickMongoResult<u64> {
        debug!(
            "执行MongoDB删除: 集合={}, 条件={:?}, 多条={}",
            collection, query, many
        );

        let handle = self.db.collection::<Document>(collection);
        let result = if many {
            handle.delete_many(query, None).await
        } else {
            handle.delete_one(query, None).await
        }
        .map_err(|e| QuickMongoError::QueryError {
            message: format!("MongoDB删除失败: {}", e),
        })?;

        Ok(result.deleted_count)
    }
}
