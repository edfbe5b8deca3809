//! QuickMongo 门面
//!
//! 单一对象：打开后懒连接数据库并引导集合，对外暴露四个CRUD入口、
//! 令牌签发与订阅。每个CRUD调用同步返回关联令牌，结果经订阅通道投递。

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use mongodb::bson::Document;
use rat_logger::{info, warn};
use tokio::sync::{mpsc, watch};

use crate::dispatcher::{CrudReceiver, RequestToken, TokenDispatcher};
use crate::error::{QuickMongoError, QuickMongoResult};
use crate::session::{MongoSession, ReadyState, SessionBackend, SessionWorker};
use crate::types::{MongoConfig, MongoOperation, MutateOptions, QuerySpec, RecordInput};

/// MongoDB 便捷包装器
pub struct QuickMongo {
    /// 操作发送器
    operation_sender: mpsc::UnboundedSender<MongoOperation>,
    /// 关联令牌调度器
    dispatcher: Arc<TokenDispatcher>,
    /// 就绪信号接收端
    ready_receiver: watch::Receiver<ReadyState>,
    /// 后台工作器句柄（用于优雅关闭）
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl QuickMongo {
    /// 打开包装器：立即返回，连接与集合引导在后台完成
    ///
    /// 连接完成前发起的操作停留在队列中，连接完成后按原始参数执行；
    /// 引导失败经 `ready()` 与各令牌的错误结果暴露
    pub fn open(config: MongoConfig) -> Self {
        info!(
            "打开QuickMongo: 数据库={}, 引导集合数={}",
            config.database,
            config.collections.len()
        );
        let collections = config.collections.clone();
        Self::with_backend(collections, async move { MongoSession::connect(&config).await })
    }

    /// 使用注入的后端引导future启动包装器
    ///
    /// 测试和自定义后端使用此入口；`open` 基于它接入 mongodb 驱动
    pub fn with_backend<B, F>(collections: Vec<String>, bootstrap: F) -> Self
    where
        B: SessionBackend,
        F: Future<Output = QuickMongoResult<B>> + Send + 'static,
    {
        let (operation_sender, operation_receiver) = mpsc::unbounded_channel();
        let (ready_sender, ready_receiver) = watch::channel(ReadyState::Connecting);
        let dispatcher = Arc::new(TokenDispatcher::new());

        let worker = SessionWorker {
            operation_receiver,
            collections,
            dispatcher: dispatcher.clone(),
            ready_sender,
        };

        let task_handle = tokio::spawn(worker.run(bootstrap.boxed()));

        Self {
            operation_sender,
            dispatcher,
            ready_receiver,
            task_handle: Some(task_handle),
        }
    }

    /// 会话句柄是否已就绪
    pub fn is_ready(&self) -> bool {
        matches!(*self.ready_receiver.borrow(), ReadyState::Ready)
    }

    /// 等待连接就绪；引导失败时返回对应的连接错误
    pub async fn ready(&self) -> QuickMongoResult<()> {
        let mut receiver = self.ready_receiver.clone();
        loop {
            match receiver.borrow_and_update().clone() {
                ReadyState::Ready => return Ok(()),
                ReadyState::Failed(message) => {
                    return Err(QuickMongoError::ConnectionError { message });
                }
                ReadyState::Connecting => {}
            }
            if receiver.changed().await.is_err() {
                return Err(QuickMongoError::ConnectionError {
                    message: "会话工作器已退出".to_string(),
                });
            }
        }
    }

    /// 签发新令牌
    pub fn issue_token(&self) -> RequestToken {
        self.dispatcher.issue_token()
    }

    /// 订阅最早签发且尚未订阅的令牌的结果（FIFO）
    ///
    /// 应在发起调用后、下一次调用前订阅；不订阅即为即发即弃
    pub fn subscribe(&self) -> Option<CrudReceiver> {
        self.dispatcher.subscribe()
    }

    /// 查询数据：按条件查询集合，结果为命中文档列表
    pub fn get_data(&self, collection: &str, spec: QuerySpec) -> RequestToken {
        let token = self.dispatcher.issue_token();
        self.dispatch(MongoOperation::Get {
            collection: collection.to_string(),
            spec,
            token,
        })
    }

    /// 创建数据：单条记录执行单文档插入，记录序列执行批量插入
    pub fn create_data<R: Into<RecordInput>>(&self, collection: &str, records: R) -> RequestToken {
        let token = self.dispatcher.issue_token();
        self.dispatch(MongoOperation::Create {
            collection: collection.to_string(),
            records: records.into(),
            token,
        })
    }

    /// 更新数据：载荷中的 `_id` 被剔除，条件中的 `_id` 提升为ObjectId
    pub fn update_data(
        &self,
        collection: &str,
        record: Document,
        options: MutateOptions,
    ) -> RequestToken {
        let token = self.dispatcher.issue_token();
        self.dispatch(MongoOperation::Update {
            collection: collection.to_string(),
            record,
            options,
            token,
        })
    }

    /// 删除数据：单条/多条由选项中的模式标志决定，默认单条
    pub fn delete_data(&self, collection: &str, options: MutateOptions) -> RequestToken {
        let token = self.dispatcher.issue_token();
        self.dispatch(MongoOperation::Delete {
            collection: collection.to_string(),
            options,
            token,
        })
    }

    /// 入队操作并同步返回令牌
    fn dispatch(&self, operation: MongoOperation) -> RequestToken {
        let token = operation.token();
        if self.operation_sender.send(operation).is_err() {
            warn!("会话工作器已退出，令牌 {} 直接投递连接错误", token);
            self.dispatcher.emit(
                token,
                Err(QuickMongoError::ConnectionError {
                    message: "会话工作器已退出".to_string(),
                }),
            );
        }
        token
    }
}

impl Drop for QuickMongo {
    fn drop(&mut self) {
        // 发送端随self释放，工作器的接收循环会自然退出；
        // 仍在运行的任务显式取消，避免悬挂的后台任务
        if let Some(handle) = self.task_handle.take() {
            if !handle.is_finished() {
                handle.abort();
            }
        }
    }
}
