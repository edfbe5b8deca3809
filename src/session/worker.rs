//! 会话工作器
//!
//! 独占持有会话句柄，串联连接引导、集合引导与操作处理。
//! 连接完成前入队的操作停留在队列中，连接完成后按原始参数执行，
//! 取代原先固定间隔的就绪轮询门。

use futures::future::BoxFuture;
use rat_logger::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::dispatcher::TokenDispatcher;
use crate::error::{QuickMongoError, QuickMongoResult};
use crate::session::{ReadyState, SessionBackend};
use crate::types::{build_update_document, CrudResponse, CrudResult, MongoOperation, RecordInput};

/// 会话工作器：每个包装器实例对应一个后台任务
pub struct SessionWorker {
    /// 操作接收器
    pub(crate) operation_receiver: mpsc::UnboundedReceiver<MongoOperation>,
    /// 启动时引导的集合列表
    pub(crate) collections: Vec<String>,
    /// 关联令牌调度器
    pub(crate) dispatcher: Arc<TokenDispatcher>,
    /// 就绪信号发送端（一次性敲定）
    pub(crate) ready_sender: watch::Sender<ReadyState>,
}

impl SessionWorker {
    /// 运行工作器：先完成连接引导与集合引导，再循环处理操作
    ///
    /// 引导失败是致命的：就绪信号敲定为Failed，已入队令牌全部
    /// 收到连接错误结果，工作器退出
    pub async fn run<B: SessionBackend>(
        mut self,
        bootstrap: BoxFuture<'static, QuickMongoResult<B>>,
    ) {
        let backend = match bootstrap.await {
            Ok(backend) => backend,
            Err(e) => {
                error!("连接引导失败，工作器退出: {}", e);
                let message = e.to_string();
                let _ = self.ready_sender.send(ReadyState::Failed(message.clone()));
                self.discard_queued(&message);
                return;
            }
        };

        self.ensure_collections(&backend).await;
        let _ = self.ready_sender.send(ReadyState::Ready);
        info!("会话工作器就绪: 集合引导完成");

        while let Some(operation) = self.operation_receiver.recv().await {
            self.handle_operation(&backend, operation).await;
        }

        debug!("会话工作器停止运行");
    }

    /// 确保配置的集合存在（幂等：先查存在性再创建）
    async fn ensure_collections<B: SessionBackend>(&self, backend: &B) {
        if self.collections.is_empty() {
            return;
        }

        let existing = match backend.list_collections().await {
            Ok(names) => names,
            Err(e) => {
                warn!("集合列表查询失败，跳过集合引导: {}", e);
                return;
            }
        };

        for name in &self.collections {
            if existing.contains(name) {
                continue;
            }
            match backend.create_collection(name).await {
                Ok(()) => info!("已创建缺失的集合: {}", name),
                Err(e) => warn!("集合 {} 创建失败: {}", name, e),
            }
        }
    }

    /// 引导失败后清空队列：每个已入队令牌收到连接错误结果
    fn discard_queued(&mut self, message: &str) {
        self.operation_receiver.close();
        while let Ok(operation) = self.operation_receiver.try_recv() {
            self.dispatcher.emit(
                operation.token(),
                Err(QuickMongoError::ConnectionError {
                    message: message.to_string(),
                }),
            );
        }
    }

    /// 处理单个操作并投递结果
    ///
    /// 驱动错误不再上抛终止进程，而是转为该令牌上的错误结果投递；
    /// 即发即弃的令牌在日志告警后丢弃错误
    async fn handle_operation<B: SessionBackend>(&self, backend: &B, operation: MongoOperation) {
        let token = operation.token();
        let result = self.execute(backend, operation).await;
        if let Err(e) = &result {
            error!("操作执行失败: 令牌={}, 错误={}", token, e);
        }
        self.dispatcher.emit(token, result);
    }

    /// 执行操作：存在性检查、选项归一化、驱动调用
    async fn execute<B: SessionBackend>(
        &self,
        backend: &B,
        operation: MongoOperation,
    ) -> CrudResult {
        // 每个操作执行前检查目标集合；缺失不是错误，按缺失集合结果投递
        let existing = backend.list_collections().await?;
        if !existing.iter().any(|name| name == operation.collection()) {
            debug!("目标集合不存在: {}", operation.collection());
            return Ok(CrudResponse::MissingCollection);
        }

        match operation {
            MongoOperation::Get {
                collection, spec, ..
            } => {
                let spec = spec.normalized();
                let documents = backend.find(&collection, spec.query, spec.sort).await?;
                Ok(CrudResponse::Found(documents))
            }
            MongoOperation::Create {
                collection,
                records,
                ..
            } => match records {
                RecordInput::One(record) => {
                    let id = backend.insert_one(&collection, record).await?;
                    Ok(CrudResponse::Created(vec![id]))
                }
                RecordInput::Many(list) if list.is_empty() => {
                    // 空序列视为不插入任何记录
                    Ok(CrudResponse::Created(Vec::new()))
                }
                RecordInput::Many(list) => {
                    let ids = backend.insert_many(&collection, list).await?;
                    Ok(CrudResponse::Created(ids))
                }
            },
            MongoOperation::Update {
                collection,
                record,
                options,
                ..
            } => {
                let options = options.normalized();
                let update = build_update_document(&record);
                let modified = backend
                    .update(&collection, options.query, update, options.many)
                    .await?;
                Ok(CrudResponse::Updated(modified))
            }
            MongoOperation::Delete {
                collection,
                options,
                ..
            } => {
                let options = options.normalized();
                let deleted = backend
                    .delete(&collection, options.query, options.many)
                    .await?;
                Ok(CrudResponse::Deleted(deleted))
            }
        }
    }
}
