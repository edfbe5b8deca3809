//! 关联令牌调度器
//!
//! 每次CRUD调用签发一个唯一令牌，结果经以令牌为键的单次通道投递。
//! 令牌采用显式状态记账（待定/已订阅，投递后条目移除），取代
//! "不在待定列表即已订阅"的隐式反转记账，外部可观察行为保持一致。

use std::collections::{HashMap, VecDeque};
use std::fmt;

use parking_lot::Mutex;
use rat_logger::warn;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::debug_log;
use crate::types::CrudResult;

/// 请求关联令牌：每次调用签发、单次使用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestToken(Uuid);

impl RequestToken {
    fn mint() -> Self {
        Self(Uuid::new_v4())
    }

    /// 获取底层UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 订阅结果接收端（单次）
pub type CrudReceiver = oneshot::Receiver<CrudResult>;

/// 令牌状态（投递后条目整体移除，完成态以缺席表示）
enum TokenState {
    /// 已签发，尚无订阅者
    Pending,
    /// 订阅者已绑定，等待结果投递
    Subscribed(oneshot::Sender<CrudResult>),
}

#[derive(Default)]
struct DispatcherInner {
    /// 令牌 -> 状态
    states: HashMap<RequestToken, TokenState>,
    /// 待定令牌，按签发顺序排列（订阅按FIFO绑定）
    pending: VecDeque<RequestToken>,
}

/// 关联请求/响应调度器
#[derive(Default)]
pub struct TokenDispatcher {
    inner: Mutex<DispatcherInner>,
}

impl TokenDispatcher {
    /// 创建新的调度器
    pub fn new() -> Self {
        Self::default()
    }

    /// 签发新令牌：登记为待定并同步返回，先于底层操作执行
    pub fn issue_token(&self) -> RequestToken {
        let token = RequestToken::mint();
        let mut inner = self.inner.lock();
        inner.states.insert(token, TokenState::Pending);
        inner.pending.push_back(token);
        debug_log!("签发令牌: {}", token);
        token
    }

    /// 订阅最早签发且尚未订阅的令牌（FIFO）
    ///
    /// 每个令牌至多绑定一个订阅者；没有待定令牌时返回None。
    /// 注意：订阅按签发顺序绑定，而非按调用点匹配——调用方应在
    /// 签发后、下一次签发前订阅，否则可能绑定到其他在途调用。
    pub fn subscribe(&self) -> Option<CrudReceiver> {
        let mut inner = self.inner.lock();
        let token = inner.pending.pop_front()?;
        let (sender, receiver) = oneshot::channel();
        inner.states.insert(token, TokenState::Subscribed(sender));
        debug_log!("订阅绑定到令牌: {}", token);
        Some(receiver)
    }

    /// 投递结果
    ///
    /// 待定令牌按即发即弃丢弃结果；已订阅令牌恰好投递一次。
    /// 投递即移除记账条目，长期运行不随调用次数累积；
    /// 重复投递或未知令牌为空操作，绝不panic。
    pub fn emit(&self, token: RequestToken, result: CrudResult) {
        let previous = {
            let mut inner = self.inner.lock();
            let Some(previous) = inner.states.remove(&token) else {
                warn!("忽略未知或已完成令牌的结果投递: {}", token);
                return;
            };
            if matches!(previous, TokenState::Pending) {
                // 从未被订阅的令牌出队，避免后续订阅绑定到已完成的令牌
                inner.pending.retain(|t| t != &token);
            }
            previous
        };

        match previous {
            TokenState::Pending => {
                debug_log!("令牌 {} 无订阅者，结果按即发即弃丢弃", token);
            }
            TokenState::Subscribed(sender) => {
                if sender.send(result).is_err() {
                    warn!("令牌 {} 的订阅者已放弃接收", token);
                }
            }
        }
    }

    /// 当前待定（已签发且未订阅、未完成）的令牌数
    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// 当前记账中（已签发且结果尚未投递）的令牌总数
    pub fn tracked_count(&self) -> usize {
        self.inner.lock().states.len()
    }

    /// 令牌是否仍处于待定状态
    pub fn is_pending(&self, token: RequestToken) -> bool {
        matches!(
            self.inner.lock().states.get(&token),
            Some(TokenState::Pending)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CrudResponse;

    #[test]
    fn test_issue_token_is_pending() {
        let dispatcher = TokenDispatcher::new();
        let token = dispatcher.issue_token();
        assert!(dispatcher.is_pending(token));
        assert_eq!(dispatcher.pending_count(), 1);
    }

    #[test]
    fn test_emit_unknown_token_is_noop() {
        let dispatcher = TokenDispatcher::new();
        let token = dispatcher.issue_token();
        dispatcher.emit(token, Ok(CrudResponse::Updated(1)));
        // 重复投递与未知令牌均为空操作
        dispatcher.emit(token, Ok(CrudResponse::Updated(2)));
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[test]
    fn test_emit_removes_bookkeeping_entry() {
        let dispatcher = TokenDispatcher::new();
        for _ in 0..1000 {
            let token = dispatcher.issue_token();
            dispatcher.emit(token, Ok(CrudResponse::Updated(1)));
        }
        // 记账随投递清空，不随调用次数累积
        assert_eq!(dispatcher.tracked_count(), 0);
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[test]
    fn test_subscribe_consumes_oldest_pending() {
        let dispatcher = TokenDispatcher::new();
        let first = dispatcher.issue_token();
        let _second = dispatcher.issue_token();
        let _receiver = dispatcher.subscribe().unwrap();
        // 最早的令牌被订阅消费，不再处于待定
        assert!(!dispatcher.is_pending(first));
        assert_eq!(dispatcher.pending_count(), 1);
    }
}
