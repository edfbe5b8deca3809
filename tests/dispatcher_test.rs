//! 关联令牌调度器行为测试
//!
//! 覆盖即发即弃丢弃、恰好一次投递与按签发顺序绑定订阅

use rat_quickmongo::{CrudResponse, TokenDispatcher};

/// 从未订阅的令牌：投递不报错、不向任何通道发布，令牌移出待定集合
#[tokio::test]
async fn test_fire_and_forget_discards_without_publishing() {
    let dispatcher = TokenDispatcher::new();
    let token = dispatcher.issue_token();
    assert!(dispatcher.is_pending(token));

    dispatcher.emit(token, Ok(CrudResponse::Updated(1)));

    assert!(!dispatcher.is_pending(token));
    assert_eq!(dispatcher.pending_count(), 0);
    // 已完成的令牌不会被后续订阅绑定
    assert!(dispatcher.subscribe().is_none());
}

/// 先订阅后投递：订阅者恰好收到一次投递的结果
#[tokio::test]
async fn test_subscribed_token_receives_exactly_once() {
    let dispatcher = TokenDispatcher::new();
    let token = dispatcher.issue_token();
    let receiver = dispatcher.subscribe().expect("应绑定到待定令牌");

    dispatcher.emit(token, Ok(CrudResponse::Deleted(3)));

    match receiver.await {
        Ok(Ok(CrudResponse::Deleted(count))) => assert_eq!(count, 3),
        other => panic!("结果投递不符合预期: {:?}", other),
    }

    // 重复投递是空操作，不会panic；投递后记账条目已移除
    dispatcher.emit(token, Ok(CrudResponse::Deleted(9)));
    assert_eq!(dispatcher.tracked_count(), 0);
}

/// 订阅严格按签发顺序绑定：两次订阅分别绑定到先后签发的令牌
#[tokio::test]
async fn test_subscription_binds_in_issuance_order() {
    let dispatcher = TokenDispatcher::new();
    let first = dispatcher.issue_token();
    let second = dispatcher.issue_token();
    let first_receiver = dispatcher.subscribe().unwrap();
    let second_receiver = dispatcher.subscribe().unwrap();

    // 故意乱序投递，验证绑定关系只取决于签发顺序
    dispatcher.emit(second, Ok(CrudResponse::Updated(2)));
    dispatcher.emit(first, Ok(CrudResponse::Updated(1)));

    assert!(matches!(
        first_receiver.await,
        Ok(Ok(CrudResponse::Updated(1)))
    ));
    assert!(matches!(
        second_receiver.await,
        Ok(Ok(CrudResponse::Updated(2)))
    ));
}

/// 即发即弃完成的令牌出队后，订阅绑定到下一个待定令牌
#[tokio::test]
async fn test_completed_token_skipped_by_subscription() {
    let dispatcher = TokenDispatcher::new();
    let first = dispatcher.issue_token();
    let second = dispatcher.issue_token();

    // 第一个令牌在订阅前完成，按即发即弃丢弃
    dispatcher.emit(first, Ok(CrudResponse::Updated(1)));

    let receiver = dispatcher.subscribe().expect("应绑定到第二个令牌");
    dispatcher.emit(second, Ok(CrudResponse::Deleted(7)));

    assert!(matches!(receiver.await, Ok(Ok(CrudResponse::Deleted(7)))));
}
