#![cfg(test)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lina_bot::{
    base::{
        config::{Config, ConfigInner},
        types::{PlatformError, Reply, Res, Void},
    },
    dice::RollSource,
    dispatch::{DispatchOutcome, Dispatcher},
    handler::{self, MessageHandler},
    message::NewMessage,
    runtime::{OK_BODY, Runtime},
    service::vk::{GenericVkClient, UserProfile, VkClient},
};
use mockall::mock;
use serde_json::json;

// Mocks.

// Mock VK client for testing.

mock! {
    pub Vk {}

    #[async_trait]
    impl GenericVkClient for Vk {
        async fn send_message(&self, peer_id: i64, text: &str) -> Void;
        async fn send_sticker(&self, peer_id: i64, sticker_id: u32) -> Void;
        async fn get_conversation_members(&self, peer_id: i64) -> Res<Vec<UserProfile>>;
    }
}

/// Roll source returning a scripted pool.
struct ScriptedRolls(Vec<u32>);

#[async_trait]
impl RollSource for ScriptedRolls {
    async fn pool(&self, _count: u32, _faces: u32) -> Vec<u32> {
        self.0.clone()
    }
}

const FALLBACK_STICKER: u32 = 8471;
const GROUP_PEER: i64 = 2_000_000_001;

fn test_config() -> Config {
    Config {
        inner: Arc::new(ConfigInner {
            group_id: 123,
            bot_names: vec!["lina".to_string()],
            vk_access_token: "token".to_string(),
            confirmation_code: "c0ffee".to_string(),
            admin_id: 1,
            friends: vec![2],
            handler_timeout_secs: 5,
            peer_id_threshold: 2_000_000_000,
            fallback_sticker_id: FALLBACK_STICKER,
            listen_addr: "127.0.0.1:0".to_string(),
        }),
    }
}

fn addressed_message(raw_text: &str) -> NewMessage {
    NewMessage {
        from_id: 7,
        peer_id: GROUP_PEER,
        text: raw_text.to_string(),
        attachments: Vec::new(),
        action: None,
        raw_text: Some(raw_text.to_string()),
    }
}

fn dispatcher_with_rolls(mock: MockVk, rolls: Vec<u32>) -> Dispatcher {
    let config = test_config();
    let vk = VkClient::new(Arc::new(mock));
    let handlers = handler::registry(&config, vk.clone(), Arc::new(ScriptedRolls(rolls)));

    Dispatcher::new(handlers, vk, &config)
}

// Dispatcher tests.

#[tokio::test]
async fn dice_roll_is_delivered_once() {
    let mut mock = MockVk::new();
    mock.expect_send_message()
        .withf(|peer_id, text| *peer_id == GROUP_PEER && text == "(4 + 2 + 6) +2 = 14")
        .times(1)
        .returning(|_, _| Ok(()));

    let dispatcher = dispatcher_with_rolls(mock, vec![4, 2, 6]);
    let outcomes = dispatcher.dispatch(&addressed_message("3d6+2")).await;

    assert!(outcomes.contains(&DispatchOutcome::Delivered));
}

#[tokio::test]
async fn message_without_raw_text_triggers_no_handler() {
    // No expectations: any outbound call would panic the test.
    let dispatcher = dispatcher_with_rolls(MockVk::new(), vec![]);

    let mut message = addressed_message("3d6+2 hello help choose a or b");
    message.raw_text = None;

    let outcomes = dispatcher.dispatch(&message).await;
    assert!(outcomes.iter().all(|o| *o == DispatchOutcome::NotTriggered));
}

#[tokio::test]
async fn invalid_dice_notation_sends_one_fallback_sticker() {
    let mut mock = MockVk::new();
    mock.expect_send_sticker()
        .withf(|peer_id, sticker_id| *peer_id == GROUP_PEER && *sticker_id == FALLBACK_STICKER)
        .times(1)
        .returning(|_, _| Ok(()));

    let dispatcher = dispatcher_with_rolls(mock, vec![]);
    let outcomes = dispatcher.dispatch(&addressed_message("0d6")).await;

    assert!(outcomes.contains(&DispatchOutcome::Fallback));
}

#[tokio::test]
async fn admin_permission_failure_is_suppressed_silently() {
    let mut mock = MockVk::new();
    mock.expect_get_conversation_members()
        .times(1)
        .returning(|_| Err(PlatformError::new(917, "admin permission required").into()));

    let dispatcher = dispatcher_with_rolls(mock, vec![]);
    let outcomes = dispatcher.dispatch(&addressed_message("who took the last cookie")).await;

    assert!(outcomes.contains(&DispatchOutcome::Suppressed));
    assert!(!outcomes.contains(&DispatchOutcome::Fallback));
}

#[tokio::test]
async fn too_long_delivery_failure_escalates_to_fallback() {
    let mut mock = MockVk::new();
    mock.expect_send_message()
        .times(1)
        .returning(|_, _| Err(PlatformError::new(414, "request uri too long").into()));
    mock.expect_send_sticker()
        .withf(|_, sticker_id| *sticker_id == FALLBACK_STICKER)
        .times(1)
        .returning(|_, _| Ok(()));

    let dispatcher = dispatcher_with_rolls(mock, vec![3, 3]);
    let outcomes = dispatcher.dispatch(&addressed_message("2d6")).await;

    assert!(outcomes.contains(&DispatchOutcome::Fallback));
}

#[tokio::test]
async fn other_platform_errors_fail_the_turn_without_delivery() {
    let mut mock = MockVk::new();
    mock.expect_send_message().times(1).returning(|_, _| Err(PlatformError::new(902, "forbidden").into()));

    let dispatcher = dispatcher_with_rolls(mock, vec![3, 3]);
    let outcomes = dispatcher.dispatch(&addressed_message("2d6")).await;

    assert!(outcomes.contains(&DispatchOutcome::Failed));
}

#[tokio::test(start_paused = true)]
async fn multi_part_reply_is_delivered_in_order() {
    let sent: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let record = sent.clone();

    let mut mock = MockVk::new();
    mock.expect_send_message().times(3).returning(move |_, text| {
        record.lock().unwrap().push(text.to_string());
        Ok(())
    });

    let dispatcher = dispatcher_with_rolls(mock, vec![]);
    let outcomes = dispatcher.dispatch(&addressed_message("help")).await;

    assert!(outcomes.contains(&DispatchOutcome::Delivered));

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 3);
    assert!(sent[0].contains("roll dice"));
    assert!(sent[2].contains("group chat"));
}

// Timeout behavior, with a handler that never finishes in time.

struct SlowHandler;

#[async_trait]
impl MessageHandler for SlowHandler {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn triggers(&self) -> &[&str] {
        &["slow"]
    }

    async fn produce(&self, _message: &NewMessage) -> Result<Reply, lina_bot::base::types::HandlerError> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok(Reply::Text("too late".to_string()))
    }
}

#[tokio::test(start_paused = true)]
async fn timed_out_handler_sends_exactly_one_fallback_and_no_reply() {
    let mut mock = MockVk::new();
    mock.expect_send_sticker()
        .withf(|_, sticker_id| *sticker_id == FALLBACK_STICKER)
        .times(1)
        .returning(|_, _| Ok(()));

    let config = test_config();
    let vk = VkClient::new(Arc::new(mock));
    let handlers: Vec<Arc<dyn MessageHandler>> = vec![Arc::new(SlowHandler)];
    let dispatcher = Dispatcher::new(handlers, vk, &config);

    let outcomes = dispatcher.dispatch(&addressed_message("slow down")).await;
    assert_eq!(outcomes, vec![DispatchOutcome::TimedOut]);
}

// Runtime routing tests.

fn test_runtime(mock: MockVk) -> Runtime {
    let vk = VkClient::new(Arc::new(mock));
    Runtime::with_services(test_config(), vk, Arc::new(ScriptedRolls(vec![]))).unwrap()
}

#[tokio::test]
async fn confirmation_challenge_is_answered_with_the_code() {
    let runtime = test_runtime(MockVk::new());

    let reply = runtime.handle_callback("confirmation", &serde_json::Value::Null).unwrap();
    assert_eq!(reply, "c0ffee");
}

#[tokio::test]
async fn unknown_event_type_is_rejected() {
    let runtime = test_runtime(MockVk::new());

    let err = runtime.handle_callback("wall_post_new", &serde_json::Value::Null).unwrap_err();
    assert!(err.to_string().contains("wall_post_new"));
}

#[tokio::test]
async fn unaddressed_message_is_dropped_but_acknowledged() {
    let runtime = test_runtime(MockVk::new());

    let payload = json!({ "from_id": 7, "peer_id": GROUP_PEER, "text": "just chatting about 2d6" });
    let reply = runtime.handle_callback("message_new", &payload).unwrap();

    assert_eq!(reply, OK_BODY);
}

#[tokio::test]
async fn addressed_message_is_routed_to_handlers() {
    let mut mock = MockVk::new();
    mock.expect_send_message()
        .withf(|_, text| text == "hello!")
        .times(1)
        .returning(|_, _| Ok(()));

    let runtime = test_runtime(mock);

    let payload = json!({ "from_id": 7, "peer_id": GROUP_PEER, "text": "Lina, hello" });
    let reply = runtime.handle_callback("message_new", &payload).unwrap();
    assert_eq!(reply, OK_BODY);

    // Dispatch runs detached; poll briefly for the delivery.
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}
