//! A Telegram API that accepts connections and never answers must not stall
//! the dispatcher.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bellwether_core::config::TelegramSettings;
use bellwether_notify::telegram::TelegramNotifier;
use bellwether_notify::{
    ChannelSelection, Dispatcher, Notification, Notifier, NotifyError, RetryPolicy,
};
use tokio::net::TcpListener;

/// Bind a listener that accepts sockets and holds them open without replying.
async fn silent_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{addr}")
}

fn telegram(timeout_secs: u64) -> TelegramSettings {
    TelegramSettings {
        enabled: true,
        bot_token: "123:ABC".to_string(),
        chat_id: "42".to_string(),
        timeout_secs,
        ..Default::default()
    }
}

#[tokio::test]
async fn telegram_request_times_out_on_silent_server() {
    let base = silent_server().await;
    let notifier = TelegramNotifier::from_config(&telegram(1))
        .unwrap()
        .with_api_base(base);

    let start = Instant::now();
    let err = tokio::time::timeout(
        Duration::from_secs(10),
        notifier.send(&Notification::test_message()),
    )
    .await
    .expect("telegram send hung past its own timeout")
    .unwrap_err();

    match err {
        NotifyError::Http(e) => assert!(e.is_timeout(), "unexpected error: {e}"),
        other => panic!("expected HTTP timeout, got {other:?}"),
    }
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn dispatch_to_silent_telegram_returns_failed_outcome() {
    let base = silent_server().await;
    let notifier: Arc<dyn Notifier> = Arc::new(
        TelegramNotifier::from_config(&telegram(30))
            .unwrap()
            .with_api_base(base),
    );
    let dispatcher = Dispatcher::new(vec![notifier])
        .with_retry(RetryPolicy::none().with_attempt_timeout(Duration::from_millis(500)));

    let outcomes = tokio::time::timeout(
        Duration::from_secs(10),
        dispatcher.send(&Notification::test_message(), &ChannelSelection::All),
    )
    .await
    .expect("dispatch hung on a silent channel");

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].channel, "telegram");
    assert!(!outcomes[0].is_delivered());
    assert!(outcomes[0].error().unwrap().contains("Timed out"));
}
