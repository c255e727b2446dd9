//! Integration test: start the service on a free port, GET /, assert health
//! JSON; POST /telegram/webhook with a wrong secret is rejected. Does not
//! require a Telegram token or a reachable tracker. The server task is left
//! running when the test ends.

use lib::config::Config;
use lib::service;
use std::time::Duration;

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

fn test_config(port: u16) -> Config {
    let mut config = Config::default();
    config.gateway.port = port;
    config.gateway.bind = "127.0.0.1".to_string();
    // Valid-looking tracker settings; nothing in these tests calls the tracker.
    config.tracker.base_url = Some("http://127.0.0.1:9".to_string());
    config.tracker.credential = Some("Basic dGVzdA==".to_string());
    config.tracker.default_project_key = Some("TEST".to_string());
    config
}

async fn wait_until_healthy(client: &reqwest::Client, url: &str) -> serde_json::Value {
    let mut last_err = None;
    for _ in 0..100 {
        match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => {
                return resp.json().await.expect("parse JSON");
            }
            Ok(_) => {}
            Err(e) => last_err = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!(
        "GET {} did not return 200 within 5s; last error: {:?}",
        url, last_err
    );
}

#[tokio::test]
async fn service_health_http_responds_with_running() {
    let port = free_port();
    let config = test_config(port);

    tokio::spawn(async move {
        let _ = service::run_service(config).await;
    });

    let url = format!("http://127.0.0.1:{}/", port);
    let client = reqwest::Client::new();
    let json = wait_until_healthy(&client, &url).await;

    assert_eq!(json.get("runtime").and_then(|v| v.as_str()), Some("running"));
    assert_eq!(json.get("channel").and_then(|v| v.as_str()), Some("telegram"));
    assert_eq!(json.get("port").and_then(|v| v.as_u64()), Some(port as u64));
}

#[tokio::test]
async fn webhook_rejects_wrong_secret_and_accepts_the_right_one() {
    let port = free_port();
    let mut config = test_config(port);
    config.channels.telegram.webhook_secret = Some("shh".to_string());

    tokio::spawn(async move {
        let _ = service::run_service(config).await;
    });

    let base = format!("http://127.0.0.1:{}", port);
    let client = reqwest::Client::new();
    wait_until_healthy(&client, &format!("{}/", base)).await;

    let url = format!("{}/telegram/webhook", base);
    let update = r#"{ "update_id": 1, "message": { "message_id": 1, "chat": { "id": 5 }, "text": "hello" } }"#;

    let resp = client
        .post(&url)
        .header("Content-Type", "application/json")
        .body(update)
        .send()
        .await
        .expect("post without secret");
    assert_eq!(resp.status().as_u16(), 403);

    let resp = client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("X-Telegram-Bot-Api-Secret-Token", "shh")
        .body(update)
        .send()
        .await
        .expect("post with secret");
    assert_eq!(resp.status().as_u16(), 200);

    let resp = client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("X-Telegram-Bot-Api-Secret-Token", "shh")
        .body("not json")
        .send()
        .await
        .expect("post bad body");
    assert_eq!(resp.status().as_u16(), 400);
}
