//! End-to-end tests against an in-process mock Quadrille cluster,
//! exercising only the public API.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use quadrille_client::{BulkWrite, ClientConfig, ClientError, QuadrilleClient};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Mock cluster node: answers membership and leadership queries and
/// echoes canned payloads for the data operations, exactly the fixtures
/// a single-node Quadrille leader would produce.
async fn spawn_mock_node() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (read_half, mut write_half) = stream.into_split();
                let mut lines = BufReader::new(read_half).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let Some((id, command)) = line.trim().split_once("::") else {
                        continue;
                    };
                    let payload = if command.starts_with("get") {
                        r#"{"data":"loc2","lat":17,"lon":78}"#
                    } else if command.starts_with("neighbors") {
                        r#"[{"data":"loc2","lat":12.99478,"lon":77.542687}]"#
                    } else if command.starts_with("members") {
                        r#"[{"id":"node0","addr":"127.0.0.1:5679"}]"#
                    } else if command.starts_with("isleader") {
                        "true"
                    } else {
                        "ok"
                    };
                    let reply = format!("{}::{}\n", id, payload);
                    if write_half.write_all(reply.as_bytes()).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    addr
}

fn test_config() -> ClientConfig {
    ClientConfig::new()
        .with_pool_size(4)
        .with_connect_timeout(Duration::from_secs(2))
        .with_request_timeout(Duration::from_secs(1))
}

#[tokio::test]
async fn test_driver() {
    init_tracing();
    let addr = spawn_mock_node().await;
    let client = QuadrilleClient::connect_with(&addr, test_config())
        .await
        .unwrap();

    let (location_id, latitude, longitude) = ("loc123", 17.0, 78.0);

    client
        .insert(location_id, latitude, longitude, &serde_json::json!({}))
        .await
        .unwrap();

    let location = client.get(location_id).await.unwrap();
    assert_eq!(location.latitude, latitude);
    assert_eq!(location.longitude, longitude);

    let neighbors = client.nearby(latitude, longitude, 1000, 10).await.unwrap();
    assert!(!neighbors.is_empty(), "didn't get neighbors");

    client.delete(location_id).await.unwrap();

    let bulk = BulkWrite::new()
        .insert("loc123", 12.0, 77.0, serde_json::json!({}))
        .update("loc123", 17.0, 78.0, serde_json::json!({"reg_no": "KA03NB5352"}));
    client.execute_bulk(&bulk).await.unwrap();

    client.close().await;
    assert!(matches!(
        client.get(location_id).await,
        Err(ClientError::Closed)
    ));
}

#[tokio::test]
async fn test_connect_fails_when_no_seed_reachable() {
    init_tracing();
    let config = test_config().with_connect_timeout(Duration::from_millis(300));
    let result = QuadrilleClient::connect_with("127.0.0.1:1,127.0.0.1:2", config).await;
    assert!(matches!(result, Err(ClientError::NoMembersFound)));
}
