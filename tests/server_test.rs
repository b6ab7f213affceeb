//! Integration tests for the posture-agent HTTP server

#[cfg(feature = "server")]
mod server_tests {
    use posture_agent::server::{run, ServerConfig, ServerState};
    use posture_agent::stats::create_shared_log;
    use posture_agent::{SessionCommand, Thresholds};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
    use tokio::sync::watch;

    fn test_state() -> (
        Arc<ServerState>,
        watch::Sender<Thresholds>,
        UnboundedReceiver<SessionCommand>,
    ) {
        let (thresholds_tx, thresholds_rx) = watch::channel(Thresholds::default());
        let (commands_tx, commands_rx) = unbounded_channel();
        let state = ServerState::new(thresholds_rx, create_shared_log(), commands_tx);
        (state, thresholds_tx, commands_rx)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (state, _thresholds, _commands) = test_state();

        // Start server on a random port
        let (addr, shutdown_tx) = run(ServerConfig::new(0), state)
            .await
            .expect("Failed to start server");

        // Give server time to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        let client = reqwest::Client::new();
        let response = client
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .expect("Failed to send request");

        assert!(response.status().is_success());

        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["status"], "ok");
        assert!(body["version"].as_str().is_some());

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_thresholds_follow_updates() {
        let (state, thresholds_tx, _commands) = test_state();
        let (addr, shutdown_tx) = run(ServerConfig::new(0), state)
            .await
            .expect("Failed to start server");
        tokio::time::sleep(Duration::from_millis(100)).await;

        let client = reqwest::Client::new();
        let url = format!("http://{}/api/posture_thresholds", addr);

        let body: serde_json::Value = client.get(&url).send().await.unwrap().json().await.unwrap();
        assert_eq!(body["neck_angle_threshold"], 35.0);
        assert_eq!(body["torso_angle_threshold"], 10.0);
        assert_eq!(body["alignment_threshold"], 30.0);
        assert_eq!(body["forward_head_threshold"], 0.2);

        thresholds_tx.send_replace(Thresholds {
            neck_angle_deg: 28.0,
            ..Thresholds::default()
        });
        let body: serde_json::Value = client.get(&url).send().await.unwrap().json().await.unwrap();
        assert_eq!(body["neck_angle_threshold"], 28.0);

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_health_conditions_endpoint() {
        let (state, _thresholds, _commands) = test_state();
        let (addr, shutdown_tx) = run(ServerConfig::new(0), state)
            .await
            .expect("Failed to start server");
        tokio::time::sleep(Duration::from_millis(100)).await;

        let body: serde_json::Value = reqwest::get(format!("http://{}/api/health_conditions", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["musculoskeletal"]["name"], "Musculoskeletal Issues");
        assert!(body["respiratory"]["prevention"].as_str().is_some());

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_status_before_first_report() {
        let (state, _thresholds, _commands) = test_state();
        let (addr, shutdown_tx) = run(ServerConfig::new(0), state)
            .await
            .expect("Failed to start server");
        tokio::time::sleep(Duration::from_millis(100)).await;

        let body: serde_json::Value = reqwest::get(format!("http://{}/api/status", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert!(body.get("latest_report").is_none());
        assert_eq!(body["stats"]["frames_seen"], 0);
        assert_eq!(body["thresholds"]["neck_angle_threshold"], 35.0);

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_reset_enqueues_command() {
        let (state, _thresholds, mut commands) = test_state();
        let (addr, shutdown_tx) = run(ServerConfig::new(0), state)
            .await
            .expect("Failed to start server");
        tokio::time::sleep(Duration::from_millis(100)).await;

        let response = reqwest::Client::new()
            .post(format!("http://{}/api/reset", addr))
            .send()
            .await
            .expect("Failed to send request");
        assert!(response.status().is_success());

        assert_eq!(commands.try_recv().ok(), Some(SessionCommand::Reset));

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_reset_without_loop() {
        let (state, _thresholds, commands) = test_state();
        drop(commands);
        let (addr, shutdown_tx) = run(ServerConfig::new(0), state)
            .await
            .expect("Failed to start server");
        tokio::time::sleep(Duration::from_millis(100)).await;

        let response = reqwest::Client::new()
            .post(format!("http://{}/api/reset", addr))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["code"], "LOOP_STOPPED");

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_cors_headers() {
        let (state, _thresholds, _commands) = test_state();
        let (addr, shutdown_tx) = run(ServerConfig::new(0), state)
            .await
            .expect("Failed to start server");
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Send OPTIONS request to check CORS
        let client = reqwest::Client::new();
        let response = client
            .request(reqwest::Method::OPTIONS, format!("http://{}/api/reset", addr))
            .header("Origin", "http://localhost")
            .header("Access-Control-Request-Method", "POST")
            .send()
            .await
            .expect("Failed to send request");

        assert!(
            response.status().is_success() || response.status() == reqwest::StatusCode::NO_CONTENT,
            "CORS preflight failed: {}",
            response.status()
        );

        let _ = shutdown_tx.send(());
    }
}
