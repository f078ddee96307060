use std::sync::Arc;
use std::time::Duration;

use hammr_core::{Report, Requester, RpcMethod, RunConfig, RunnerError, Schema, TlsMode};
use hammr_testserver::{Behavior, GrpcTestServer};

fn method(name: &str) -> RpcMethod {
    Schema::from_pool(hammr_testserver::descriptor_pool())
        .method(&format!("hammr.test.EchoService/{name}"))
        .expect("test method resolves")
}

fn config(target: &str, data: serde_json::Value) -> RunConfig {
    RunConfig {
        host: target.to_string(),
        n: 1,
        c: 1,
        qps: 0,
        z: None,
        timeout: Some(Duration::from_secs(5)),
        dial_timeout: Some(Duration::from_secs(5)),
        keepalive: None,
        data,
        metadata: None,
        tls: TlsMode::Insecure,
    }
}

async fn run(method_name: &str, config: RunConfig) -> Report {
    let requester = Requester::new(method(method_name), config).expect("requester builds");
    requester.run().await.expect("run succeeds")
}

#[tokio::test]
async fn unary_fan_out_counts_every_call() {
    let server = GrpcTestServer::start_with(Behavior {
        delay: Duration::from_millis(10),
        ..Behavior::default()
    })
    .await
    .expect("server starts");

    let mut cfg = config(&server.target(), serde_json::json!({ "message": "hello" }));
    cfg.n = 4;
    cfg.c = 2;
    let report = run("Echo", cfg).await;

    assert_eq!(report.count, 4);
    assert_eq!(report.details.len(), 4);
    assert_eq!(report.status_code_dist.get("OK"), Some(&4));
    assert!(report.error_dist.is_empty());
    assert!(report.fastest >= Duration::from_millis(10));
    assert!(report.fastest <= report.average && report.average <= report.slowest);
    assert_eq!(report.histogram.iter().map(|b| b.count).sum::<u64>(), 4);

    let mut previous = Duration::ZERO;
    for entry in &report.latency_distribution {
        assert!(entry.latency >= previous);
        previous = entry.latency;
    }

    server.shutdown().await;
}

#[tokio::test]
async fn server_stream_end_of_stream_is_ok() {
    let server = GrpcTestServer::start_with(Behavior {
        stream_messages: 3,
        ..Behavior::default()
    })
    .await
    .expect("server starts");

    let report = run(
        "Expand",
        config(&server.target(), serde_json::json!({ "message": "feed" })),
    )
    .await;

    assert_eq!(report.count, 1);
    assert_eq!(report.status_code_dist.get("OK"), Some(&1));
    assert!(report.error_dist.is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn client_stream_sends_each_message() {
    let server = GrpcTestServer::start().await.expect("server starts");

    let data = serde_json::json!([
        { "message": "one" },
        { "message": "two" },
        { "message": "three" }
    ]);
    let report = run("Collect", config(&server.target(), data)).await;

    assert_eq!(report.count, 1);
    assert_eq!(report.status_code_dist.get("OK"), Some(&1));

    server.shutdown().await;
}

#[tokio::test]
async fn bidi_stream_echoes_and_completes() {
    let server = GrpcTestServer::start().await.expect("server starts");

    let data = serde_json::json!([{ "message": "m1" }, { "message": "m2" }]);
    let report = run("Chat", config(&server.target(), data)).await;

    assert_eq!(report.count, 1);
    assert_eq!(report.status_code_dist.get("OK"), Some(&1));

    server.shutdown().await;
}

#[tokio::test]
async fn slow_peer_yields_deadline_exceeded() {
    let server = GrpcTestServer::start_with(Behavior {
        delay: Duration::from_millis(200),
        ..Behavior::default()
    })
    .await
    .expect("server starts");

    let mut cfg = config(&server.target(), serde_json::json!({ "message": "late" }));
    cfg.n = 2;
    cfg.c = 1;
    cfg.timeout = Some(Duration::from_millis(50));
    let report = run("Echo", cfg).await;

    assert_eq!(report.count, 2);
    assert_eq!(report.status_code_dist.get("DeadlineExceeded"), Some(&2));
    for detail in &report.details {
        assert!(detail.latency >= Duration::from_millis(50));
    }

    server.shutdown().await;
}

#[tokio::test]
async fn peer_status_lands_in_both_distributions() {
    let server = GrpcTestServer::start_with(Behavior {
        fail_with: Some((tonic::Code::Unavailable, "maintenance window".to_string())),
        ..Behavior::default()
    })
    .await
    .expect("server starts");

    let mut cfg = config(&server.target(), serde_json::json!({ "message": "x" }));
    cfg.n = 3;
    let report = run("Echo", cfg).await;

    assert_eq!(report.count, 3);
    assert_eq!(report.status_code_dist.get("Unavailable"), Some(&3));
    assert_eq!(report.error_dist.get("maintenance window"), Some(&3));

    server.shutdown().await;
}

#[tokio::test]
async fn stop_ends_the_run_early() {
    let server = GrpcTestServer::start().await.expect("server starts");

    let mut cfg = config(&server.target(), serde_json::json!({ "message": "go" }));
    cfg.n = 1000;
    cfg.c = 4;
    cfg.qps = 100;

    let requester =
        Arc::new(Requester::new(method("Echo"), cfg).expect("requester builds"));
    let handle = tokio::spawn({
        let requester = requester.clone();
        async move { requester.run().await }
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    requester.stop();

    let report = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("run returns promptly after stop")
        .expect("runner task")
        .expect("run succeeds");

    assert!(report.count < 1000, "count was {}", report.count);
    assert_eq!(report.count, report.details.len() as u64);

    server.shutdown().await;
}

#[tokio::test]
async fn duration_limit_stops_the_run() {
    let server = GrpcTestServer::start().await.expect("server starts");

    let mut cfg = config(&server.target(), serde_json::json!({ "message": "go" }));
    cfg.n = 100_000;
    cfg.c = 2;
    cfg.qps = 200;
    cfg.z = Some(Duration::from_millis(200));

    let started = std::time::Instant::now();
    let report = run("Echo", cfg).await;

    assert!(report.count < 100_000);
    assert!(started.elapsed() < Duration::from_secs(5));

    server.shutdown().await;
}

#[tokio::test]
async fn qps_bounds_the_completion_rate() {
    let server = GrpcTestServer::start().await.expect("server starts");

    let mut cfg = config(&server.target(), serde_json::json!({ "message": "paced" }));
    cfg.n = 10;
    cfg.c = 4;
    cfg.qps = 50;
    let report = run("Echo", cfg).await;

    assert_eq!(report.count, 10);
    // 10 calls at 50 qps take about 180ms of pacing alone.
    assert!(report.total >= Duration::from_millis(120), "total was {:?}", report.total);
    assert!(report.rps <= 75.0, "rps was {}", report.rps);

    server.shutdown().await;
}

#[tokio::test]
async fn remainder_calls_are_not_skipped() {
    let server = GrpcTestServer::start().await.expect("server starts");

    // 7 calls across 3 workers: 3 + 2 + 2.
    let mut cfg = config(&server.target(), serde_json::json!({ "message": "odd" }));
    cfg.n = 7;
    cfg.c = 3;
    let report = run("Echo", cfg).await;

    assert_eq!(report.count, 7);
    assert_eq!(report.status_code_dist.get("OK"), Some(&7));

    server.shutdown().await;
}

#[tokio::test]
async fn templated_payload_renders_per_call() {
    let server = GrpcTestServer::start().await.expect("server starts");

    let mut cfg = config(
        &server.target(),
        serde_json::json!({ "message": "call-{{ request_number }}" }),
    );
    cfg.n = 3;
    cfg.metadata = Some(
        [("x-request-id".to_string(), "{{ uuid }}".to_string())]
            .into_iter()
            .collect(),
    );
    let report = run("Echo", cfg).await;

    assert_eq!(report.count, 3);
    assert_eq!(report.status_code_dist.get("OK"), Some(&3));

    server.shutdown().await;
}

#[tokio::test]
async fn render_failures_drop_the_call_without_a_result() {
    let server = GrpcTestServer::start().await.expect("server starts");

    // Syntactically valid template over an unknown variable: fails at
    // render time, so every call is dropped.
    let mut cfg = config(
        &server.target(),
        serde_json::json!({ "message": "{{ no_such_field }}" }),
    );
    cfg.n = 5;
    let report = run("Echo", cfg).await;

    assert_eq!(report.count, 0);
    assert!(report.details.is_empty());
    assert!(report.status_code_dist.is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn dial_failure_is_fatal_and_reportless() {
    // Bind and immediately drop a listener to find a port with nothing
    // behind it.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let target = listener.local_addr().expect("addr").to_string();
    drop(listener);

    let mut cfg = config(&target, serde_json::json!({ "message": "x" }));
    cfg.dial_timeout = Some(Duration::from_secs(2));

    let requester = Requester::new(method("Echo"), cfg).expect("requester builds");
    let err = requester.run().await.expect_err("nothing is listening");
    assert!(matches!(err, RunnerError::Transport(_)));
}

#[tokio::test]
async fn options_echo_round_trips_into_the_report() {
    let server = GrpcTestServer::start().await.expect("server starts");

    let mut cfg = config(&server.target(), serde_json::json!({ "message": "echo" }));
    cfg.n = 2;
    cfg.qps = 0;
    let report = run("Echo", cfg.clone()).await;

    assert_eq!(report.options.host, cfg.host);
    assert_eq!(report.options.n, 2);
    assert_eq!(report.options.tls, TlsMode::Insecure);

    server.shutdown().await;
}
