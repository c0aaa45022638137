//! Supervisor behaviour against real child processes.
#![cfg(unix)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use hyper::{Body, Client, Method, Request, StatusCode};
use serde_json::{json, Value};

use resource_cluster::dispatcher::SelectionPolicy;
use resource_cluster::http;
use resource_cluster::lifecycle::{
    Cluster, RestartPolicy, Supervisor, SupervisorConfig, WorkerEntry, WorkerLaunch, WorkerRegistry,
    WorkerState,
};

fn shell(script: &str) -> WorkerLaunch {
    WorkerLaunch {
        program: PathBuf::from("sh"),
        args: vec!["-c".into(), script.into()],
    }
}

fn free_port() -> u16 {
    http::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Polls slot 1 until `done` holds, failing the test after ten seconds.
async fn wait_for(registry: &WorkerRegistry, done: impl Fn(&WorkerEntry) -> bool) -> WorkerEntry {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        if let Some(entry) = registry.get(1) {
            if done(&entry) {
                return entry;
            }
        }
        assert!(tokio::time::Instant::now() < deadline, "timed out, registry: {:?}", registry.snapshot());
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_exited_worker_stays_dead_without_restart_policy() {
    let registry = WorkerRegistry::new();
    let config = SupervisorConfig {
        worker_count: 1,
        base_port: free_port(),
        launch: shell("exit 3"),
        restart: RestartPolicy::Never,
        ready_timeout: Duration::from_secs(1),
    };
    let handle = Supervisor::new(config, registry.clone()).start().unwrap();

    let entry = wait_for(&registry, |w| w.state == WorkerState::Dead).await;
    assert!(entry.pid.is_some());

    tokio::time::sleep(Duration::from_millis(200)).await;
    let entry = registry.get(1).unwrap();
    assert_eq!(entry.state, WorkerState::Dead);
    assert_eq!(entry.restarts, 0);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_backoff_restarts_until_the_limit() {
    let registry = WorkerRegistry::new();
    let config = SupervisorConfig {
        worker_count: 1,
        base_port: free_port(),
        launch: shell("exit 1"),
        restart: RestartPolicy::Backoff {
            initial: Duration::from_millis(10),
            max: Duration::from_millis(40),
            max_restarts: Some(2),
        },
        ready_timeout: Duration::from_secs(1),
    };
    let handle = Supervisor::new(config, registry.clone()).start().unwrap();

    wait_for(&registry, |w| w.restarts == 2 && w.state == WorkerState::Dead).await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    let entry = registry.get(1).unwrap();
    assert_eq!(entry.restarts, 2);
    assert_eq!(entry.state, WorkerState::Dead);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_kills_running_workers() {
    let registry = WorkerRegistry::new();
    let config = SupervisorConfig {
        worker_count: 1,
        base_port: free_port(),
        launch: shell("sleep 30"),
        restart: RestartPolicy::Never,
        ready_timeout: Duration::from_secs(30),
    };
    let handle = Supervisor::new(config, registry.clone()).start().unwrap();

    wait_for(&registry, |w| w.pid.is_some()).await;
    assert_eq!(registry.get(1).unwrap().state, WorkerState::Starting);

    handle.shutdown().await.unwrap();
    assert_eq!(registry.get(1).unwrap().state, WorkerState::Dead);
}

#[tokio::test]
async fn test_missing_program_is_recorded_dead() {
    let registry = WorkerRegistry::new();
    let config = SupervisorConfig {
        worker_count: 1,
        base_port: free_port(),
        launch: WorkerLaunch {
            program: PathBuf::from("/nonexistent/resource-cluster-worker"),
            args: vec![],
        },
        restart: RestartPolicy::Never,
        ready_timeout: Duration::from_secs(1),
    };
    let handle = Supervisor::new(config, registry.clone()).start().unwrap();

    let entry = wait_for(&registry, |w| w.state == WorkerState::Dead).await;
    assert_eq!(entry.pid, None);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_worker_not_ready_in_time_is_killed() {
    let registry = WorkerRegistry::new();
    let config = SupervisorConfig {
        worker_count: 1,
        base_port: free_port(),
        launch: shell("sleep 30"),
        restart: RestartPolicy::Never,
        ready_timeout: Duration::from_millis(100),
    };
    let started = tokio::time::Instant::now();
    let handle = Supervisor::new(config, registry.clone()).start().unwrap();

    let entry = wait_for(&registry, |w| w.state == WorkerState::Dead).await;
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(entry.restarts, 0);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_occupied_port_is_never_reported_ready() {
    let base_port = free_port();
    let Ok(squatter) = std::net::TcpListener::bind(("127.0.0.1", base_port + 1)) else {
        return; // port taken by something else on this host
    };
    let registry = WorkerRegistry::new();
    let config = SupervisorConfig {
        worker_count: 1,
        base_port,
        launch: shell("sleep 30"),
        restart: RestartPolicy::Never,
        ready_timeout: Duration::from_secs(5),
    };
    let handle = Supervisor::new(config, registry.clone()).start().unwrap();

    let entry = wait_for(&registry, |w| w.state == WorkerState::Dead).await;
    assert_eq!(entry.pid, None, "no child may be launched onto a taken port");

    handle.shutdown().await.unwrap();
    drop(squatter);
}

#[tokio::test]
async fn test_shutdown_during_backoff_does_not_relaunch() {
    let registry = WorkerRegistry::new();
    let config = SupervisorConfig {
        worker_count: 1,
        base_port: free_port(),
        launch: shell("exit 1"),
        restart: RestartPolicy::Backoff {
            initial: Duration::from_secs(30),
            max: Duration::from_secs(30),
            max_restarts: None,
        },
        ready_timeout: Duration::from_secs(1),
    };
    let handle = Supervisor::new(config, registry.clone()).start().unwrap();
    wait_for(&registry, |w| w.state == WorkerState::Dead).await;

    tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
        .await
        .expect("shutdown must not wait out the backoff")
        .unwrap();

    let entry = registry.get(1).unwrap();
    assert_eq!(entry.state, WorkerState::Dead);
    assert_eq!(entry.restarts, 0);
}

#[tokio::test]
async fn test_workers_run_in_their_own_process_group() {
    let registry = WorkerRegistry::new();
    let config = SupervisorConfig {
        worker_count: 1,
        base_port: free_port(),
        launch: shell("sleep 30"),
        restart: RestartPolicy::Never,
        ready_timeout: Duration::from_secs(30),
    };
    let handle = Supervisor::new(config, registry.clone()).start().unwrap();
    let pid = wait_for(&registry, |w| w.pid.is_some()).await.pid.unwrap();

    let output = std::process::Command::new("ps")
        .args(["-o", "pgid=", "-p", &pid.to_string()])
        .output()
        .unwrap();
    let pgid: u32 = String::from_utf8_lossy(&output.stdout).trim().parse().unwrap();
    assert_eq!(pgid, pid, "a terminal Ctrl-C must not reach the worker directly");

    handle.shutdown().await.unwrap();
}

/// The real binary in worker mode, behind a real dispatcher.
#[tokio::test]
async fn test_cluster_serves_through_a_worker_process() {
    let listener = http::bind(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
    let base_port = listener.local_addr().unwrap().port();
    let config = SupervisorConfig {
        worker_count: 1,
        base_port,
        launch: WorkerLaunch {
            program: PathBuf::from(env!("CARGO_BIN_EXE_resource-cluster")),
            args: vec!["worker".into()],
        },
        restart: RestartPolicy::Never,
        ready_timeout: Duration::from_secs(10),
    };
    let cluster = Cluster::start(listener, SelectionPolicy::RoundRobin, config).unwrap();
    let registry = cluster.registry();
    let addr = cluster.local_addr().unwrap();

    let entry = wait_for(&registry, |w| w.state == WorkerState::Ready).await;
    assert_eq!(entry.port, base_port + 1);

    let client = Client::new();
    let req = Request::builder()
        .method(Method::POST)
        .uri(format!("http://{addr}/api/resources"))
        .body(Body::from(json!({"name": "a", "count": 1, "tags": []}).to_string()))
        .unwrap();
    let response = client.request(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let created: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(created["name"], "a");

    cluster.shutdown().await.unwrap();
    assert_eq!(registry.get(1).unwrap().state, WorkerState::Dead);
}
