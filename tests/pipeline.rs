//! End-to-end runs over loopback TCP

use logtally::distributed::{connect_workers, WorkerService};
use logtally::source::DirectorySource;
use logtally::{Coordinator, Role, TallyError};
use std::fs;
use tempfile::TempDir;
use tokio::net::TcpListener;

const MAX_PAYLOAD: usize = 1024 * 1024;

fn write_logs(dir: &TempDir) {
    fs::write(
        dir.path().join("secure"),
        "Mar  1 10:00:01 h sshd[101]: Failed password for root from 10.0.0.1 port 22 ssh2\n\
         Mar  1 10:00:02 h sshd[102]: Invalid user admin from 10.0.0.2 port 22\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("secure.1"),
        "Mar  1 09:00:01 h sshd[201]: Failed password for root from 10.0.0.1 port 22 ssh2\n\
         Mar  1 09:00:02 h sshd[202]: Failed password for admin from 10.0.0.3 port 22 ssh2\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("secure.2"),
        "Mar  1 08:00:01 h sshd[301]: Accepted password for ops from 10.0.0.9 port 22 ssh2\n\
         Mar  1 08:00:02 h sshd[302]: Failed password for root from 10.0.0.1 port 22 ssh2\n\
         Mar  1 08:00:03 h sshd[303]: Invalid user guest from 10.0.0.4 port 22\n",
    )
    .unwrap();
    // Filtered out by name
    fs::write(
        dir.path().join("messages"),
        "Mar  1 08:00:01 h sshd[999]: Failed password for root from 10.0.0.1 port 22 ssh2\n",
    )
    .unwrap();
}

async fn spawn_workers(count: usize) -> (Vec<String>, Vec<tokio::task::JoinHandle<logtally::Result<()>>>) {
    let mut addresses = Vec::new();
    let mut handles = Vec::new();
    for _ in 0..count {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        addresses.push(listener.local_addr().unwrap().to_string());
        let service = WorkerService::new(0).with_max_payload(MAX_PAYLOAD).once(true);
        handles.push(tokio::spawn(service.serve(listener)));
    }
    (addresses, handles)
}

#[tokio::test]
async fn coordinator_and_two_workers_rank_tags() {
    let dir = TempDir::new().unwrap();
    write_logs(&dir);

    let (addresses, handles) = spawn_workers(2).await;
    let channels = connect_workers(&addresses, MAX_PAYLOAD).await.unwrap();

    let summary = Coordinator::new(DirectorySource::new(dir.path(), "secure"), channels)
        .run()
        .await
        .unwrap();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(summary.file_count, 3);
    assert_eq!(summary.world_size, 3);
    assert_eq!(
        summary.report.entries(),
        &[
            ("Failed password".to_string(), 4),
            ("Invalid user".to_string(), 2),
            ("Accepted password".to_string(), 1),
        ]
    );
}

#[tokio::test]
async fn more_workers_than_logs() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("secure"),
        "Mar  1 10:00:01 h sshd[101]: Failed password for root from 10.0.0.1 port 22 ssh2\n",
    )
    .unwrap();

    let (addresses, handles) = spawn_workers(4).await;
    let channels = connect_workers(&addresses, MAX_PAYLOAD).await.unwrap();

    let summary = Coordinator::new(DirectorySource::new(dir.path(), "secure"), channels)
        .run()
        .await
        .unwrap();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(summary.world_size, 5);
    assert_eq!(summary.report.entries(), &[("Failed password".to_string(), 1)]);
}

#[tokio::test]
async fn missing_log_dir_fails_the_run() {
    let dir = TempDir::new().unwrap();

    let (addresses, _handles) = spawn_workers(1).await;
    let channels = connect_workers(&addresses, MAX_PAYLOAD).await.unwrap();

    let err = Coordinator::new(DirectorySource::new(dir.path().join("absent"), "secure"), channels)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, TallyError::IoFailure { .. }));
}

#[tokio::test]
async fn unreachable_worker_is_a_transport_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let err = connect_workers(&[addr], MAX_PAYLOAD).await.unwrap_err();
    assert!(matches!(err, TallyError::TransportFailure(_)));
}
