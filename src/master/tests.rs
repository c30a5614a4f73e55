//! Master Module Tests
//!
//! ## Test Scopes
//! - **End to End**: a master and real peers on loopback, driven through `DfsClient`.
//! - **Gating**: readiness, membership bounds and input validation as seen by clients.
//! - **Lifecycle**: peer loss and cluster shutdown.

#[cfg(test)]
mod tests {
    use crate::client::DfsClient;
    use crate::cluster::{ConnectionStatus, HealthSettings};
    use crate::config::MasterConfig;
    use crate::error::DfsError;
    use crate::master::Master;
    use crate::peer::{PeerService, register_with_master};
    use crate::stripe::RecordSizes;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    struct TestPeer {
        service: Arc<PeerService>,
        address: String,
        server: JoinHandle<()>,
        _dir: TempDir,
    }

    fn test_config(target_size: usize) -> MasterConfig {
        MasterConfig {
            target_size,
            bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            health: HealthSettings {
                interval: Duration::from_millis(50),
                dial_timeout: Duration::from_secs(1),
                ping_timeout: Duration::from_secs(1),
            },
            call_timeout: Duration::from_secs(2),
        }
    }

    async fn spawn_master(target_size: usize) -> (Arc<Master>, DfsClient) {
        let master = Master::new(&test_config(target_size)).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let server = master.clone();
        tokio::spawn(async move {
            server
                .serve(listener, std::future::pending())
                .await
                .unwrap();
        });

        let client = DfsClient::with_timeout(&address, Duration::from_secs(5)).unwrap();
        (master, client)
    }

    async fn spawn_peer(client: &DfsClient) -> TestPeer {
        let dir = TempDir::new().unwrap();
        let service = PeerService::open(dir.path()).await.unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let server = service.clone();
        let server = tokio::spawn(async move {
            server.serve(listener).await.unwrap();
        });

        register_with_master(client, &address, 3).await.unwrap();

        TestPeer {
            service,
            address,
            server,
            _dir: dir,
        }
    }

    /// Waits until the master reports every peer connected.
    async fn wait_connected(client: &DfsClient) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let status = client.status().await.unwrap();
            let all_connected = status.peers.len() == status.target_size
                && status
                    .peers
                    .iter()
                    .all(|peer| peer.status == ConnectionStatus::Connected);
            if status.ready && all_connected {
                return;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "cluster never became ready: {:?}",
                status.peers
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    fn mapping(name: &str, size: u32) -> RecordSizes {
        RecordSizes::from([(name.to_string(), size)])
    }

    // ============================================================
    // END TO END TESTS
    // ============================================================

    #[tokio::test]
    async fn test_striped_round_trip_over_http() {
        let (_master, client) = spawn_master(3).await;
        let mut peers = Vec::new();
        for _ in 0..3 {
            peers.push(spawn_peer(&client).await);
        }
        wait_connected(&client).await;

        // Data operations need the mapping first
        assert_eq!(
            client.write_bytes("log.dat", 0, vec![1; 5]).await,
            Err(DfsError::RecordMapUnset)
        );

        client.init_mapping(mapping("log.dat", 5)).await.unwrap();
        client.create_file("log.dat").await.unwrap();
        assert!(client.file_exists("log.dat").await.unwrap());

        let data: Vec<u8> = (1u8..=15).collect();
        client.write_bytes("log.dat", 0, data.clone()).await.unwrap();
        assert_eq!(client.read_bytes("log.dat", 0, 15).await.unwrap(), data);
        assert_eq!(
            client.read_bytes("log.dat", 5, 5).await.unwrap(),
            data[5..10].to_vec()
        );

        // Records 1, 2, 3 live on the second, third and first peer to register
        let on_disk = |peer: &TestPeer, offset| {
            let service = peer.service.clone();
            async move { service.store().read("log.dat", offset, 5).await.unwrap() }
        };
        assert_eq!(on_disk(&peers[1], 0).await, data[0..5].to_vec());
        assert_eq!(on_disk(&peers[2], 5).await, data[5..10].to_vec());
        assert_eq!(on_disk(&peers[0], 10).await, data[10..15].to_vec());

        client.delete_file("log.dat").await.unwrap();
        assert!(!client.file_exists("log.dat").await.unwrap());
        for peer in &peers {
            assert!(!peer.service.store().exists("log.dat").await.unwrap());
        }
    }

    // ============================================================
    // GATING TESTS
    // ============================================================

    #[tokio::test]
    async fn test_partial_cluster_is_not_ready() {
        let (_master, client) = spawn_master(2).await;
        let _peer = spawn_peer(&client).await;
        client.init_mapping(mapping("log.dat", 5)).await.unwrap();

        let status = client.status().await.unwrap();
        assert!(!status.ready);
        assert_eq!(status.peers.len(), 1);

        assert_eq!(
            client.write_bytes("log.dat", 0, vec![1; 5]).await,
            Err(DfsError::NotReady)
        );
        assert_eq!(client.file_exists("log.dat").await, Err(DfsError::NotReady));
    }

    #[tokio::test]
    async fn test_registration_beyond_target_is_rejected() {
        let (_master, client) = spawn_master(1).await;
        let first = spawn_peer(&client).await;

        let again = client.register_peer(&first.address).await.unwrap();
        assert!(!again.added);
        assert_eq!(again.registered, 1);

        let result = client.register_peer("127.0.0.1:1").await;
        assert_eq!(result, Err(DfsError::ClusterFull { target: 1 }));
    }

    #[tokio::test]
    async fn test_invalid_requests_are_rejected() {
        let (_master, client) = spawn_master(1).await;
        let _peer = spawn_peer(&client).await;
        wait_connected(&client).await;

        let zero = client.init_mapping(mapping("log.dat", 0)).await;
        assert!(matches!(zero, Err(DfsError::InvalidRecordSize { .. })));

        client.init_mapping(mapping("log.dat", 4)).await.unwrap();

        assert!(matches!(
            client.read_bytes("log.dat", -4, 4).await,
            Err(DfsError::Misaligned { .. })
        ));
        assert!(matches!(
            client.write_bytes("log.dat", 0, vec![0; 3]).await,
            Err(DfsError::Misaligned { .. })
        ));
        assert!(matches!(
            client.read_bytes("other.dat", 0, 4).await,
            Err(DfsError::UnknownRecordSize { .. })
        ));
        assert!(matches!(
            client.read_bytes("log.dat", 0, i32::MAX - 3).await,
            Err(DfsError::RequestTooLarge { .. })
        ));

        // The master is still serving
        assert!(client.status().await.unwrap().ready);
    }

    #[tokio::test]
    async fn test_unreachable_master_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let client = DfsClient::with_timeout(&address, Duration::from_secs(1)).unwrap();
        assert!(matches!(
            client.status().await,
            Err(DfsError::Transport { .. })
        ));
    }

    // ============================================================
    // LIFECYCLE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_lost_peer_makes_cluster_unready() {
        let (master, client) = spawn_master(2).await;
        let first = spawn_peer(&client).await;
        let _second = spawn_peer(&client).await;
        wait_connected(&client).await;

        first.service.request_shutdown();
        first.server.await.unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while master.cluster().is_ready() {
            assert!(tokio::time::Instant::now() < deadline, "peer loss never noticed");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let status = client.status().await.unwrap();
        assert_eq!(status.peers[0].status, ConnectionStatus::Disconnected);
        assert_eq!(client.create_file("x.dat").await, Err(DfsError::NotReady));
    }

    #[tokio::test]
    async fn test_shutdown_stops_connected_peers() {
        let (master, client) = spawn_master(2).await;
        let first = spawn_peer(&client).await;
        let second = spawn_peer(&client).await;
        wait_connected(&client).await;

        assert_eq!(master.shutdown_peers().await, 2);

        for peer in [first, second] {
            tokio::time::timeout(Duration::from_secs(5), peer.server)
                .await
                .expect("peer did not stop")
                .unwrap();
        }
    }
}
