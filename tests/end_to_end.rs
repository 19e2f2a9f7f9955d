#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Full client/server exchanges over real TCP sockets.
//!
//! Every test binds its own server on an ephemeral port and drives it with
//! the blocking wire client, so the tests exercise the same code paths a
//! faulting region does, minus the signal handler.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;

use netmem::config::ServerConfig;
use netmem::error::NetmemError;
use netmem::protocol::frame::encode_connect;
use netmem::service::{PageClient, PageServer};

const PAGE: u64 = 4096;
const MEMORY: u64 = 64 * 1024;

/// A test server on its own thread. Dropping the handle drops the shutdown
/// sender, which stops the accept loop between connections.
struct ServerHandle {
    addr: SocketAddr,
    _shutdown: tokio::sync::mpsc::Sender<()>,
}

fn spawn_server(config: ServerConfig) -> ServerHandle {
    let (shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
    let (addr_tx, addr_rx) = std::sync::mpsc::channel();

    thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("failed to build runtime");
        runtime.block_on(async move {
            let server = PageServer::bind(config).await.expect("failed to bind server");
            addr_tx
                .send(server.local_addr())
                .expect("address channel closed");
            server
                .run_with_shutdown(shutdown_rx)
                .await
                .expect("server loop failed");
        });
    });

    let addr = addr_rx.recv().expect("server did not start");
    ServerHandle {
        addr,
        _shutdown: shutdown_tx,
    }
}

fn test_config() -> ServerConfig {
    ServerConfig {
        address: "127.0.0.1:0".to_string(),
        page_size: PAGE,
        max_memory_size: 1024 * 1024,
        persist_path: None,
    }
}

// ============================================================================
// HANDSHAKE AND FETCH
// ============================================================================

#[test]
fn test_handshake_and_pattern_fetch() {
    let server = spawn_server(test_config());
    let mut client = PageClient::connect(server.addr, PAGE, MEMORY).expect("handshake failed");

    assert_eq!(client.page_size(), PAGE);
    assert_eq!(client.memory_size(), MEMORY);

    // A fresh store serves block i filled with 0xA0 + i.
    let mut buf = vec![0u8; PAGE as usize];
    for page in 0..(MEMORY / PAGE) {
        client
            .fetch_page_into(page * PAGE, &mut buf)
            .expect("fetch failed");
        let expected = 0xA0u8.wrapping_add(page as u8);
        assert!(
            buf.iter().all(|&b| b == expected),
            "page {page} should be filled with {expected:#04x}"
        );
    }

    client.disconnect().expect("disconnect failed");
}

#[test]
fn test_unaligned_fetch_spans_blocks() {
    let server = spawn_server(test_config());
    let mut client = PageClient::connect(server.addr, PAGE, MEMORY).expect("handshake failed");

    // Offsets index the store directly; an unaligned fetch straddles two
    // pattern blocks.
    let mut buf = vec![0u8; PAGE as usize];
    client.fetch_page_into(8, &mut buf).expect("fetch failed");
    let split = PAGE as usize - 8;
    assert!(buf[..split].iter().all(|&b| b == 0xA0));
    assert!(buf[split..].iter().all(|&b| b == 0xA1));
}

// ============================================================================
// SYNC
// ============================================================================

#[test]
fn test_sync_then_fetch_round_trip() {
    let server = spawn_server(test_config());
    let mut client = PageClient::connect(server.addr, PAGE, MEMORY).expect("handshake failed");

    let page = vec![0x5Au8; PAGE as usize];
    client.sync_page(0x2000, &page).expect("sync failed");

    let mut buf = vec![0u8; PAGE as usize];
    client.fetch_page_into(0x2000, &mut buf).expect("fetch failed");
    assert_eq!(buf, page);

    // Neighbouring pages keep the pattern.
    client.fetch_page_into(0x1000, &mut buf).expect("fetch failed");
    assert!(buf.iter().all(|&b| b == 0xA1));
    client.fetch_page_into(0x3000, &mut buf).expect("fetch failed");
    assert!(buf.iter().all(|&b| b == 0xA3));
}

#[test]
fn test_out_of_bounds_sync_keeps_connection() {
    let server = spawn_server(test_config());
    let mut client = PageClient::connect(server.addr, PAGE, MEMORY).expect("handshake failed");

    let page = vec![0u8; PAGE as usize];
    let err = client.sync_page(MEMORY, &page).unwrap_err();
    assert!(
        matches!(err, NetmemError::SyncRejected { offset } if offset == MEMORY),
        "unexpected error: {err:?}"
    );

    // The connection survives a rejected sync.
    let mut buf = vec![0u8; PAGE as usize];
    client.fetch_page_into(0, &mut buf).expect("fetch after rejected sync");
    assert!(buf.iter().all(|&b| b == 0xA0));
}

#[test]
fn test_sync_persists_store_to_disk() {
    let path = std::env::temp_dir().join(format!("netmem-e2e-persist-{}.bin", std::process::id()));
    let _ = std::fs::remove_file(&path);

    let mut config = test_config();
    config.persist_path = Some(path.clone());
    let server = spawn_server(config);

    let mut client = PageClient::connect(server.addr, PAGE, MEMORY).expect("handshake failed");
    let page = vec![0xC3u8; PAGE as usize];
    client.sync_page(0x1000, &page).expect("sync failed");

    // SYNC_OK is only sent after the persist write, so the file is complete
    // by the time sync_page returns.
    let image = std::fs::read(&path).expect("persist file missing");
    assert_eq!(image.len() as u64, MEMORY);
    assert!(image[0x1000..0x2000].iter().all(|&b| b == 0xC3));
    assert!(image[..0x1000].iter().all(|&b| b == 0xA0));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_persisted_store_restored_for_next_session() {
    let path = std::env::temp_dir().join(format!("netmem-e2e-restore-{}.bin", std::process::id()));
    let _ = std::fs::remove_file(&path);

    let mut config = test_config();
    config.persist_path = Some(path.clone());
    let server = spawn_server(config);

    let mut first = PageClient::connect(server.addr, PAGE, MEMORY).expect("handshake failed");
    let page = vec![0x99u8; PAGE as usize];
    first.sync_page(0x3000, &page).expect("sync failed");
    first.disconnect().expect("disconnect failed");

    // The next session's store is initialized from the persisted image, so
    // the synced page survives the reconnect.
    let mut second = PageClient::connect(server.addr, PAGE, MEMORY).expect("reconnect failed");
    let mut buf = vec![0u8; PAGE as usize];
    second.fetch_page_into(0x3000, &mut buf).expect("fetch failed");
    assert!(buf.iter().all(|&b| b == 0x99));

    // Unsynced blocks were persisted with their pattern content.
    second.fetch_page_into(0x2000, &mut buf).expect("fetch failed");
    assert!(buf.iter().all(|&b| b == 0xA2));

    let _ = std::fs::remove_file(&path);
}

// ============================================================================
// BOUNDS AND TEARDOWN
// ============================================================================

#[test]
fn test_out_of_bounds_fetch_tears_connection() {
    let server = spawn_server(test_config());
    let mut client = PageClient::connect(server.addr, PAGE, MEMORY).expect("handshake failed");

    // The page payload has no status channel ahead of it, so the server's
    // only refusal is to drop the connection.
    let mut buf = vec![0u8; PAGE as usize];
    let err = client.fetch_page_into(MEMORY, &mut buf).unwrap_err();
    match err {
        NetmemError::PeerClosed | NetmemError::Io(_) => {}
        other => panic!("expected connection teardown, got {other:?}"),
    }

    // The accept loop survives and serves the next client.
    let mut next = PageClient::connect(server.addr, PAGE, MEMORY).expect("reconnect failed");
    next.fetch_page_into(0, &mut buf).expect("fetch failed");
    assert!(buf.iter().all(|&b| b == 0xA0));
}

#[test]
fn test_disconnect_then_next_session() {
    let server = spawn_server(test_config());

    let mut first = PageClient::connect(server.addr, PAGE, MEMORY).expect("handshake failed");
    let page = vec![0x11u8; PAGE as usize];
    first.sync_page(0, &page).expect("sync failed");
    first.disconnect().expect("disconnect failed");

    // The store dies with the session; the next client sees a fresh pattern.
    let mut second = PageClient::connect(server.addr, PAGE, MEMORY).expect("reconnect failed");
    let mut buf = vec![0u8; PAGE as usize];
    second.fetch_page_into(0, &mut buf).expect("fetch failed");
    assert!(buf.iter().all(|&b| b == 0xA0));
}

// ============================================================================
// HANDSHAKE REJECTION
// ============================================================================

#[test]
fn test_wrong_page_size_is_nacked() {
    let server = spawn_server(test_config());

    let err = PageClient::connect(server.addr, 8192, MEMORY).unwrap_err();
    assert!(
        matches!(
            err,
            NetmemError::NegotiationRejected {
                page_size: 8192,
                memory_size: MEMORY,
            }
        ),
        "unexpected error: {err:?}"
    );

    // A NACK closes that connection but the server keeps listening.
    PageClient::connect(server.addr, PAGE, MEMORY).expect("follow-up handshake failed");
}

#[test]
fn test_invalid_geometry_is_nacked() {
    let server = spawn_server(test_config());

    // Zero size, size not a multiple of the page, size over the server limit.
    for memory_size in [0, 6000, 2 * 1024 * 1024] {
        let err = PageClient::connect(server.addr, PAGE, memory_size).unwrap_err();
        assert!(
            matches!(err, NetmemError::NegotiationRejected { .. }),
            "memory_size {memory_size}: unexpected error: {err:?}"
        );
    }
}

// ============================================================================
// PROTOCOL VIOLATIONS (RAW WIRE)
// ============================================================================

#[test]
fn test_unknown_first_byte_tears_connection() {
    let server = spawn_server(test_config());

    let mut stream = TcpStream::connect(server.addr).expect("connect failed");
    stream.write_all(&[0x42]).expect("write failed");

    // The server tears the connection down without a response.
    let mut byte = [0u8; 1];
    let n = stream.read(&mut byte).expect("read failed");
    assert_eq!(n, 0, "expected EOF after a protocol violation");
}

#[test]
fn test_second_connect_tears_connection() {
    let server = spawn_server(test_config());

    let mut stream = TcpStream::connect(server.addr).expect("connect failed");
    stream
        .write_all(&encode_connect(PAGE, MEMORY))
        .expect("write failed");

    let mut status = [0u8; 1];
    stream.read_exact(&mut status).expect("read failed");
    assert_eq!(status[0], 0xE0, "expected ACK");

    // CONNECT is only valid as the first request.
    stream
        .write_all(&encode_connect(PAGE, MEMORY))
        .expect("write failed");
    let mut byte = [0u8; 1];
    let n = stream.read(&mut byte).expect("read failed");
    assert_eq!(n, 0, "expected EOF after a repeated CONNECT");
}
