//! Integration tests for the TCP transport.
//!
//! These spin up a real listener on a random port and talk to it over
//! raw sockets, so chunking and coalescing happen exactly as they would
//! on the network.

use std::time::Duration;

use rgmatch_transport::{
    Connection, FramePolicy, FramingError, TcpConnection, TcpTransport,
    Transport, TransportError,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn listen() -> (TcpTransport, String) {
    let transport = TcpTransport::bind("127.0.0.1:0")
        .await
        .expect("should bind");
    let addr = transport.local_addr().expect("local addr").to_string();
    (transport, addr)
}

#[tokio::test]
async fn test_send_and_receive_framed_payloads() {
    let (mut transport, addr) = listen().await;
    let server = tokio::spawn(async move {
        transport.accept().await.expect("should accept")
    });

    let client = TcpConnection::connect(&addr, FramePolicy::Exclusive)
        .await
        .expect("should connect");
    let server_conn = server.await.expect("task should complete");
    assert!(server_conn.id().into_inner() > 0);

    server_conn.send(b"CONNECTED hi").await.unwrap();
    let got = client.recv().await.unwrap().expect("should have data");
    assert_eq!(got, b"CONNECTED hi");

    client.send(b"NAME r1").await.unwrap();
    let got = server_conn.recv().await.unwrap().expect("should have data");
    assert_eq!(got, b"NAME r1");
}

#[tokio::test]
async fn test_byte_at_a_time_delivery() {
    let (mut transport, addr) = listen().await;
    let server = tokio::spawn(async move { transport.accept().await.unwrap() });

    let mut raw = TcpStream::connect(&addr).await.unwrap();
    raw.set_nodelay(true).unwrap();
    let server_conn = server.await.unwrap();

    let reader = tokio::spawn(async move {
        let got = server_conn.recv().await;
        (server_conn, got)
    });
    for b in b"7:NAME r1," {
        raw.write_all(std::slice::from_ref(b)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let (_conn, got) = reader.await.unwrap();
    assert_eq!(got.unwrap(), Some(b"NAME r1".to_vec()));
}

#[tokio::test]
async fn test_queue_policy_keeps_surplus_in_order() {
    let (mut transport, addr) = listen().await;
    let server = tokio::spawn(async move { transport.accept().await.unwrap() });

    let mut raw = TcpStream::connect(&addr).await.unwrap();
    let server_conn = server.await.unwrap();

    raw.write_all(b"4:LIST,5:START,").await.unwrap();
    assert_eq!(server_conn.recv().await.unwrap(), Some(b"LIST".to_vec()));
    assert_eq!(server_conn.recv().await.unwrap(), Some(b"START".to_vec()));
}

#[tokio::test]
async fn test_exclusive_policy_rejects_coalesced_units() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let server = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        sock.write_all(b"1:a,1:b,").await.unwrap();
        sock
    });

    let client = TcpConnection::connect(&addr, FramePolicy::Exclusive)
        .await
        .unwrap();
    let _sock = server.await.unwrap();
    // Both units normally land in one read; give the kernel a moment.
    tokio::time::sleep(Duration::from_millis(20)).await;

    match client.recv().await {
        Err(TransportError::Framing(FramingError::MultipleUnits)) => {}
        other => panic!("expected MultipleUnits, got {other:?}"),
    }
}

#[tokio::test]
async fn test_clean_close_returns_none() {
    let (mut transport, addr) = listen().await;
    let server = tokio::spawn(async move { transport.accept().await.unwrap() });

    let raw = TcpStream::connect(&addr).await.unwrap();
    let server_conn = server.await.unwrap();
    drop(raw);

    assert_eq!(server_conn.recv().await.unwrap(), None);
}

#[tokio::test]
async fn test_close_mid_unit_is_a_framing_error() {
    let (mut transport, addr) = listen().await;
    let server = tokio::spawn(async move { transport.accept().await.unwrap() });

    let mut raw = TcpStream::connect(&addr).await.unwrap();
    let server_conn = server.await.unwrap();
    raw.write_all(b"10:abc").await.unwrap();
    raw.shutdown().await.unwrap();

    match server_conn.recv().await {
        Err(TransportError::Framing(FramingError::Truncated(6))) => {}
        other => panic!("expected Truncated, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_prefix_is_a_framing_error() {
    let (mut transport, addr) = listen().await;
    let server = tokio::spawn(async move { transport.accept().await.unwrap() });

    let mut raw = TcpStream::connect(&addr).await.unwrap();
    let server_conn = server.await.unwrap();
    raw.write_all(b"NAME r1").await.unwrap();

    match server_conn.recv().await {
        Err(TransportError::Framing(FramingError::MalformedPrefix)) => {}
        other => panic!("expected MalformedPrefix, got {other:?}"),
    }
}

#[tokio::test]
async fn test_close_sends_eof() {
    let (mut transport, addr) = listen().await;
    let server = tokio::spawn(async move { transport.accept().await.unwrap() });

    let mut raw = TcpStream::connect(&addr).await.unwrap();
    let server_conn = server.await.unwrap();
    server_conn.close().await.unwrap();

    let mut buf = [0u8; 8];
    let n = raw.read(&mut buf).await.unwrap();
    assert_eq!(n, 0);
}
