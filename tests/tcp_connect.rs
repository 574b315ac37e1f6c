//! End-to-end tests for TCP CONNECT

mod common;

use common::*;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[tokio::test]
async fn test_connect_echo() {
    let server = start_server(TestConfigBuilder::new().build()).await;
    let echo = start_tcp_echo().await;

    let mut stream = connect_and_negotiate(server.addr).await;
    stream.write_all(&ipv4_request(0x01, echo)).await.unwrap();

    let (code, bound) = read_ipv4_reply(&mut stream).await;
    assert_eq!(code, 0x00);
    assert_eq!(bound.ip(), Ipv4Addr::LOCALHOST);
    assert_ne!(bound.port(), 0);

    stream.write_all(b"hello through socks").await.unwrap();
    let mut buf = [0u8; 19];
    tokio::time::timeout(Duration::from_secs(2), stream.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf, b"hello through socks");

    // Half-close: the echo server sees EOF and closes its side
    stream.shutdown().await.unwrap();
    let mut rest = Vec::new();
    tokio::time::timeout(Duration::from_secs(2), stream.read_to_end(&mut rest))
        .await
        .unwrap()
        .unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_connect_domain_target() {
    let server = start_server(TestConfigBuilder::new().build()).await;
    let echo = start_tcp_echo().await;

    let mut stream = connect_and_negotiate(server.addr).await;
    let mut request = vec![0x05, 0x01, 0x00, 0x03, 9];
    request.extend_from_slice(b"127.0.0.1");
    request.extend_from_slice(&echo.port().to_be_bytes());
    stream.write_all(&request).await.unwrap();

    let (code, _) = read_ipv4_reply(&mut stream).await;
    assert_eq!(code, 0x00);

    stream.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    stream.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ping");
}

#[tokio::test]
async fn test_connect_refused() {
    let server = start_server(TestConfigBuilder::new().build()).await;
    let target = closed_port().await;

    let mut stream = connect_and_negotiate(server.addr).await;
    stream.write_all(&ipv4_request(0x01, target)).await.unwrap();

    let (code, bound) = read_ipv4_reply(&mut stream).await;
    assert_eq!(code, 0x05);
    assert_eq!(bound, "0.0.0.0:0".parse().unwrap());

    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_bind_not_supported() {
    let server = start_server(TestConfigBuilder::new().build()).await;

    let mut stream = connect_and_negotiate(server.addr).await;
    stream
        .write_all(&ipv4_request(0x02, "127.0.0.1:80".parse().unwrap()))
        .await
        .unwrap();

    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, [0x05, 0x07, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);
}

#[tokio::test]
async fn test_no_acceptable_method() {
    let server = start_server(TestConfigBuilder::new().build()).await;

    let mut stream = tokio::net::TcpStream::connect(server.addr).await.unwrap();
    stream.write_all(&[0x05, 0x01, 0x02]).await.unwrap();

    let mut reply = [0u8; 2];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, [0x05, 0xFF]);

    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_invalid_version_closes_silently() {
    let server = start_server(TestConfigBuilder::new().build()).await;

    let mut stream = tokio::net::TcpStream::connect(server.addr).await.unwrap();
    stream.write_all(&[0x04, 0x01, 0x00]).await.unwrap();

    let mut rest = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(2), stream.read_to_end(&mut rest))
        .await
        .unwrap();
    // The server may reset the connection since a byte was left unread
    if read.is_ok() {
        assert!(rest.is_empty());
    }
}
