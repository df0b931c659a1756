//! The capturing decorator over TLS, without gRPC.

mod common;

use std::os::fd::AsRawFd;

use common::selfsigned;
use common::tls::{client_config, server_config};
use conncapture::{CaptureCredentials, HandshakeError, TlsAuthInfo, TlsCredentials, TransportCredentials};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

#[tokio::test]
async fn test_capture_happens_after_tls() {
    common::init_tracing();
    let identity = selfsigned::generate("localhost");
    assert!(identity.cert_pem.starts_with("-----BEGIN CERTIFICATE-----"));
    assert!(identity.key_pem.contains("PRIVATE KEY"));

    let creds = CaptureCredentials::wrap(TlsCredentials::new(
        client_config(&identity.cert_der),
        server_config(&identity),
    ));
    assert_eq!(creds.info().security_protocol, "tls");

    let (a, b) = UnixStream::pair().unwrap();
    let (client_fd, server_fd) = (a.as_raw_fd(), b.as_raw_fd());

    let server_creds = creds.clone();
    let server = tokio::spawn(async move {
        server_creds
            .capture_server(Box::new(conncapture::Socket::from(b)))
            .await
    });
    let client = creds
        .capture_client("localhost", Box::new(conncapture::Socket::from(a)))
        .await
        .unwrap();
    let server = server.await.unwrap().unwrap();

    // Descriptors pass through the TLS layer to the socket underneath.
    assert_eq!(client.conn.raw_fd().unwrap(), client_fd);
    assert_eq!(server.conn.raw_fd().unwrap(), server_fd);

    let client_auth = client.auth_info.as_ref().unwrap();
    assert_eq!(client_auth.auth_type(), "tls");
    let client_tls = client_auth.as_any().downcast_ref::<TlsAuthInfo>().unwrap();
    assert_eq!(client_tls.peer_certificates, vec![identity.cert_der.clone()]);
    assert!(client_tls.protocol_version.is_some());

    let server_tls = server
        .auth_info
        .as_ref()
        .unwrap()
        .as_any()
        .downcast_ref::<TlsAuthInfo>()
        .unwrap();
    assert!(server_tls.peer_certificates.is_empty());

    // Bytes written through the captured handles are encrypted and decrypted
    // transparently.
    let mut client_conn = client.conn.clone();
    let mut server_conn = server.conn.clone();
    client_conn.write_all(b"hello over tls").await.unwrap();
    client_conn.flush().await.unwrap();
    let mut buf = [0u8; 14];
    server_conn.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"hello over tls");
}

#[tokio::test]
async fn test_wrong_certificate_fails_without_capture() {
    let identity = selfsigned::generate("localhost");
    let other = selfsigned::generate("localhost");

    let server_creds = CaptureCredentials::wrap(TlsCredentials::server(server_config(&identity)));
    let client_creds =
        CaptureCredentials::wrap(TlsCredentials::client(client_config(&other.cert_der)));

    let (a, b) = UnixStream::pair().unwrap();
    let server = tokio::spawn(async move {
        server_creds
            .capture_server(Box::new(conncapture::Socket::from(b)))
            .await
    });

    let err = client_creds
        .capture_client("localhost", Box::new(conncapture::Socket::from(a)))
        .await
        .unwrap_err();
    assert!(matches!(err, HandshakeError::Io(_)));
    assert!(server.await.unwrap().is_err());
}

#[tokio::test]
async fn test_server_name_override_goes_to_tls() {
    let identity = selfsigned::generate("localhost");
    let mut creds = CaptureCredentials::wrap(TlsCredentials::client(client_config(&identity.cert_der)));

    creds.override_server_name("localhost").unwrap();
    assert_eq!(creds.info().server_name, "localhost");
    assert!(matches!(
        creds.override_server_name("bad name"),
        Err(HandshakeError::InvalidServerName(_))
    ));
}
