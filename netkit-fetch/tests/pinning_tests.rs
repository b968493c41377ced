//! Certificate pinning against a local TLS server.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use netkit_core::{NetworkingError, Request, TransportErrorKind};
use netkit_fetch::{Session, SessionSettings};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{ServerConfig, ServerConnection, StreamOwned};
use tempfile::TempDir;

const BODY: &[u8] = br#"{"ok":true}"#;

/// Serves `BODY` over TLS with a fresh self-signed certificate.
///
/// Returns the port and the server certificate in DER form.
fn spawn_tls_server() -> (u16, Vec<u8>) {
    let certified =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string(), "127.0.0.1".to_string()])
            .unwrap();
    let cert_der = certified.cert.der().to_vec();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der()));

    let config = ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .unwrap()
    .with_no_client_auth()
    .with_single_cert(vec![CertificateDer::from(cert_der.clone())], key)
    .unwrap();
    let config = Arc::new(config);

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            let Ok(connection) = ServerConnection::new(Arc::clone(&config)) else {
                continue;
            };
            let mut tls = StreamOwned::new(connection, stream);

            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                match tls.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        request.extend_from_slice(&buf[..n]);
                        if request.windows(4).any(|w| w == b"\r\n\r\n") {
                            break;
                        }
                    }
                }
            }
            if request.is_empty() {
                continue;
            }

            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                BODY.len()
            );
            let _ = tls.write_all(head.as_bytes());
            let _ = tls.write_all(BODY);
            let _ = tls.flush();
            tls.conn.send_close_notify();
            let _ = tls.flush();
        }
    });

    (port, cert_der)
}

fn write_pin(dir: &TempDir, name: &str, der: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, der).unwrap();
    path
}

fn other_certificate() -> Vec<u8> {
    rcgen::generate_simple_self_signed(vec!["example.com".to_string()])
        .unwrap()
        .cert
        .der()
        .to_vec()
}

fn session(pins: Vec<PathBuf>) -> Session {
    Session::new(
        SessionSettings::default()
            .with_timeouts(Duration::from_secs(5), Duration::from_secs(10))
            .with_system_proxy(false)
            .with_pinned_certificates(pins),
    )
    .unwrap()
}

fn request(port: u16) -> Request {
    Request::get(&format!("https://127.0.0.1:{port}/status")).unwrap()
}

#[tokio::test]
async fn test_pinned_server_is_accepted() {
    let (port, server_der) = spawn_tls_server();
    let dir = tempfile::tempdir().unwrap();
    let session = session(vec![
        write_pin(&dir, "other.der", &other_certificate()),
        write_pin(&dir, "server.der", &server_der),
    ]);

    let body = session.dispatch_bytes(request(port)).await.unwrap();
    assert_eq!(body, BODY);
}

#[tokio::test]
async fn test_unpinned_server_is_cancelled() {
    let (port, _) = spawn_tls_server();
    let dir = tempfile::tempdir().unwrap();
    let session = session(vec![
        write_pin(&dir, "a.der", &other_certificate()),
        write_pin(&dir, "b.der", &other_certificate()),
        write_pin(&dir, "c.der", &other_certificate()),
    ]);

    let err = session.dispatch_bytes(request(port)).await.unwrap_err();
    let NetworkingError::RequestCancelled(cause) = &err else {
        panic!("expected cancellation, got {err:?}");
    };
    assert!(cause.is_pin_rejection());
    assert_eq!(session.in_flight_count(), 0);
}

#[tokio::test]
async fn test_no_pins_defers_to_default_verification() {
    let (port, _) = spawn_tls_server();
    let session = session(Vec::new());

    let err = session.dispatch_bytes(request(port)).await.unwrap_err();
    let NetworkingError::Underlying { source, .. } = &err else {
        panic!("expected underlying TLS failure, got {err:?}");
    };
    assert_eq!(source.kind(), TransportErrorKind::Tls);
    assert!(!source.is_pin_rejection());
}

#[tokio::test]
async fn test_trust_all_accepts_unpinned_server() {
    let (port, _) = spawn_tls_server();
    let dir = tempfile::tempdir().unwrap();
    let session = session(vec![write_pin(&dir, "other.der", &other_certificate())]);

    session.trust_all_peers().unwrap();
    let body = session.dispatch_bytes(request(port)).await.unwrap();
    assert_eq!(body, BODY);

    session.use_pinning().unwrap();
    let err = session.dispatch_bytes(request(port)).await.unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn test_json_over_pinned_connection() {
    #[derive(serde::Deserialize)]
    struct Status {
        ok: bool,
    }

    let (port, server_der) = spawn_tls_server();
    let dir = tempfile::tempdir().unwrap();
    let session = session(vec![write_pin(&dir, "server.der", &server_der)]);

    let status: Status = session.dispatch(request(port)).await.unwrap();
    assert!(status.ok);
}
