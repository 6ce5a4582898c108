//! Opening transports for stream connections.

use super::ConnectionParameters;
use crate::error::{Error, Result};
use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, TcpKeepalive, Type};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpSocket, TcpStream};
use tracing::debug;

/// Keepalive idle time for dialed sockets
const KEEPALIVE_TIME: Duration = Duration::from_secs(60);

/// Opens the byte stream a [`StreamConnection`](super::StreamConnection) runs on.
#[async_trait]
pub trait Dialer: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    async fn dial(&self, parameters: &ConnectionParameters) -> Result<Self::Stream>;
}

/// Dials TCP with nodelay and keepalive set.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

#[async_trait]
impl Dialer for TcpDialer {
    type Stream = TcpStream;

    async fn dial(&self, parameters: &ConnectionParameters) -> Result<TcpStream> {
        let addr = resolve(&parameters.address).await?;
        let socket = create_socket(addr)
            .map_err(|e| Error::io(format!("failed to create socket for {addr}"), e))?;

        let stream = tokio::time::timeout(parameters.connect_timeout, socket.connect(addr))
            .await
            .map_err(|_| Error::communication(format!("timed out connecting to {addr}")))?
            .map_err(|e| Error::io(format!("failed to connect to {addr}"), e))?;

        debug!(address = %addr, "Dialed");
        Ok(stream)
    }
}

async fn resolve(address: &str) -> Result<SocketAddr> {
    tokio::net::lookup_host(address)
        .await
        .map_err(|e| Error::io(format!("failed to resolve '{address}'"), e))?
        .next()
        .ok_or_else(|| Error::communication(format!("no addresses found for '{address}'")))
}

fn create_socket(addr: SocketAddr) -> std::io::Result<TcpSocket> {
    let socket = Socket::new(
        match addr {
            SocketAddr::V4(_) => Domain::IPV4,
            SocketAddr::V6(_) => Domain::IPV6,
        },
        Type::STREAM,
        Some(Protocol::TCP),
    )?;

    socket.set_nodelay(true)?;
    socket.set_tcp_keepalive(&TcpKeepalive::new().with_time(KEEPALIVE_TIME))?;
    socket.set_nonblocking(true)?;

    Ok(TcpSocket::from_std_stream(socket.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_dial_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            socket.read_exact(&mut buf).await.unwrap();
            buf
        });

        let parameters = ConnectionParameters::new(address);
        let mut stream = TcpDialer.dial(&parameters).await.unwrap();
        assert!(stream.nodelay().unwrap());
        stream.write_all(b"PING").await.unwrap();

        assert_eq!(&server.await.unwrap(), b"PING");
    }

    #[tokio::test]
    async fn test_dial_unresolvable_address() {
        let parameters = ConnectionParameters::new("not an address");
        let err = TcpDialer.dial(&parameters).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
