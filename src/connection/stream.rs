//! Single-socket connection.
//!
//! Commands are written as RESP arrays; replies are framed out of a
//! `BytesMut` read buffer one at a time. A transport failure drops the
//! socket and the next command reconnects, replaying the handshake and any
//! registered connect commands.

use super::{Connection, Dialer, RetryPolicy, TcpDialer};
use crate::command::Command;
use crate::error::{Error, ProtocolError, Result};
use crate::resp::{parse, FrameScanner, ParseResult, Response};
use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, trace, warn};

/// Read buffer size
const BUFFER_SIZE: usize = 16 * 1024;

/// How to reach and greet one server.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionParameters {
    /// `host:port`
    pub address: String,
    /// RESP version, 2 or 3
    pub protocol: u8,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<u32>,
    pub client_name: Option<String>,
    pub connect_timeout: Duration,
    /// Applies to every socket read and write (None = wait forever)
    pub read_write_timeout: Option<Duration>,
    /// Turn error replies into `Error::Server`
    pub exceptions: bool,
    pub retry: RetryPolicy,
}

impl Default for ConnectionParameters {
    fn default() -> Self {
        ConnectionParameters {
            address: "127.0.0.1:6379".to_string(),
            protocol: 3,
            username: None,
            password: None,
            database: None,
            client_name: None,
            connect_timeout: Duration::from_secs(5),
            read_write_timeout: None,
            exceptions: false,
            retry: RetryPolicy::default(),
        }
    }
}

impl ConnectionParameters {
    pub fn new(address: impl Into<String>) -> Self {
        ConnectionParameters {
            address: address.into(),
            ..Self::default()
        }
    }
}

pub struct StreamConnection<D: Dialer = TcpDialer> {
    dialer: D,
    parameters: ConnectionParameters,
    stream: Option<D::Stream>,
    buffer: BytesMut,
    scanner: FrameScanner,
    connect_commands: Vec<Command>,
    client_id: Option<i64>,
    epoch: u64,
}

impl StreamConnection<TcpDialer> {
    pub fn tcp(parameters: ConnectionParameters) -> Self {
        Self::new(TcpDialer, parameters)
    }
}

impl<D: Dialer> StreamConnection<D> {
    /// Create an unconnected connection; the socket opens on first use.
    pub fn new(dialer: D, parameters: ConnectionParameters) -> Self {
        StreamConnection {
            dialer,
            parameters,
            stream: None,
            buffer: BytesMut::with_capacity(BUFFER_SIZE),
            scanner: FrameScanner::new(),
            connect_commands: Vec::new(),
            client_id: None,
            epoch: 0,
        }
    }

    pub fn parameters(&self) -> &ConnectionParameters {
        &self.parameters
    }

    /// Connection id reported by the server during the handshake.
    pub fn client_id(&self) -> Option<i64> {
        self.client_id
    }

    fn drop_stream(&mut self) {
        if self.stream.take().is_some() {
            debug!(address = %self.parameters.address, "Connection dropped");
        }
        self.buffer.clear();
        self.scanner.reset();
    }

    async fn ensure_connected(&mut self) -> Result<()> {
        if self.stream.is_none() {
            self.connect().await?;
        }
        Ok(())
    }

    async fn send(&mut self, command: &Command) -> Result<()> {
        let timeout = self.parameters.read_write_timeout;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::communication("not connected"))?;

        trace!(command = %command.id(), "Writing command");
        let result = write_all(stream, &command.serialize(), timeout).await;
        if result.is_err() {
            self.drop_stream();
        }
        result
    }

    /// Read one frame. Timeouts leave the socket open; any other transport
    /// failure or a framing error drops it.
    async fn read_frame(&mut self) -> Result<Response> {
        loop {
            match self.scanner.scan(&self.buffer) {
                Ok(Some(len)) => return self.take_frame(len),
                Ok(None) => {}
                Err(e) => return Err(self.protocol_failure(e)),
            }

            let timeout = self.parameters.read_write_timeout;
            let stream = self
                .stream
                .as_mut()
                .ok_or_else(|| Error::communication("not connected"))?;

            match with_timeout(timeout, stream.read_buf(&mut self.buffer)).await {
                Ok(0) => {
                    self.drop_stream();
                    return Err(Error::communication("connection closed by server"));
                }
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                    return Err(Error::io("timed out reading from the server", e));
                }
                Err(e) => {
                    self.drop_stream();
                    return Err(Error::io("error while reading from the server", e));
                }
            }
        }
    }

    /// Decode the first `len` buffered bytes, already known to hold exactly
    /// one frame.
    fn take_frame(&mut self, len: usize) -> Result<Response> {
        match parse(&self.buffer[..len]) {
            ParseResult::Complete(response, _) => {
                self.buffer.advance(len);
                trace!(?response, "Frame received");
                Ok(response)
            }
            ParseResult::Incomplete => {
                let e = ProtocolError::Invalid("frame ended early".to_string());
                Err(self.protocol_failure(e))
            }
            ParseResult::Error(e) => Err(self.protocol_failure(e)),
        }
    }

    fn protocol_failure(&mut self, e: ProtocolError) -> Error {
        warn!(error = %e, "Protocol error, closing connection");
        self.drop_stream();
        e.into()
    }

    /// Read one frame, re-reading after communication errors while the
    /// socket survives.
    async fn read_with_retry(&mut self) -> Result<Response> {
        let retry = self.parameters.retry;
        let mut delays = retry.delays();
        loop {
            match self.read_frame().await {
                Err(e) if e.is_retryable() && self.stream.is_some() => match delays.next() {
                    Some(delay) => {
                        warn!(
                            error = %e,
                            delay_us = delay.as_micros() as u64,
                            "Read failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        // A late reply would pair with the next command
                        self.drop_stream();
                        return Err(e);
                    }
                },
                result => return result,
            }
        }
    }

    async fn initialize(&mut self) -> Result<()> {
        if self.parameters.protocol >= 3 {
            self.hello().await?;
        } else if let Some(password) = self.parameters.password.clone() {
            let auth = auth_command(self.parameters.username.as_deref(), &password);
            self.run_init_command(&auth).await?;
        }

        if let Some(database) = self.parameters.database {
            self.run_init_command(&Command::raw("SELECT", [database])).await?;
        }

        if self.parameters.protocol < 3 {
            if let Some(name) = self.parameters.client_name.clone() {
                self.run_init_command(&Command::raw("CLIENT", ["SETNAME", name.as_str()]))
                    .await?;
            }
        }

        for command in self.connect_commands.clone() {
            self.run_init_command(&command).await?;
        }
        Ok(())
    }

    /// `HELLO 3 [AUTH user pass] [SETNAME name]`, falling back to a plain
    /// `AUTH` when the server rejects the credentials form.
    async fn hello(&mut self) -> Result<()> {
        let mut hello = Command::raw("HELLO", [self.parameters.protocol.to_string()]);
        if let Some(password) = &self.parameters.password {
            let username = self.parameters.username.as_deref().unwrap_or("default");
            hello = hello.args(["AUTH", username, password.as_str()]);
        }
        if let Some(name) = &self.parameters.client_name {
            hello = hello.args(["SETNAME", name.as_str()]);
        }

        self.send(&hello).await?;
        match self.read_frame().await? {
            Response::Error(err) => match self.parameters.password.clone() {
                Some(password) => {
                    debug!(error = %err, "HELLO rejected, falling back to AUTH");
                    let auth = auth_command(self.parameters.username.as_deref(), &password);
                    self.run_init_command(&auth).await?;
                    if let Some(name) = self.parameters.client_name.clone() {
                        self.run_init_command(&Command::raw("CLIENT", ["SETNAME", name.as_str()]))
                            .await?;
                    }
                    Ok(())
                }
                None => Err(Error::Server(err)),
            },
            reply => {
                self.client_id = hello_client_id(&reply);
                Ok(())
            }
        }
    }

    /// Error replies to `CLIENT` commands are ignored; any other error
    /// reply fails the connect.
    async fn run_init_command(&mut self, command: &Command) -> Result<()> {
        self.send(command).await?;
        match self.read_frame().await? {
            Response::Error(err) if command.id() == "CLIENT" => {
                debug!(error = %err, "Ignoring CLIENT error during connect");
                Ok(())
            }
            Response::Error(err) => Err(Error::Server(err)),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl<D: Dialer> Connection for StreamConnection<D> {
    async fn connect(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let dialer = &self.dialer;
        let parameters = &self.parameters;
        let stream = parameters
            .retry
            .retry_on_error(
                || dialer.dial(parameters),
                |e| {
                    warn!(address = %parameters.address, error = %e, "Connect failed");
                    Ok(())
                },
            )
            .await?;

        self.stream = Some(stream);
        self.buffer.clear();
        self.scanner.reset();
        self.client_id = None;

        if let Err(e) = self.initialize().await {
            self.drop_stream();
            return Err(e);
        }

        self.epoch += 1;
        info!(
            address = %self.parameters.address,
            protocol = self.parameters.protocol,
            epoch = self.epoch,
            "Connected"
        );
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.drop_stream();
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn write_request(&mut self, command: &Command) -> Result<()> {
        self.ensure_connected().await?;
        self.send(command).await
    }

    async fn read_response(&mut self, _command: &Command) -> Result<Response> {
        match self.read_with_retry().await? {
            Response::Error(err) if self.parameters.exceptions => Err(Error::Server(err)),
            response => Ok(response),
        }
    }

    async fn read(&mut self) -> Result<Response> {
        self.read_with_retry().await
    }

    async fn has_data_to_read(&mut self) -> bool {
        if !self.buffer.is_empty() {
            return true;
        }
        let Some(stream) = self.stream.as_mut() else {
            return false;
        };

        // A zero timeout polls the socket once without waiting
        match tokio::time::timeout(Duration::ZERO, stream.read_buf(&mut self.buffer)).await {
            Ok(Ok(0)) | Ok(Err(_)) => {
                self.drop_stream();
                false
            }
            Ok(Ok(_)) => true,
            Err(_) => false,
        }
    }

    fn add_connect_command(&mut self, command: Command) {
        self.connect_commands.push(command);
    }

    fn epoch(&self) -> u64 {
        self.epoch
    }
}

fn auth_command(username: Option<&str>, password: &str) -> Command {
    match username {
        Some(username) => Command::raw("AUTH", [username, password]),
        None => Command::raw("AUTH", [password]),
    }
}

/// The `id` field of a HELLO reply: a map under RESP3, a flat
/// field/value array under RESP2.
fn hello_client_id(reply: &Response) -> Option<i64> {
    let is_id = |field: &Response| field.as_str() == Some("id");
    let value = match reply {
        Response::Map(pairs) => pairs.iter().find(|(k, _)| is_id(k)).map(|(_, v)| v),
        Response::Array(items) => items
            .chunks(2)
            .find(|pair| is_id(&pair[0]))
            .and_then(|pair| pair.get(1)),
        _ => None,
    };
    match value {
        Some(Response::Integer(id)) => Some(*id),
        _ => None,
    }
}

async fn with_timeout<F, T>(limit: Option<Duration>, future: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, future)
            .await
            .unwrap_or_else(|_| Err(io::ErrorKind::TimedOut.into())),
        None => future.await,
    }
}

/// Write until the whole buffer is flushed; a zero-length write means the
/// peer is gone.
async fn write_all<S>(stream: &mut S, mut buf: &[u8], timeout: Option<Duration>) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    while !buf.is_empty() {
        match with_timeout(timeout, stream.write(buf)).await {
            Ok(0) => return Err(Error::communication("error while writing bytes to the server")),
            Ok(n) => buf = &buf[n..],
            Err(e) => return Err(Error::io("error while writing bytes to the server", e)),
        }
    }
    stream
        .flush()
        .await
        .map_err(|e| Error::io("error while flushing to the server", e))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use tokio::io::AsyncRead;
    use tokio_test::io::{Builder, Mock};

    /// Hands out pre-built streams in order, failing once they run out.
    pub(crate) struct ScriptedDialer<S> {
        streams: Mutex<VecDeque<Result<S>>>,
    }

    impl<S> ScriptedDialer<S> {
        pub(crate) fn new(streams: impl IntoIterator<Item = Result<S>>) -> Self {
            ScriptedDialer {
                streams: Mutex::new(streams.into_iter().collect()),
            }
        }
    }

    #[async_trait]
    impl<S> Dialer for ScriptedDialer<S>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        type Stream = S;

        async fn dial(&self, _parameters: &ConnectionParameters) -> Result<S> {
            self.streams
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(Error::communication("connection refused")))
        }
    }

    pub(crate) fn resp2_parameters() -> ConnectionParameters {
        ConnectionParameters {
            protocol: 2,
            ..ConnectionParameters::default()
        }
    }

    fn connection(
        mocks: Vec<Mock>,
        parameters: ConnectionParameters,
    ) -> StreamConnection<ScriptedDialer<Mock>> {
        StreamConnection::new(ScriptedDialer::new(mocks.into_iter().map(Ok)), parameters)
    }

    fn wire(command: &Command) -> Vec<u8> {
        command.serialize().to_vec()
    }

    #[tokio::test]
    async fn test_execute_command() {
        let get = Command::new("GET").arg("foo");
        let mock = Builder::new().write(&wire(&get)).read(b"$3\r\nbar\r\n").build();
        let mut conn = connection(vec![mock], resp2_parameters());

        let response = conn.execute_command(&get).await.unwrap();
        assert_eq!(response, Response::bulk("bar"));
        assert!(conn.is_connected());
        assert_eq!(conn.epoch(), 1);
    }

    #[tokio::test]
    async fn test_reply_split_across_reads() {
        let get = Command::new("GET").arg("foo");
        let mock = Builder::new()
            .write(&wire(&get))
            .read(b"$3\r\n")
            .read(b"ba")
            .read(b"r\r\n")
            .build();
        let mut conn = connection(vec![mock], resp2_parameters());

        assert_eq!(conn.execute_command(&get).await.unwrap(), Response::bulk("bar"));
    }

    #[tokio::test]
    async fn test_large_reply_over_many_reads() {
        let command = Command::new("LRANGE").args(["list", "0", "-1"]);
        let elements = 100_000;
        let mut reply = format!("*{elements}\r\n").into_bytes();
        for i in 0..elements {
            reply.extend_from_slice(format!(":{i}\r\n").as_bytes());
        }

        let mut builder = Builder::new();
        builder.write(&wire(&command));
        for chunk in reply.chunks(1024) {
            builder.read(chunk);
        }
        let mut conn = connection(vec![builder.build()], resp2_parameters());

        let response = conn.execute_command(&command).await.unwrap();
        let Response::Array(items) = response else {
            panic!("Expected array, got {response:?}");
        };
        assert_eq!(items.len(), elements);
        assert_eq!(items[elements - 1], Response::Integer(elements as i64 - 1));
        assert!(conn.is_connected());
    }

    #[tokio::test]
    async fn test_deeply_nested_reply_closes_connection() {
        let get = Command::new("GET").arg("foo");
        let mut reply = b"*1\r\n".repeat(100_000);
        reply.extend_from_slice(b":1\r\n");
        let mock = Builder::new().write(&wire(&get)).read(&reply).build();
        let mut conn = connection(vec![mock], resp2_parameters());

        match conn.execute_command(&get).await {
            Err(Error::Protocol(ProtocolError::Invalid(_))) => {}
            other => panic!("Expected protocol error, got {other:?}"),
        }
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn test_error_reply_without_exceptions() {
        let get = Command::new("GET").arg("foo");
        let mock = Builder::new()
            .write(&wire(&get))
            .read(b"-WRONGTYPE Operation against a key\r\n")
            .build();
        let mut conn = connection(vec![mock], resp2_parameters());

        let response = conn.execute_command(&get).await.unwrap();
        assert!(response.is_error());
    }

    #[tokio::test]
    async fn test_error_reply_with_exceptions() {
        let get = Command::new("GET").arg("foo");
        let mock = Builder::new()
            .write(&wire(&get))
            .read(b"-WRONGTYPE Operation against a key\r\n")
            .build();
        let parameters = ConnectionParameters {
            exceptions: true,
            ..resp2_parameters()
        };
        let mut conn = connection(vec![mock], parameters);

        match conn.execute_command(&get).await {
            Err(Error::Server(err)) => assert_eq!(err.kind.as_deref(), Some("WRONGTYPE")),
            other => panic!("Expected server error, got {other:?}"),
        }
        // Error replies leave the connection usable
        assert!(conn.is_connected());
    }

    #[tokio::test]
    async fn test_hello_handshake() {
        let hello = Command::raw(
            "HELLO",
            ["3", "AUTH", "user", "secret", "SETNAME", "app"],
        );
        let ping = Command::new("PING");
        let mock = Builder::new()
            .write(&wire(&hello))
            .read(b"%2\r\n$6\r\nserver\r\n$5\r\nredis\r\n$2\r\nid\r\n:42\r\n")
            .write(&wire(&ping))
            .read(b"+PONG\r\n")
            .build();
        let parameters = ConnectionParameters {
            username: Some("user".into()),
            password: Some("secret".into()),
            client_name: Some("app".into()),
            ..ConnectionParameters::default()
        };
        let mut conn = connection(vec![mock], parameters);

        assert_eq!(conn.execute_command(&ping).await.unwrap(), Response::status("PONG"));
        assert_eq!(conn.client_id(), Some(42));
    }

    #[tokio::test]
    async fn test_hello_failure_falls_back_to_auth() {
        let hello = Command::raw("HELLO", ["3", "AUTH", "default", "secret", "SETNAME", "app"]);
        let auth = Command::raw("AUTH", ["secret"]);
        let setname = Command::raw("CLIENT", ["SETNAME", "app"]);
        let mock = Builder::new()
            .write(&wire(&hello))
            .read(b"-ERR unknown command 'HELLO'\r\n")
            .write(&wire(&auth))
            .read(b"+OK\r\n")
            .write(&wire(&setname))
            .read(b"-ERR unknown subcommand\r\n")
            .build();
        let parameters = ConnectionParameters {
            password: Some("secret".into()),
            client_name: Some("app".into()),
            ..ConnectionParameters::default()
        };
        let mut conn = connection(vec![mock], parameters);

        conn.connect().await.unwrap();
        assert!(conn.is_connected());
        assert_eq!(conn.client_id(), None);
    }

    #[tokio::test]
    async fn test_auth_failure_is_fatal() {
        let auth = Command::raw("AUTH", ["wrong"]);
        let mock = Builder::new()
            .write(&wire(&auth))
            .read(b"-WRONGPASS invalid username-password pair\r\n")
            .build();
        let parameters = ConnectionParameters {
            password: Some("wrong".into()),
            ..resp2_parameters()
        };
        let mut conn = connection(vec![mock], parameters);

        assert!(matches!(conn.connect().await, Err(Error::Server(_))));
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn test_select_database() {
        let select = Command::raw("SELECT", ["2"]);
        let mock = Builder::new().write(&wire(&select)).read(b"+OK\r\n").build();
        let parameters = ConnectionParameters {
            database: Some(2),
            ..resp2_parameters()
        };
        let mut conn = connection(vec![mock], parameters);

        conn.connect().await.unwrap();
        // Connecting twice is a no-op
        conn.connect().await.unwrap();
        assert_eq!(conn.epoch(), 1);
    }

    #[tokio::test]
    async fn test_closed_connection_reconnects_and_replays() {
        let tracking = Command::raw("CLIENT", ["TRACKING", "ON"]);
        let get = Command::new("GET").arg("foo");

        // Server closes the socket after receiving GET
        let first = Builder::new().write(&wire(&get)).build();
        let second = Builder::new()
            .write(&wire(&tracking))
            .read(b"+OK\r\n")
            .write(&wire(&get))
            .read(b"$3\r\nbar\r\n")
            .build();
        let mut conn = connection(vec![first, second], resp2_parameters());

        conn.connect().await.unwrap();
        conn.add_connect_command(tracking);

        let err = conn.execute_command(&get).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(!conn.is_connected());

        assert_eq!(conn.execute_command(&get).await.unwrap(), Response::bulk("bar"));
        assert_eq!(conn.epoch(), 2);
    }

    #[tokio::test]
    async fn test_connect_retries_dial_failures() {
        let ping = Command::new("PING");
        let mock = Builder::new().write(&wire(&ping)).read(b"+PONG\r\n").build();
        let dialer = ScriptedDialer::new([
            Err(Error::communication("refused")),
            Err(Error::communication("refused")),
            Ok(mock),
        ]);
        let mut conn = StreamConnection::new(dialer, resp2_parameters());

        assert_eq!(conn.execute_command(&ping).await.unwrap(), Response::status("PONG"));
    }

    #[tokio::test]
    async fn test_connect_gives_up() {
        let dialer: ScriptedDialer<Mock> = ScriptedDialer::new([]);
        let mut conn = StreamConnection::new(dialer, resp2_parameters());

        assert!(conn.connect().await.unwrap_err().is_retryable());
        assert_eq!(conn.epoch(), 0);
    }

    #[tokio::test]
    async fn test_protocol_error_is_fatal() {
        let get = Command::new("GET").arg("foo");
        let mock = Builder::new().write(&wire(&get)).read(b"?weird\r\n").build();
        let mut conn = connection(vec![mock], resp2_parameters());

        match conn.execute_command(&get).await {
            Err(Error::Protocol(ProtocolError::UnknownType(b'?'))) => {}
            other => panic!("Expected protocol error, got {other:?}"),
        }
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn test_push_frames_are_returned_in_order() {
        let get = Command::new("GET").arg("foo");
        let mock = Builder::new()
            .write(&wire(&get))
            .read(b">2\r\n$10\r\ninvalidate\r\n*1\r\n$3\r\nfoo\r\n$3\r\nbar\r\n")
            .build();
        let mut conn = connection(vec![mock], resp2_parameters());

        let first = conn.execute_command(&get).await.unwrap();
        assert_eq!(first, Response::invalidate(Some(&["foo"][..])));
        assert!(conn.has_data_to_read().await);
        assert_eq!(conn.read_response(&get).await.unwrap(), Response::bulk("bar"));
    }

    #[tokio::test]
    async fn test_read_timeout_exhausts_retries() {
        let (client, _server) = tokio::io::duplex(64);
        let parameters = ConnectionParameters {
            read_write_timeout: Some(Duration::from_millis(5)),
            ..resp2_parameters()
        };
        let mut conn = StreamConnection::new(ScriptedDialer::new([Ok(client)]), parameters);

        conn.connect().await.unwrap();
        let err = conn.read().await.unwrap_err();
        assert!(err.is_retryable());
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn test_has_data_to_read() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut conn = StreamConnection::new(ScriptedDialer::new([Ok(client)]), resp2_parameters());
        conn.connect().await.unwrap();

        assert!(!conn.has_data_to_read().await);

        server.write_all(b"+OK\r\n").await.unwrap();
        assert!(conn.has_data_to_read().await);
        assert_eq!(conn.read().await.unwrap(), Response::status("OK"));
        assert!(!conn.has_data_to_read().await);
    }

    #[test]
    fn test_hello_client_id() {
        let map = Response::Map(vec![(Response::bulk("id"), Response::Integer(7))]);
        assert_eq!(hello_client_id(&map), Some(7));

        let flat = Response::Array(vec![
            Response::bulk("server"),
            Response::bulk("redis"),
            Response::bulk("id"),
            Response::Integer(9),
        ]);
        assert_eq!(hello_client_id(&flat), Some(9));
        assert_eq!(hello_client_id(&Response::status("OK")), None);
    }
}
