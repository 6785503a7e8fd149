//! TCP transport: one netstring stream per socket.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::{
    Connection, ConnectionId, DEFAULT_MAX_FRAME_LEN, Framer, FramingError,
    Transport, TransportError, encode_frame,
};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Size of a single socket read.
const READ_CHUNK: usize = 4096;

/// What `recv` does when one read delivers more than one complete unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramePolicy {
    /// Keep the surplus buffered and hand it out on later calls, in order.
    #[default]
    Queue,
    /// Treat a second complete unit as [`FramingError::MultipleUnits`].
    /// For peers that only ever expect one reply per request.
    Exclusive,
}

/// A TCP [`Transport`] that listens for incoming connections.
pub struct TcpTransport {
    listener: TcpListener,
    max_frame_len: usize,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self {
            listener,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        })
    }

    /// Sets the maximum payload length accepted on new connections.
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let conn = TcpConnection::from_stream(
            stream,
            addr,
            FramePolicy::Queue,
            self.max_frame_len,
        );
        tracing::debug!(id = %conn.id, %addr, "accepted TCP connection");
        Ok(conn)
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// Read side of a connection: the socket half plus its framer.
struct Reader {
    half: OwnedReadHalf,
    framer: Framer,
}

/// A single framed TCP connection.
pub struct TcpConnection {
    id: ConnectionId,
    peer: SocketAddr,
    policy: FramePolicy,
    reader: Mutex<Reader>,
    writer: Mutex<OwnedWriteHalf>,
}

impl TcpConnection {
    /// Connects to a remote server.
    pub async fn connect(
        addr: &str,
        policy: FramePolicy,
    ) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(TransportError::ConnectFailed)?;
        let peer = stream.peer_addr().map_err(TransportError::ConnectFailed)?;
        tracing::debug!(%peer, "connected");
        Ok(Self::from_stream(stream, peer, policy, DEFAULT_MAX_FRAME_LEN))
    }

    fn from_stream(
        stream: TcpStream,
        peer: SocketAddr,
        policy: FramePolicy,
        max_frame_len: usize,
    ) -> Self {
        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();
        Self {
            id: ConnectionId::new(
                NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            ),
            peer,
            policy,
            reader: Mutex::new(Reader {
                half: read_half,
                framer: Framer::new(max_frame_len),
            }),
            writer: Mutex::new(write_half),
        }
    }
}

impl Connection for TcpConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let frame = encode_frame(data);
        let mut writer = self.writer.lock().await;
        writer
            .write_all(&frame)
            .await
            .map_err(TransportError::SendFailed)?;
        writer.flush().await.map_err(TransportError::SendFailed)
    }

    /// Cancel-safe: bytes are only moved into the framer after a read
    /// completes, so dropping this future never loses stream data.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut reader = self.reader.lock().await;
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(frame) = reader.framer.next_frame()? {
                if self.policy == FramePolicy::Exclusive
                    && reader.framer.has_complete_frame()?
                {
                    return Err(FramingError::MultipleUnits.into());
                }
                return Ok(Some(frame));
            }

            let n = reader
                .half
                .read(&mut chunk)
                .await
                .map_err(TransportError::ReceiveFailed)?;
            if n == 0 {
                reader.framer.finish()?;
                return Ok(None);
            }
            reader.framer.push(&chunk[..n]);
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}
