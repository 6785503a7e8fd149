/// Errors produced while decoding the netstring byte stream.
///
/// All of these are fatal to the connection: the stream is no longer
/// aligned on a unit boundary, so nothing after the error can be trusted.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FramingError {
    /// The length prefix contained something other than ASCII digits,
    /// was empty, or ran past the maximum number of digits.
    #[error("malformed length prefix")]
    MalformedPrefix,

    /// The byte after the payload was not the `,` terminator.
    #[error("missing ',' terminator after {0}-byte payload")]
    MissingTerminator(usize),

    /// The announced payload length exceeds the configured maximum.
    #[error("unit of {len} bytes exceeds limit of {max}")]
    TooLong { len: usize, max: usize },

    /// More than one complete unit arrived for a single receive under
    /// [`FramePolicy::Exclusive`](crate::FramePolicy::Exclusive).
    #[error("multiple units received in a single read")]
    MultipleUnits,

    /// The peer closed the stream in the middle of a unit.
    #[error("connection closed with {0} bytes of an unterminated unit buffered")]
    Truncated(usize),
}

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The inbound byte stream violated the framing rules.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Connecting to a remote server failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),
}
