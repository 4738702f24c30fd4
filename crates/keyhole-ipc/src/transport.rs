//! Channel binding over ZeroMQ sockets.
//!
//! The main channel is a one-way PUB/SUB pair: messages published before a
//! subscriber's connection has taken effect are dropped, which is why
//! session startup goes through the handshake channel, a REQ/REP pair
//! used exactly once.
//!
//! The lenient startup policy of the sessions (a publisher that cannot
//! bind keeps running with a dead channel) is applied by the callers;
//! this module only reports errors.

/// Error raised while binding or connecting a channel.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    /// A channel could not be bound to its endpoint.
    #[error("failed to bind {endpoint}")]
    Bind {
        /// Endpoint address the bind was attempted on.
        endpoint: String,

        /// Underlying socket error.
        #[source]
        source: zmq::Error,
    },

    /// A channel could not be connected to its endpoint.
    #[error("failed to connect {endpoint}")]
    Connect {
        /// Endpoint address the connect was attempted on.
        endpoint: String,

        /// Underlying socket error.
        #[source]
        source: zmq::Error,
    },

    /// No more sockets could be allocated from the context.
    #[error("socket allocation failed")]
    Exhausted(#[source] zmq::Error),
}

/// Factory for the channels of one session.
///
/// Owns the socket context; every channel created from it is closed when
/// dropped.
pub struct Transport {
    context: zmq::Context,
}

impl Transport {
    /// Creates a new transport.
    pub fn new() -> Self {
        Self {
            context: zmq::Context::new(),
        }
    }

    /// Binds the publishing end of a main channel.
    pub fn bind_publish(&self, endpoint: &str) -> Result<PubChannel, TransportError> {
        let socket = self
            .context
            .socket(zmq::PUB)
            .map_err(TransportError::Exhausted)?;

        socket.set_identity(b"pub").map_err(|source| bind(endpoint, source))?;
        socket.bind(endpoint).map_err(|source| bind(endpoint, source))?;

        tracing::debug!(endpoint, "publish channel bound");

        Ok(PubChannel { socket })
    }

    /// Connects the subscribing end of a main channel.
    pub fn connect_subscribe(&self, endpoint: &str) -> Result<SubChannel, TransportError> {
        let socket = self
            .context
            .socket(zmq::SUB)
            .map_err(TransportError::Exhausted)?;

        socket
            .set_identity(b"sub")
            .map_err(|source| connect(endpoint, source))?;
        socket
            .connect(endpoint)
            .map_err(|source| connect(endpoint, source))?;
        socket
            .set_subscribe(b"")
            .map_err(|source| connect(endpoint, source))?;

        tracing::debug!(endpoint, "subscribe channel connected");

        Ok(SubChannel { socket })
    }

    /// Binds the replying end of a handshake channel.
    pub fn bind_reply(&self, endpoint: &str) -> Result<ReplyChannel, TransportError> {
        let socket = self
            .context
            .socket(zmq::REP)
            .map_err(TransportError::Exhausted)?;

        socket.bind(endpoint).map_err(|source| bind(endpoint, source))?;

        Ok(ReplyChannel { socket })
    }

    /// Connects the requesting end of a handshake channel.
    pub fn connect_request(&self, endpoint: &str) -> Result<RequestChannel, TransportError> {
        let socket = self
            .context
            .socket(zmq::REQ)
            .map_err(TransportError::Exhausted)?;

        socket
            .connect(endpoint)
            .map_err(|source| connect(endpoint, source))?;

        Ok(RequestChannel { socket })
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

fn bind(endpoint: &str, source: zmq::Error) -> TransportError {
    TransportError::Bind {
        endpoint: endpoint.to_owned(),
        source,
    }
}

fn connect(endpoint: &str, source: zmq::Error) -> TransportError {
    TransportError::Connect {
        endpoint: endpoint.to_owned(),
        source,
    }
}

/// Publishing end of a main channel.
pub struct PubChannel {
    socket: zmq::Socket,
}

impl PubChannel {
    /// Publishes one message.
    ///
    /// Delivery is fire-and-forget: subscribers that have not finished
    /// connecting miss the message.
    pub fn send(&self, bytes: &[u8]) -> Result<(), zmq::Error> {
        self.socket.send(bytes, 0)
    }
}

/// Subscribing end of a main channel.
pub struct SubChannel {
    socket: zmq::Socket,
}

impl SubChannel {
    /// Receives one message, blocking until one arrives.
    ///
    /// Returns [`zmq::Error::EINTR`] when interrupted by a signal, so the
    /// caller can re-check its cancellation flag.
    pub fn recv(&self) -> Result<Vec<u8>, zmq::Error> {
        self.socket.recv_bytes(0)
    }
}

/// Replying end of a handshake channel.
pub struct ReplyChannel {
    socket: zmq::Socket,
}

impl ReplyChannel {
    /// Polls for a pending request without blocking.
    pub fn try_recv(&self) -> Result<Option<Vec<u8>>, zmq::Error> {
        match self.socket.recv_bytes(zmq::DONTWAIT) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(zmq::Error::EAGAIN | zmq::Error::EINTR) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Sends one reply.
    pub fn send(&self, bytes: &[u8]) -> Result<(), zmq::Error> {
        self.socket.send(bytes, 0)
    }
}

/// Requesting end of a handshake channel.
pub struct RequestChannel {
    socket: zmq::Socket,
}

impl RequestChannel {
    /// Sends one request.
    pub fn send(&self, bytes: &[u8]) -> Result<(), zmq::Error> {
        self.socket.send(bytes, 0)
    }

    /// Receives one reply, blocking until it arrives.
    pub fn recv(&self) -> Result<Vec<u8>, zmq::Error> {
        self.socket.recv_bytes(0)
    }
}
