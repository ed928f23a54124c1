//! Device session: one open link to one phone.
//!
//! A session owns the port, performs the init handshake and serializes
//! request/reply exchanges. The protocol has no correlation identifiers, so
//! a reply belongs to whatever request was sent last; [`Session::transact`]
//! holds the link lock across both halves of an exchange.
//!
//! Once a read or write fails the position in the byte stream is unknown and
//! the session refuses further traffic.

pub mod reader;

use {
    crate::{
        address::BtTarget,
        error::{Error, Result},
        port::{Connector, Port},
        protocol::{
            CommandFrame, Frame, INIT_ACK,
            codec::hex_dump,
            command::reply,
        },
    },
    log::{debug, info, trace, warn},
    std::{
        sync::{Mutex, MutexGuard},
        time::Duration,
    },
};

pub use reader::{QuiescenceReader, ResponseReader};

/// Session tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Silence that ends a reply.
    pub quiet_period: Duration,
    /// Bound on the wait for the first byte of a reply.
    pub response_timeout: Duration,
    /// Largest reply accepted.
    pub max_response_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            quiet_period: reader::DEFAULT_QUIET_PERIOD,
            response_timeout: reader::DEFAULT_RESPONSE_TIMEOUT,
            max_response_len: reader::DEFAULT_MAX_RESPONSE_LEN,
        }
    }
}

impl SessionConfig {
    /// Reject settings the reader cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.quiet_period.is_zero() {
            return Err(Error::Config("quiet period must be positive".into()));
        }
        if self.response_timeout < self.quiet_period {
            return Err(Error::Config(format!(
                "response timeout ({:?}) is shorter than the quiet period ({:?})",
                self.response_timeout, self.quiet_period
            )));
        }
        if self.max_response_len < INIT_ACK.len() {
            return Err(Error::Config(format!(
                "maximum reply length {} cannot hold the init acknowledgement",
                self.max_response_len
            )));
        }
        Ok(())
    }

    /// Timeout for a single port read. Blocking reads wait at most one
    /// quiet period, so the reader re-checks its deadline that often.
    pub fn read_timeout(&self) -> Duration {
        self.quiet_period
    }

    /// The default reader for this configuration.
    pub fn reader(&self) -> QuiescenceReader {
        QuiescenceReader::new(
            self.quiet_period,
            self.response_timeout,
            self.max_response_len,
        )
    }
}

/// Firmware details reported during the handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PhoneInfo {
    /// Firmware version (e.g. `7.01`).
    pub firmware_version: String,
    /// Firmware date (e.g. `01-01-09`).
    pub firmware_date: String,
    /// Model name (e.g. `6212 classic`).
    pub model: String,
}

impl PhoneInfo {
    /// Parse a `PhoneInfo` reply: a fixed preamble, then version, date and
    /// model on separate lines.
    ///
    /// Missing lines come back empty.
    pub fn parse(reply_bytes: &[u8]) -> Result<Self> {
        let text = reply_bytes.get(reply::PHONE_INFO_SKIP..).ok_or_else(|| {
            Error::Protocol(format!(
                "phone info reply too short ({} bytes)",
                reply_bytes.len()
            ))
        })?;
        let text = String::from_utf8_lossy(text);
        let mut lines = text
            .split('\n')
            .map(|l| l.trim_end_matches(['\r', '\0']).to_string());

        Ok(Self {
            firmware_version: lines.next().unwrap_or_default(),
            firmware_date: lines.next().unwrap_or_default(),
            model: lines.next().unwrap_or_default(),
        })
    }
}

/// Close a port that is being abandoned; its error is only logged.
fn close_quietly<P: Port>(port: &mut P) {
    if let Err(e) = port.close() {
        debug!("Could not close {}: {e}", port.name());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Unusable,
    Closed,
}

struct Link<P> {
    port: P,
    reader: Box<dyn ResponseReader>,
    state: State,
}

/// Exclusive access to the link, for callers that need several exchanges
/// without interleaving.
pub struct LinkGuard<'a, P: Port> {
    inner: MutexGuard<'a, Link<P>>,
}

impl<P: Port> LinkGuard<'_, P> {
    /// Frame and send a request.
    pub fn send(&mut self, msg_type: u8, payload: &[u8]) -> Result<()> {
        self.guarded(|link| link.send(msg_type, payload))
    }

    /// Read one reply.
    pub fn receive(&mut self) -> Result<Vec<u8>> {
        self.guarded(Link::receive)
    }

    /// Send a request and read its reply.
    pub fn transact(&mut self, msg_type: u8, payload: &[u8]) -> Result<Vec<u8>> {
        self.guarded(|link| {
            link.send(msg_type, payload)?;
            link.receive()
        })
    }

    fn guarded<T>(&mut self, op: impl FnOnce(&mut Link<P>) -> Result<T>) -> Result<T> {
        match self.inner.state {
            State::Open => {},
            State::Unusable => return Err(Error::SessionUnusable),
            State::Closed => return Err(Error::SessionClosed),
        }
        let result = op(&mut *self.inner);
        if let Err(ref e) = result {
            if e.is_fatal() {
                warn!("Session unusable after: {e}");
                self.inner.state = State::Unusable;
            }
        }
        result
    }
}

impl<P: Port> Link<P> {
    fn send(&mut self, msg_type: u8, payload: &[u8]) -> Result<()> {
        let data = Frame::request(msg_type, payload.to_vec()).build();
        trace!("TX {} bytes\n{}", data.len(), hex_dump(&data));
        self.port.write_all_bytes(&data)
    }

    fn receive(&mut self) -> Result<Vec<u8>> {
        let data = self.reader.read_response(&mut self.port)?;
        trace!("RX {} bytes\n{}", data.len(), hex_dump(&data));
        Ok(data)
    }
}

/// An open link to a phone.
///
/// `Session` is `Sync`; exchanges from several threads are serialized.
pub struct Session<P: Port> {
    link: Mutex<Link<P>>,
    info: PhoneInfo,
}

impl<P: Port> Session<P> {
    /// Validate the target, connect through `connector` and perform the
    /// handshake with default settings.
    pub fn open<C>(address: &str, channel: i32, connector: &C) -> Result<Self>
    where
        C: Connector<Port = P>,
    {
        Self::open_with_config(address, channel, connector, &SessionConfig::default())
    }

    /// Like [`Session::open`] with explicit settings.
    pub fn open_with_config<C>(
        address: &str,
        channel: i32,
        connector: &C,
        config: &SessionConfig,
    ) -> Result<Self>
    where
        C: Connector<Port = P>,
    {
        config.validate()?;
        let target = BtTarget::new(address, channel)?;
        info!("Connecting to {target}");
        let port = connector.connect(&target)?;
        Self::from_port(port, config)
    }

    /// Perform the handshake over an already open port.
    ///
    /// The port's read timeout is set from `config`.
    pub fn from_port(mut port: P, config: &SessionConfig) -> Result<Self> {
        if let Err(e) = config.validate() {
            close_quietly(&mut port);
            return Err(e);
        }
        if let Err(e) = port.set_timeout(config.read_timeout()) {
            debug!("Could not set read timeout on {}: {e}", port.name());
        }
        Self::with_reader(port, Box::new(config.reader()))
    }

    /// Perform the handshake over an open port with a custom reply reader.
    pub fn with_reader(mut port: P, reader: Box<dyn ResponseReader>) -> Result<Self> {
        debug!(
            "Starting handshake on {} (read timeout {:?})",
            port.name(),
            port.timeout()
        );
        if let Err(e) = port.clear_buffers() {
            debug!("Could not clear buffers on {}: {e}", port.name());
        }

        let mut link = Link {
            port,
            reader,
            state: State::Open,
        };

        match Self::handshake(&mut link) {
            Ok(info) => {
                info!(
                    "Connected: {} firmware {} ({})",
                    info.model, info.firmware_version, info.firmware_date
                );
                Ok(Self {
                    link: Mutex::new(link),
                    info,
                })
            },
            Err(e) => {
                close_quietly(&mut link.port);
                Err(e)
            },
        }
    }

    fn handshake(link: &mut Link<P>) -> Result<PhoneInfo> {
        let init = CommandFrame::init();
        link.send(init.msg_type(), init.payload())?;
        let ack = link.receive()?;
        if ack != INIT_ACK {
            return Err(Error::Protocol(format!(
                "unexpected init acknowledgement: {}",
                hex_dump(&ack).trim_end()
            )));
        }

        let query = CommandFrame::phone_info();
        link.send(query.msg_type(), query.payload())?;
        PhoneInfo::parse(&link.receive()?)
    }

    /// Firmware details from the handshake.
    pub fn info(&self) -> &PhoneInfo {
        &self.info
    }

    /// Lock the link for a sequence of exchanges.
    pub fn lock(&self) -> Result<LinkGuard<'_, P>> {
        let inner = self.link.lock().map_err(|_| Error::SessionUnusable)?;
        Ok(LinkGuard { inner })
    }

    /// Frame and send a request.
    pub fn send(&self, msg_type: u8, payload: &[u8]) -> Result<()> {
        self.lock()?.send(msg_type, payload)
    }

    /// Read one reply.
    pub fn receive(&self) -> Result<Vec<u8>> {
        self.lock()?.receive()
    }

    /// Send a request and read its reply without letting other exchanges in
    /// between.
    pub fn transact(&self, msg_type: u8, payload: &[u8]) -> Result<Vec<u8>> {
        self.lock()?.transact(msg_type, payload)
    }

    /// [`Session::transact`] for a catalog command.
    pub fn exchange(&self, command: &CommandFrame) -> Result<Vec<u8>> {
        trace!("Exchange {:?}", command.command());
        self.transact(command.msg_type(), command.payload())
    }

    /// Whether the session still accepts requests.
    pub fn is_open(&self) -> bool {
        self.link
            .lock()
            .map(|l| l.state == State::Open)
            .unwrap_or(false)
    }

    /// Close the link. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut link = self.link.lock().map_err(|_| Error::SessionUnusable)?;
        if link.state == State::Closed {
            return Ok(());
        }
        link.state = State::Closed;
        debug!("Closing {}", link.port.name());
        link.port.close()
    }
}
