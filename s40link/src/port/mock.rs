//! In-memory ports for tests.
//!
//! [`MockPort`] replays scripted replies, one per written request.
//! [`FakePhone`] decodes requests and answers them from an in-memory file
//! system, the way a handset would.

use {
    crate::{
        error::Result,
        phone::entry::{DIRECTORY_FLAG, EntryTimestamp, FILE_FLAG, tests as records},
        port::Port,
        protocol::{
            BLOCK_SIZE, Command, Frame, INIT_ACK, codec,
            command::msg_type,
            frame::split_frames,
        },
        session::SessionConfig,
    },
    std::{
        collections::{BTreeMap, HashMap, VecDeque},
        io::{self, Read, Write},
        sync::{Arc, Mutex},
        thread,
        time::Duration,
    },
};

/// Session limits tuned for in-memory ports.
pub(crate) fn fast_config() -> SessionConfig {
    SessionConfig {
        quiet_period: Duration::from_millis(1),
        response_timeout: Duration::from_millis(200),
        ..SessionConfig::default()
    }
}

fn timed_out() -> io::Error {
    // Pace polling loops a little
    thread::sleep(Duration::from_millis(1));
    io::Error::new(io::ErrorKind::TimedOut, "no data")
}

#[derive(Debug, Clone)]
enum Chunk {
    Data(Vec<u8>),
    Eof,
}

/// Port replaying scripted replies.
///
/// Every `write` call makes the next scripted reply readable.
#[derive(Debug, Default)]
pub(crate) struct MockPort {
    script: VecDeque<Vec<Chunk>>,
    readable: VecDeque<Chunk>,
    written: Arc<Mutex<Vec<u8>>>,
    fail_writes: bool,
    timeout: Duration,
}

impl MockPort {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue a reply delivered as the given physical chunks.
    pub(crate) fn with_reply(mut self, chunks: Vec<Vec<u8>>) -> Self {
        self.script
            .push_back(chunks.into_iter().map(Chunk::Data).collect());
        self
    }

    /// Queue a reply that ends the stream after `bytes`.
    pub(crate) fn with_eof_after(mut self, bytes: Vec<u8>) -> Self {
        self.script
            .push_back(vec![Chunk::Data(bytes), Chunk::Eof]);
        self
    }

    /// Make every write fail.
    pub(crate) fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Everything written so far.
    pub(crate) fn written(&self) -> Arc<Mutex<Vec<u8>>> {
        Arc::clone(&self.written)
    }

    /// Make the next scripted reply readable without a write.
    pub(crate) fn release_next(&mut self) {
        if let Some(reply) = self.script.pop_front() {
            self.readable.extend(reply);
        }
    }
}

impl Read for MockPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.readable.front_mut() {
            None => Err(timed_out()),
            Some(Chunk::Eof) => Ok(0),
            Some(Chunk::Data(data)) => {
                let n = buf.len().min(data.len());
                buf[..n].copy_from_slice(&data[..n]);
                data.drain(..n);
                if data.is_empty() {
                    self.readable.pop_front();
                }
                Ok(n)
            },
        }
    }
}

impl Write for MockPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "link dropped"));
        }
        self.written
            .lock()
            .map_err(|_| io::Error::other("poisoned"))?
            .extend_from_slice(buf);
        self.release_next();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Port for MockPort {
    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.timeout = timeout;
        Ok(())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn bytes_to_read(&mut self) -> Result<usize> {
        // A pending end of stream counts as readable, like a hangup on poll
        Ok(self
            .readable
            .iter()
            .map(|c| match c {
                Chunk::Data(d) => d.len(),
                Chunk::Eof => 1,
            })
            .sum())
    }

    fn clear_buffers(&mut self) -> Result<()> {
        self.readable.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn close(&mut self) -> Result<()> {
        self.readable.clear();
        Ok(())
    }
}

/// A node of the fake file system.
#[derive(Debug, Clone)]
pub(crate) enum Node {
    File(Vec<u8>),
    Dir,
}

/// Observable state of a [`FakePhone`].
#[derive(Debug)]
pub(crate) struct PhoneState {
    pub nodes: BTreeMap<String, Node>,
    pub timestamp: EntryTimestamp,
    pub open: HashMap<u16, String>,
    pub closed: Vec<u16>,
    pub requests: Vec<Frame>,
    pub init_reply: Vec<u8>,
    pub info_text: String,
    pub imei: String,
    /// Block index whose reply carries a wrong length byte.
    pub bad_length_block: Option<u16>,
    pub reset_received: bool,
    pub port_closed: bool,
    /// Last read timeout applied to the port.
    pub read_timeout: Option<Duration>,
    next_handle: u16,
}

impl Default for PhoneState {
    fn default() -> Self {
        Self {
            nodes: BTreeMap::new(),
            timestamp: EntryTimestamp {
                year: 2009,
                month: 0,
                day: 1,
                hour: 0,
                minute: 0,
                second: 0,
            },
            open: HashMap::new(),
            closed: Vec::new(),
            requests: Vec::new(),
            init_reply: INIT_ACK.to_vec(),
            info_text: "7.01\n01-01-09\n6212 classic\n".into(),
            imei: "356789012345678".into(),
            bad_length_block: None,
            reset_received: false,
            port_closed: false,
            read_timeout: None,
            next_handle: 0x0100,
        }
    }
}

impl PhoneState {
    /// Number of requests of the given command seen so far.
    pub(crate) fn count(&self, cmd: Command) -> usize {
        self.requests
            .iter()
            .filter(|f| f.msg_type == cmd.msg_type() && classify(&f.payload) == Some(cmd))
            .count()
    }

    pub(crate) fn file(&self, path: &str) -> Option<&[u8]> {
        match self.nodes.get(path) {
            Some(Node::File(data)) => Some(data),
            _ => None,
        }
    }
}

/// Port that behaves like a phone with an in-memory file system.
pub(crate) struct FakePhone {
    state: Arc<Mutex<PhoneState>>,
    inbox: Vec<u8>,
    outbox: VecDeque<u8>,
}

impl FakePhone {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(PhoneState::default())),
            inbox: Vec::new(),
            outbox: VecDeque::new(),
        }
    }

    /// Shared handle on the phone state, usable after the port is moved.
    pub(crate) fn state(&self) -> Arc<Mutex<PhoneState>> {
        Arc::clone(&self.state)
    }

    pub(crate) fn with_dir(self, path: &str) -> Self {
        self.lock().nodes.insert(path.into(), Node::Dir);
        self
    }

    pub(crate) fn with_file(self, path: &str, data: &[u8]) -> Self {
        self.lock()
            .nodes
            .insert(path.into(), Node::File(data.to_vec()));
        self
    }

    pub(crate) fn with_init_reply(self, reply: &[u8]) -> Self {
        self.lock().init_reply = reply.to_vec();
        self
    }

    pub(crate) fn with_bad_length_at(self, block: u16) -> Self {
        self.lock().bad_length_block = Some(block);
        self
    }

    #[allow(clippy::unwrap_used)]
    fn lock(&self) -> std::sync::MutexGuard<'_, PhoneState> {
        self.state.lock().unwrap()
    }

    fn handle_requests(&mut self) {
        let Ok(frames) = split_frames(&self.inbox) else {
            // Wait for the rest of the frame
            return;
        };
        self.inbox.clear();
        for frame in frames {
            let reply = {
                let mut state = self.lock();
                state.requests.push(frame.clone());
                answer(&mut state, &frame)
            };
            self.outbox.extend(reply);
        }
    }
}

/// Identify a request by its template prefix.
fn classify(payload: &[u8]) -> Option<Command> {
    let op = *payload.get(3)?;
    Some(match op {
        0x07 => Command::PhoneInfo,
        0x00 if payload.get(4) == Some(&0x41) => Command::Imei,
        0x05 => Command::Reset,
        0x68 => {
            if decode_path(payload.get(7..)?).ends_with('*') {
                Command::ListDirectory
            } else {
                Command::FileInfo
            }
        },
        0x72 if payload.get(4) == Some(&0x11) => Command::OpenWrite,
        0x72 => Command::OpenRead,
        0x5E => Command::ReadBlock,
        0x58 => Command::WriteBlock,
        0x74 => Command::CloseFile,
        0x62 => Command::DeleteFile,
        _ => return None,
    })
}

#[allow(clippy::unwrap_used)]
fn decode_path(encoded: &[u8]) -> String {
    let len = encoded.len().saturating_sub(codec::NARROW_CHAR_WIDTH);
    codec::narrow_decode(encoded, 0, len).unwrap()
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

fn name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn ack(op: u8) -> Vec<u8> {
    Frame::response(msg_type::FILE_SYSTEM, vec![0x00, 0x01, 0x00, op | 0x01, 0x00]).build()
}

fn handle_reply(handle: u16) -> Vec<u8> {
    let mut payload = vec![0x00, 0x01, 0x00, 0x73, 0x00, 0x00, 0x00, 0x00];
    payload.extend_from_slice(&handle.to_be_bytes());
    Frame::response(msg_type::FILE_SYSTEM, payload).build()
}

fn entry_record(state: &PhoneState, path: &str) -> Vec<u8> {
    match state.nodes.get(path) {
        Some(Node::File(data)) => records::record(
            FILE_FLAG,
            name_of(path),
            u32::try_from(data.len()).unwrap_or(u32::MAX),
            state.timestamp,
        ),
        Some(Node::Dir) => records::record(DIRECTORY_FLAG, name_of(path), 0, state.timestamp),
        None => records::empty_marker(),
    }
}

fn u16_at(payload: &[u8], offset: usize) -> u16 {
    codec::u16_be(payload, offset).unwrap_or(0)
}

fn answer(state: &mut PhoneState, frame: &Frame) -> Vec<u8> {
    let p = &frame.payload;
    if frame.msg_type == msg_type::INIT {
        return state.init_reply.clone();
    }
    let Some(cmd) = classify(p) else {
        return ack(0xFF);
    };

    match cmd {
        Command::Init => state.init_reply.clone(),
        Command::PhoneInfo => {
            let mut payload = vec![0u8; 12];
            payload.extend_from_slice(state.info_text.as_bytes());
            Frame::response(msg_type::IDENTITY, payload).build()
        },
        Command::Imei => {
            let mut payload = vec![0u8; 10];
            payload.extend_from_slice(state.imei.as_bytes());
            payload.push(0);
            Frame::response(msg_type::IDENTITY, payload).build()
        },
        Command::Reset => {
            state.reset_received = true;
            Frame::response(msg_type::POWER, vec![0x00, 0x01, 0x00, 0x06]).build()
        },
        Command::FileInfo => entry_record(state, &decode_path(&p[7..])),
        Command::ListDirectory => {
            let state = &*state;
            let pattern = decode_path(&p[7..]);
            let dir = pattern.trim_end_matches('*');
            let key = if dir == "/" { "/" } else { dir.trim_end_matches('/') };
            let children: Vec<String> = state
                .nodes
                .keys()
                .filter(|path| parent_of(path) == key && path.as_str() != "/")
                .cloned()
                .collect();
            if children.is_empty() {
                return records::empty_marker();
            }
            children
                .iter()
                .flat_map(|path| entry_record(state, path))
                .collect()
        },
        Command::OpenRead => {
            let path = decode_path(&p[9..]);
            if state.file(&path).is_none() {
                return ack(0x72);
            }
            let handle = state.next_handle;
            state.next_handle += 1;
            state.open.insert(handle, path);
            handle_reply(handle)
        },
        Command::OpenWrite => {
            let path = decode_path(&p[8..]);
            if !matches!(state.nodes.get(parent_of(&path)), Some(Node::Dir)) && parent_of(&path) != "/" {
                return ack(0x72);
            }
            state.nodes.insert(path.clone(), Node::File(Vec::new()));
            let handle = state.next_handle;
            state.next_handle += 1;
            state.open.insert(handle, path);
            handle_reply(handle)
        },
        Command::ReadBlock => {
            let handle = u16_at(p, 8);
            let index = usize::from(u16_at(p, 11));
            let wanted = usize::from(u16_at(p, 20));
            let data = state
                .open
                .get(&handle)
                .and_then(|path| state.file(path))
                .map(|d| {
                    let start = (index * BLOCK_SIZE).min(d.len());
                    let end = (start + wanted).min(d.len());
                    d[start..end].to_vec()
                })
                .unwrap_or_default();
            #[allow(clippy::cast_possible_truncation)]
            let mut len_byte = data.len() as u8;
            if state.bad_length_block == Some(u16_at(p, 11)) {
                len_byte ^= 0x01;
            }
            let mut payload = vec![0x00, 0x01, 0x00, 0x5F, 0x00, 0x00, 0x00, 0x00, 0x00, len_byte];
            payload.extend_from_slice(&data);
            Frame::response(msg_type::FILE_SYSTEM, payload).build()
        },
        Command::WriteBlock => {
            let handle = u16_at(p, 8);
            let len = usize::from(u16_at(p, 12));
            let block = p.get(14..14 + len).unwrap_or_default().to_vec();
            if let Some(path) = state.open.get(&handle).cloned() {
                if let Some(Node::File(data)) = state.nodes.get_mut(&path) {
                    data.extend_from_slice(&block);
                }
            }
            ack(0x58)
        },
        Command::CloseFile => {
            let handle = u16_at(p, 8);
            state.open.remove(&handle);
            state.closed.push(handle);
            ack(0x74)
        },
        Command::DeleteFile => {
            let path = decode_path(&p[6..]);
            state.nodes.remove(&path);
            ack(0x62)
        },
    }
}

impl Read for FakePhone {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.outbox.is_empty() {
            return Err(timed_out());
        }
        // Deliver in uneven pieces to exercise reassembly
        let n = buf.len().min(self.outbox.len()).min(40);
        for (dst, src) in buf.iter_mut().zip(self.outbox.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

impl Write for FakePhone {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inbox.extend_from_slice(buf);
        self.handle_requests();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Port for FakePhone {
    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.lock().read_timeout = Some(timeout);
        Ok(())
    }

    fn timeout(&self) -> Duration {
        self.lock().read_timeout.unwrap_or_default()
    }

    fn bytes_to_read(&mut self) -> Result<usize> {
        Ok(self.outbox.len())
    }

    fn clear_buffers(&mut self) -> Result<()> {
        self.outbox.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        "fake-phone"
    }

    fn close(&mut self) -> Result<()> {
        self.lock().port_closed = true;
        Ok(())
    }
}
