//! InfraNet: device hello, pose stream and scene-shift requests.
//!
//! Messages are JSON objects tagged by `type`. The host link is one WebSocket
//! carrying both directions; plain HTTP endpoints get outbound POSTs only. A
//! `PoseStreamer` thread pulls poses from any `PoseSource` at a fixed rate and
//! pushes them through an `InfraSink`.

use std::io;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use crate::engine::{EngineError, EngineResult, HeadPose};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum InfraMessage {
    Hello {
        device_id: String,
        capabilities: Vec<String>,
    },
    Pose {
        device_id: String,
        ts: i64,
        position: [f32; 3],
        orientation: [f32; 4],
    },
    DomShiftRequest {
        device_id: String,
        target_scene: String,
        reason: String,
    },
}

impl InfraMessage {
    pub fn hello(device_id: &str, capabilities: &[String]) -> Self {
        InfraMessage::Hello {
            device_id: device_id.to_string(),
            capabilities: capabilities.to_vec(),
        }
    }

    pub fn pose(device_id: &str, pose: &HeadPose) -> Self {
        InfraMessage::Pose {
            device_id: device_id.to_string(),
            ts: pose.timestamp_ns,
            position: pose.position,
            orientation: pose.orientation,
        }
    }

    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

pub trait InfraSink: Send {
    fn send(&mut self, message: &InfraMessage) -> EngineResult<()>;
}

/// Called on the connection thread for every message the host sends.
pub type InboundHandler = Box<dyn Fn(InfraMessage) + Send>;

/// Opens the sink matching the endpoint scheme: `ws://` / `wss://` get a
/// `WebSocketSink`, `http://` / `https://` an `HttpSink` (no inbound path).
pub fn connect_sink(endpoint: &str, on_message: InboundHandler) -> EngineResult<Box<dyn InfraSink>> {
    if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
        Ok(Box::new(WebSocketSink::connect(endpoint, on_message)?))
    } else if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        debug!("[InfraNet] {} is HTTP, inbound messages are not available", endpoint);
        Ok(Box::new(HttpSink::new(endpoint)?))
    } else {
        Err(EngineError::Config(format!("unsupported InfraNet endpoint '{}'", endpoint)))
    }
}

/// How long the connection thread blocks on a read before checking for outbound
/// messages again.
const READ_POLL: Duration = Duration::from_millis(5);

/// One persistent WebSocket to the host.
///
/// A connection thread owns the socket: it writes queued outbound messages and
/// decodes inbound text frames into `InfraMessage`s for the handler. Frames that
/// do not parse are skipped.
pub struct WebSocketSink {
    outbound: Sender<String>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl WebSocketSink {
    pub fn connect(endpoint: &str, on_message: InboundHandler) -> EngineResult<Self> {
        let (socket, response) = tungstenite::connect(endpoint)?;
        set_read_timeout(socket.get_ref(), Some(READ_POLL))?;
        info!("[InfraNet] connected to {} ({})", endpoint, response.status());

        let (outbound, queue) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let handle = thread::Builder::new()
            .name("xrphone-infranet".to_string())
            .spawn(move || run_connection(socket, queue, &thread_stop, on_message))
            .map_err(|e| EngineError::Thread(format!("infranet spawn: {}", e)))?;

        Ok(Self {
            outbound,
            stop,
            handle: Some(handle),
        })
    }
}

impl InfraSink for WebSocketSink {
    fn send(&mut self, message: &InfraMessage) -> EngineResult<()> {
        self.outbound
            .send(message.to_json()?)
            .map_err(|_| EngineError::Disconnected)
    }
}

impl Drop for WebSocketSink {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("[InfraNet] connection thread panicked");
            }
        }
    }
}

fn set_read_timeout(stream: &MaybeTlsStream<TcpStream>, timeout: Option<Duration>) -> io::Result<()> {
    match stream {
        MaybeTlsStream::Plain(tcp) => tcp.set_read_timeout(timeout),
        MaybeTlsStream::Rustls(tls) => tls.get_ref().set_read_timeout(timeout),
        _ => Ok(()),
    }
}

fn run_connection(
    mut socket: WebSocket<MaybeTlsStream<TcpStream>>,
    queue: Receiver<String>,
    stop: &AtomicBool,
    on_message: InboundHandler,
) {
    loop {
        // Outbound first, so everything queued before a stop still goes out.
        loop {
            match queue.try_recv() {
                Ok(text) => {
                    if let Err(e) = socket.send(Message::Text(text)) {
                        warn!("[InfraNet] send failed, closing: {}", e);
                        return;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    stop.store(true, Ordering::Release);
                    break;
                }
            }
        }

        if stop.load(Ordering::Acquire) {
            let _ = socket.close(None);
            let _ = socket.flush();
            debug!("[InfraNet] connection closed");
            return;
        }

        match socket.read() {
            Ok(Message::Text(text)) => match serde_json::from_str::<InfraMessage>(&text) {
                Ok(message) => on_message(message),
                Err(e) => debug!("[InfraNet] skipping message: {}", e),
            },
            Ok(Message::Close(_)) => {
                let _ = socket.flush();
                info!("[InfraNet] host closed the connection");
                return;
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(e))
                if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {}
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => return,
            Err(e) => {
                warn!("[InfraNet] read failed, closing: {}", e);
                return;
            }
        }
    }
}

/// POSTs each message as JSON to the InfraNet endpoint.
pub struct HttpSink {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpSink {
    pub fn new(endpoint: impl Into<String>) -> EngineResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

impl InfraSink for HttpSink {
    fn send(&mut self, message: &InfraMessage) -> EngineResult<()> {
        self.client
            .post(&self.endpoint)
            .json(message)
            .send()?
            .error_for_status()?;
        Ok(())
    }
}

/// Collects messages in memory. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct MemorySink {
    messages: Arc<Mutex<Vec<InfraMessage>>>,
}

impl MemorySink {
    pub fn messages(&self) -> Vec<InfraMessage> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl InfraSink for MemorySink {
    fn send(&mut self, message: &InfraMessage) -> EngineResult<()> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        Ok(())
    }
}

pub trait PoseSource: Send + Sync {
    fn head_pose(&self) -> HeadPose;
}

impl<F> PoseSource for F
where
    F: Fn() -> HeadPose + Send + Sync,
{
    fn head_pose(&self) -> HeadPose {
        self()
    }
}

/// Sends one scene-shift request.
pub fn request_dom_shift(
    sink: &mut dyn InfraSink,
    device_id: &str,
    target_scene: &str,
    reason: &str,
) -> EngineResult<()> {
    sink.send(&InfraMessage::DomShiftRequest {
        device_id: device_id.to_string(),
        target_scene: target_scene.to_string(),
        reason: reason.to_string(),
    })
}

pub struct PoseStreamer {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<u64>>,
}

impl PoseStreamer {
    /// Sends `hello`, then one `pose` every `1 / rate_hz` seconds until stopped.
    /// Sentinel poses are skipped. Send errors are logged and the stream goes on.
    pub fn spawn(
        source: Arc<dyn PoseSource>,
        mut sink: Box<dyn InfraSink>,
        device_id: String,
        capabilities: Vec<String>,
        rate_hz: u32,
    ) -> EngineResult<Self> {
        if rate_hz == 0 {
            return Err(EngineError::Config("pose rate must be > 0".to_string()));
        }
        let period = Duration::from_secs_f64(1.0 / rate_hz as f64);
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();

        let handle = thread::Builder::new()
            .name("xrphone-pose-stream".to_string())
            .spawn(move || {
                if let Err(e) = sink.send(&InfraMessage::hello(&device_id, &capabilities)) {
                    warn!("[InfraNet] hello failed: {}", e);
                }

                let mut sent = 0u64;
                while !thread_stop.load(Ordering::Acquire) {
                    let pose = source.head_pose();
                    if !pose.is_sentinel() {
                        match sink.send(&InfraMessage::pose(&device_id, &pose)) {
                            Ok(()) => sent += 1,
                            Err(e) => debug!("[InfraNet] pose send failed: {}", e),
                        }
                    }
                    thread::sleep(period);
                }
                sent
            })
            .map_err(|e| EngineError::Thread(format!("pose streamer spawn: {}", e)))?;

        info!("[InfraNet] streaming poses at {} Hz", rate_hz);
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Stops the stream and returns how many poses were delivered.
    pub fn stop(&mut self) -> u64 {
        self.stop.store(true, Ordering::Release);
        match self.handle.take().map(|h| h.join()) {
            Some(Ok(sent)) => sent,
            Some(Err(_)) => {
                warn!("[InfraNet] streamer thread panicked");
                0
            }
            None => 0,
        }
    }
}

impl Drop for PoseStreamer {
    fn drop(&mut self) {
        self.stop();
    }
}
