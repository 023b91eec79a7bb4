use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, StreamExt};
use shared::BackendConfig;
use tokio::{
    net::TcpStream,
    sync::{Mutex as AsyncMutex, mpsc, oneshot},
    task::JoinHandle,
    time::{self, Instant},
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message as WsMessage,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::{
    ChannelId, ChannelSpec, PushEvent, PushTransport,
    phoenix::{self, Frame},
};
use crate::error::{ClientError, ClientResult};

const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug)]
struct Route {
    id: ChannelId,
    sink: mpsc::UnboundedSender<PushEvent>,
}

/// Joined topics and join requests awaiting their reply, shared with the
/// connection task.
#[derive(Debug, Default)]
struct Routing {
    channels: HashMap<String, Route>,
    pending: HashMap<String, oneshot::Sender<Frame>>,
}

#[derive(Debug)]
struct Connection {
    outbound: mpsc::UnboundedSender<Frame>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl Connection {
    fn is_alive(&self) -> bool {
        !self.task.is_finished() && !self.outbound.is_closed()
    }
}

/// Websocket client for the hosted realtime service.
///
/// One socket multiplexes any number of channels. The connection is opened on
/// the first subscribe and reopened on the next subscribe after it drops.
pub struct RealtimeSocket {
    url: Url,
    access_token: String,
    join_timeout: Duration,
    heartbeat_interval: Duration,
    routing: Arc<Mutex<Routing>>,
    connection: AsyncMutex<Option<Connection>>,
    refs: Arc<AtomicU64>,
    next_channel: AtomicU64,
}

impl fmt::Debug for RealtimeSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeSocket")
            .field("url", &self.url.as_str())
            .field("join_timeout", &self.join_timeout)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .finish_non_exhaustive()
    }
}

impl RealtimeSocket {
    /// Creates a socket for `url`. `access_token` authorises row-level
    /// filtering on the server; the public API key works for public tables.
    pub fn new(url: Url, access_token: impl Into<String>, join_timeout: Duration) -> Self {
        Self {
            url,
            access_token: access_token.into(),
            join_timeout,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            routing: Arc::new(Mutex::new(Routing::default())),
            connection: AsyncMutex::new(None),
            refs: Arc::new(AtomicU64::new(0)),
            next_channel: AtomicU64::new(1),
        }
    }

    /// Socket for the configured backend, authorised with the API key.
    ///
    /// # Errors
    /// [`ClientError::Config`] when the realtime URL cannot be derived.
    pub fn from_config(config: &BackendConfig) -> ClientResult<Self> {
        Ok(Self::new(
            config.realtime_url()?,
            config.api_key.clone(),
            config.request_timeout(),
        ))
    }

    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = token.into();
        self
    }

    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Closes the websocket and drops every joined channel.
    pub async fn close(&self) {
        let connection = self.connection.lock().await.take();
        if let Some(connection) = connection {
            connection.shutdown.cancel();
            let _ = connection.task.await;
        }
    }

    fn routing(&self) -> MutexGuard<'_, Routing> {
        lock(&self.routing)
    }

    async fn outbound(&self) -> ClientResult<mpsc::UnboundedSender<Frame>> {
        let mut guard = self.connection.lock().await;
        if let Some(connection) = guard.as_ref().filter(|c| c.is_alive()) {
            return Ok(connection.outbound.clone());
        }

        debug!(url = %self.url.path(), "connecting realtime socket");
        let (stream, _) = time::timeout(self.join_timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| ClientError::Subscription("realtime connect timed out".into()))?
            .map_err(|err| ClientError::Subscription(format!("realtime connect failed: {err}")))?;

        let (outbound, frames) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run_connection(
            stream,
            frames,
            Arc::clone(&self.routing),
            Arc::clone(&self.refs),
            self.heartbeat_interval,
            shutdown.clone(),
        ));
        *guard = Some(Connection {
            outbound: outbound.clone(),
            shutdown,
            task,
        });
        info!("realtime socket connected");
        Ok(outbound)
    }

    fn forget(&self, topic: &str, reference: &str) {
        let mut routing = self.routing();
        routing.channels.remove(topic);
        routing.pending.remove(reference);
    }
}

impl Drop for RealtimeSocket {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.get_mut().take() {
            connection.shutdown.cancel();
        }
    }
}

#[async_trait]
impl PushTransport for RealtimeSocket {
    async fn subscribe(
        &self,
        spec: ChannelSpec,
        sink: mpsc::UnboundedSender<PushEvent>,
    ) -> ClientResult<ChannelId> {
        let topic = phoenix::topic_for(&spec);
        let outbound = self.outbound().await?;
        let id = ChannelId(self.next_channel.fetch_add(1, Ordering::SeqCst));
        let reference = next_ref(&self.refs);
        let (reply_tx, reply_rx) = oneshot::channel();

        {
            let mut routing = self.routing();
            if routing.channels.contains_key(&topic) {
                return Err(ClientError::Subscription(format!(
                    "{topic} is already joined"
                )));
            }
            routing.channels.insert(topic.clone(), Route { id, sink });
            routing.pending.insert(reference.clone(), reply_tx);
        }

        if outbound
            .send(Frame::join(&spec, &self.access_token, reference.clone()))
            .is_err()
        {
            self.forget(&topic, &reference);
            return Err(ClientError::Subscription(
                "realtime connection closed".into(),
            ));
        }

        match time::timeout(self.join_timeout, reply_rx).await {
            Ok(Ok(reply)) if reply.reply_status() == Some("ok") => {
                info!(topic = %topic, channel = %id, table = %spec.table, "joined realtime channel");
                Ok(id)
            }
            Ok(Ok(reply)) => {
                self.forget(&topic, &reference);
                Err(ClientError::Subscription(format!(
                    "join {topic} rejected: {}",
                    reply.reply_reason()
                )))
            }
            Ok(Err(_)) => {
                self.forget(&topic, &reference);
                Err(ClientError::Subscription(format!(
                    "connection closed before {topic} was joined"
                )))
            }
            Err(_) => {
                self.forget(&topic, &reference);
                Err(ClientError::Subscription(format!(
                    "join {topic} timed out after {:?}",
                    self.join_timeout
                )))
            }
        }
    }

    async fn unsubscribe(&self, channel: ChannelId) -> ClientResult<()> {
        let topic = {
            let mut routing = self.routing();
            let topic = routing
                .channels
                .iter()
                .find(|(_, route)| route.id == channel)
                .map(|(topic, _)| topic.clone());
            if let Some(topic) = &topic {
                routing.channels.remove(topic);
            }
            topic
        };
        let Some(topic) = topic else {
            return Ok(());
        };

        let guard = self.connection.lock().await;
        if let Some(connection) = guard.as_ref().filter(|c| c.is_alive()) {
            let _ = connection
                .outbound
                .send(Frame::leave(topic.clone(), next_ref(&self.refs)));
        }
        info!(topic = %topic, channel = %channel, "left realtime channel");
        Ok(())
    }
}

fn lock(routing: &Mutex<Routing>) -> MutexGuard<'_, Routing> {
    routing.lock().unwrap_or_else(PoisonError::into_inner)
}

fn next_ref(refs: &AtomicU64) -> String {
    (refs.fetch_add(1, Ordering::SeqCst) + 1).to_string()
}

async fn run_connection(
    stream: Socket,
    mut frames: mpsc::UnboundedReceiver<Frame>,
    routing: Arc<Mutex<Routing>>,
    refs: Arc<AtomicU64>,
    heartbeat_interval: Duration,
    shutdown: CancellationToken,
) {
    let (mut writer, mut reader) = stream.split();
    let mut heartbeat = time::interval_at(Instant::now() + heartbeat_interval, heartbeat_interval);

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                let _ = writer.send(WsMessage::Close(None)).await;
                break;
            }
            Some(frame) = frames.recv() => {
                if let Err(err) = send_frame(&mut writer, &frame).await {
                    warn!(error = %err, event = %frame.event, "realtime send failed");
                    break;
                }
            }
            _ = heartbeat.tick() => {
                if let Err(err) = send_frame(&mut writer, &Frame::heartbeat(next_ref(&refs))).await {
                    warn!(error = %err, "realtime heartbeat failed");
                    break;
                }
            }
            incoming = reader.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => dispatch(&routing, text.as_str()),
                Some(Ok(WsMessage::Close(_))) | None => {
                    info!("realtime socket closed by server");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(error = %err, "realtime socket failed");
                    break;
                }
            },
        }
    }

    // Dropping the sinks ends every subscriber's event stream.
    let mut routing = lock(&routing);
    routing.channels.clear();
    routing.pending.clear();
}

async fn send_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), String>
where
    W: Sink<WsMessage> + Unpin,
    W::Error: fmt::Display,
{
    let text = serde_json::to_string(frame).map_err(|err| err.to_string())?;
    writer
        .send(WsMessage::Text(text.into()))
        .await
        .map_err(|err| err.to_string())
}

fn dispatch(routing: &Mutex<Routing>, text: &str) {
    let frame: Frame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(err) => {
            warn!(error = %err, "skipping undecodable realtime frame");
            return;
        }
    };

    match frame.event.as_str() {
        phoenix::PHX_REPLY => {
            let waiter = frame
                .reference
                .as_ref()
                .and_then(|reference| lock(routing).pending.remove(reference));
            if let Some(waiter) = waiter {
                let _ = waiter.send(frame);
            }
        }
        phoenix::POSTGRES_CHANGES => match phoenix::decode_change(&frame.payload) {
            Ok(event) => {
                let routing = lock(routing);
                if let Some(route) = routing.channels.get(&frame.topic)
                    && route.sink.send(event).is_err()
                {
                    debug!(topic = %frame.topic, "subscriber dropped its receiver");
                }
            }
            Err(err) => warn!(topic = %frame.topic, error = %err, "skipping malformed change"),
        },
        phoenix::PHX_ERROR | phoenix::PHX_CLOSE => {
            if lock(routing).channels.remove(&frame.topic).is_some() {
                warn!(topic = %frame.topic, event = %frame.event, "channel closed by server");
            }
        }
        _ => debug!(topic = %frame.topic, event = %frame.event, "ignoring realtime frame"),
    }
}
