use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::broker::message::Response;
use crate::broker::{Broker, Control};
use crate::client::{Client, ConnectionId};
use crate::config::BrokerSettings;
use crate::transport::codec::MqttCodec;
use crate::utils::error::CodecError;

/// How long a closed connection's writer may keep flushing queued frames.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Binds `addr` and serves MQTT connections until the listener fails.
pub async fn start_mqtt_server(
    addr: &str,
    broker: Arc<Mutex<Broker>>,
    settings: BrokerSettings,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("MQTT server listening on mqtt://{}", listener.local_addr()?);
    serve(listener, broker, settings).await
}

/// Accept loop over an already bound listener.
pub async fn serve(
    listener: TcpListener,
    broker: Arc<Mutex<Broker>>,
    settings: BrokerSettings,
) -> std::io::Result<()> {
    let active = Arc::new(AtomicUsize::new(0));
    let codec = MqttCodec::new(settings.max_packet_size);
    let queue_capacity = settings.outbound_queue_capacity;

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Accept failed: {}", e);
                continue;
            }
        };

        if active.load(Ordering::SeqCst) >= settings.max_connections {
            warn!(
                "Rejecting {}: {} connections already open",
                peer, settings.max_connections
            );
            continue;
        }
        active.fetch_add(1, Ordering::SeqCst);

        let broker = broker.clone();
        let active = active.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer, broker, codec, queue_capacity).await {
                debug!("Connection from {} ended with error: {}", peer, e);
            }
            active.fetch_sub(1, Ordering::SeqCst);
        });
    }
}

fn lock(broker: &Mutex<Broker>) -> MutexGuard<'_, Broker> {
    broker.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    broker: Arc<Mutex<Broker>>,
    codec: MqttCodec,
    queue_capacity: usize,
) -> Result<(), CodecError> {
    let (mut reader, mut writer) = stream.into_split();
    let (tx, mut rx) = mpsc::channel::<Response>(queue_capacity);

    // Register before reading anything
    let client = Client::new(tx);
    let id = client.id;
    lock(&broker).register_client(client);
    info!("Accepted {} from {}", id, peer);

    // broker -> socket. Ends once the session, the only sender, is dropped.
    let writer_task = tokio::spawn(async move {
        let mut out = BytesMut::with_capacity(256);
        while let Some(response) = rx.recv().await {
            out.clear();
            MqttCodec::encode(&response, &mut out);
            if out.is_empty() {
                continue;
            }
            if let Err(e) = writer.write_all(&out).await {
                debug!("Failed to write to {}: {}", id, e);
                break;
            }
        }
        let _ = writer.shutdown().await;
    });

    let result = read_loop(&mut reader, id, &broker, &codec).await;

    lock(&broker).on_close(&id);
    if !finish_writer(writer_task, WRITER_DRAIN_TIMEOUT).await {
        debug!("Writer of {} did not drain in time, aborted", id);
    }
    info!("{} disconnected", id);
    result
}

/// Waits up to `grace` for a writer task to flush and exit, aborting it
/// otherwise. Returns false if it had to be aborted.
pub(crate) async fn finish_writer(mut handle: JoinHandle<()>, grace: Duration) -> bool {
    match tokio::time::timeout(grace, &mut handle).await {
        Ok(_) => true,
        Err(_) => {
            handle.abort();
            false
        }
    }
}

/// socket -> broker, until EOF, a fatal error, or the broker asks to close.
async fn read_loop(
    reader: &mut OwnedReadHalf,
    id: ConnectionId,
    broker: &Mutex<Broker>,
    codec: &MqttCodec,
) -> Result<(), CodecError> {
    let mut buf = BytesMut::with_capacity(4096);
    loop {
        while let Some(command) = codec.decode(&mut buf)? {
            let control = lock(broker).on_command(&id, command);
            match control {
                Ok(Control::Continue) => {}
                Ok(Control::Close) => return Ok(()),
                Err(e) => {
                    warn!("Closing {}: {}", id, e);
                    return Ok(());
                }
            }
        }
        if reader.read_buf(&mut buf).await? == 0 {
            return Ok(());
        }
    }
}
