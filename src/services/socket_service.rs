use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use crate::error::{ApiError, Result};
use crate::models::{ClientEvent, ServerEvent};

const EVENT_BUFFER: usize = 256;

/// Live connection to the backend's event socket.
///
/// Outbound frames go through a writer task; inbound frames are parsed into
/// [`ServerEvent`]s by a reader task and handed out as a stream.
pub struct SocketClient {
    outbound: mpsc::UnboundedSender<String>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl SocketClient {
    /// Connect and, when a token is given, authenticate straight away.
    pub async fn connect(url: &str, token: Option<String>) -> Result<(Self, ReceiverStream<ServerEvent>)> {
        let (ws, _) = connect_async(url).await?;
        info!("Socket connected to {}", url);
        let (mut sink, mut stream) = ws.split();

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let writer = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(frame.into())).await {
                    warn!("Socket send failed: {}", e);
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let (events, events_rx) = mpsc::channel(EVENT_BUFFER);
        let reader = tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => match ServerEvent::from_frame(text.as_str()) {
                        Ok(event) => {
                            debug!("<-- {}", event.name());
                            if events.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Dropping socket frame: {}", e),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Socket read failed: {}", e);
                        break;
                    }
                }
            }
            info!("Socket closed");
        });

        let client = Self { outbound, reader, writer };
        if let Some(token) = token {
            client.emit(&ClientEvent::Authenticate { token })?;
        }
        Ok((client, ReceiverStream::new(events_rx)))
    }

    pub fn emit(&self, event: &ClientEvent) -> Result<()> {
        let frame = event.to_frame()?;
        self.outbound
            .send(frame)
            .map_err(|_| ApiError::Socket(WsError::ConnectionClosed))
    }

    pub fn is_connected(&self) -> bool {
        !self.reader.is_finished() && !self.writer.is_finished()
    }

    /// Flush pending frames, close the socket and stop reading.
    pub async fn disconnect(self) {
        let Self { outbound, reader, writer } = self;
        drop(outbound);
        let _ = writer.await;
        reader.abort();
    }
}
