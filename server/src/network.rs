//! Server network layer: WebSocket transport and the loop that owns the room

use crate::broadcast::{Outbound, OUTBOUND_CAPACITY};
use crate::client_manager::ClientId;
use crate::error::SessionError;
use crate::room::Room;
use crate::session::{HealthReport, SessionRouter};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use axum::Json;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{ServerMessage, TICK_RATE};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};

/// Connection events buffered before socket tasks have to wait for the loop.
pub const EVENT_CAPACITY: usize = 1000;

/// Events sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum NetworkEvent {
    Connected {
        outbound: Outbound,
        reply: oneshot::Sender<Result<ClientId, SessionError>>,
    },
    Frame {
        client_id: ClientId,
        text: String,
    },
    Disconnected {
        client_id: ClientId,
    },
    HealthQuery {
        reply: oneshot::Sender<HealthReport>,
    },
}

#[derive(Clone)]
struct AppState {
    events: mpsc::Sender<NetworkEvent>,
}

/// Main server tying the transport to the session router.
///
/// Connection tasks only forward events; the room is touched exclusively by
/// the loop in [`Server::run`], so message handlers, ticks and timers never
/// overlap. The event queue is bounded, so a socket that floods frames waits
/// for the loop instead of growing the queue.
pub struct Server {
    listener: TcpListener,
    router: SessionRouter,
    tick_duration: Duration,
    events_tx: mpsc::Sender<NetworkEvent>,
    events_rx: mpsc::Receiver<NetworkEvent>,
}

impl Server {
    pub async fn bind(addr: &str, max_clients: usize) -> Result<Self, std::io::Error> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);

        Ok(Server {
            listener,
            router: SessionRouter::new(Room::new(), max_clients),
            tick_duration: Duration::from_secs_f64(1.0 / TICK_RATE as f64),
            events_tx,
            events_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Serves connections and runs the game loop until the transport stops.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let Server {
            listener,
            mut router,
            tick_duration,
            events_tx,
            mut events_rx,
        } = self;

        let app = axum::Router::new()
            .route("/", get(ws_handler))
            .route("/health", get(health))
            .with_state(AppState { events: events_tx });

        let mut serve_handle = tokio::spawn(async move { axum::serve(listener, app).await });

        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Server started successfully");

        loop {
            let deadline = router.next_deadline();
            let timer_due = deadline.map(Instant::from_std).unwrap_or_else(Instant::now);

            tokio::select! {
                event = events_rx.recv() => {
                    match event {
                        Some(event) => handle_event(&mut router, event),
                        None => {
                            info!("Event channel closed, shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    router.tick();
                },

                _ = sleep_until(timer_due), if deadline.is_some() => {
                    router.fire_due_timers(std::time::Instant::now());
                },

                result = &mut serve_handle => {
                    match result {
                        Ok(Ok(())) => info!("Transport stopped"),
                        Ok(Err(e)) => error!("Transport error: {}", e),
                        Err(e) => error!("Transport task panicked: {}", e),
                    }
                    break;
                },
            }
        }

        Ok(())
    }
}

/// Applies one connection event to the router.
pub fn handle_event(router: &mut SessionRouter, event: NetworkEvent) {
    match event {
        NetworkEvent::Connected { outbound, reply } => {
            let result = router.connect(outbound);
            if let Err(Ok(client_id)) = reply.send(result) {
                // The connection task is gone before it learned its id.
                router.disconnect(&client_id);
            }
        }
        NetworkEvent::Frame { client_id, text } => router.handle_frame(&client_id, &text),
        NetworkEvent::Disconnected { client_id } => router.disconnect(&client_id),
        NetworkEvent::HealthQuery { reply } => {
            let _ = reply.send(router.health());
        }
    }
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthReport>, StatusCode> {
    let (reply, report) = oneshot::channel();
    state
        .events
        .send(NetworkEvent::HealthQuery { reply })
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;
    report
        .await
        .map(Json)
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Pumps frames between one WebSocket and the server loop.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (outbound, mut outbound_rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);

    let (reply, assigned) = oneshot::channel();
    if state
        .events
        .send(NetworkEvent::Connected { outbound, reply })
        .await
        .is_err()
    {
        return;
    }

    let client_id = match assigned.await {
        Ok(Ok(client_id)) => client_id,
        Ok(Err(e)) => {
            warn!("Rejecting connection: {}", e);
            let rejection = ServerMessage::Error {
                message: e.to_string(),
            };
            if let Ok(text) = rejection.to_json() {
                let _ = sink.send(Message::Text(text.into())).await;
            }
            let _ = sink.close().await;
            return;
        }
        Err(_) => return,
    };

    let mut writer = tokio::spawn(async move {
        while let Some(text) = outbound_rx.recv().await {
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let event = NetworkEvent::Frame {
                            client_id: client_id.clone(),
                            text: text.as_str().to_owned(),
                        };
                        if state.events.send(event).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        warn!("Dropping binary frame from {}", client_id);
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("Connection {} errored: {}", client_id, e);
                        break;
                    }
                }
            },
            _ = &mut writer => break,
        }
    }

    writer.abort();
    let _ = state
        .events
        .send(NetworkEvent::Disconnected { client_id })
        .await;
}
