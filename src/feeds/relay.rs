// DANS : src/feeds/relay.rs

use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};
use warp::ws::{Message, WebSocket};
use warp::Filter;

/// Chaque client WebSocket reçoit, en JSON, tous les résultats publiés après sa connexion.
pub fn routes(
    relay: broadcast::Sender<String>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::ws().map(move |ws: warp::ws::Ws| {
        let results = relay.subscribe();
        ws.on_upgrade(move |socket| client_session(socket, results))
    })
}

pub async fn start_relay_server(relay: broadcast::Sender<String>, port: u16) {
    info!(port, "[Relay] Serveur WebSocket démarré");
    warp::serve(routes(relay)).run(([0, 0, 0, 0], port)).await;
}

async fn client_session(socket: WebSocket, mut results: broadcast::Receiver<String>) {
    info!("[Relay] Nouveau client connecté");
    let (mut outgoing, mut incoming) = socket.split();

    loop {
        tokio::select! {
            published = results.recv() => match published {
                Ok(json) => {
                    if outgoing.send(Message::text(json)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "[Relay] Client trop lent, résultats perdus");
                }
                Err(RecvError::Closed) => break,
            },
            received = incoming.next() => match received {
                Some(Ok(message)) if message.is_close() => break,
                Some(Ok(message)) => {
                    if let Ok(text) = message.to_str() {
                        debug!(text, "[Relay] Message client reçu");
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, "[Relay] Erreur de transport client");
                    break;
                }
                None => break,
            },
        }
    }
    info!("[Relay] Client déconnecté");
}
