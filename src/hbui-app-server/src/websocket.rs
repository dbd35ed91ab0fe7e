//! WebSocket channel for plugin commands.
//!
//! The client asks for an install, update or uninstall; the server streams
//! the raw terminal output as `stdout` messages and finishes with exactly
//! one `result` message for that command.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
    routing::get,
};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, SplitStream, StreamExt},
};
use hbui_plugins::{PluginAction, PluginError};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::state::AppState;

/// Create WebSocket routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/ws/plugins", get(plugins_websocket_handler))
}

/// Handle WebSocket upgrade.
async fn plugins_websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = Uuid::new_v4().to_string();
    info!(connection_id = %connection_id, "WebSocket connected");

    let (sender, receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<WsMessage>();

    let sender_task = tokio::spawn(async move {
        handle_sender(sender, rx).await;
    });

    handle_receiver(receiver, tx, &state).await;

    // Running commands keep their own sender clones and finish on their own.
    sender_task.abort();
    info!(connection_id = %connection_id, "WebSocket disconnected");
}

/// Handle outgoing messages.
async fn handle_sender(
    mut sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<WsMessage>,
) {
    while let Some(msg) = rx.recv().await {
        let text = match serde_json::to_string(&msg) {
            Ok(t) => t,
            Err(e) => {
                error!("Failed to serialize message: {}", e);
                continue;
            }
        };

        if let Err(e) = sender.send(Message::Text(text.into())).await {
            error!("Failed to send message: {}", e);
            break;
        }
    }
}

/// Handle incoming messages.
async fn handle_receiver(
    mut receiver: SplitStream<WebSocket>,
    tx: mpsc::UnboundedSender<WsMessage>,
    state: &Arc<AppState>,
) {
    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                error!("WebSocket receive error: {}", e);
                break;
            }
        };

        match msg {
            Message::Text(text) => handle_text_message(&text, &tx, state),
            Message::Binary(data) => {
                debug!("Received binary message: {} bytes", data.len());
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => {
                info!("WebSocket close requested");
                break;
            }
        }
    }
}

/// Handle a text message.
fn handle_text_message(text: &str, tx: &mpsc::UnboundedSender<WsMessage>, state: &Arc<AppState>) {
    let msg: WsClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            let _ = tx.send(WsMessage::Error {
                code: "validation_error".to_string(),
                message: format!("Invalid message format: {e}"),
            });
            return;
        }
    };

    let command = match msg {
        WsClientMessage::Ping { timestamp } => {
            let _ = tx.send(WsMessage::Pong { timestamp });
            return;
        }
        WsClientMessage::Install { name } => PluginCommand::Plugin(PluginAction::Install, name),
        WsClientMessage::Update { name } => PluginCommand::Plugin(PluginAction::Update, name),
        WsClientMessage::Uninstall { name } => PluginCommand::Plugin(PluginAction::Uninstall, name),
        WsClientMessage::UpdateHomebridge => PluginCommand::UpdateHomebridge,
    };

    let state = Arc::clone(state);
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = run_command(&state, command, &tx).await;
        let _ = tx.send(WsMessage::from_result(result));
    });
}

/// A command requested over the socket.
#[derive(Debug, Clone)]
enum PluginCommand {
    Plugin(PluginAction, String),
    UpdateHomebridge,
}

/// Run a command, forwarding its output as `stdout` messages.
///
/// Returns only after every output chunk has been queued.
async fn run_command(
    state: &AppState,
    command: PluginCommand,
    tx: &mpsc::UnboundedSender<WsMessage>,
) -> Result<(), PluginError> {
    let (sink, mut output) = mpsc::unbounded_channel::<String>();
    let forward_tx = tx.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(data) = output.recv().await {
            let _ = forward_tx.send(WsMessage::Stdout { data });
        }
    });

    let plugins = &state.plugins;
    let result = match command {
        PluginCommand::Plugin(action, name) => {
            info!(plugin = %name, %action, "Plugin command requested");
            let installed = plugins.installed_plugins().await;
            match action {
                PluginAction::Install => plugins.install(&installed, &name, &sink).await,
                PluginAction::Update => plugins.update(&installed, &name, &sink).await,
                PluginAction::Uninstall => plugins.uninstall(&installed, &name, &sink).await,
            }
        }
        PluginCommand::UpdateHomebridge => {
            info!("Homebridge update requested");
            plugins.update_homebridge(&sink).await
        }
    };

    drop(sink);
    if let Err(e) = forwarder.await {
        error!("Output forwarder failed: {}", e);
    }
    result
}

/// Client-to-server WebSocket messages.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsClientMessage {
    /// Install the latest version of a plugin.
    Install { name: String },
    /// Update an installed plugin to the latest version.
    Update { name: String },
    /// Remove an installed plugin.
    Uninstall { name: String },
    /// Update the bridge package itself.
    UpdateHomebridge,
    /// Keep-alive.
    Ping { timestamp: u64 },
}

/// Server-to-client WebSocket messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// Raw terminal output chunk.
    Stdout { data: String },
    /// Final outcome of one command.
    Result {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Pong response.
    Pong { timestamp: u64 },
    /// Error message.
    Error { code: String, message: String },
}

impl WsMessage {
    /// The `result` message for a finished command.
    pub fn from_result(result: Result<(), PluginError>) -> Self {
        match result {
            Ok(()) => Self::Result {
                success: true,
                message: None,
            },
            Err(e) => Self::Result {
                success: false,
                message: Some(e.to_string()),
            },
        }
    }
}
