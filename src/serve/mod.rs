//! Development server: layered static roots and live-reload push
//!
//! Requests are satisfied by the first root that contains the path:
//! intermediate root, then source root, then public-assets root. Connected
//! clients hold a WebSocket open on `/__livereload` and receive reload
//! signals as tagged JSON frames.

use crate::core::config::SiteConfig;
use crate::core::reload::ReloadHub;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tower_http::services::ServeDir;
use tracing::{debug, info};

/// Browser-side snippet applying reload and inject signals
const CLIENT_JS: &str = r#"(() => {
  const proto = location.protocol === "https:" ? "wss" : "ws";
  const socket = new WebSocket(`${proto}://${location.host}/__livereload`);
  socket.onmessage = (event) => {
    const signal = JSON.parse(event.data);
    if (signal.type === "reload") {
      location.reload();
      return;
    }
    if (signal.type === "inject") {
      for (const link of document.querySelectorAll("link[rel=stylesheet]")) {
        if (new URL(link.href).pathname === signal.path) {
          link.href = `${signal.path}?t=${Date.now()}`;
        }
      }
    }
  };
})();
"#;

pub struct DevServer {
    port: u16,
    temp_root: PathBuf,
    source_root: PathBuf,
    public_root: PathBuf,
    vendor_dir: PathBuf,
    hub: ReloadHub,
}

impl DevServer {
    pub fn new(config: &SiteConfig, port: u16, hub: ReloadHub) -> Self {
        DevServer {
            port,
            temp_root: PathBuf::from(&config.build.temp),
            source_root: PathBuf::from(&config.build.src),
            public_root: PathBuf::from(&config.build.public),
            vendor_dir: PathBuf::from("node_modules"),
            hub,
        }
    }

    pub fn router(&self) -> Router {
        // First-match-wins layering: temp, then src, then public.
        let static_roots = ServeDir::new(&self.temp_root).fallback(
            ServeDir::new(&self.source_root).fallback(ServeDir::new(&self.public_root)),
        );

        Router::new()
            .route("/__livereload", get(ws_handler))
            .route("/__livereload.js", get(client_script))
            .nest_service("/node_modules", ServeDir::new(&self.vendor_dir))
            .fallback_service(static_roots)
            .with_state(self.hub.clone())
    }

    /// Serve until the process exits; there is no graceful drain.
    pub async fn serve(self) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", self.port)).await?;
        info!(port = self.port, "dev server listening");
        axum::serve(listener, self.router()).await
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<ReloadHub>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| client_session(socket, hub))
}

async fn client_session(mut socket: WebSocket, hub: ReloadHub) {
    // Subscribing here means this client only sees signals from now on;
    // earlier broadcasts are gone.
    let mut rx = hub.subscribe();
    debug!("live-reload client connected");
    loop {
        tokio::select! {
            signal = rx.recv() => match signal {
                Ok(signal) => {
                    let frame = match serde_json::to_string(&signal) {
                        Ok(frame) => frame,
                        Err(_) => continue,
                    };
                    if socket.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "client lagged behind reload signals");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(_)) => continue,
                _ => break,
            },
        }
    }
    debug!("live-reload client disconnected");
}

async fn client_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        CLIENT_JS,
    )
}
