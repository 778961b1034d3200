//! Servidor web Axum com WebSocket para visualização do parser de citações
//! em tempo real

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Json},
    routing::{get, post},
    Router,
};
use cite_core::{
    corpus::demo_citations,
    pipeline::{CitationPipeline, PipelineEvent},
    ParserConfig, TokenizerMode,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Estado compartilhado da aplicação: um pipeline validado por modo de
/// tokenização. Cada parse cria o próprio adaptador de modelo, então os
/// pipelines podem ser compartilhados livremente entre requisições.
struct AppState {
    plain: CitationPipeline,
    structural: CitationPipeline,
}

impl AppState {
    fn pipeline(&self, mode: TokenizerMode) -> &CitationPipeline {
        match mode {
            TokenizerMode::Plain => &self.plain,
            TokenizerMode::Structural => &self.structural,
        }
    }
}

#[derive(Deserialize)]
struct ParseRequest {
    text: String,
    #[serde(default)]
    mode: Option<TokenizerMode>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let plain = CitationPipeline::new(ParserConfig::default_for_mode(TokenizerMode::Plain))
        .expect("configuração padrão plain válida");
    let structural =
        CitationPipeline::new(ParserConfig::default_for_mode(TokenizerMode::Structural))
            .expect("configuração padrão structural válida");
    let state = Arc::new(AppState { plain, structural });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(index_handler))
        .route("/parse", post(parse_handler))
        .route("/ws", get(ws_handler))
        .route("/demo-citations", get(demo_citations_handler))
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
    info!("🚀 Servidor de citações iniciado em http://localhost:3000");
    axum::serve(listener, app).await.unwrap();
}

/// Retorna a página principal HTML
async fn index_handler() -> impl IntoResponse {
    Html(include_str!("templates/index.html"))
}

/// Parse de citação via HTTP POST (sem streaming)
async fn parse_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ParseRequest>,
) -> impl IntoResponse {
    if req.text.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Citação vazia"})),
        )
            .into_response();
    }

    let mode = req.mode.unwrap_or_default();
    match state.pipeline(mode).parse(&req.text) {
        Ok(parsed) => Json(parsed).into_response(),
        Err(err) => {
            error!("falha no parse: {err}");
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({"error": err.to_string()})),
            )
                .into_response()
        }
    }
}

/// Retorna citações de demonstração
async fn demo_citations_handler() -> impl IntoResponse {
    let citations: Vec<serde_json::Value> = demo_citations()
        .iter()
        .map(|(style, text)| {
            serde_json::json!({
                "style": style,
                "text": text
            })
        })
        .collect();
    Json(citations)
}

/// Upgrade HTTP → WebSocket
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Lógica do WebSocket: recebe a citação, roda o pipeline e envia os
/// eventos um a um, com pequena pausa para a animação do passo-a-passo
async fn handle_websocket(mut socket: WebSocket, state: Arc<AppState>) {
    info!("WebSocket conectado");

    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            Message::Text(text) => {
                // Tenta parsear como JSON {text, mode}; senão usa como texto puro
                let (text_str, mode) = if let Ok(req) = serde_json::from_str::<ParseRequest>(&text)
                {
                    (req.text.trim().to_string(), req.mode.unwrap_or_default())
                } else {
                    (text.trim().to_string(), TokenizerMode::Plain)
                };

                if text_str.is_empty() {
                    continue;
                }

                info!(
                    "Analisando via WebSocket [{mode:?}]: {} chars",
                    text_str.len()
                );

                // O pipeline é síncrono: roda em spawn_blocking para não
                // travar o runtime
                let (tx_std, rx_std) = std::sync::mpsc::channel::<PipelineEvent>();
                let state_for_thread = Arc::clone(&state);
                let text_for_thread = text_str.clone();

                let handle = tokio::task::spawn_blocking(move || {
                    state_for_thread
                        .pipeline(mode)
                        .parse_streaming(&text_for_thread, tx_std);
                });
                handle.await.ok();

                // Drena a fila std::mpsc (o rx não é Send; coleta tudo aqui)
                let events: Vec<PipelineEvent> = rx_std.try_iter().collect();

                for event in &events {
                    if let Ok(json) = serde_json::to_string(event) {
                        if socket.send(Message::Text(json.into())).await.is_err() {
                            return; // cliente desconectou
                        }
                        // Pequena pausa para animação visual (passo a passo)
                        tokio::time::sleep(tokio::time::Duration::from_millis(35)).await;
                    }
                }
            }
            Message::Close(_) => {
                info!("WebSocket desconectado");
                return;
            }
            Message::Ping(payload) => {
                let _ = socket.send(Message::Pong(payload)).await;
            }
            _ => {}
        }
    }
}
