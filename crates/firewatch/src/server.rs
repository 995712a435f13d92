//! HTTP endpoint for Discord interactions.
//!
//! Discord posts every slash command invocation to `POST /interactions`,
//! signed with the application's ed25519 key. Commands that need network
//! work are acknowledged with a deferred reply and completed by editing the
//! original response once the work is done.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::commands::{Command, CommandHandler};
use crate::discord::client::DiscordClient;
use crate::discord::embed::MessagePayload;
use crate::discord::interactions::{Interaction, InteractionResponse, SignatureVerifier};
use crate::error::{BotError, BotResult};
use crate::task::spawn_supervised;

const SIGNATURE_HEADER: &str = "x-signature-ed25519";
const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

/// Shared state for the interactions endpoint.
#[derive(Debug)]
pub struct InteractionState {
    verifier: SignatureVerifier,
    commands: CommandHandler,
    discord: Arc<DiscordClient>,
}

impl InteractionState {
    /// Creates the endpoint state.
    #[must_use]
    pub const fn new(
        verifier: SignatureVerifier,
        commands: CommandHandler,
        discord: Arc<DiscordClient>,
    ) -> Self {
        Self {
            verifier,
            commands,
            discord,
        }
    }
}

/// Builds the interactions router.
pub fn create_router(state: Arc<InteractionState>) -> Router {
    Router::new()
        .route("/interactions", post(handle_interaction))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serves the interactions router until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if binding to the address fails.
pub async fn serve<F>(state: Arc<InteractionState>, addr: SocketAddr, shutdown: F) -> BotResult<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| BotError::BindFailed(addr, e))?;

    info!(addr = %addr, "interactions endpoint listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("interactions endpoint shut down");
    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> BotResult<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or(BotError::Signature)
}

async fn handle_interaction(
    State(state): State<Arc<InteractionState>>,
    headers: HeaderMap,
    body: Bytes,
) -> BotResult<Json<InteractionResponse>> {
    let signature = header(&headers, SIGNATURE_HEADER)?;
    let timestamp = header(&headers, TIMESTAMP_HEADER)?;
    state.verifier.verify(signature, timestamp, &body)?;

    let interaction: Interaction = serde_json::from_slice(&body)
        .map_err(|e| BotError::InvalidRequest(format!("malformed interaction: {e}")))?;

    if interaction.is_ping() {
        debug!("answering interaction ping");
        return Ok(Json(InteractionResponse::pong()));
    }

    let Some(name) = interaction.command_name() else {
        return Err(BotError::InvalidRequest(format!(
            "unsupported interaction type {}",
            interaction.kind
        )));
    };

    let Some(command) = Command::parse(name) else {
        warn!(command = %name, "unknown command");
        return Ok(Json(InteractionResponse::message(MessagePayload::text(
            format!("Unknown command `/{name}`"),
        ))));
    };

    if command.is_deferred() {
        spawn_follow_up(&state, command, interaction);
        return Ok(Json(InteractionResponse::deferred()));
    }

    let reply = state.commands.execute(command).await;
    Ok(Json(InteractionResponse::message(reply)))
}

fn spawn_follow_up(state: &Arc<InteractionState>, command: Command, interaction: Interaction) {
    let state = Arc::clone(state);
    spawn_supervised("interaction-follow-up", async move {
        let reply = state.commands.execute(command).await;
        if let Err(e) = state
            .discord
            .edit_original_response(&interaction.application_id, &interaction.token, &reply)
            .await
        {
            warn!(%command, error = %e, "failed to send command reply");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiscordConfig;
    use axum::body::Body;
    use axum::extract::Path;
    use axum::http::{Request, StatusCode};
    use axum::routing::patch;
    use ed25519_dalek::{Signer, SigningKey};
    use fire_alerts::{AlertPoller, AlertRecord, AlertSource, Notifier, PollerConfig};
    use http_body_util::BodyExt;
    use parking_lot::Mutex;
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;
    use tower::ServiceExt;

    struct FixedSource(Vec<AlertRecord>);

    impl AlertSource for FixedSource {
        fn fetch<'a>(&'a self) -> Pin<Box<dyn Future<Output = Vec<AlertRecord>> + Send + 'a>> {
            Box::pin(async move { self.0.clone() })
        }
    }

    struct NullNotifier;

    impl Notifier for NullNotifier {
        fn name(&self) -> &str {
            "null"
        }

        fn deliver<'a>(
            &'a self,
            _alert: &'a AlertRecord,
        ) -> Pin<Box<dyn Future<Output = fire_alerts::Result<()>> + Send + 'a>> {
            Box::pin(async { Ok(()) })
        }
    }

    type Edits = Arc<Mutex<Vec<(String, Value)>>>;

    fn signing_key() -> SigningKey {
        SigningKey::from_bytes(&[3u8; 32])
    }

    fn make_state(api_base: &str) -> Arc<InteractionState> {
        let key = signing_key();
        let verifier = SignatureVerifier::new(key.verifying_key());

        let source = Arc::new(FixedSource(vec![
            AlertRecord::new("A1", "Red Flag Warning").with_area("Butte"),
        ]));
        let config = PollerConfig {
            delivery_spacing: Duration::ZERO,
            ..PollerConfig::default()
        };
        let poller = AlertPoller::with_config(config, source, Arc::new(NullNotifier)).unwrap();
        let commands = CommandHandler::new(
            Arc::new(poller),
            Duration::from_secs(60),
            vec!["Red Flag Warning".to_string()],
        );

        let discord = DiscordClient::new(&DiscordConfig {
            token: "secret".to_string(),
            api_base: api_base.to_string(),
            ..DiscordConfig::default()
        })
        .unwrap();

        Arc::new(InteractionState::new(verifier, commands, Arc::new(discord)))
    }

    fn signed_request(body: &str) -> Request<Body> {
        let timestamp = "1700000000";
        let mut message = timestamp.as_bytes().to_vec();
        message.extend_from_slice(body.as_bytes());
        let signature = hex::encode(signing_key().sign(&message).to_bytes());

        Request::builder()
            .method("POST")
            .uri("/interactions")
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .header(TIMESTAMP_HEADER, timestamp)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    async fn start_webhook_mock() -> (String, Edits) {
        let edits: Edits = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&edits);
        let app = Router::new().route(
            "/webhooks/{app}/{token}/messages/@original",
            patch(
                move |Path((_app, token)): Path<(String, String)>, Json(body): Json<Value>| {
                    let recorded = Arc::clone(&recorded);
                    async move {
                        recorded.lock().push((token, body));
                        Json(json!({ "id": "1" }))
                    }
                },
            ),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        (format!("http://{addr}"), edits)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_router(make_state("http://127.0.0.1:9"));
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_ping_returns_pong() {
        let app = create_router(make_state("http://127.0.0.1:9"));

        let response = app.oneshot(signed_request(r#"{"type":1}"#)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "type": 1 }));
    }

    #[tokio::test]
    async fn test_unsigned_request_rejected() {
        let app = create_router(make_state("http://127.0.0.1:9"));
        let request = Request::builder()
            .method("POST")
            .uri("/interactions")
            .body(Body::from(r#"{"type":1}"#))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "invalid_signature");
    }

    #[tokio::test]
    async fn test_bad_signature_rejected() {
        let app = create_router(make_state("http://127.0.0.1:9"));
        let mut request = signed_request(r#"{"type":1}"#);
        request
            .headers_mut()
            .insert(TIMESTAMP_HEADER, "1700000001".parse().unwrap());

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_malformed_body_rejected() {
        let app = create_router(make_state("http://127.0.0.1:9"));

        let response = app.oneshot(signed_request("not json")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_status_replies_immediately() {
        let app = create_router(make_state("http://127.0.0.1:9"));
        let body = r#"{"type":2,"id":"1","application_id":"555","token":"t","data":{"name":"status"}}"#;

        let response = app.oneshot(signed_request(body)).await.unwrap();

        let json = json_body(response).await;
        assert_eq!(json["type"], 4);
        assert_eq!(json["data"]["embeds"][0]["title"], "Bot Status");
    }

    #[tokio::test]
    async fn test_test_command_replies_with_test_embed() {
        let app = create_router(make_state("http://127.0.0.1:9"));
        let body = r#"{"type":2,"application_id":"555","token":"t","data":{"name":"test"}}"#;

        let response = app.oneshot(signed_request(body)).await.unwrap();

        let json = json_body(response).await;
        assert_eq!(json["data"]["embeds"][0]["title"], "TEST - Red Flag Warning");
    }

    #[tokio::test]
    async fn test_unknown_command_gets_text_reply() {
        let app = create_router(make_state("http://127.0.0.1:9"));
        let body = r#"{"type":2,"application_id":"555","token":"t","data":{"name":"deploy"}}"#;

        let response = app.oneshot(signed_request(body)).await.unwrap();

        let json = json_body(response).await;
        assert_eq!(json["type"], 4);
        assert_eq!(json["data"]["content"], "Unknown command `/deploy`");
    }

    #[tokio::test]
    async fn test_check_is_deferred_then_edited() {
        let (api_base, edits) = start_webhook_mock().await;
        let state = make_state(&api_base);
        let app = create_router(Arc::clone(&state));
        let body = r#"{"type":2,"application_id":"555","token":"tok-1","data":{"name":"check"}}"#;

        let response = app.oneshot(signed_request(body)).await.unwrap();
        assert_eq!(json_body(response).await, json!({ "type": 5 }));

        for _ in 0..100 {
            if !edits.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let edits = edits.lock();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].0, "tok-1");
        assert_eq!(edits[0].1["embeds"][0]["title"], "Manual Check Complete");
        assert!(state.commands.poller().has_seen("A1"));
    }
}
