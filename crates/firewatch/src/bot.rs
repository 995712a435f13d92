//! Bot runtime: wires the feed, poller, Discord client and interactions
//! endpoint together and runs them until shutdown.

use std::sync::Arc;

use chrono::Utc;
use fire_alerts::AlertPoller;
use tokio::sync::oneshot;
use tokio::task::JoinError;
use tracing::{error, info, warn};

use crate::commands::{self, CommandHandler};
use crate::config::BotConfig;
use crate::discord::client::{DiscordClient, DiscordNotifier};
use crate::discord::interactions::SignatureVerifier;
use crate::error::{BotError, BotResult};
use crate::nws::NwsClient;
use crate::server::{self, InteractionState};
use crate::task::log_join_error;

/// Process-wide state, built once at startup.
#[derive(Debug)]
pub struct BotContext {
    config: BotConfig,
    discord: Arc<DiscordClient>,
    poller: Arc<AlertPoller>,
    commands: CommandHandler,
}

impl BotContext {
    /// Validates the configuration and builds every component.
    ///
    /// No network requests are made.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configuration is invalid.
    pub fn new(config: BotConfig) -> BotResult<Self> {
        config.validate()?;

        let feed = Arc::new(NwsClient::new(&config.feed)?);
        let discord = Arc::new(DiscordClient::new(&config.discord)?);
        let notifier = Arc::new(DiscordNotifier::new(
            Arc::clone(&discord),
            config.discord.channel_id.clone(),
        ));
        let poller = Arc::new(AlertPoller::with_config(
            config.poll.poller(),
            feed,
            notifier,
        )?);
        let commands = CommandHandler::new(
            Arc::clone(&poller),
            config.poll.interval(),
            config.feed.hazard_types.clone(),
        );

        Ok(Self {
            config,
            discord,
            poller,
            commands,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Returns the shared poller.
    #[must_use]
    pub const fn poller(&self) -> &Arc<AlertPoller> {
        &self.poller
    }

    /// Returns the command handler.
    #[must_use]
    pub const fn commands(&self) -> &CommandHandler {
        &self.commands
    }

    /// Returns the configured application id, or asks Discord for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is not configured and the lookup fails.
    pub async fn resolve_application_id(&self) -> BotResult<String> {
        if let Some(id) = &self.config.discord.application_id {
            return Ok(id.clone());
        }
        let app = self.discord.current_application().await?;
        info!(application_id = %app.id, name = %app.name, "resolved application");
        Ok(app.id)
    }

    /// Registers the slash commands for the application.
    ///
    /// # Errors
    ///
    /// Returns an error if Discord rejects the registration.
    pub async fn register_commands(&self, application_id: &str) -> BotResult<()> {
        let definitions = commands::definitions();
        self.discord
            .register_commands(application_id, &definitions)
            .await?;
        info!(count = definitions.len(), "slash commands registered");
        Ok(())
    }

    /// Posts the startup announcement to the alert channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is not visible or the post fails.
    pub async fn announce(&self) -> BotResult<()> {
        let channel_id = &self.config.discord.channel_id;
        let channel = self.discord.get_channel(channel_id).await?;
        self.discord
            .send_message(channel_id, &self.commands.startup(Utc::now()))
            .await?;
        info!(
            channel_id = %channel.id,
            channel = channel.name.as_deref().unwrap_or(""),
            "startup announcement sent"
        );
        Ok(())
    }

    fn interaction_state(&self) -> BotResult<Option<Arc<InteractionState>>> {
        if !self.config.interactions.enabled {
            return Ok(None);
        }
        let Some(public_key) = &self.config.discord.public_key else {
            warn!("no discord public key configured, slash commands will not be answered");
            return Ok(None);
        };

        let verifier = SignatureVerifier::from_hex(public_key)?;
        Ok(Some(Arc::new(InteractionState::new(
            verifier,
            self.commands.clone(),
            Arc::clone(&self.discord),
        ))))
    }

    /// Runs the bot until interrupted.
    ///
    /// Startup steps that talk to Discord are logged and skipped on failure;
    /// alerts keep flowing as long as the poll loop is alive.
    ///
    /// # Errors
    ///
    /// Returns an error if the interactions endpoint cannot be started, or
    /// if scheduled polling or the endpoint stops before shutdown is
    /// requested.
    pub async fn run(self) -> BotResult<()> {
        info!(
            hazard_types = ?self.config.feed.hazard_types,
            channel_id = %self.config.discord.channel_id,
            interval_secs = self.config.poll.interval_secs,
            "firewatch starting"
        );

        let interactions = self.interaction_state()?;

        match self.resolve_application_id().await {
            Ok(app_id) => {
                if let Err(e) = self.register_commands(&app_id).await {
                    error!(error = %e, "failed to register slash commands");
                }
            }
            Err(e) => error!(error = %e, "failed to resolve application id"),
        }

        if let Err(e) = self.announce().await {
            warn!(
                channel_id = %self.config.discord.channel_id,
                error = %e,
                "could not post startup announcement"
            );
        }

        let poller = Arc::clone(&self.poller);
        let interval = self.config.poll.interval();
        let mut polling = tokio::spawn(poller.run_scheduled(interval));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let mut serving = match interactions {
            Some(state) => {
                let addr = self.config.listen_addr()?;
                Some(tokio::spawn(server::serve(state, addr, async move {
                    let _ = shutdown_rx.await;
                })))
            }
            None => None,
        };

        let (outcome, server_finished) = tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                match signal {
                    Ok(()) => info!("received SIGINT, shutting down"),
                    Err(e) => error!(error = %e, "failed to listen for shutdown signal"),
                }
                (Ok(()), false)
            }
            joined = &mut polling => (polling_stopped(joined), false),
            joined = async {
                match serving.as_mut() {
                    Some(handle) => handle.await,
                    None => std::future::pending().await,
                }
            } => {
                let outcome = match joined {
                    Ok(Ok(())) => {
                        warn!("interactions endpoint stopped");
                        Ok(())
                    }
                    Ok(Err(e)) => Err(e),
                    Err(e) => {
                        log_join_error("interactions-endpoint", &e);
                        Err(BotError::TaskStopped("interactions-endpoint".to_string()))
                    }
                };
                (outcome, true)
            }
        };

        let _ = shutdown_tx.send(());
        polling.abort();
        if let Some(handle) = serving.filter(|_| !server_finished) {
            if let Err(e) = handle.await {
                log_join_error("interactions-endpoint", &e);
            }
        }

        if let Err(e) = &outcome {
            error!(error = %e, "firewatch stopped with an error");
        } else {
            info!("firewatch stopped");
        }
        outcome
    }
}

/// Turns the end of the scheduled polling task into an error.
///
/// Polling only stops when the task panics or is cancelled, and the
/// process is no use without it.
fn polling_stopped(joined: Result<(), JoinError>) -> BotResult<()> {
    match joined {
        Ok(()) => error!("scheduled polling stopped"),
        Err(e) => log_join_error("scheduled-polling", &e),
    }
    Err(BotError::TaskStopped("scheduled-polling".to_string()))
}

/// Checks that the process can start before any network activity.
///
/// # Errors
///
/// Returns [`BotError::Config`] describing the first problem found.
pub fn preflight(config: &BotConfig) -> BotResult<()> {
    config.validate()?;
    if config.interactions.enabled {
        if let Some(key) = &config.discord.public_key {
            SignatureVerifier::from_hex(key)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiscordConfig;
    use axum::extract::Path;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use parking_lot::Mutex;
    use serde_json::{Value, json};
    use tokio::net::TcpListener;

    fn valid_config(api_base: &str) -> BotConfig {
        let mut config = BotConfig::default();
        config.discord = DiscordConfig {
            token: "secret".to_string(),
            channel_id: "42".to_string(),
            api_base: api_base.to_string(),
            ..DiscordConfig::default()
        };
        config
    }

    async fn start_discord_mock() -> (String, Arc<Mutex<Vec<Value>>>) {
        let posted = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&posted);
        let app = Router::new()
            .route(
                "/channels/{id}",
                get(|Path(id): Path<String>| async move {
                    Json(json!({ "id": id, "name": "fire-alerts" }))
                }),
            )
            .route(
                "/channels/{id}/messages",
                post(move |Json(body): Json<Value>| {
                    let recorded = Arc::clone(&recorded);
                    async move {
                        recorded.lock().push(body);
                        Json(json!({ "id": "1" }))
                    }
                }),
            )
            .route(
                "/oauth2/applications/@me",
                get(|| async { Json(json!({ "id": "999", "name": "firewatch" })) }),
            );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        (format!("http://{addr}"), posted)
    }

    #[test]
    fn test_new_rejects_missing_token() {
        let mut config = valid_config("http://127.0.0.1:9");
        config.discord.token = String::new();

        let err = BotContext::new(config).unwrap_err();

        assert!(matches!(err, BotError::Config(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_new_builds_components() {
        let ctx = BotContext::new(valid_config("http://127.0.0.1:9")).unwrap();

        assert_eq!(ctx.poller().tracked(), 0);
        assert_eq!(ctx.config().discord.channel_id, "42");
        assert_eq!(ctx.poller().config().delivery_spacing.as_millis(), 1000);
    }

    #[test]
    fn test_interaction_state_requires_public_key() {
        let ctx = BotContext::new(valid_config("http://127.0.0.1:9")).unwrap();
        assert!(ctx.interaction_state().unwrap().is_none());

        let mut config = valid_config("http://127.0.0.1:9");
        config.discord.public_key = Some(hex::encode(
            ed25519_dalek::SigningKey::from_bytes(&[1u8; 32])
                .verifying_key()
                .as_bytes(),
        ));
        let ctx = BotContext::new(config).unwrap();
        assert!(ctx.interaction_state().unwrap().is_some());
    }

    #[test]
    fn test_preflight_rejects_zero_interval() {
        let mut config = valid_config("http://127.0.0.1:9");
        config.poll.interval_secs = 0;

        assert!(matches!(preflight(&config), Err(BotError::Config(_))));
    }

    #[tokio::test]
    async fn test_stopped_polling_is_an_error() {
        let finished = polling_stopped(Ok(()));
        assert!(matches!(finished, Err(BotError::TaskStopped(ref name)) if name == "scheduled-polling"));

        let panicked = tokio::spawn(async {
            panic!("poll loop bug");
        })
        .await;
        let err = polling_stopped(panicked).unwrap_err();
        assert_eq!(err.to_string(), "background task stopped: scheduled-polling");
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_configured_application_id_skips_lookup() {
        let mut config = valid_config("http://127.0.0.1:9");
        config.discord.application_id = Some("123".to_string());
        let ctx = BotContext::new(config).unwrap();

        assert_eq!(ctx.resolve_application_id().await.unwrap(), "123");
    }

    #[tokio::test]
    async fn test_application_id_lookup() {
        let (api_base, _posted) = start_discord_mock().await;
        let ctx = BotContext::new(valid_config(&api_base)).unwrap();

        assert_eq!(ctx.resolve_application_id().await.unwrap(), "999");
    }

    #[tokio::test]
    async fn test_announce_posts_startup_embed() {
        let (api_base, posted) = start_discord_mock().await;
        let ctx = BotContext::new(valid_config(&api_base)).unwrap();

        ctx.announce().await.unwrap();

        let posted = posted.lock();
        assert_eq!(posted.len(), 1);
        assert_eq!(
            posted[0]["embeds"][0]["title"],
            "Fire Weather Alert Bot Online"
        );
        assert_eq!(
            posted[0]["embeds"][0]["footer"]["text"],
            "Polling every 60 seconds"
        );
    }
}
