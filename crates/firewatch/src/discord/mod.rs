//! Discord delivery, rendering and interactions.

pub mod client;
pub mod embed;
pub mod interactions;

pub use client::{ApplicationInfo, ChannelInfo, CommandDefinition, DiscordClient, DiscordNotifier};
pub use embed::{Embed, MessagePayload, alert_embed};
pub use interactions::{Interaction, InteractionResponse, SignatureVerifier};
