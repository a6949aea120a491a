//! Messaging transport.
//!
//! The bot core talks to users only through the [`Messenger`] trait and
//! receives updates as an [`EventStream`] from a [`Channel`].

mod event;
mod telegram;

pub use event::{
    BotCommand, ButtonAction, CallbackAction, Command, EventKind, InboundEvent, InlineButton,
    Keyboard,
};
pub use telegram::TelegramChannel;

use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::ChannelError;

/// Stream of inbound events from a channel.
pub type EventStream = Pin<Box<dyn Stream<Item = InboundEvent> + Send>>;

/// Outbound operations the bot needs from a transport.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send text, optionally with an inline keyboard.
    async fn send_text(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError>;

    /// Upload a file as a document.
    async fn send_document(&self, chat_id: &str, path: &Path) -> Result<(), ChannelError>;

    /// Replace the client-side command menu.
    async fn set_commands(&self, commands: &[BotCommand]) -> Result<(), ChannelError>;

    /// Acknowledge a button press.
    async fn answer_callback(&self, callback_id: &str) -> Result<(), ChannelError>;
}

/// A source of inbound events.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Start listening. The stream ends when the listener stops.
    async fn start(&self) -> Result<EventStream, ChannelError>;

    /// Check that the transport is reachable.
    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
