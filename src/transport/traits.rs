//! Transport trait abstraction for the publish/subscribe client

use crate::error::TransportError;
use async_trait::async_trait;

/// Receives messages delivered during [`Transport::loop_once`]
pub trait MessageHandler: Send {
    fn on_message(&mut self, topic: &str, payload: &[u8]);
}

/// A publish/subscribe client the node drives one call at a time
#[async_trait]
pub trait Transport: Send {
    /// Open a session with the broker
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Subscribe to `topic` on the open session
    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    /// Publish `payload` to `topic`, optionally retained by the broker
    async fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), TransportError>;

    /// Pump inbound traffic once, handing any messages to `handler`
    async fn loop_once(&mut self, handler: &mut dyn MessageHandler) -> Result<(), TransportError>;

    /// Close the session; a no-op when not connected
    async fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Human-readable name for this transport
    fn name(&self) -> &'static str;
}
