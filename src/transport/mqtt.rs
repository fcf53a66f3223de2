//! MQTT transport on top of rumqttc
//!
//! Each `connect` builds a fresh client/event-loop pair; every wait for a
//! broker acknowledgement is bounded by `ack_timeout`.

use crate::config::MqttConfig;
use crate::error::TransportError;
use crate::transport::traits::{MessageHandler, Transport};
use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info};

struct Session {
    client: AsyncClient,
    eventloop: EventLoop,
}

/// A message that arrived while waiting for an acknowledgement
struct Inbound {
    topic: String,
    payload: Vec<u8>,
}

pub struct MqttTransport {
    config: MqttConfig,
    session: Option<Session>,
    pending: VecDeque<Inbound>,
}

impl MqttTransport {
    pub fn new(config: MqttConfig) -> Self {
        Self {
            config,
            session: None,
            pending: VecDeque::new(),
        }
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(
            self.config.client_id.clone(),
            self.config.host.clone(),
            self.config.port,
        );
        options.set_keep_alive(Duration::from_secs(self.config.keep_alive_secs));
        options.set_clean_session(true);
        if let Some(username) = &self.config.username {
            options.set_credentials(
                username.clone(),
                self.config.password.clone().unwrap_or_default(),
            );
        }
        options
    }

    fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.config.ack_timeout_secs)
    }

    /// Poll the event loop until `done` accepts an incoming packet
    async fn wait_for<F>(&mut self, what: &'static str, done: F) -> Result<(), TransportError>
    where
        F: FnMut(&Packet) -> Result<bool, TransportError> + Send,
    {
        let ack_timeout = self.ack_timeout();
        let session = self.session.as_mut().ok_or(TransportError::NotConnected)?;

        match timeout(
            ack_timeout,
            poll_until(&mut session.eventloop, &mut self.pending, done),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(what)),
        }
    }
}

async fn poll_until<F>(
    eventloop: &mut EventLoop,
    pending: &mut VecDeque<Inbound>,
    mut done: F,
) -> Result<(), TransportError>
where
    F: FnMut(&Packet) -> Result<bool, TransportError>,
{
    loop {
        match eventloop.poll().await? {
            Event::Incoming(Packet::Publish(publish)) => {
                pending.push_back(Inbound {
                    topic: publish.topic.clone(),
                    payload: publish.payload.to_vec(),
                });
            }
            Event::Incoming(packet) => {
                if done(&packet)? {
                    return Ok(());
                }
            }
            Event::Outgoing(_) => {}
        }
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.session.is_some() {
            return Ok(());
        }

        info!(
            "[MQTT] Connecting to {}:{}...",
            self.config.host, self.config.port
        );
        let (client, eventloop) = AsyncClient::new(self.options(), 10);
        self.session = Some(Session { client, eventloop });

        let result = self
            .wait_for("connack", |packet| match packet {
                Packet::ConnAck(ack) if ack.code == ConnectReturnCode::Success => Ok(true),
                Packet::ConnAck(ack) => Err(TransportError::Refused(format!("{:?}", ack.code))),
                _ => Ok(false),
            })
            .await;

        if result.is_err() {
            self.session = None;
        }
        result
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        let session = self.session.as_ref().ok_or(TransportError::NotConnected)?;
        session.client.subscribe(topic, QoS::AtLeastOnce).await?;
        self.wait_for("suback", |packet| Ok(matches!(packet, Packet::SubAck(_))))
            .await?;
        debug!("[MQTT] Subscribed to {}", topic);
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), TransportError> {
        let session = self.session.as_ref().ok_or(TransportError::NotConnected)?;
        session
            .client
            .publish(topic, QoS::AtLeastOnce, retain, payload.to_vec())
            .await?;
        self.wait_for("puback", |packet| Ok(matches!(packet, Packet::PubAck(_))))
            .await
    }

    async fn loop_once(&mut self, handler: &mut dyn MessageHandler) -> Result<(), TransportError> {
        while let Some(message) = self.pending.pop_front() {
            handler.on_message(&message.topic, &message.payload);
        }

        let window = Duration::from_millis(self.config.loop_window_ms);
        let session = self.session.as_mut().ok_or(TransportError::NotConnected)?;

        let deadline = sleep(window);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => return Ok(()),
                event = session.eventloop.poll() => {
                    if let Event::Incoming(Packet::Publish(publish)) = event? {
                        handler.on_message(&publish.topic, &publish.payload);
                    }
                }
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.pending.clear();
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };

        session.client.disconnect().await?;

        // Drive the event loop until the DISCONNECT has gone out
        let flush = async {
            loop {
                match session.eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        };
        timeout(self.ack_timeout(), flush)
            .await
            .map_err(|_| TransportError::Timeout("disconnect"))
    }

    fn name(&self) -> &'static str {
        "MQTT"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(port: u16) -> MqttConfig {
        MqttConfig {
            host: "127.0.0.1".into(),
            port,
            ack_timeout_secs: 1,
            ..MqttConfig::default()
        }
    }

    #[test]
    fn test_transport_name() {
        assert_eq!(MqttTransport::new(MqttConfig::default()).name(), "MQTT");
    }

    #[tokio::test]
    async fn test_calls_without_session_fail() {
        let mut transport = MqttTransport::new(config(1883));
        assert!(matches!(
            transport.publish("t", b"{}", true).await,
            Err(TransportError::NotConnected)
        ));
        assert!(matches!(
            transport.subscribe("t").await,
            Err(TransportError::NotConnected)
        ));
        // Disconnecting an idle transport is fine
        assert!(transport.disconnect().await.is_ok());
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails() {
        // Grab a free port, then close it so nothing is listening
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let mut transport = MqttTransport::new(config(port));
        assert!(transport.connect().await.is_err());
        assert!(transport.session.is_none());
    }
}
