pub mod mqtt;
pub mod traits;

pub use mqtt::MqttTransport;
pub use traits::{MessageHandler, Transport};

/// Scriptable in-memory transport for tests
#[cfg(test)]
pub mod fake {
    use super::*;
    use crate::error::TransportError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Debug, Default)]
    pub struct FakeBroker {
        /// Remaining connect attempts that fail
        pub connect_failures: u32,
        /// Fail every publish while set
        pub publish_fails: bool,
        /// Fail publishes to these topics only
        pub failing_topics: Vec<String>,
        /// Make publish hang far past any timeout
        pub publish_hangs: bool,
        /// Messages delivered on the next `loop_once`
        pub inbound: VecDeque<(String, Vec<u8>)>,
        pub published: Vec<(String, Vec<u8>, bool)>,
        pub subscriptions: Vec<String>,
        pub calls: Vec<&'static str>,
        pub connected: bool,
    }

    impl FakeBroker {
        pub fn published_to(&self, topic: &str) -> usize {
            self.published.iter().filter(|(t, _, _)| t == topic).count()
        }
    }

    #[derive(Clone, Default)]
    pub struct FakeTransport {
        pub broker: Arc<Mutex<FakeBroker>>,
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn broker(&self) -> std::sync::MutexGuard<'_, FakeBroker> {
            self.broker.lock().unwrap()
        }
    }

    fn refused() -> TransportError {
        TransportError::Refused("fake broker down".into())
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn connect(&mut self) -> Result<(), TransportError> {
            let mut broker = self.broker();
            broker.calls.push("connect");
            if broker.connect_failures > 0 {
                broker.connect_failures -= 1;
                return Err(refused());
            }
            broker.connected = true;
            Ok(())
        }

        async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
            let mut broker = self.broker();
            broker.calls.push("subscribe");
            if !broker.connected {
                return Err(TransportError::NotConnected);
            }
            broker.subscriptions.push(topic.to_string());
            Ok(())
        }

        async fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), TransportError> {
            let hangs = {
                let mut broker = self.broker();
                broker.calls.push("publish");
                if !broker.connected {
                    return Err(TransportError::NotConnected);
                }
                if broker.publish_fails || broker.failing_topics.iter().any(|t| t == topic) {
                    return Err(refused());
                }
                broker.publish_hangs
            };
            if hangs {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            self.broker()
                .published
                .push((topic.to_string(), payload.to_vec(), retain));
            Ok(())
        }

        async fn loop_once(&mut self, handler: &mut dyn MessageHandler) -> Result<(), TransportError> {
            let messages: Vec<_> = {
                let mut broker = self.broker();
                broker.calls.push("loop");
                broker.inbound.drain(..).collect()
            };
            for (topic, payload) in messages {
                handler.on_message(&topic, &payload);
            }
            Ok(())
        }

        async fn disconnect(&mut self) -> Result<(), TransportError> {
            let mut broker = self.broker();
            broker.calls.push("disconnect");
            broker.connected = false;
            Ok(())
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }
}
