//! One-shot MQTT session.
//!
//! A [`Session`] owns a client and its event loop for the duration of a
//! single publish cycle: connect, wait for CONNACK, publish, wait for the
//! delivery acknowledgement that matches the QoS, then disconnect. Nothing
//! is kept between cycles.
//!
//! | QoS | Delivery is confirmed by        |
//! |-----|---------------------------------|
//! | 0   | the PUBLISH leaving the client  |
//! | 1   | PUBACK                          |
//! | 2   | PUBCOMP                         |

use std::time::Duration;

use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, Outgoing, Packet, QoS};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::{
    client::ClientBuilder,
    config::Config,
    error::{root_cause, TransferError},
};

const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

pub struct Session {
    client: AsyncClient,
    event_loop: EventLoop,
    ack_timeout: Duration,
    address: String,
}

impl Session {
    /// Connects to the broker and waits for a successful CONNACK.
    ///
    /// # Errors
    ///
    /// - [`TransferError::ConfigError`] if `config` fails validation
    /// - [`TransferError::Refused`] if the broker rejects the client
    /// - [`TransferError::Timeout`] if no CONNACK arrives within `connection_timeout`
    /// - [`TransferError::ClientConnection`] for network failures
    pub async fn open(config: &Config) -> Result<Self, TransferError> {
        let (client, event_loop) = ClientBuilder::from_config(config)?.build()?;
        let mut session = Self {
            client,
            event_loop,
            ack_timeout: Duration::from_secs(config.ack_timeout),
            address: config.address(),
        };

        let after = Duration::from_secs(config.connection_timeout);
        match timeout(after, session.await_connack()).await {
            Ok(Ok(())) => {
                debug!("Connected to broker {}", session.address);
                Ok(session)
            }
            Ok(Err(e)) => {
                debug!("Connection to {} failed: {}", session.address, root_cause(&e));
                Err(e)
            }
            Err(_) => Err(TransferError::Timeout {
                stage: "CONNACK",
                after,
            }),
        }
    }

    async fn await_connack(&mut self) -> Result<(), TransferError> {
        loop {
            match self.event_loop.poll().await? {
                Event::Incoming(Packet::ConnAck(ack)) => {
                    return if ack.code == ConnectReturnCode::Success {
                        Ok(())
                    } else {
                        Err(TransferError::Refused(ack.code))
                    };
                }
                Event::Incoming(Packet::Disconnect) => return Err(TransferError::Closed("CONNACK")),
                event => trace!("Ignoring event before CONNACK: {:?}", event),
            }
        }
    }

    /// Publishes `payload` on `topic` and waits until delivery is confirmed
    /// for the given QoS.
    ///
    /// # Errors
    ///
    /// - [`TransferError::InvalidTopic`] for an empty topic
    /// - [`TransferError::ClientTransfer`] if the request cannot be queued
    /// - [`TransferError::Timeout`] if the acknowledgement does not arrive within `ack_timeout`
    /// - [`TransferError::Closed`] if the broker disconnects first
    pub async fn publish(
        &mut self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: impl Into<Vec<u8>>,
    ) -> Result<(), TransferError> {
        if topic.is_empty() {
            return Err(TransferError::InvalidTopic("topic cannot be empty".into()));
        }

        self.client.publish(topic, qos, retain, payload).await?;

        let stage = ack_stage(qos);
        match timeout(self.ack_timeout, self.await_delivery(qos)).await {
            Ok(result) => result,
            Err(_) => Err(TransferError::Timeout {
                stage,
                after: self.ack_timeout,
            }),
        }
    }

    async fn await_delivery(&mut self, qos: QoS) -> Result<(), TransferError> {
        loop {
            match self.event_loop.poll().await? {
                Event::Outgoing(Outgoing::Publish(pkid)) if qos == QoS::AtMostOnce => {
                    trace!("Publish {} flushed", pkid);
                    return Ok(());
                }
                Event::Incoming(Packet::PubAck(ack)) if qos == QoS::AtLeastOnce => {
                    trace!("PUBACK for {}", ack.pkid);
                    return Ok(());
                }
                Event::Incoming(Packet::PubComp(comp)) if qos == QoS::ExactlyOnce => {
                    trace!("PUBCOMP for {}", comp.pkid);
                    return Ok(());
                }
                Event::Incoming(Packet::Disconnect) => {
                    warn!("Disconnected by broker {}", self.address);
                    return Err(TransferError::Closed(ack_stage(qos)));
                }
                event => trace!("Event while awaiting delivery: {:?}", event),
            }
        }
    }

    /// Sends DISCONNECT and drives the event loop until it is written.
    ///
    /// Best effort: failures are logged and the session is dropped anyway.
    pub async fn close(mut self) {
        if let Err(e) = self.client.disconnect().await {
            warn!("Error sending disconnect packet: {:?}", e);
            return;
        }

        let drained = timeout(DISCONNECT_GRACE, async {
            loop {
                match self.event_loop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => continue,
                }
            }
        })
        .await;

        if drained.is_err() {
            debug!("Disconnect from {} not confirmed within {:?}", self.address, DISCONNECT_GRACE);
        }
    }
}

fn ack_stage(qos: QoS) -> &'static str {
    match qos {
        QoS::AtMostOnce => "PUBLISH flush",
        QoS::AtLeastOnce => "PUBACK",
        QoS::ExactlyOnce => "PUBCOMP",
    }
}
