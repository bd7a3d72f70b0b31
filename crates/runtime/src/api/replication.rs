//! Outbound replication transport.
//!
//! The worker encodes every outbound [`ReplicationMessage`] with bincode and
//! hands the bytes to a [`ReplicationSink`]. The sink decides how they reach
//! the remote peer: a socket, an in-process channel, or nowhere at all.
use async_trait::async_trait;
use tokio::sync::mpsc;

use action_core::{ActorId, ReplicationMessage};

use super::errors::{Result, RuntimeError};

/// Encoded replication message addressed by the actor that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationPacket {
    pub actor: ActorId,
    pub bytes: Vec<u8>,
}

impl ReplicationPacket {
    pub fn encode(actor: ActorId, message: &ReplicationMessage) -> Result<Self> {
        Ok(Self {
            actor,
            bytes: message.encode()?,
        })
    }

    pub fn decode(&self) -> Result<ReplicationMessage> {
        Ok(ReplicationMessage::decode(&self.bytes)?)
    }
}

/// Destination of outbound replication traffic.
#[async_trait]
pub trait ReplicationSink: Send + Sync {
    async fn send(&self, packet: ReplicationPacket) -> Result<()>;
}

/// Drops every packet. Used when the runtime has no remote peer.
pub struct NullReplicationSink;

#[async_trait]
impl ReplicationSink for NullReplicationSink {
    async fn send(&self, _packet: ReplicationPacket) -> Result<()> {
        Ok(())
    }
}

/// Forwards packets into an in-process channel, e.g. to pump them into a
/// second runtime playing the other peer.
pub struct ChannelReplicationSink {
    tx: mpsc::UnboundedSender<ReplicationPacket>,
}

impl ChannelReplicationSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ReplicationPacket>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ReplicationSink for ChannelReplicationSink {
    async fn send(&self, packet: ReplicationPacket) -> Result<()> {
        self.tx
            .send(packet)
            .map_err(|_| RuntimeError::Sink("replication channel closed".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_core::{ActionSpecHandle, ContextPayload, PredictionKey};

    #[tokio::test]
    async fn channel_sink_delivers_decodable_packets() {
        let (sink, mut rx) = ChannelReplicationSink::new();
        let message = ReplicationMessage::ExecuteRequest {
            spec: ActionSpecHandle::new(1),
            prediction: PredictionKey::new(1),
            payload: ContextPayload::new(),
        };
        sink.send(ReplicationPacket::encode(ActorId::new(5), &message).unwrap())
            .await
            .unwrap();

        let packet = rx.recv().await.unwrap();
        assert_eq!(packet.actor, ActorId::new(5));
        assert_eq!(packet.decode().unwrap(), message);
    }

    #[tokio::test]
    async fn closed_channel_is_a_sink_error() {
        let (sink, rx) = ChannelReplicationSink::new();
        drop(rx);
        let message = ReplicationMessage::PredictionResult {
            spec: ActionSpecHandle::new(1),
            key: PredictionKey::new(1),
            accepted: true,
        };
        let packet = ReplicationPacket::encode(ActorId::new(5), &message).unwrap();
        assert!(matches!(sink.send(packet).await, Err(RuntimeError::Sink(_))));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let packet = ReplicationPacket {
            actor: ActorId::new(1),
            bytes: vec![0xff; 3],
        };
        assert!(matches!(packet.decode(), Err(RuntimeError::Codec(_))));
    }
}
