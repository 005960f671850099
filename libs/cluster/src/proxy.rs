//! Typed peer proxies
//!
//! `GateProxy` wraps the pooled client a node holds toward one gate;
//! `NodeProxy` the client a gate holds toward one node. Each operation
//! encodes its packet into a chain, routes it through the pool (pinning
//! the partition to the entity whose order matters), and maps the reply
//! code back to a typed error.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use codec::packet::{
    self, BindReq, DeliverReq, DisconnectReq, GetIpReq, GetStateRes, IsOnlineReq, MulticastReq,
    PublishReq, PushReq, StatReq, SubscribeReq, TriggerReq,
};
use codec::{EventKind, Route, ServiceState, SessionKind};
use network::{Client, Partition};

use crate::error::{ClusterError, Result};
use crate::seq::SeqCounter;

/// Node-side proxy for one gate instance.
pub struct GateProxy {
    client: Arc<Client>,
    seqs: Arc<SeqCounter>,
    call_timeout: Duration,
}

impl GateProxy {
    pub fn new(client: Arc<Client>, seqs: Arc<SeqCounter>, call_timeout: Duration) -> Self {
        Self {
            client,
            seqs,
            call_timeout,
        }
    }

    /// Associates a gate connection with a user.
    pub async fn bind(&self, cid: u64, uid: u64) -> Result<()> {
        let seq = self.seqs.next();
        let chain = packet::encode_bind_req(self.client.arena(), seq, &BindReq { cid, uid });
        let reply = self
            .client
            .call(seq, chain, self.call_timeout, Partition::Key(cid))
            .await?;
        let (_, code) = packet::decode_bind_res(&reply)?;
        ClusterError::check(Route::Bind, code)
    }

    pub async fn unbind(&self, cid: u64, uid: u64) -> Result<()> {
        let seq = self.seqs.next();
        let chain = packet::encode_unbind_req(self.client.arena(), seq, &BindReq { cid, uid });
        let reply = self
            .client
            .call(seq, chain, self.call_timeout, Partition::Key(cid))
            .await?;
        let (_, code) = packet::decode_unbind_res(&reply)?;
        ClusterError::check(Route::Unbind, code)
    }

    pub async fn get_ip(&self, kind: SessionKind, target: u64) -> Result<String> {
        let seq = self.seqs.next();
        let chain =
            packet::encode_get_ip_req(self.client.arena(), seq, &GetIpReq { kind, target });
        let reply = self
            .client
            .call(seq, chain, self.call_timeout, Partition::Any)
            .await?;
        let (_, res) = packet::decode_get_ip_res(&reply)?;
        ClusterError::check(Route::GetIp, res.code)?;
        Ok(res.ip)
    }

    pub async fn stat(&self, kind: SessionKind) -> Result<u64> {
        let seq = self.seqs.next();
        let chain = packet::encode_stat_req(self.client.arena(), seq, &StatReq { kind });
        let reply = self
            .client
            .call(seq, chain, self.call_timeout, Partition::Any)
            .await?;
        let (_, res) = packet::decode_stat_res(&reply)?;
        ClusterError::check(Route::Stat, res.code)?;
        Ok(res.total)
    }

    pub async fn is_online(&self, kind: SessionKind, target: u64) -> Result<bool> {
        let seq = self.seqs.next();
        let chain =
            packet::encode_is_online_req(self.client.arena(), seq, &IsOnlineReq { kind, target });
        let reply = self
            .client
            .call(seq, chain, self.call_timeout, Partition::Any)
            .await?;
        let (_, res) = packet::decode_is_online_res(&reply)?;
        ClusterError::check(Route::IsOnline, res.code)?;
        Ok(res.online)
    }

    pub async fn disconnect(&self, kind: SessionKind, target: u64, force: bool) -> Result<()> {
        let seq = self.seqs.next();
        let chain = packet::encode_disconnect_req(
            self.client.arena(),
            seq,
            &DisconnectReq { kind, target, force },
        );
        let reply = self
            .client
            .call(seq, chain, self.call_timeout, Partition::Key(target))
            .await?;
        let (_, code) = packet::decode_disconnect_res(&reply)?;
        ClusterError::check(Route::Disconnect, code)
    }

    /// Pushes `message` to one session. Pinned to the target so pushes
    /// to the same session keep their order.
    pub async fn push(&self, kind: SessionKind, target: u64, message: Bytes) -> Result<()> {
        let seq = self.seqs.next();
        let chain = packet::encode_push_req(
            self.client.arena(),
            seq,
            &PushReq {
                kind,
                target,
                message,
            },
        );
        let reply = self
            .client
            .call(seq, chain, self.call_timeout, Partition::Key(target))
            .await?;
        let (_, code) = packet::decode_push_res(&reply)?;
        ClusterError::check(Route::Push, code)
    }

    pub async fn multicast(
        &self,
        kind: SessionKind,
        targets: Vec<u64>,
        message: Bytes,
    ) -> Result<u64> {
        let seq = self.seqs.next();
        let chain = packet::encode_multicast_req(
            self.client.arena(),
            seq,
            &MulticastReq {
                kind,
                targets,
                message,
            },
        )?;
        let reply = self
            .client
            .call(seq, chain, self.call_timeout, Partition::Any)
            .await?;
        let (_, res) = packet::decode_multicast_res(&reply)?;
        ClusterError::check(Route::Multicast, res.code)?;
        Ok(res.total)
    }

    pub async fn broadcast(&self, kind: SessionKind, message: Bytes) -> Result<u64> {
        let seq = self.seqs.next();
        let chain = packet::encode_broadcast_req(
            self.client.arena(),
            seq,
            &packet::BroadcastReq { kind, message },
        );
        let reply = self
            .client
            .call(seq, chain, self.call_timeout, Partition::Any)
            .await?;
        let (_, res) = packet::decode_broadcast_res(&reply)?;
        ClusterError::check(Route::Broadcast, res.code)?;
        Ok(res.total)
    }

    pub async fn publish(&self, channel: String, message: Bytes) -> Result<u64> {
        let seq = self.seqs.next();
        let chain = packet::encode_publish_req(
            self.client.arena(),
            seq,
            &PublishReq { channel, message },
        )?;
        let reply = self
            .client
            .call(seq, chain, self.call_timeout, Partition::Any)
            .await?;
        let (_, res) = packet::decode_publish_res(&reply)?;
        ClusterError::check(Route::Publish, res.code)?;
        Ok(res.total)
    }

    pub async fn subscribe(
        &self,
        kind: SessionKind,
        targets: Vec<u64>,
        channel: String,
    ) -> Result<()> {
        let seq = self.seqs.next();
        let chain = packet::encode_subscribe_req(
            self.client.arena(),
            seq,
            &SubscribeReq {
                kind,
                targets,
                channel,
            },
        )?;
        let reply = self
            .client
            .call(seq, chain, self.call_timeout, Partition::Any)
            .await?;
        let (_, code) = packet::decode_subscribe_res(&reply)?;
        ClusterError::check(Route::Subscribe, code)
    }

    pub async fn unsubscribe(
        &self,
        kind: SessionKind,
        targets: Vec<u64>,
        channel: String,
    ) -> Result<()> {
        let seq = self.seqs.next();
        let chain = packet::encode_unsubscribe_req(
            self.client.arena(),
            seq,
            &SubscribeReq {
                kind,
                targets,
                channel,
            },
        )?;
        let reply = self
            .client
            .call(seq, chain, self.call_timeout, Partition::Any)
            .await?;
        let (_, code) = packet::decode_unsubscribe_res(&reply)?;
        ClusterError::check(Route::Unsubscribe, code)
    }

    pub async fn get_state(&self) -> Result<ServiceState> {
        get_state(&self.client, &self.seqs, self.call_timeout).await
    }

    pub async fn set_state(&self, state: ServiceState) -> Result<()> {
        set_state(&self.client, &self.seqs, self.call_timeout, state).await
    }
}

/// Gate-side proxy for one node instance.
pub struct NodeProxy {
    client: Arc<Client>,
    seqs: Arc<SeqCounter>,
    call_timeout: Duration,
}

impl NodeProxy {
    pub fn new(client: Arc<Client>, seqs: Arc<SeqCounter>, call_timeout: Duration) -> Self {
        Self {
            client,
            seqs,
            call_timeout,
        }
    }

    /// Reports a connection lifecycle event. Pinned to the connection so
    /// connect/disconnect ordering survives.
    pub async fn trigger(&self, event: EventKind, cid: u64, uid: u64) -> Result<()> {
        let seq = self.seqs.next();
        let chain =
            packet::encode_trigger_req(self.client.arena(), seq, &TriggerReq { event, cid, uid });
        let reply = self
            .client
            .call(seq, chain, self.call_timeout, Partition::Key(cid))
            .await?;
        let (_, code) = packet::decode_trigger_res(&reply)?;
        ClusterError::check(Route::Trigger, code)
    }

    /// Forwards a client request to the node. Pinned to the connection
    /// so one session's requests stay ordered.
    pub async fn deliver(&self, cid: u64, uid: u64, message: Bytes) -> Result<()> {
        let seq = self.seqs.next();
        let chain =
            packet::encode_deliver_req(self.client.arena(), seq, &DeliverReq { cid, uid, message });
        let reply = self
            .client
            .call(seq, chain, self.call_timeout, Partition::Key(cid))
            .await?;
        let (_, code) = packet::decode_deliver_res(&reply)?;
        ClusterError::check(Route::Deliver, code)
    }

    /// Fire-and-forget variant of [`NodeProxy::deliver`].
    pub async fn deliver_noreply(&self, cid: u64, uid: u64, message: Bytes) -> Result<()> {
        let chain =
            packet::encode_deliver_req(self.client.arena(), 0, &DeliverReq { cid, uid, message });
        self.client.send(chain, Partition::Key(cid)).await?;
        Ok(())
    }

    pub async fn get_state(&self) -> Result<ServiceState> {
        get_state(&self.client, &self.seqs, self.call_timeout).await
    }

    pub async fn set_state(&self, state: ServiceState) -> Result<()> {
        set_state(&self.client, &self.seqs, self.call_timeout, state).await
    }
}

async fn get_state(
    client: &Client,
    seqs: &SeqCounter,
    call_timeout: Duration,
) -> Result<ServiceState> {
    let seq = seqs.next();
    let chain = packet::encode_get_state_req(client.arena(), seq);
    let reply = client.call(seq, chain, call_timeout, Partition::Any).await?;
    let (_, GetStateRes { code, state }) = packet::decode_get_state_res(&reply)?;
    ClusterError::check(Route::GetState, code)?;
    Ok(state)
}

async fn set_state(
    client: &Client,
    seqs: &SeqCounter,
    call_timeout: Duration,
    state: ServiceState,
) -> Result<()> {
    let seq = seqs.next();
    let chain = packet::encode_set_state_req(client.arena(), seq, state);
    let reply = client.call(seq, chain, call_timeout, Partition::Any).await?;
    let (_, code) = packet::decode_set_state_res(&reply)?;
    ClusterError::check(Route::SetState, code)
}
