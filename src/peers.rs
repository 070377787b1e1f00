//! VPN peer store.

use std::path::PathBuf;

use crate::error::{Result, UacError};
use crate::model::{PeerMode, VpnPeer};
use crate::profiles::{validate_network_list, validate_token};
use crate::store::{JsonFileStore, Repository};

pub struct PeerStore {
    store: JsonFileStore<VpnPeer>,
}

impl PeerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            store: JsonFileStore::new(path),
        }
    }

    pub fn list(&self) -> Result<Vec<VpnPeer>> {
        self.store.list()
    }

    /// Append a peer. The name check and the append happen under one lock;
    /// on conflict the stored list is not rewritten.
    pub fn add(&self, peer: VpnPeer) -> Result<VpnPeer> {
        let peer = validate(peer)?;
        self.store.update(|peers| {
            if peers.iter().any(|p| p.name == peer.name) {
                return Err(UacError::conflict("peer", peer.name.clone()));
            }
            tracing::info!(peer = %peer.name, mode = peer.mode.label(), "adding VPN peer");
            peers.push(peer.clone());
            Ok(peer)
        })
    }

    /// Remove every peer named `name`.
    pub fn delete(&self, name: &str) -> Result<()> {
        if !self.store.delete(name)? {
            return Err(UacError::not_found("peer", name));
        }
        tracing::info!(peer = name, "deleted VPN peer");
        Ok(())
    }
}

/// Names end up as tokens in the bridge script, so no whitespace.
pub fn validate(mut peer: VpnPeer) -> Result<VpnPeer> {
    peer.name = peer.name.trim().to_string();
    if peer.name.is_empty() || peer.name.chars().any(char::is_whitespace) {
        return Err(UacError::invalid(
            "name",
            "peer name must be non-empty without whitespace",
        ));
    }

    peer.endpoint = peer.endpoint.trim().to_string();
    validate_token("endpoint", &peer.endpoint)?;
    let port_ok = peer
        .endpoint
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok_and(|p| p > 0));
    if !port_ok {
        return Err(UacError::invalid(
            "endpoint",
            format!("{} is not host:port", peer.endpoint),
        ));
    }

    peer.public_key = peer.public_key.trim().to_string();
    if peer.public_key.is_empty() {
        return Err(UacError::invalid("public_key", "public key must not be empty"));
    }
    validate_token("public_key", &peer.public_key)?;

    let blank_to_none = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    peer.mode = match peer.mode {
        PeerMode::Routed { allowed_ips } => {
            let allowed_ips = blank_to_none(allowed_ips);
            if let Some(list) = &allowed_ips {
                validate_network_list("allowed_ips", list)?;
            }
            PeerMode::Routed { allowed_ips }
        }
        PeerMode::Bridged { target_vlan } => {
            let target_vlan = blank_to_none(target_vlan);
            if let Some(target) = &target_vlan {
                validate_token("target_vlan", target)?;
            }
            PeerMode::Bridged { target_vlan }
        }
    };

    Ok(peer)
}
