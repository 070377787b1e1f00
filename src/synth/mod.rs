//! Artifact synthesis.
//!
//! Profiles and one-off requests are first lowered to [`InterfacePlan`]s,
//! then each plan is serialized by the netplan and CoovaChilli writers.
//! Nothing in here talks to the host beyond the artifact directories.

pub mod artifacts;
pub mod chilli;
pub mod netplan;
pub mod network;
pub mod vpn;

pub use artifacts::GenerationReport;
pub use network::{ArtifactOutcome, ConfigSynthesizer, InterfaceKind, InterfaceSummary};
pub use vpn::{VpnReport, VpnSynthesizer, DEFAULT_ALLOWED_IPS};

/// Ethernet or VLAN sub-interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkKind {
    Ethernet,
    Vlan { id: u16, link: String },
}

/// Everything both serializers need to know about one interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfacePlan {
    pub name: String,
    pub kind: LinkKind,
    pub addresses: Vec<String>,
    /// Emitted as `dhcp4:` only when set.
    pub dhcp4: Option<bool>,
    pub gateway4: Option<String>,
    pub nameservers: Vec<String>,
    /// Network CIDR handed to the DHCP server, when this interface serves one.
    pub dhcp_network: Option<String>,
}

impl InterfacePlan {
    pub fn ethernet(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: LinkKind::Ethernet,
            addresses: Vec::new(),
            dhcp4: None,
            gateway4: None,
            nameservers: Vec::new(),
            dhcp_network: None,
        }
    }

    pub fn vlan(id: u16, link: impl Into<String>) -> Self {
        let link = link.into();
        Self {
            name: format!("{}.{}", link, id),
            kind: LinkKind::Vlan { id, link },
            ..Self::ethernet(String::new())
        }
    }
}
