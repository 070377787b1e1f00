//! Netplan and CoovaChilli artifacts for ports, profiles and one-off
//! interface requests.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::artifacts::{self, ArtifactSet, GenerationReport, Namespace};
use super::{chilli, netplan, InterfacePlan};
use crate::config::Settings;
use crate::error::{Result, UacError};
use crate::model::{InterfaceSpec, NetworkProfile, PhysicalPort, VlanSpec};
use crate::profiles::{validate_cidr, VLAN_ID_RANGE};
use crate::store::write_atomic_with_mode;
use crate::system::{ApplyOutcome, HostReloader};

pub const PROFILE_NETPLAN_PREFIX: &str = "20-uac-profile-";
pub const PROFILE_CHILLI_PREFIX: &str = "uac-profile-";
pub const ONE_OFF_NETPLAN_PREFIX: &str = "10-uac-";

const NETPLAN_MODE: u32 = 0o600;

/// Result of a one-off VLAN or interface request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactOutcome {
    pub status: &'static str,
    pub interface: String,
    pub netplan_file: PathBuf,
    pub dhcp_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    Physical,
    Vlan,
}

/// One row of the interface listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceSummary {
    pub name: String,
    pub kind: InterfaceKind,
    pub status: String,
    pub address: Option<String>,
    pub vlan_id: Option<u16>,
    pub parent: Option<String>,
}

pub struct ConfigSynthesizer {
    netplan_dir: PathBuf,
    chilli_dir: PathBuf,
    reloader: HostReloader,
}

impl ConfigSynthesizer {
    pub fn new(netplan_dir: impl Into<PathBuf>, chilli_dir: impl Into<PathBuf>, reloader: HostReloader) -> Self {
        Self {
            netplan_dir: netplan_dir.into(),
            chilli_dir: chilli_dir.into(),
            reloader,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.netplan_dir(),
            settings.chilli_dir(),
            HostReloader::new(settings.apply_command.clone(), settings.dry_run_apply),
        )
    }

    pub fn netplan_dir(&self) -> &Path {
        &self.netplan_dir
    }

    pub fn chilli_dir(&self) -> &Path {
        &self.chilli_dir
    }

    fn profile_namespaces(&self) -> [Namespace; 2] {
        [
            Namespace::new(&self.netplan_dir, PROFILE_NETPLAN_PREFIX),
            Namespace::new(&self.chilli_dir, PROFILE_CHILLI_PREFIX),
        ]
    }

    /// Lower bound ports to interface plans, one per effective interface,
    /// ordered by interface name.
    pub fn plan(ports: &[PhysicalPort], profiles: &[NetworkProfile]) -> Vec<InterfacePlan> {
        let by_id: HashMap<&str, &NetworkProfile> =
            profiles.iter().map(|p| (p.id.as_str(), p)).collect();

        let mut sorted: Vec<&PhysicalPort> = ports.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));

        let mut plans: BTreeMap<String, (String, InterfacePlan)> = BTreeMap::new();
        for port in sorted {
            let Some(profile_id) = port.assigned_profile_id.as_deref() else {
                continue;
            };
            let Some(profile) = by_id.get(profile_id) else {
                tracing::debug!(port = %port.name, profile = profile_id, "binding to unknown profile ignored");
                continue;
            };

            let plan = profile_plan(&port.name, profile);
            if let Some((previous, _)) = plans.get(&plan.name) {
                tracing::warn!(
                    interface = %plan.name,
                    replaced = %previous,
                    by = %port.name,
                    "two bindings produce the same interface; last one wins"
                );
            }
            plans.insert(plan.name.clone(), (port.name.clone(), plan));
        }

        plans.into_values().map(|(_, plan)| plan).collect()
    }

    /// Desired profile artifacts for `plans`.
    pub fn render(&self, plans: &[InterfacePlan]) -> Result<ArtifactSet> {
        let mut set = ArtifactSet::new();
        for plan in plans {
            set.insert_private(
                self.netplan_dir
                    .join(format!("{}{}.yaml", PROFILE_NETPLAN_PREFIX, plan.name)),
                netplan::render(plan)?,
            );
            if let Some(snippet) = chilli::render(plan) {
                set.insert(
                    self.chilli_dir
                        .join(format!("{}{}.conf", PROFILE_CHILLI_PREFIX, plan.name)),
                    snippet,
                );
            }
        }
        Ok(set)
    }

    /// Rebuild every profile artifact from the current bindings and remove
    /// the ones no binding produces any more.
    pub fn regenerate(&self, ports: &[PhysicalPort], profiles: &[NetworkProfile]) -> Result<GenerationReport> {
        let plans = Self::plan(ports, profiles);
        let desired = self.render(&plans)?;
        let report = artifacts::sync(&self.profile_namespaces(), &desired)?;
        tracing::info!(interfaces = plans.len(), result = %report.summary(), "regenerated network artifacts");
        Ok(report)
    }

    /// Write a standalone VLAN outside the profile namespace.
    pub fn create_vlan(&self, spec: &VlanSpec) -> Result<ArtifactOutcome> {
        if !VLAN_ID_RANGE.contains(&spec.vlan_id) {
            return Err(UacError::invalid(
                "vlan_id",
                format!("{} is outside 1-4094", spec.vlan_id),
            ));
        }
        let parent = spec.parent_interface.trim();
        validate_interface_name("parent_interface", parent)?;
        let cidr = spec.ip_cidr.trim();
        validate_cidr("ip_cidr", cidr)?;

        let mut plan = InterfacePlan::vlan(spec.vlan_id, parent);
        plan.addresses.push(cidr.to_string());
        if spec.dhcp_server_enabled {
            plan.dhcp_network = Some(cidr.to_string());
        }

        let netplan_file = self
            .netplan_dir
            .join(format!("{}vlan{}.yaml", ONE_OFF_NETPLAN_PREFIX, spec.vlan_id));
        write_atomic_with_mode(&netplan_file, netplan::render(&plan)?.as_bytes(), Some(NETPLAN_MODE))?;

        let chilli_file = self.chilli_dir.join(format!("vlan{}.conf", spec.vlan_id));
        let dhcp_file = match chilli::render(&plan) {
            Some(snippet) => {
                write_atomic_with_mode(&chilli_file, snippet.as_bytes(), None)?;
                Some(chilli_file)
            }
            None => {
                remove_if_present(&chilli_file)?;
                None
            }
        };

        tracing::info!(
            interface = %plan.name,
            description = spec.description.as_deref().unwrap_or(""),
            dhcp = spec.dhcp_server_enabled,
            "created VLAN"
        );
        Ok(ArtifactOutcome {
            status: "created",
            interface: plan.name,
            netplan_file,
            dhcp_file,
        })
    }

    /// Write a standalone ethernet override outside the profile namespace.
    pub fn modify_interface(&self, spec: &InterfaceSpec) -> Result<ArtifactOutcome> {
        let name = spec.name.trim();
        validate_interface_name("name", name)?;

        let mut plan = InterfacePlan::ethernet(name);
        plan.dhcp4 = Some(spec.dhcp4);
        if !spec.dhcp4 {
            let addresses = spec.addresses.clone().unwrap_or_default();
            if addresses.is_empty() {
                return Err(UacError::invalid(
                    "addresses",
                    "a static interface needs at least one address",
                ));
            }
            for address in &addresses {
                validate_cidr("addresses", address)?;
            }
            plan.addresses = addresses;

            if let Some(gateway) = spec.gateway4.as_deref().map(str::trim).filter(|g| !g.is_empty()) {
                validate_ip("gateway4", gateway)?;
                plan.gateway4 = Some(gateway.to_string());
            }
            let nameservers = spec.nameservers.clone().unwrap_or_default();
            for ns in &nameservers {
                validate_ip("nameservers", ns)?;
            }
            plan.nameservers = nameservers;
        }

        let netplan_file = self
            .netplan_dir
            .join(format!("{}iface-{}.yaml", ONE_OFF_NETPLAN_PREFIX, name));
        write_atomic_with_mode(&netplan_file, netplan::render(&plan)?.as_bytes(), Some(NETPLAN_MODE))?;

        tracing::info!(interface = name, dhcp4 = spec.dhcp4, "modified interface");
        Ok(ArtifactOutcome {
            status: "modified",
            interface: plan.name,
            netplan_file,
            dhcp_file: None,
        })
    }

    /// Physical ports followed by every VLAN declared in a netplan document.
    pub fn list_interfaces(&self, ports: &[PhysicalPort]) -> Vec<InterfaceSummary> {
        let mut rows: Vec<InterfaceSummary> = ports
            .iter()
            .map(|port| InterfaceSummary {
                name: port.name.clone(),
                kind: InterfaceKind::Physical,
                status: port.operstate.as_str().to_string(),
                address: None,
                vlan_id: None,
                parent: None,
            })
            .collect();
        rows.extend(self.declared_vlans());
        rows
    }

    /// VLANs across all netplan documents. Later files override earlier
    /// ones, as netplan merges them in lexical order.
    fn declared_vlans(&self) -> Vec<InterfaceSummary> {
        let entries = match fs::read_dir(&self.netplan_dir) {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(dir = %self.netplan_dir.display(), error = %e, "cannot read netplan directory");
                }
                return Vec::new();
            }
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| matches!(p.extension().and_then(|e| e.to_str()), Some("yaml" | "yml")))
            .collect();
        files.sort();

        let mut vlans: BTreeMap<String, InterfaceSummary> = BTreeMap::new();
        for path in files {
            let doc = match fs::read_to_string(&path)
                .map_err(|e| UacError::io_at(&path, e))
                .and_then(|text| netplan::parse(&text))
            {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable netplan document");
                    continue;
                }
            };
            for (name, stanza) in doc.network.vlans {
                vlans.insert(
                    name.clone(),
                    InterfaceSummary {
                        name,
                        kind: InterfaceKind::Vlan,
                        status: "configured".into(),
                        address: stanza.addresses.first().cloned(),
                        vlan_id: stanza.id,
                        parent: stanza.link,
                    },
                );
            }
        }
        vlans.into_values().collect()
    }

    /// Hand the written configuration to the host.
    pub async fn apply(&self) -> Result<ApplyOutcome> {
        self.reloader.apply().await
    }
}

fn profile_plan(port: &str, profile: &NetworkProfile) -> InterfacePlan {
    let mut plan = match profile.vlan_id {
        Some(id) => InterfacePlan::vlan(id, port),
        None => InterfacePlan::ethernet(port),
    };
    if let Some(cidr) = &profile.ip_cidr {
        plan.addresses.push(cidr.clone());
    }
    if profile.dhcp_server_enabled {
        match &profile.ip_cidr {
            Some(cidr) => plan.dhcp_network = Some(cidr.clone()),
            None => tracing::warn!(
                profile = %profile.id,
                interface = %plan.name,
                "DHCP enabled without an address; no DHCP snippet generated"
            ),
        }
    }
    plan
}

fn validate_interface_name(field: &'static str, name: &str) -> Result<()> {
    let bad_char = |c: char| c == '/' || c.is_whitespace() || c.is_control();
    if name.is_empty() || name.chars().any(bad_char) || name.starts_with('.') {
        return Err(UacError::invalid(field, format!("`{}` is not an interface name", name)));
    }
    Ok(())
}

fn validate_ip(field: &'static str, value: &str) -> Result<()> {
    value
        .trim()
        .parse::<IpAddr>()
        .map(|_| ())
        .map_err(|_| UacError::invalid(field, format!("{} is not an IP address", value)))
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "removed stale artifact");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(UacError::io_at(path, e)),
    }
}
