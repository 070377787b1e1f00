//! Netplan v2 documents.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;

use super::{InterfacePlan, LinkKind};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetplanDocument {
    pub network: NetworkSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSection {
    #[serde(default = "default_version")]
    pub version: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renderer: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ethernets: BTreeMap<String, Stanza>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vlans: BTreeMap<String, Stanza>,
}

fn default_version() -> u8 {
    2
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stanza {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_bool"
    )]
    pub dhcp4: Option<bool>,
    #[serde(default, deserialize_with = "address_list")]
    pub addresses: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Route>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nameservers: Option<Nameservers>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    #[serde(default)]
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nameservers {
    #[serde(default)]
    pub addresses: Vec<String>,
}

impl NetplanDocument {
    pub fn for_plan(plan: &InterfacePlan) -> Self {
        let mut stanza = Stanza {
            dhcp4: plan.dhcp4,
            addresses: plan.addresses.clone(),
            ..Stanza::default()
        };
        if let Some(gateway) = &plan.gateway4 {
            stanza.routes.push(Route {
                to: "default".into(),
                via: Some(gateway.clone()),
            });
        }
        if !plan.nameservers.is_empty() {
            stanza.nameservers = Some(Nameservers {
                addresses: plan.nameservers.clone(),
            });
        }

        let mut network = NetworkSection {
            version: default_version(),
            renderer: None,
            ethernets: BTreeMap::new(),
            vlans: BTreeMap::new(),
        };
        match &plan.kind {
            LinkKind::Ethernet => {
                network.ethernets.insert(plan.name.clone(), stanza);
            }
            LinkKind::Vlan { id, link } => {
                stanza.id = Some(*id);
                stanza.link = Some(link.clone());
                network.vlans.insert(plan.name.clone(), stanza);
            }
        }
        Self { network }
    }
}

/// Netplan also writes booleans as `yes`/`no`/`on`/`off`.
fn lenient_bool<'de, D: Deserializer<'de>>(de: D) -> std::result::Result<Option<bool>, D::Error> {
    Ok(match Option::<Value>::deserialize(de)? {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::String(s)) => match s.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" => Some(true),
            "false" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

/// Entries are plain `addr/prefix` strings or single-key maps carrying
/// per-address options (`- 10.0.0.1/24: {label: x}`); keep the address.
fn address_list<'de, D: Deserializer<'de>>(de: D) -> std::result::Result<Vec<String>, D::Error> {
    let items = Option::<Vec<Value>>::deserialize(de)?.unwrap_or_default();
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s),
            Value::Mapping(map) => map
                .into_iter()
                .next()
                .and_then(|(key, _)| key.as_str().map(String::from)),
            _ => None,
        })
        .collect())
}

pub fn render(plan: &InterfacePlan) -> Result<String> {
    Ok(serde_yaml::to_string(&NetplanDocument::for_plan(plan))?)
}

pub fn parse(text: &str) -> Result<NetplanDocument> {
    Ok(serde_yaml::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vlan_document_shape() {
        let mut plan = InterfacePlan::vlan(30, "eth1");
        plan.addresses.push("10.30.0.1/24".into());

        let text = render(&plan).unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();
        let vlan = &value["network"]["vlans"]["eth1.30"];
        assert_eq!(value["network"]["version"], 2);
        assert_eq!(vlan["id"], 30);
        assert_eq!(vlan["link"], "eth1");
        assert_eq!(vlan["addresses"][0], "10.30.0.1/24");
        assert!(value["network"].get("ethernets").is_none());
    }

    #[test]
    fn test_ethernet_without_address_keeps_empty_list() {
        let plan = InterfacePlan::ethernet("eth2");
        let text = render(&plan).unwrap();
        let doc = parse(&text).unwrap();
        let stanza = &doc.network.ethernets["eth2"];
        assert!(stanza.addresses.is_empty());
        assert!(text.contains("addresses: []"));
        assert!(stanza.id.is_none());
    }

    #[test]
    fn test_static_override_routes_and_nameservers() {
        let mut plan = InterfacePlan::ethernet("eth0");
        plan.dhcp4 = Some(false);
        plan.addresses.push("192.168.1.10/24".into());
        plan.gateway4 = Some("192.168.1.1".into());
        plan.nameservers = vec!["1.1.1.1".into(), "9.9.9.9".into()];

        let doc = parse(&render(&plan).unwrap()).unwrap();
        let stanza = &doc.network.ethernets["eth0"];
        assert_eq!(stanza.dhcp4, Some(false));
        assert_eq!(
            stanza.routes,
            vec![Route {
                to: "default".into(),
                via: Some("192.168.1.1".into())
            }]
        );
        assert_eq!(stanza.nameservers.as_ref().unwrap().addresses.len(), 2);
    }

    #[test]
    fn test_parse_foreign_document() {
        let text = "network:\n  version: 2\n  renderer: networkd\n  ethernets:\n    eth0:\n      dhcp4: true\n";
        let doc = parse(text).unwrap();
        assert_eq!(doc.network.renderer.as_deref(), Some("networkd"));
        assert_eq!(doc.network.ethernets["eth0"].dhcp4, Some(true));
        assert!(doc.network.vlans.is_empty());
    }

    #[test]
    fn test_parse_tolerates_netplan_variants() {
        let text = r#"
network:
  version: 2
  ethernets:
    eth0:
      dhcp4: yes
      addresses:
        - 192.168.1.10/24:
            label: "eth0:mgmt"
        - 192.168.1.11/24
      routes:
        - to: 10.0.0.0/8
          scope: link
  vlans:
    eth0.50:
      id: 50
      link: eth0
      dhcp4: no
      addresses: [10.50.0.1/24]
"#;
        let doc = parse(text).unwrap();
        let eth0 = &doc.network.ethernets["eth0"];
        assert_eq!(eth0.dhcp4, Some(true));
        assert_eq!(eth0.addresses, vec!["192.168.1.10/24", "192.168.1.11/24"]);
        assert_eq!(eth0.routes[0].via, None);
        let vlan = &doc.network.vlans["eth0.50"];
        assert_eq!(vlan.dhcp4, Some(false));
        assert_eq!(vlan.id, Some(50));
    }
}
