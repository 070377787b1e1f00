//! Input forms for the console.
//!
//! A form is a flat list of fields. Parsing into records only checks
//! what the text itself can tell (numbers, lists); range and format rules
//! are applied by the stores and synthesizers.

use crate::error::{Result, UacError};
use crate::model::{InterfaceSpec, NetworkProfile, PeerMode, VlanSpec, VpnPeer};

pub const PEER_MODES: &[&str] = &["L3", "L2"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Toggle(bool),
    Choice {
        options: &'static [&'static str],
        selected: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub key: &'static str,
    pub label: &'static str,
    pub hint: &'static str,
    pub value: FieldValue,
}

impl FormField {
    fn text(key: &'static str, label: &'static str, hint: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            label,
            hint,
            value: FieldValue::Text(value.into()),
        }
    }

    fn toggle(key: &'static str, label: &'static str, value: bool) -> Self {
        Self {
            key,
            label,
            hint: "space to toggle",
            value: FieldValue::Toggle(value),
        }
    }

    fn choice(key: &'static str, label: &'static str, options: &'static [&'static str]) -> Self {
        Self {
            key,
            label,
            hint: "←/→ to change",
            value: FieldValue::Choice {
                options,
                selected: 0,
            },
        }
    }

    /// Value as shown in the form.
    pub fn display(&self) -> String {
        match &self.value {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Toggle(true) => "yes".into(),
            FieldValue::Toggle(false) => "no".into(),
            FieldValue::Choice { options, selected } => {
                options.get(*selected).copied().unwrap_or_default().to_string()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    Profile { editing: bool },
    Peer,
    Vlan,
    Interface,
}

/// A parsed form, ready for the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormSubmission {
    Profile(NetworkProfile),
    Peer(VpnPeer),
    Vlan(VlanSpec),
    Interface(InterfaceSpec),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    pub kind: FormKind,
    pub fields: Vec<FormField>,
    pub focused: usize,
    pub error: Option<String>,
}

impl FormState {
    fn new(kind: FormKind, fields: Vec<FormField>) -> Self {
        Self {
            kind,
            fields,
            focused: 0,
            error: None,
        }
    }

    /// New profile, or edit of `existing`.
    pub fn profile(existing: Option<&NetworkProfile>) -> Self {
        let p = existing.cloned().unwrap_or_else(|| NetworkProfile {
            id: String::new(),
            name: String::new(),
            vlan_id: None,
            ip_cidr: None,
            dhcp_server_enabled: false,
        });
        let mut form = Self::new(
            FormKind::Profile {
                editing: existing.is_some(),
            },
            vec![
                FormField::text("id", "Id", "unique key, e.g. guest", p.id),
                FormField::text("name", "Name", "defaults to the id", p.name),
                FormField::text(
                    "vlan_id",
                    "VLAN id",
                    "1-4094, empty for untagged",
                    p.vlan_id.map(|v| v.to_string()).unwrap_or_default(),
                ),
                FormField::text("ip_cidr", "Address", "e.g. 10.30.0.1/24", p.ip_cidr.unwrap_or_default()),
                FormField::toggle("dhcp", "DHCP server", p.dhcp_server_enabled),
            ],
        );
        if existing.is_some() {
            form.focused = 1;
        }
        form
    }

    pub fn peer() -> Self {
        Self::new(
            FormKind::Peer,
            vec![
                FormField::text("name", "Name", "no spaces", ""),
                FormField::choice("mode", "Mode", PEER_MODES),
                FormField::text("endpoint", "Endpoint", "host:port", ""),
                FormField::text("public_key", "Public key", "", ""),
                FormField::text("allowed_ips", "Allowed IPs", "L3 only, default 0.0.0.0/0", ""),
                FormField::text("target_vlan", "Target VLAN", "L2 only, e.g. eth1.30", ""),
                FormField::toggle("active", "Active", true),
            ],
        )
    }

    pub fn vlan(parent: Option<&str>) -> Self {
        Self::new(
            FormKind::Vlan,
            vec![
                FormField::text("vlan_id", "VLAN id", "1-4094", ""),
                FormField::text("parent", "Parent", "e.g. eth1", parent.unwrap_or_default()),
                FormField::text("ip_cidr", "Address", "e.g. 10.40.0.1/24", ""),
                FormField::toggle("dhcp", "DHCP server", true),
                FormField::text("description", "Description", "optional", ""),
            ],
        )
    }

    pub fn interface(name: Option<&str>) -> Self {
        Self::new(
            FormKind::Interface,
            vec![
                FormField::text("name", "Interface", "e.g. eth0", name.unwrap_or_default()),
                FormField::toggle("dhcp4", "DHCP client", false),
                FormField::text("addresses", "Addresses", "comma separated CIDRs", ""),
                FormField::text("gateway4", "Gateway", "optional", ""),
                FormField::text("nameservers", "DNS", "comma separated", ""),
            ],
        )
    }

    pub fn title(&self) -> &'static str {
        match self.kind {
            FormKind::Profile { editing: false } => "New Profile",
            FormKind::Profile { editing: true } => "Edit Profile",
            FormKind::Peer => "New VPN Peer",
            FormKind::Vlan => "New VLAN",
            FormKind::Interface => "Interface Override",
        }
    }

    pub fn focus_next(&mut self) {
        self.focused = (self.focused + 1) % self.fields.len().max(1);
    }

    pub fn focus_prev(&mut self) {
        let len = self.fields.len().max(1);
        self.focused = (self.focused + len - 1) % len;
    }

    /// Typed character: appended to text, space flips toggles and choices.
    pub fn input(&mut self, c: char) {
        let Some(field) = self.fields.get_mut(self.focused) else {
            return;
        };
        if let FieldValue::Text(s) = &mut field.value {
            s.push(c);
            return;
        }
        if c == ' ' {
            self.cycle(true);
        }
    }

    pub fn backspace(&mut self) {
        if let Some(FormField {
            value: FieldValue::Text(s),
            ..
        }) = self.fields.get_mut(self.focused)
        {
            s.pop();
        }
    }

    /// Flip a toggle or step a choice. No-op on text fields.
    pub fn cycle(&mut self, forward: bool) {
        let Some(field) = self.fields.get_mut(self.focused) else {
            return;
        };
        match &mut field.value {
            FieldValue::Toggle(b) => *b = !*b,
            FieldValue::Choice { options, selected } => {
                let n = options.len().max(1);
                *selected = if forward { (*selected + 1) % n } else { (*selected + n - 1) % n };
            }
            FieldValue::Text(_) => {}
        }
    }

    fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.key == key).map(|f| &f.value)
    }

    fn text(&self, key: &str) -> &str {
        match self.field(key) {
            Some(FieldValue::Text(s)) => s.trim(),
            _ => "",
        }
    }

    fn optional_text(&self, key: &str) -> Option<String> {
        Some(self.text(key).to_string()).filter(|s| !s.is_empty())
    }

    fn toggle(&self, key: &str) -> bool {
        matches!(self.field(key), Some(FieldValue::Toggle(true)))
    }

    fn choice(&self, key: &str) -> &'static str {
        match self.field(key) {
            Some(FieldValue::Choice { options, selected }) => {
                options.get(*selected).copied().unwrap_or_default()
            }
            _ => "",
        }
    }

    fn list(&self, key: &str) -> Option<Vec<String>> {
        let items: Vec<String> = self
            .text(key)
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        Some(items).filter(|v| !v.is_empty())
    }

    fn vlan_id(&self, key: &str) -> Result<Option<u16>> {
        let raw = self.text(key);
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse::<u16>()
            .map(Some)
            .map_err(|_| UacError::invalid("vlan_id", format!("`{}` is not a number", raw)))
    }

    pub fn submit(&self) -> Result<FormSubmission> {
        match self.kind {
            FormKind::Profile { .. } => Ok(FormSubmission::Profile(NetworkProfile {
                id: self.text("id").to_string(),
                name: self.text("name").to_string(),
                vlan_id: self.vlan_id("vlan_id")?,
                ip_cidr: self.optional_text("ip_cidr"),
                dhcp_server_enabled: self.toggle("dhcp"),
            })),
            FormKind::Peer => {
                let mode = match self.choice("mode") {
                    "L2" => PeerMode::Bridged {
                        target_vlan: self.optional_text("target_vlan"),
                    },
                    _ => PeerMode::Routed {
                        allowed_ips: self.optional_text("allowed_ips"),
                    },
                };
                Ok(FormSubmission::Peer(VpnPeer {
                    name: self.text("name").to_string(),
                    mode,
                    endpoint: self.text("endpoint").to_string(),
                    public_key: self.text("public_key").to_string(),
                    is_active: self.toggle("active"),
                }))
            }
            FormKind::Vlan => {
                let vlan_id = self
                    .vlan_id("vlan_id")?
                    .ok_or_else(|| UacError::invalid("vlan_id", "VLAN id is required"))?;
                Ok(FormSubmission::Vlan(VlanSpec {
                    vlan_id,
                    parent_interface: self.text("parent").to_string(),
                    ip_cidr: self.text("ip_cidr").to_string(),
                    dhcp_server_enabled: self.toggle("dhcp"),
                    description: self.optional_text("description"),
                }))
            }
            FormKind::Interface => Ok(FormSubmission::Interface(InterfaceSpec {
                name: self.text("name").to_string(),
                dhcp4: self.toggle("dhcp4"),
                addresses: self.list("addresses"),
                gateway4: self.optional_text("gateway4"),
                nameservers: self.list("nameservers"),
            })),
        }
    }
}
