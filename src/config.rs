//! Controller settings.
//!
//! Loaded from `$UACNET_CONFIG` or `~/.config/uacnet/config.json`, then
//! overridden by the host-path environment variables used when the controller
//! runs in a container with the host filesystem mounted. A missing or broken
//! file falls back to defaults.

use std::env;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Runtime settings. Every field has a serde default so partial files load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Root of the host filesystem (netplan and chilli dirs live under it).
    #[serde(default = "default_root")]
    pub host_fs_root: PathBuf,

    /// Root under which `sys/class/net` is enumerated.
    #[serde(default = "default_root")]
    pub sysfs_root: PathBuf,

    /// Persisted stores and the bridge control script.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Where the routed tunnel config is written.
    #[serde(default = "default_wireguard_dir")]
    pub wireguard_dir: PathBuf,

    /// Host reload command, program first.
    #[serde(default = "default_apply_command")]
    pub apply_command: Vec<String>,

    /// Report a successful apply without running the reload command.
    #[serde(default)]
    pub dry_run_apply: bool,

    #[serde(default)]
    pub wireguard: WireguardSettings,
}

/// Local identity of the routed tunnel interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireguardSettings {
    #[serde(default = "default_private_key")]
    pub private_key: String,

    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u32,
}

fn default_root() -> PathBuf {
    PathBuf::from("/")
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("/opt/uac-controller")
}

fn default_wireguard_dir() -> PathBuf {
    PathBuf::from("/etc/wireguard")
}

fn default_apply_command() -> Vec<String> {
    vec!["netplan".into(), "apply".into()]
}

fn default_private_key() -> String {
    "<LOCAL_PRIVATE_KEY>".into()
}

fn default_listen_port() -> u16 {
    51820
}

fn default_keepalive() -> u32 {
    25
}

impl Default for WireguardSettings {
    fn default() -> Self {
        Self {
            private_key: default_private_key(),
            listen_port: default_listen_port(),
            keepalive_secs: default_keepalive(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host_fs_root: default_root(),
            sysfs_root: default_root(),
            state_dir: default_state_dir(),
            wireguard_dir: default_wireguard_dir(),
            apply_command: default_apply_command(),
            dry_run_apply: false,
            wireguard: WireguardSettings::default(),
        }
    }
}

impl Settings {
    /// Settings rooted entirely under `root`, with apply in dry-run mode.
    #[cfg(test)]
    pub fn rooted_at(root: &std::path::Path) -> Self {
        Self {
            host_fs_root: root.to_path_buf(),
            sysfs_root: root.to_path_buf(),
            state_dir: root.join("opt/uac-controller"),
            wireguard_dir: root.join("etc/wireguard"),
            dry_run_apply: true,
            ..Self::default()
        }
    }

    /// Config file path: `$UACNET_CONFIG`, else `~/.config/uacnet/config.json`.
    pub fn path() -> Option<PathBuf> {
        if let Some(explicit) = env::var_os("UACNET_CONFIG") {
            return Some(PathBuf::from(explicit));
        }
        dirs::config_dir().map(|d| d.join("uacnet").join("config.json"))
    }

    /// Load settings, falling back to defaults, then apply env overrides.
    pub fn load() -> Self {
        let mut settings = Self::path().map(Self::read).unwrap_or_default();
        settings.apply_env_overrides(|key| env::var_os(key).map(PathBuf::from));
        settings
    }

    /// Settings from `path`; defaults when the file is missing or malformed.
    fn read(path: PathBuf) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|contents| serde_json::from_str::<Settings>(&contents).ok())
            .unwrap_or_default()
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<PathBuf>) {
        if let Some(root) = lookup("HOST_FS_ROOT") {
            self.host_fs_root = root;
        }
        if let Some(dir) = lookup("HOST_WG_DIR") {
            self.wireguard_dir = dir;
        }
        if let Some(dir) = lookup("UAC_STATE_DIR") {
            self.state_dir = dir;
        }
        if let Some(root) = lookup("UAC_SYSFS_ROOT") {
            self.sysfs_root = root;
        }
    }

    pub fn netplan_dir(&self) -> PathBuf {
        self.host_fs_root.join("etc/netplan")
    }

    pub fn chilli_dir(&self) -> PathBuf {
        self.host_fs_root.join("etc/chilli/config.d")
    }

    pub fn ports_store(&self) -> PathBuf {
        self.state_dir.join("ports.json")
    }

    pub fn profiles_store(&self) -> PathBuf {
        self.state_dir.join("network_profiles.json")
    }

    pub fn peers_store(&self) -> PathBuf {
        self.state_dir.join("vpn_peers.json")
    }

    pub fn routed_artifact(&self) -> PathBuf {
        self.wireguard_dir.join("wg0.conf")
    }

    pub fn bridge_artifact(&self) -> PathBuf {
        self.state_dir.join("softether_bridge.cmd")
    }

    pub fn log_file(&self) -> PathBuf {
        self.state_dir.join("uacnet.log")
    }
}
