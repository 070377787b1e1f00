//! Application state and message handling (Elm architecture) with async support.
//!
//! Controller calls run on tokio's blocking pool; results come back over an
//! mpsc channel and are applied in `poll_async_results`. One operation is in
//! flight at a time.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::KeyCode;
use tokio::sync::mpsc;

use crate::controller::{Controller, PortAssignment};
use crate::error::{Result, UacError};
use crate::form::{FormState, FormSubmission};
use crate::model::{NetworkProfile, PhysicalPort, VpnPeer};
use crate::synth::{ArtifactOutcome, GenerationReport, InterfaceKind, InterfaceSummary, VpnReport};
use crate::system::ApplyOutcome;
use crate::ui::activity::{ActivityLog, Level};

/// Maximum number of log entries kept in memory.
const MAX_LOG_ENTRIES: usize = 500;

const TIMEOUT_REFRESH: Duration = Duration::from_secs(10);
const TIMEOUT_MUTATION: Duration = Duration::from_secs(15);
const TIMEOUT_APPLY: Duration = Duration::from_secs(60);

/// Everything the views display, loaded in one go.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub ports: Vec<PhysicalPort>,
    pub profiles: Vec<NetworkProfile>,
    pub peers: Vec<VpnPeer>,
    pub interfaces: Vec<InterfaceSummary>,
}

/// Result of an async operation.
pub enum AsyncOpResult {
    Refreshed(Result<Snapshot>),
    PortAssigned {
        port: String,
        result: Result<PortAssignment>,
    },
    ProfileSaved(Result<(NetworkProfile, GenerationReport)>),
    ProfileDeleted {
        id: String,
        result: Result<GenerationReport>,
    },
    PeerAdded(Result<(VpnPeer, VpnReport)>),
    PeerDeleted {
        name: String,
        result: Result<VpnReport>,
    },
    VlanCreated(Result<ArtifactOutcome>),
    InterfaceModified(Result<ArtifactOutcome>),
    Regenerated(Result<(GenerationReport, VpnReport)>),
    Applied(Result<ApplyOutcome>),
}

impl AsyncOpResult {
    fn op(&self) -> PendingOp {
        match self {
            Self::Refreshed(_) => PendingOp::Refreshing,
            Self::PortAssigned { .. } => PendingOp::AssigningPort,
            Self::ProfileSaved(_) => PendingOp::SavingProfile,
            Self::ProfileDeleted { .. } => PendingOp::DeletingProfile,
            Self::PeerAdded(_) => PendingOp::AddingPeer,
            Self::PeerDeleted { .. } => PendingOp::DeletingPeer,
            Self::VlanCreated(_) => PendingOp::CreatingVlan,
            Self::InterfaceModified(_) => PendingOp::ModifyingInterface,
            Self::Regenerated(_) => PendingOp::Regenerating,
            Self::Applied(_) => PendingOp::Applying,
        }
    }
}

/// Pending async operation type (for UI display).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingOp {
    Refreshing,
    AssigningPort,
    SavingProfile,
    DeletingProfile,
    AddingPeer,
    DeletingPeer,
    CreatingVlan,
    ModifyingInterface,
    Regenerating,
    Applying,
}

impl PendingOp {
    /// Get display text for the operation.
    pub fn display(&self) -> &'static str {
        match self {
            PendingOp::Refreshing => "Loading ports, profiles and peers...",
            PendingOp::AssigningPort => "Assigning port...",
            PendingOp::SavingProfile => "Saving profile...",
            PendingOp::DeletingProfile => "Deleting profile...",
            PendingOp::AddingPeer => "Adding VPN peer...",
            PendingOp::DeletingPeer => "Deleting VPN peer...",
            PendingOp::CreatingVlan => "Creating VLAN...",
            PendingOp::ModifyingInterface => "Writing interface override...",
            PendingOp::Regenerating => "Regenerating artifacts...",
            PendingOp::Applying => "Applying network configuration...",
        }
    }

    fn timeout(&self) -> Duration {
        match self {
            PendingOp::Refreshing => TIMEOUT_REFRESH,
            PendingOp::Applying => TIMEOUT_APPLY,
            _ => TIMEOUT_MUTATION,
        }
    }

    fn timed_out(&self) -> UacError {
        UacError::CommandFailed {
            command: self.display().trim_end_matches('.').into(),
            message: "operation timed out".into(),
        }
    }
}

/// Top-level tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Ports,
    Profiles,
    Peers,
    Interfaces,
}

impl View {
    pub const ALL: [View; 4] = [View::Ports, View::Profiles, View::Peers, View::Interfaces];

    pub fn title(&self) -> &'static str {
        match self {
            View::Ports => "Ports",
            View::Profiles => "Profiles",
            View::Peers => "VPN Peers",
            View::Interfaces => "Interfaces",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            View::Ports => 0,
            View::Profiles => 1,
            View::Peers => 2,
            View::Interfaces => 3,
        }
    }
}

/// Current UI state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Browsing,
    /// Choosing a profile for a port.
    PickingProfile,
    EditingForm,
    Confirming,
}

/// Destructive action awaiting a y/n.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmAction {
    DeleteProfile(String),
    DeletePeer(String),
}

impl ConfirmAction {
    pub fn prompt(&self) -> String {
        match self {
            ConfirmAction::DeleteProfile(id) => {
                format!("Delete profile '{}'? Bound ports become unassigned.", id)
            }
            ConfirmAction::DeletePeer(name) => format!("Delete VPN peer '{}'?", name),
        }
    }
}

/// Profile picker for one port. Entry 0 is "None".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picker {
    pub port: String,
    pub options: Vec<Option<String>>,
    pub selected: usize,
}

/// Application state.
pub struct App {
    controller: Arc<Controller>,
    pub view: View,
    pub state: AppState,
    pub snapshot: Snapshot,
    /// Selected row per view.
    pub selected: [usize; 4],
    pub picker: Option<Picker>,
    /// Form being edited. Kept while its submission is in flight so a
    /// rejected submission can be reopened with the error shown.
    pub form: Option<FormState>,
    pub confirm: Option<ConfirmAction>,
    pub logs: ActivityLog,
    /// Whether the log panel is expanded.
    pub logs_expanded: bool,
    /// Whether the app should quit.
    pub should_quit: bool,
    op_tx: mpsc::UnboundedSender<(u64, AsyncOpResult)>,
    op_rx: mpsc::UnboundedReceiver<(u64, AsyncOpResult)>,
    /// Sequence number handed to the most recently started operation.
    op_seq: u64,
    /// Currently pending async operation.
    pub pending_op: Option<PendingOp>,
    /// Sequence number of the pending operation; results carrying any
    /// other number are stale.
    pending_seq: Option<u64>,
    /// When the current pending operation started (for elapsed time display).
    pub pending_op_started: Option<Instant>,
}

impl App {
    pub fn new(controller: Arc<Controller>, log_path: Option<PathBuf>) -> Self {
        let (op_tx, op_rx) = mpsc::unbounded_channel();

        let mut app = Self {
            controller,
            view: View::Ports,
            state: AppState::Browsing,
            snapshot: Snapshot::default(),
            selected: [0; 4],
            picker: None,
            form: None,
            confirm: None,
            logs: ActivityLog::with_capacity(MAX_LOG_ENTRIES),
            logs_expanded: false,
            should_quit: false,
            op_tx,
            op_rx,
            op_seq: 0,
            pending_op: None,
            pending_seq: None,
            pending_op_started: None,
        };

        app.log_info("Ready. Tab switches views, r refreshes.");
        match log_path {
            Some(path) => app.log_info(format!("Diagnostics in {}", path.display())),
            None => app.log_warning("Log file unavailable; diagnostics disabled"),
        }
        app
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Set the pending operation, record its start time and return its
    /// sequence number.
    fn set_pending_op(&mut self, op: PendingOp) -> u64 {
        self.op_seq += 1;
        self.pending_op = Some(op);
        self.pending_seq = Some(self.op_seq);
        self.pending_op_started = Some(Instant::now());
        self.op_seq
    }

    /// Clear the pending operation and its start time.
    fn clear_pending_op(&mut self) {
        self.pending_op = None;
        self.pending_seq = None;
        self.pending_op_started = None;
    }

    /// Get elapsed time since the pending operation started.
    pub fn pending_elapsed(&self) -> Option<Duration> {
        self.pending_op_started.map(|start| start.elapsed())
    }

    /// Stop waiting for the pending operation. The work itself runs to
    /// completion; its result is discarded as stale when it arrives.
    fn cancel_pending_op(&mut self) {
        if let Some(op) = self.pending_op {
            self.log_warning(format!("Cancelled: {}", op.display()));
            self.clear_pending_op();
            self.form = None;
        }
    }

    /// Poll for async operation results. Call this from the main loop.
    pub fn poll_async_results(&mut self) {
        while let Ok((seq, result)) = self.op_rx.try_recv() {
            self.handle_async_result(seq, result);
        }
    }

    /// Run `work` against the controller on the blocking pool.
    fn run_blocking<T, F, W>(&mut self, op: PendingOp, work: F, wrap: W)
    where
        T: Send + 'static,
        F: FnOnce(&Controller) -> Result<T> + Send + 'static,
        W: FnOnce(Result<T>) -> AsyncOpResult + Send + 'static,
    {
        if self.pending_op.is_some() {
            return; // Already busy
        }
        let seq = self.set_pending_op(op);

        let controller = Arc::clone(&self.controller);
        let tx = self.op_tx.clone();
        tokio::spawn(async move {
            let task = tokio::task::spawn_blocking(move || work(&*controller));
            let result = match tokio::time::timeout(op.timeout(), task).await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => Err(UacError::CommandFailed {
                    command: op.display().trim_end_matches('.').into(),
                    message: e.to_string(),
                }),
                Err(_) => Err(op.timed_out()),
            };
            let _ = tx.send((seq, wrap(result)));
        });
    }

    /// Run an async controller call with a timeout.
    fn run_async<T, Fut, W>(&mut self, op: PendingOp, fut: Fut, wrap: W)
    where
        T: Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        W: FnOnce(Result<T>) -> AsyncOpResult + Send + 'static,
    {
        if self.pending_op.is_some() {
            return;
        }
        let seq = self.set_pending_op(op);

        let tx = self.op_tx.clone();
        tokio::spawn(async move {
            let result = tokio::time::timeout(op.timeout(), fut)
                .await
                .unwrap_or_else(|_| Err(op.timed_out()));
            let _ = tx.send((seq, wrap(result)));
        });
    }

    /// Reload every view from the controller.
    pub fn refresh(&mut self) {
        self.run_blocking(
            PendingOp::Refreshing,
            |c| {
                Ok(Snapshot {
                    ports: c.list_ports()?,
                    profiles: c.list_profiles()?,
                    peers: c.list_peers()?,
                    interfaces: c.list_interfaces()?,
                })
            },
            AsyncOpResult::Refreshed,
        );
    }

    fn regenerate_all(&mut self) {
        self.log_info("Regenerating network and VPN artifacts...");
        self.run_blocking(
            PendingOp::Regenerating,
            |c| Ok((c.regenerate_network()?, c.regenerate_vpn()?)),
            AsyncOpResult::Regenerated,
        );
    }

    fn apply_network(&mut self) {
        self.log_info("Applying network configuration...");
        let controller = Arc::clone(&self.controller);
        self.run_async(
            PendingOp::Applying,
            async move { controller.apply_network_config().await },
            AsyncOpResult::Applied,
        );
    }

    fn assign_port(&mut self, port: String, profile: Option<String>) {
        self.log_info(format!(
            "Assigning {} to {}",
            port,
            profile.as_deref().unwrap_or("none")
        ));
        let target = port.clone();
        self.run_blocking(
            PendingOp::AssigningPort,
            move |c| c.assign_port(&target, profile.as_deref()),
            move |result| AsyncOpResult::PortAssigned { port, result },
        );
    }

    fn submit_form(&mut self) {
        let Some(form) = self.form.as_mut() else {
            return;
        };
        let submission = match form.submit() {
            Ok(submission) => submission,
            Err(e) => {
                form.error = Some(e.to_string());
                return;
            }
        };
        form.error = None;
        self.state = AppState::Browsing;

        match submission {
            FormSubmission::Profile(profile) => self.run_blocking(
                PendingOp::SavingProfile,
                move |c| c.save_profile(profile),
                AsyncOpResult::ProfileSaved,
            ),
            FormSubmission::Peer(peer) => self.run_blocking(
                PendingOp::AddingPeer,
                move |c| c.add_peer(peer),
                AsyncOpResult::PeerAdded,
            ),
            FormSubmission::Vlan(spec) => self.run_blocking(
                PendingOp::CreatingVlan,
                move |c| c.create_vlan(&spec),
                AsyncOpResult::VlanCreated,
            ),
            FormSubmission::Interface(spec) => self.run_blocking(
                PendingOp::ModifyingInterface,
                move |c| c.modify_interface(&spec),
                AsyncOpResult::InterfaceModified,
            ),
        }
    }

    fn confirm_action(&mut self) {
        self.state = AppState::Browsing;
        match self.confirm.take() {
            Some(ConfirmAction::DeleteProfile(id)) => {
                let target = id.clone();
                self.run_blocking(
                    PendingOp::DeletingProfile,
                    move |c| c.delete_profile(&target),
                    move |result| AsyncOpResult::ProfileDeleted { id, result },
                );
            }
            Some(ConfirmAction::DeletePeer(name)) => {
                let target = name.clone();
                self.run_blocking(
                    PendingOp::DeletingPeer,
                    move |c| c.delete_peer(&target),
                    move |result| AsyncOpResult::PeerDeleted { name, result },
                );
            }
            None => {}
        }
    }

    /// Handle a completed async operation.
    fn handle_async_result(&mut self, seq: u64, result: AsyncOpResult) {
        // Guard against stale results: cancelled or timed-out work that
        // finished after a newer operation started, even one of the same kind.
        if self.pending_seq != Some(seq) {
            self.log_info(format!(
                "Discarded stale result ({}); press r to refresh",
                result.op().display().trim_end_matches('.')
            ));
            return;
        }
        self.clear_pending_op();

        let mutated = match result {
            AsyncOpResult::Refreshed(Ok(snapshot)) => {
                self.log_success(format!(
                    "{} port(s), {} profile(s), {} peer(s)",
                    snapshot.ports.len(),
                    snapshot.profiles.len(),
                    snapshot.peers.len()
                ));
                if snapshot.ports.is_empty() {
                    self.log_warning("No physical ports discovered");
                }
                self.snapshot = snapshot;
                self.clamp_selection();
                false
            }
            AsyncOpResult::Refreshed(Err(e)) => {
                self.log_error(format!("Refresh failed: {}", e));
                false
            }
            AsyncOpResult::PortAssigned { port, result } => match result {
                Ok(assignment) => {
                    self.snapshot.ports = assignment.ports;
                    self.log_success(format!(
                        "{} updated; artifacts {}",
                        port,
                        assignment.report.summary()
                    ));
                    true
                }
                Err(e) => {
                    self.log_error(format!("Assigning {} failed: {}", port, e));
                    false
                }
            },
            AsyncOpResult::ProfileSaved(result) => match result {
                Ok((profile, report)) => {
                    self.form = None;
                    self.log_success(format!(
                        "Saved profile '{}'; artifacts {}",
                        profile.id,
                        report.summary()
                    ));
                    true
                }
                Err(e) => {
                    self.reject_form("Saving profile", e);
                    false
                }
            },
            AsyncOpResult::ProfileDeleted { id, result } => match result {
                Ok(report) => {
                    self.log_success(format!("Deleted profile '{}'; artifacts {}", id, report.summary()));
                    true
                }
                Err(e) => {
                    self.log_error(format!("Deleting profile '{}' failed: {}", id, e));
                    false
                }
            },
            AsyncOpResult::PeerAdded(result) => match result {
                Ok((peer, report)) => {
                    self.form = None;
                    self.log_success(format!("Added {} peer '{}'", peer.mode.label(), peer.name));
                    self.log_vpn_report(&report);
                    true
                }
                Err(e) => {
                    self.reject_form("Adding peer", e);
                    false
                }
            },
            AsyncOpResult::PeerDeleted { name, result } => match result {
                Ok(report) => {
                    self.log_success(format!("Deleted peer '{}'", name));
                    self.log_vpn_report(&report);
                    true
                }
                Err(e) => {
                    self.log_error(format!("Deleting peer '{}' failed: {}", name, e));
                    false
                }
            },
            AsyncOpResult::VlanCreated(result) | AsyncOpResult::InterfaceModified(result) => {
                match result {
                    Ok(outcome) => {
                        self.form = None;
                        self.log_success(format!(
                            "{} {} ({})",
                            outcome.interface,
                            outcome.status,
                            outcome.netplan_file.display()
                        ));
                        if let Some(dhcp) = outcome.dhcp_file {
                            let message = format!("DHCP snippet {}", dhcp.display());
                            self.logs.push(Level::Artifact, message);
                        }
                        true
                    }
                    Err(e) => {
                        self.reject_form("Writing interface", e);
                        false
                    }
                }
            }
            AsyncOpResult::Regenerated(result) => match result {
                Ok((network, vpn)) => {
                    if network.is_noop() {
                        self.log_success("Network artifacts already up to date");
                    } else {
                        let message = format!("Network artifacts {}", network.summary());
                        self.logs.push(Level::Artifact, message);
                    }
                    self.log_vpn_report(&vpn);
                    true
                }
                Err(e) => {
                    self.log_error(format!("Regeneration failed: {}", e));
                    false
                }
            },
            AsyncOpResult::Applied(result) => {
                match result {
                    Ok(outcome) if outcome.applied => self.log_success(outcome.message),
                    Ok(outcome) => self.log_warning(outcome.message),
                    Err(e) => self.log_error(format!("Apply failed: {}", e)),
                }
                false
            }
        };

        if mutated {
            self.refresh();
        }
    }

    /// Reopen the in-flight form on client errors, log everything else.
    fn reject_form(&mut self, what: &str, e: UacError) {
        if e.is_client_error() {
            if let Some(form) = self.form.as_mut() {
                form.error = Some(e.to_string());
                self.state = AppState::EditingForm;
            }
        } else {
            self.form = None;
        }
        self.log_error(format!("{} failed: {}", what, e));
    }

    fn log_vpn_report(&mut self, report: &VpnReport) {
        let message = format!(
            "VPN artifacts: {} routed, {} bridged, {} inactive",
            report.routed_peers, report.bridged_peers, report.inactive_peers
        );
        self.logs.push(Level::Vpn, message);
        for path in &report.skipped {
            self.log_warning(format!("No permission to write {}", path.display()));
        }
    }

    /// Rows in the current view.
    pub fn row_count(&self, view: View) -> usize {
        match view {
            View::Ports => self.snapshot.ports.len(),
            View::Profiles => self.snapshot.profiles.len(),
            View::Peers => self.snapshot.peers.len(),
            View::Interfaces => self.snapshot.interfaces.len(),
        }
    }

    pub fn selected_row(&self) -> usize {
        self.selected[self.view.index()]
    }

    fn clamp_selection(&mut self) {
        for view in View::ALL {
            let max = self.row_count(view).saturating_sub(1);
            let slot = &mut self.selected[view.index()];
            *slot = (*slot).min(max);
        }
    }

    fn move_selection(&mut self, down: bool) {
        let count = self.row_count(self.view);
        let slot = &mut self.selected[self.view.index()];
        if down {
            if *slot + 1 < count {
                *slot += 1;
            }
        } else {
            *slot = slot.saturating_sub(1);
        }
    }

    fn switch_view(&mut self, forward: bool) {
        let i = self.view.index();
        let n = View::ALL.len();
        self.view = View::ALL[if forward { (i + 1) % n } else { (i + n - 1) % n }];
    }

    /// Profile name for display next to a port binding.
    pub fn profile_label(&self, id: &str) -> String {
        match self.snapshot.profiles.iter().find(|p| p.id == id) {
            Some(p) if p.name != p.id => format!("{} ({})", p.id, p.name),
            Some(p) => p.id.clone(),
            None => format!("{} (missing)", id),
        }
    }

    /// Handle keyboard input.
    pub fn handle_key(&mut self, key: KeyCode) {
        // While an operation is pending, only allow quit and cancel
        if self.pending_op.is_some() {
            match key {
                KeyCode::Char('q') if self.state == AppState::Browsing => {
                    self.should_quit = true;
                }
                KeyCode::Esc => {
                    self.cancel_pending_op();
                }
                _ => {}
            }
            return;
        }

        match self.state {
            AppState::Browsing => self.handle_browse_key(key),
            AppState::PickingProfile => self.handle_picker_key(key),
            AppState::EditingForm => self.handle_form_key(key),
            AppState::Confirming => self.handle_confirm_key(key),
        }
    }

    fn handle_browse_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Tab | KeyCode::Right => self.switch_view(true),
            KeyCode::BackTab | KeyCode::Left => self.switch_view(false),
            KeyCode::Char(c @ '1'..='4') => {
                self.view = View::ALL[c as usize - '1' as usize];
            }
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(false),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(true),
            KeyCode::Char('r') => self.refresh(),
            KeyCode::Char('g') => self.regenerate_all(),
            KeyCode::Char('a') => self.apply_network(),
            KeyCode::Char('l') => {
                self.logs_expanded = !self.logs_expanded;
            }
            KeyCode::Char('q') => self.should_quit = true,
            _ => match self.view {
                View::Ports => self.handle_ports_key(key),
                View::Profiles => self.handle_profiles_key(key),
                View::Peers => self.handle_peers_key(key),
                View::Interfaces => self.handle_interfaces_key(key),
            },
        }
    }

    fn handle_ports_key(&mut self, key: KeyCode) {
        if key != KeyCode::Enter {
            return;
        }
        let Some(port) = self.snapshot.ports.get(self.selected_row()) else {
            return;
        };
        let mut options: Vec<Option<String>> = vec![None];
        options.extend(self.snapshot.profiles.iter().map(|p| Some(p.id.clone())));
        let selected = options
            .iter()
            .position(|o| o.as_deref() == port.assigned_profile_id.as_deref())
            .unwrap_or(0);
        self.picker = Some(Picker {
            port: port.name.clone(),
            options,
            selected,
        });
        self.state = AppState::PickingProfile;
    }

    fn handle_profiles_key(&mut self, key: KeyCode) {
        let current = self.snapshot.profiles.get(self.selected_row()).cloned();
        match key {
            KeyCode::Char('n') => self.open_form(FormState::profile(None)),
            KeyCode::Char('e') | KeyCode::Enter => {
                if let Some(profile) = current {
                    self.open_form(FormState::profile(Some(&profile)));
                }
            }
            KeyCode::Char('x') | KeyCode::Delete => {
                if let Some(profile) = current {
                    self.confirm = Some(ConfirmAction::DeleteProfile(profile.id));
                    self.state = AppState::Confirming;
                }
            }
            _ => {}
        }
    }

    fn handle_peers_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('n') => self.open_form(FormState::peer()),
            KeyCode::Char('x') | KeyCode::Delete => {
                if let Some(peer) = self.snapshot.peers.get(self.selected_row()) {
                    self.confirm = Some(ConfirmAction::DeletePeer(peer.name.clone()));
                    self.state = AppState::Confirming;
                }
            }
            _ => {}
        }
    }

    fn handle_interfaces_key(&mut self, key: KeyCode) {
        let physical = self
            .snapshot
            .interfaces
            .get(self.selected_row())
            .filter(|row| row.kind == InterfaceKind::Physical)
            .map(|row| row.name.clone());
        match key {
            KeyCode::Char('v') => self.open_form(FormState::vlan(physical.as_deref())),
            KeyCode::Char('i') | KeyCode::Enter => {
                self.open_form(FormState::interface(physical.as_deref()))
            }
            _ => {}
        }
    }

    fn open_form(&mut self, form: FormState) {
        self.form = Some(form);
        self.state = AppState::EditingForm;
    }

    fn handle_picker_key(&mut self, key: KeyCode) {
        let Some(picker) = self.picker.as_mut() else {
            self.state = AppState::Browsing;
            return;
        };
        match key {
            KeyCode::Up | KeyCode::Char('k') => {
                picker.selected = picker.selected.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if picker.selected + 1 < picker.options.len() {
                    picker.selected += 1;
                }
            }
            KeyCode::Enter => {
                let port = picker.port.clone();
                let profile = picker.options.get(picker.selected).cloned().flatten();
                self.picker = None;
                self.state = AppState::Browsing;
                self.assign_port(port, profile);
            }
            KeyCode::Esc | KeyCode::Char('q') => {
                self.picker = None;
                self.state = AppState::Browsing;
            }
            _ => {}
        }
    }

    fn handle_form_key(&mut self, key: KeyCode) {
        let Some(form) = self.form.as_mut() else {
            self.state = AppState::Browsing;
            return;
        };
        match key {
            KeyCode::Esc => {
                self.form = None;
                self.state = AppState::Browsing;
            }
            KeyCode::Enter => self.submit_form(),
            KeyCode::Tab | KeyCode::Down => form.focus_next(),
            KeyCode::BackTab | KeyCode::Up => form.focus_prev(),
            KeyCode::Left => form.cycle(false),
            KeyCode::Right => form.cycle(true),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Char(c) => form.input(c),
            _ => {}
        }
    }

    fn handle_confirm_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('y') | KeyCode::Char('Y') => self.confirm_action(),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.confirm = None;
                self.state = AppState::Browsing;
            }
            _ => {}
        }
    }

    /// Get the help text for current state.
    pub fn help_text(&self) -> &'static str {
        if self.pending_op.is_some() {
            return "Esc: Cancel  q: Quit";
        }

        match self.state {
            AppState::PickingProfile => "↑/↓: Navigate  Enter: Assign  Esc: Cancel",
            AppState::EditingForm => "Tab/↓: Next  ←/→: Change  Enter: Save  Esc: Cancel",
            AppState::Confirming => "y: Confirm  n: Cancel",
            AppState::Browsing => match self.view {
                View::Ports => "Tab: View  ↑/↓: Navigate  Enter: Assign  r: Refresh  g: Regenerate  a: Apply  l: Logs  q: Quit",
                View::Profiles => "Tab: View  n: New  e: Edit  x: Delete  g: Regenerate  a: Apply  l: Logs  q: Quit",
                View::Peers => "Tab: View  n: New  x: Delete  g: Regenerate  l: Logs  q: Quit",
                View::Interfaces => "Tab: View  v: New VLAN  i: Override  a: Apply  l: Logs  q: Quit",
            },
        }
    }

    // Logging helpers

    fn log_info(&mut self, msg: impl Into<String>) {
        self.logs.push(Level::Info, msg);
    }

    fn log_success(&mut self, msg: impl Into<String>) {
        self.logs.push(Level::Success, msg);
    }

    fn log_warning(&mut self, msg: impl Into<String>) {
        self.logs.push(Level::Warning, msg);
    }

    fn log_error(&mut self, msg: impl Into<String>) {
        self.logs.push(Level::Error, msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::system::sysfs::testing::fake_iface;
    use tempfile::TempDir;

    fn app(root: &TempDir) -> App {
        fake_iface(root.path(), "eth0", None, Some("up"), None);
        fake_iface(root.path(), "eth1", None, Some("down"), None);
        let controller = Controller::new(Settings::rooted_at(root.path()));
        App::new(Arc::new(controller), None)
    }

    async fn settle(app: &mut App) {
        for _ in 0..200 {
            app.poll_async_results();
            if app.pending_op.is_none() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("operation did not finish");
    }

    fn type_into(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(KeyCode::Char(c));
        }
    }

    #[tokio::test]
    async fn test_refresh_loads_ports() {
        let root = TempDir::new().unwrap();
        let mut app = app(&root);
        app.refresh();
        assert_eq!(app.pending_op, Some(PendingOp::Refreshing));
        settle(&mut app).await;
        assert_eq!(app.snapshot.ports.len(), 2);
        assert_eq!(app.snapshot.interfaces.len(), 2);
    }

    #[tokio::test]
    async fn test_create_profile_and_assign_through_keys() {
        let root = TempDir::new().unwrap();
        let mut app = app(&root);
        app.refresh();
        settle(&mut app).await;

        app.handle_key(KeyCode::Char('2'));
        app.handle_key(KeyCode::Char('n'));
        assert_eq!(app.state, AppState::EditingForm);
        type_into(&mut app, "guest");
        app.handle_key(KeyCode::Tab);
        app.handle_key(KeyCode::Tab);
        type_into(&mut app, "30");
        app.handle_key(KeyCode::Tab);
        type_into(&mut app, "10.30.0.1/24");
        app.handle_key(KeyCode::Enter);
        settle(&mut app).await;
        settle(&mut app).await;
        assert_eq!(app.snapshot.profiles.len(), 1);
        assert!(app.form.is_none());

        app.handle_key(KeyCode::Char('1'));
        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Enter);
        assert_eq!(app.state, AppState::PickingProfile);
        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Enter);
        settle(&mut app).await;
        settle(&mut app).await;

        let eth1 = app.snapshot.ports.iter().find(|p| p.name == "eth1").unwrap();
        assert_eq!(eth1.assigned_profile_id.as_deref(), Some("guest"));
        assert!(Settings::rooted_at(root.path())
            .netplan_dir()
            .join("20-uac-profile-eth1.30.yaml")
            .exists());
    }

    #[tokio::test]
    async fn test_rejected_form_reopens_with_error() {
        let root = TempDir::new().unwrap();
        let mut app = app(&root);

        app.handle_key(KeyCode::Char('2'));
        app.handle_key(KeyCode::Char('n'));
        type_into(&mut app, "guest");
        app.handle_key(KeyCode::Tab);
        app.handle_key(KeyCode::Tab);
        type_into(&mut app, "5000");
        app.handle_key(KeyCode::Enter);
        settle(&mut app).await;

        assert_eq!(app.state, AppState::EditingForm);
        assert!(app.form.as_ref().unwrap().error.is_some());
    }

    #[tokio::test]
    async fn test_stale_result_is_discarded() {
        let root = TempDir::new().unwrap();
        let mut app = app(&root);
        app.refresh();
        app.handle_key(KeyCode::Esc);
        assert!(app.pending_op.is_none());

        tokio::time::sleep(Duration::from_millis(200)).await;
        app.poll_async_results();
        assert!(app.snapshot.ports.is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_result_of_same_kind_is_discarded() {
        let root = TempDir::new().unwrap();
        let mut app = app(&root);
        app.refresh();
        let abandoned = app.pending_seq.unwrap();
        app.handle_key(KeyCode::Esc);
        app.refresh();
        assert_eq!(app.pending_op, Some(PendingOp::Refreshing));

        let late = Snapshot {
            profiles: vec![NetworkProfile {
                id: "ghost".into(),
                name: "ghost".into(),
                vlan_id: None,
                ip_cidr: None,
                dhcp_server_enabled: false,
            }],
            ..Snapshot::default()
        };
        app.op_tx
            .send((abandoned, AsyncOpResult::Refreshed(Ok(late))))
            .unwrap();
        app.poll_async_results();
        assert!(app.snapshot.profiles.iter().all(|p| p.id != "ghost"));

        settle(&mut app).await;
        assert_eq!(app.snapshot.ports.len(), 2);
        assert!(app.snapshot.profiles.is_empty());
    }

    #[tokio::test]
    async fn test_delete_requires_confirmation() {
        let root = TempDir::new().unwrap();
        let mut app = app(&root);
        app.snapshot.peers.push(VpnPeer {
            name: "siteA".into(),
            mode: crate::model::PeerMode::Routed { allowed_ips: None },
            endpoint: "203.0.113.5:51820".into(),
            public_key: "K1".into(),
            is_active: true,
        });
        app.view = View::Peers;

        app.handle_key(KeyCode::Char('x'));
        assert_eq!(app.state, AppState::Confirming);
        app.handle_key(KeyCode::Char('n'));
        assert_eq!(app.state, AppState::Browsing);
        assert!(app.pending_op.is_none());
    }

    #[tokio::test]
    async fn test_regenerate_logs_vpn_report() {
        let root = TempDir::new().unwrap();
        let mut app = app(&root);
        app.handle_key(KeyCode::Char('g'));
        settle(&mut app).await;
        settle(&mut app).await;

        let vpn = app
            .logs
            .recent(MAX_LOG_ENTRIES)
            .find(|entry| entry.level == Level::Vpn)
            .unwrap();
        assert!(vpn.message.contains("0 routed, 0 bridged"));
        assert!(!app.logs.recent(MAX_LOG_ENTRIES).any(|e| e.level == Level::Error));
    }

    #[test]
    fn test_log_is_bounded() {
        let root = TempDir::new().unwrap();
        let mut app = app(&root);
        for i in 0..(MAX_LOG_ENTRIES + 10) {
            app.log_info(format!("entry {}", i));
        }
        assert_eq!(app.logs.len(), MAX_LOG_ENTRIES);
    }
}
