//! List views for ports, profiles, peers and interfaces.
//!
//! Each view is a card with one line per record; the selected record
//! expands into tree-style details.

use ratatui::{
    layout::{Alignment, Rect},
    style::Modifier,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::app::{App, View};
use crate::model::{LinkState, PeerMode};
use crate::synth::{InterfaceKind, DEFAULT_ALLOWED_IPS};
use crate::ui::theme::{self, glyph};
use crate::ui::widgets::Card;

/// One record in a list: a summary line plus details shown when selected.
struct Row<'a> {
    cells: Vec<Span<'a>>,
    details: Vec<(&'static str, Span<'a>)>,
}

/// Render the active view.
pub fn render_view(frame: &mut Frame, area: Rect, app: &App) {
    let rows = match app.view {
        View::Ports => port_rows(app),
        View::Profiles => profile_rows(app),
        View::Peers => peer_rows(app),
        View::Interfaces => interface_rows(app),
    };

    if rows.is_empty() {
        let message = match app.view {
            View::Ports => "No physical ports discovered (r to refresh)",
            View::Profiles => "No profiles yet (n to create one)",
            View::Peers => "No VPN peers yet (n to add one)",
            View::Interfaces => "No interfaces (r to refresh)",
        };
        render_empty(frame, area, app.view.title(), message);
        return;
    }

    render_list(frame, area, app.view.title(), &rows, app.selected_row());
}

fn port_rows(app: &App) -> Vec<Row<'_>> {
    app.snapshot
        .ports
        .iter()
        .map(|port| {
            let (icon, state_style) = theme::link(port.operstate);
            let speed = if port.speed > 0 {
                format!("{} Mb/s", port.speed)
            } else {
                "-".to_string()
            };
            let binding = match &port.assigned_profile_id {
                Some(id) => Span::styled(
                    format!("{} {}", glyph::BOUND_TO, app.profile_label(id)),
                    theme::binding(),
                ),
                None => Span::styled("unassigned", theme::muted()),
            };

            let mut details = vec![
                ("MAC", Span::raw(port.mac_address.clone())),
                ("Speed", Span::raw(speed)),
            ];
            if let Some(profile) = port
                .assigned_profile_id
                .as_ref()
                .and_then(|id| app.snapshot.profiles.iter().find(|p| &p.id == id))
            {
                details.push((
                    "Interface",
                    Span::raw(profile.effective_interface(&port.name)),
                ));
            }

            Row {
                cells: vec![
                    Span::raw(format!("{:<12}", port.name)),
                    Span::styled(format!("{} {:<9}", icon, port.operstate.as_str()), state_style),
                    binding,
                ],
                details,
            }
        })
        .collect()
}

fn profile_rows(app: &App) -> Vec<Row<'_>> {
    app.snapshot
        .profiles
        .iter()
        .map(|profile| {
            let vlan = profile
                .vlan_id
                .map(|id| format!("VLAN {}", id))
                .unwrap_or_else(|| "untagged".to_string());
            let bound: Vec<&str> = app
                .snapshot
                .ports
                .iter()
                .filter(|p| p.assigned_profile_id.as_deref() == Some(profile.id.as_str()))
                .map(|p| p.name.as_str())
                .collect();

            Row {
                cells: vec![
                    Span::raw(format!("{:<16}", profile.id)),
                    Span::styled(format!("{:<10}", vlan), theme::layer2()),
                    Span::raw(format!(
                        "{:<20}",
                        profile.ip_cidr.as_deref().unwrap_or("no address")
                    )),
                    Span::styled(
                        if profile.dhcp_server_enabled { "DHCP on" } else { "DHCP off" },
                        theme::toggle(profile.dhcp_server_enabled),
                    ),
                ],
                details: vec![
                    ("Name", Span::raw(profile.name.clone())),
                    (
                        "Ports",
                        if bound.is_empty() {
                            Span::styled("none", theme::muted())
                        } else {
                            Span::raw(bound.join(", "))
                        },
                    ),
                ],
            }
        })
        .collect()
}

fn peer_rows(app: &App) -> Vec<Row<'_>> {
    app.snapshot
        .peers
        .iter()
        .map(|peer| {
            let (target_label, target) = match &peer.mode {
                PeerMode::Routed { allowed_ips } => (
                    "Allowed IPs",
                    allowed_ips.clone().unwrap_or_else(|| DEFAULT_ALLOWED_IPS.to_string()),
                ),
                PeerMode::Bridged { target_vlan } => (
                    "Target VLAN",
                    target_vlan.clone().unwrap_or_else(|| "-".to_string()),
                ),
            };
            let (dot, state) = if peer.is_active {
                (glyph::LIT, "active")
            } else {
                (glyph::UNLIT, "inactive")
            };
            let active = Span::styled(format!("{} {}", dot, state), theme::toggle(peer.is_active));

            Row {
                cells: vec![
                    Span::raw(format!("{:<16}", peer.name)),
                    Span::styled(format!("{:<4}", peer.mode.label()), theme::peer_mode(&peer.mode)),
                    Span::raw(format!("{:<24}", peer.endpoint)),
                    active,
                ],
                details: vec![
                    (target_label, Span::raw(target)),
                    ("Public key", Span::styled(peer.public_key.clone(), theme::muted())),
                ],
            }
        })
        .collect()
}

fn interface_rows(app: &App) -> Vec<Row<'_>> {
    app.snapshot
        .interfaces
        .iter()
        .map(|iface| {
            let (kind, kind_style) = match iface.kind {
                InterfaceKind::Physical => ("physical", theme::layer3()),
                InterfaceKind::Vlan => ("vlan", theme::layer2()),
            };
            let (_, status_style) = theme::link(LinkState::parse(&iface.status));

            let mut details = Vec::new();
            if let Some(parent) = &iface.parent {
                details.push(("Parent", Span::raw(parent.clone())));
            }
            if let Some(id) = iface.vlan_id {
                details.push(("VLAN ID", Span::raw(id.to_string())));
            }

            Row {
                cells: vec![
                    Span::raw(format!("{:<16}", iface.name)),
                    Span::styled(format!("{:<10}", kind), kind_style),
                    Span::styled(format!("{:<12}", iface.status), status_style),
                    Span::raw(iface.address.clone().unwrap_or_default()),
                ],
                details,
            }
        })
        .collect()
}

/// Render rows with tree-style details under the selected one.
fn render_list(frame: &mut Frame, area: Rect, title: &str, rows: &[Row], selected: usize) {
    let card = Card::new(Span::styled(format!(" {} ", title), theme::heading()))
        .focused(true)
        .item_count(rows.len());
    frame.render_widget(card, area);

    let inner = Card::inner(area);

    // Keep the selected row and its details on screen.
    let expanded = rows.get(selected).map_or(0, |r| r.details.len() + 1) as u16;
    let start = (selected as u16 + expanded + 1).saturating_sub(inner.height) as usize;

    let mut y_offset = 0u16;
    for (i, row) in rows.iter().enumerate().skip(start) {
        if y_offset >= inner.height {
            break;
        }

        let is_selected = i == selected;
        let prefix = if is_selected {
            format!("{} ", glyph::CURSOR)
        } else {
            "  ".to_string()
        };
        let prefix_style = if is_selected {
            theme::cursor()
        } else {
            theme::text()
        };

        let mut spans = vec![Span::styled(prefix, prefix_style)];
        for (c, cell) in row.cells.iter().enumerate() {
            if c > 0 {
                spans.push(Span::raw(" "));
            }
            let mut cell = cell.clone();
            if is_selected && c == 0 {
                cell = cell.style(theme::cursor());
            }
            spans.push(cell);
        }

        let line_area = Rect::new(inner.x, inner.y + y_offset, inner.width, 1);
        frame.render_widget(Paragraph::new(Line::from(spans)), line_area);
        y_offset += 1;

        if !is_selected {
            continue;
        }

        let last = row.details.len().saturating_sub(1);
        for (d, (label, value)) in row.details.iter().enumerate() {
            if y_offset >= inner.height {
                break;
            }
            let branch = if d == last {
                glyph::LAST_BRANCH
            } else {
                glyph::BRANCH
            };
            let detail = Line::from(vec![
                Span::styled(format!("  {} ", branch), theme::muted()),
                Span::styled(format!("{}: ", label), theme::muted()),
                value.clone(),
            ]);
            let detail_area = Rect::new(inner.x, inner.y + y_offset, inner.width, 1);
            frame.render_widget(Paragraph::new(detail), detail_area);
            y_offset += 1;
        }

        // Add spacing after selected item
        y_offset += 1;
    }
}

/// Render a centered message in an empty card.
fn render_empty(frame: &mut Frame, area: Rect, title: &str, message: &str) {
    let card = Card::new(Span::styled(format!(" {} ", title), theme::heading()));
    frame.render_widget(card, area);

    let inner = Card::inner(area);

    let msg_line = Line::from(vec![
        Span::styled(glyph::WARN, theme::warn()),
        Span::raw(" "),
        Span::styled(message, theme::muted().add_modifier(Modifier::ITALIC)),
    ]);

    let msg_para = Paragraph::new(msg_line).alignment(Alignment::Center);

    // Center vertically
    let msg_y = inner.y + inner.height / 2;
    let msg_area = Rect::new(inner.x, msg_y, inner.width, 1);
    frame.render_widget(msg_para, msg_area);
}
