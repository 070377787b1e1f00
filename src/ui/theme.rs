//! Colors, glyphs and styles for the console.
//!
//! Styles are named after what they mark in this console (link state,
//! L2/L3 mode, port binding, apply mode) rather than after colors.

use ratatui::style::{Color, Modifier, Style};

use crate::model::{LinkState, PeerMode};

pub mod glyph {
    pub const LOGO: &str = "\u{25c9}"; // ◉
    pub const CURSOR: &str = "\u{25b6}"; // ▶
    pub const LIT: &str = "\u{25cf}"; // ●
    pub const UNLIT: &str = "\u{25cb}"; // ○
    pub const BOUND_TO: &str = "\u{2192}"; // →
    pub const WARN: &str = "\u{26a0}"; // ⚠
    pub const FAIL: &str = "\u{2717}"; // ✗
    pub const DONE: &str = "\u{2713}"; // ✓
    pub const NOTE: &str = "\u{00b7}"; // ·
    pub const FILE: &str = "\u{270e}"; // ✎
    pub const TUNNEL: &str = "\u{21c4}"; // ⇄
    pub const BRANCH: &str = "\u{251c}\u{2500}"; // ├─
    pub const LAST_BRANCH: &str = "\u{2514}\u{2500}"; // └─

    pub const SPINNER: &[char] = &['\u{25d0}', '\u{25d3}', '\u{25d1}', '\u{25d2}'];
}

const ACCENT: Color = Color::Cyan;
const TEXT: Color = Color::White;
const MUTED: Color = Color::DarkGray;
const FRAME: Color = Color::Gray;
const GOOD: Color = Color::Green;
const CAUTION: Color = Color::Yellow;
const BAD: Color = Color::Red;
const LAYER2: Color = Color::Blue;
const LAYER3: Color = Color::Magenta;
const ARTIFACT: Color = Color::LightBlue;

pub fn title() -> Style {
    Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
}

pub fn text() -> Style {
    Style::default().fg(TEXT)
}

/// Secondary text: hints, labels, timestamps, tree branches.
pub fn muted() -> Style {
    Style::default().fg(MUTED)
}

/// Card titles.
pub fn heading() -> Style {
    muted().add_modifier(Modifier::BOLD)
}

/// Row under the cursor.
pub fn cursor() -> Style {
    Style::default().fg(CAUTION).add_modifier(Modifier::BOLD)
}

/// Keys in the hint bar and in confirmations.
pub fn key() -> Style {
    title()
}

pub fn frame(focused: bool) -> Style {
    Style::default().fg(if focused { ACCENT } else { FRAME })
}

pub fn good() -> Style {
    Style::default().fg(GOOD)
}

pub fn warn() -> Style {
    Style::default().fg(CAUTION)
}

pub fn fail() -> Style {
    Style::default().fg(BAD)
}

pub fn artifact() -> Style {
    Style::default().fg(ARTIFACT)
}

pub fn tab(active: bool) -> Style {
    if active {
        text().add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
    } else {
        muted()
    }
}

/// VLAN ids, VLAN interfaces and L2 peers.
pub fn layer2() -> Style {
    Style::default().fg(LAYER2)
}

/// Physical interfaces and L3 peers.
pub fn layer3() -> Style {
    Style::default().fg(LAYER3)
}

pub fn peer_mode(mode: &PeerMode) -> Style {
    match mode {
        PeerMode::Routed { .. } => layer3(),
        PeerMode::Bridged { .. } => layer2(),
    }
}

/// A port's profile binding.
pub fn binding() -> Style {
    Style::default().fg(ACCENT)
}

/// Glyph and style for a link's operstate.
pub fn link(state: LinkState) -> (&'static str, Style) {
    match state {
        LinkState::Up => (glyph::LIT, good()),
        LinkState::Down => (glyph::UNLIT, fail().add_modifier(Modifier::BOLD)),
        _ => (glyph::UNLIT, muted()),
    }
}

/// On/off flags: DHCP server, peer activity, form toggles.
pub fn toggle(on: bool) -> Style {
    if on {
        good()
    } else {
        muted()
    }
}

/// Header badge for the apply mode.
pub fn apply_mode(dry_run: bool) -> (&'static str, Style) {
    if dry_run {
        ("DRY RUN", warn().add_modifier(Modifier::BOLD))
    } else {
        ("LIVE", good().add_modifier(Modifier::BOLD))
    }
}
