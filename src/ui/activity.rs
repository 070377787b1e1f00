//! Activity log and the panel that shows its tail.

use std::collections::VecDeque;

use chrono::{DateTime, Local};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};

use crate::ui::theme::{self, glyph};
use crate::ui::widgets::Card;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
    /// Netplan or chilli files written or removed.
    Artifact,
    /// Peer counts from a VPN regeneration.
    Vpn,
}

impl Level {
    fn badge(self) -> (&'static str, Style) {
        match self {
            Level::Info => (glyph::NOTE, theme::text()),
            Level::Success => (glyph::DONE, theme::good()),
            Level::Warning => (glyph::WARN, theme::warn()),
            Level::Error => (glyph::FAIL, theme::fail()),
            Level::Artifact => (glyph::FILE, theme::artifact()),
            Level::Vpn => (glyph::TUNNEL, theme::binding()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub at: DateTime<Local>,
    pub level: Level,
    pub message: String,
}

/// Bounded log; the oldest entry is evicted once `capacity` is reached.
#[derive(Debug)]
pub struct ActivityLog {
    entries: VecDeque<Entry>,
    capacity: usize,
}

impl ActivityLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, level: Level, message: impl Into<String>) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(Entry {
            at: Local::now(),
            level,
            message: message.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The newest `count` entries, oldest first.
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &Entry> {
        self.entries.iter().skip(self.entries.len().saturating_sub(count))
    }
}

/// Card listing as many of the newest entries as fit.
pub struct ActivityPanel<'a> {
    log: &'a ActivityLog,
    expanded: bool,
}

impl<'a> ActivityPanel<'a> {
    pub fn new(log: &'a ActivityLog, expanded: bool) -> Self {
        Self { log, expanded }
    }
}

impl Widget for ActivityPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Card::new(Span::styled(" Activity ", theme::heading()))
            .focused(self.expanded)
            .item_count(self.log.len())
            .render(area, buf);

        let inner = Card::inner(area);
        let lines: Vec<Line> = if self.log.is_empty() {
            vec![Line::from(Span::styled("Nothing yet", theme::muted()))]
        } else {
            self.log.recent(inner.height as usize).map(entry_line).collect()
        };
        Paragraph::new(lines).render(inner, buf);
    }
}

fn entry_line(entry: &Entry) -> Line<'static> {
    let (badge, style) = entry.level.badge();
    Line::from(vec![
        Span::styled(entry.at.format("%H:%M:%S ").to_string(), theme::muted()),
        Span::styled(format!("{} ", badge), style),
        Span::styled(entry.message.clone(), style),
    ])
}
