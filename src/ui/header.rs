//! Title bar, view tabs, separators and the key hint bar.

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    symbols::line,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::app::{App, View};
use crate::ui::theme::{self, glyph};

/// Render the title line with the state directory and apply mode on the right.
pub fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(20), Constraint::Length(48)])
        .split(area);

    let title = Paragraph::new(Line::from(vec![
        Span::raw("  "),
        Span::styled(format!("{} UAC Network", glyph::LOGO), theme::title()),
    ]));
    frame.render_widget(title, chunks[0]);

    let settings = app.controller().settings();
    let (badge, badge_style) = theme::apply_mode(settings.dry_run_apply);
    let status = Paragraph::new(Line::from(vec![
        Span::styled(settings.state_dir.display().to_string(), theme::muted()),
        Span::raw("  "),
        Span::styled(format!("{} {}", glyph::LIT, badge), badge_style),
        Span::raw("  "),
    ]))
    .alignment(Alignment::Right);
    frame.render_widget(status, chunks[1]);
}

/// Render the tab bar. Each tab shows its shortcut and row count.
pub fn render_tabs(frame: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![Span::raw("  ")];
    for (i, view) in View::ALL.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled("  │  ", theme::tab(false)));
        }
        spans.push(Span::styled(format!("{} ", i + 1), theme::key()));
        spans.push(Span::styled(view.title(), theme::tab(*view == app.view)));
        spans.push(Span::styled(
            format!(" ({})", app.row_count(*view)),
            theme::muted(),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Render a horizontal separator line.
pub fn render_separator(frame: &mut Frame, area: Rect) {
    let rule = line::HORIZONTAL.repeat(area.width as usize);
    frame.render_widget(Paragraph::new(Span::styled(rule, theme::frame(false))), area);
}

/// Render the key hints for the current state.
pub fn render_key_hints(frame: &mut Frame, area: Rect, hints: &str) {
    frame.render_widget(Paragraph::new(Line::from(hint_spans(hints))), area);
}

/// Split `"r: Refresh  q: Quit"` into styled key and action spans.
/// Groups are separated by two spaces; a group without `:` is all action.
fn hint_spans(hints: &str) -> Vec<Span<'static>> {
    let mut spans = vec![Span::raw("  ")];
    for (i, group) in hints.split("  ").enumerate() {
        if i > 0 {
            spans.push(Span::raw("   "));
        }
        match group.split_once(':') {
            Some((key, action)) => {
                spans.push(Span::styled(key.to_string(), theme::key()));
                spans.push(Span::styled(format!(" {}", action.trim_start()), theme::muted()));
            }
            None => spans.push(Span::styled(group.to_string(), theme::muted())),
        }
    }
    spans
}
