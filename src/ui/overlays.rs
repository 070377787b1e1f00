//! Popups drawn over the active view: profile picker, forms, confirmation
//! and the pending-operation spinner.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ratatui::{
    layout::{Alignment, Rect},
    style::Modifier,
    text::{Line, Span},
    widgets::{Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, Picker};
use crate::form::{FieldValue, FormState};
use crate::ui::theme::{self, glyph};
use crate::ui::widgets::{centered, Card};

/// Render whichever popup the current state calls for.
pub fn render_overlay(frame: &mut Frame, area: Rect, app: &App) {
    if let Some(picker) = &app.picker {
        render_picker(frame, area, app, picker);
    } else if let Some(form) = &app.form {
        // A submitted form stays in `app.form` until its result arrives.
        if app.pending_op.is_none() {
            render_form(frame, area, form);
        }
    } else if let Some(confirm) = &app.confirm {
        render_confirm(frame, area, &confirm.prompt());
    }
}

/// Render the profile list for a port. Entry 0 unassigns.
fn render_picker(frame: &mut Frame, area: Rect, app: &App, picker: &Picker) {
    let card_area = centered(area, 48, picker.options.len() as u16 + 4);

    frame.render_widget(Clear, card_area);
    let card = Card::new(Span::styled(
        format!(" Assign {} ", picker.port),
        theme::heading(),
    ))
    .focused(true)
    .item_count(picker.options.len());
    frame.render_widget(card, card_area);

    let inner = Card::inner(card_area);

    let current = app
        .snapshot
        .ports
        .iter()
        .find(|p| p.name == picker.port)
        .and_then(|p| p.assigned_profile_id.clone());
    let current_text = match &current {
        Some(id) => format!("Current: {}", app.profile_label(id)),
        None => "Current: unassigned".to_string(),
    };
    let current_area = Rect::new(inner.x, inner.y, inner.width, 1);
    frame.render_widget(
        Paragraph::new(Span::styled(current_text, theme::muted())),
        current_area,
    );

    let items_y = inner.y + 2;
    for (i, option) in picker.options.iter().enumerate() {
        let y = items_y + i as u16;
        if y >= inner.y + inner.height {
            break;
        }

        let is_selected = i == picker.selected;
        let prefix = if is_selected {
            format!("{} ", glyph::CURSOR)
        } else {
            "  ".to_string()
        };
        let style = if is_selected {
            theme::cursor()
        } else {
            theme::text()
        };
        let label = match option {
            Some(id) => app.profile_label(id),
            None => "None (unassign)".to_string(),
        };

        let mut spans = vec![Span::styled(prefix, style), Span::styled(label, style)];
        if *option == current {
            spans.push(Span::styled(format!(" {}", glyph::LIT), theme::binding()));
        }

        let line_area = Rect::new(inner.x, y, inner.width, 1);
        frame.render_widget(Paragraph::new(Line::from(spans)), line_area);
    }
}

/// Render a form: one line per field, the focused field's hint and the last error.
fn render_form(frame: &mut Frame, area: Rect, form: &FormState) {
    let error_lines = if form.error.is_some() { 2 } else { 0 };
    let card_height = form.fields.len() as u16 + 4 + error_lines;
    let card_area = centered(area, 64, card_height);

    frame.render_widget(Clear, card_area);
    let card = Card::new(Span::styled(
        format!(" {} ", form.title()),
        theme::heading(),
    ))
    .focused(true);
    frame.render_widget(card, card_area);

    let inner = Card::inner(card_area);
    let label_width = form
        .fields
        .iter()
        .map(|f| f.label.chars().count())
        .max()
        .unwrap_or(0);

    for (i, field) in form.fields.iter().enumerate() {
        let y = inner.y + i as u16;
        if y >= inner.y + inner.height {
            break;
        }

        let focused = i == form.focused;
        let prefix = if focused {
            format!("{} ", glyph::CURSOR)
        } else {
            "  ".to_string()
        };
        let label_style = if focused {
            theme::cursor()
        } else {
            theme::muted()
        };

        let value = match (&field.value, focused) {
            (FieldValue::Text(text), true) => format!("{}█", text),
            (FieldValue::Choice { .. }, true) => format!("‹ {} ›", field.display()),
            _ => field.display(),
        };
        let value_style = match field.value {
            FieldValue::Toggle(on) => theme::toggle(on),
            _ if focused => theme::text().add_modifier(Modifier::BOLD),
            _ => theme::text(),
        };

        let line = Line::from(vec![
            Span::styled(prefix, label_style),
            Span::styled(
                format!("{:<width$}  ", field.label, width = label_width),
                label_style,
            ),
            Span::styled(value, value_style),
        ]);
        frame.render_widget(
            Paragraph::new(line),
            Rect::new(inner.x, y, inner.width, 1),
        );
    }

    // Hint line for the focused field
    let hint_y = inner.y + form.fields.len() as u16 + 1;
    if let Some(field) = form.fields.get(form.focused) {
        if hint_y < inner.y + inner.height && !field.hint.is_empty() {
            frame.render_widget(
                Paragraph::new(Span::styled(field.hint, theme::muted())),
                Rect::new(inner.x, hint_y, inner.width, 1),
            );
        }
    }

    if let Some(error) = &form.error {
        let error_y = hint_y + 1;
        if error_y < inner.y + inner.height {
            let line = Line::from(vec![
                Span::styled(format!("{} ", glyph::FAIL), theme::fail()),
                Span::styled(error.clone(), theme::fail()),
            ]);
            frame.render_widget(
                Paragraph::new(line).wrap(Wrap { trim: true }),
                Rect::new(inner.x, error_y, inner.width, inner.y + inner.height - error_y),
            );
        }
    }
}

/// Render a y/n confirmation.
fn render_confirm(frame: &mut Frame, area: Rect, prompt: &str) {
    let card_area = centered(area, prompt.chars().count() as u16 + 8, 5);

    frame.render_widget(Clear, card_area);
    let card = Card::new(Span::styled(" Confirm ", theme::heading())).border_style(theme::warn());
    frame.render_widget(card, card_area);

    let inner = Card::inner(card_area);
    let lines = vec![
        Line::from(vec![
            Span::styled(format!("{} ", glyph::WARN), theme::warn()),
            Span::styled(prompt.to_string(), theme::text()),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("y", theme::key()),
            Span::styled(" Confirm   ", theme::muted()),
            Span::styled("n", theme::key()),
            Span::styled(" Cancel", theme::muted()),
        ]),
    ];
    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), inner);
}

/// Render a spinner box naming the pending operation and how long it has run.
pub fn render_pending(frame: &mut Frame, area: Rect, label: &str, elapsed: Option<Duration>) {
    let seconds = elapsed.map(|d| format!("  {}s", d.as_secs())).unwrap_or_default();
    let width = (label.chars().count() + seconds.len()) as u16 + 8;
    let box_area = centered(area, width, 3);

    let tick = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() / 150)
        .unwrap_or(0);
    let spinner = glyph::SPINNER[(tick % glyph::SPINNER.len() as u128) as usize];

    frame.render_widget(Clear, box_area);
    frame.render_widget(Card::empty().border_style(theme::title()), box_area);

    let line = Line::from(vec![
        Span::styled(format!("{} ", spinner), theme::title()),
        Span::styled(label.to_string(), theme::text()),
        Span::styled(seconds, theme::muted()),
    ]);
    let inner = Rect::new(box_area.x + 1, box_area.y + 1, box_area.width.saturating_sub(2), 1);
    frame.render_widget(Paragraph::new(line).alignment(Alignment::Center), inner);
}
