//! Card widget with rounded corners.
//!
//! Provides a lazygit-style card component with:
//! - Rounded corners (╭╮╰╯)
//! - Optional title
//! - Optional item count on the right of the title bar

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    symbols::border::ROUNDED,
    text::Span,
    widgets::Widget,
};

use crate::ui::theme;

/// A card widget with rounded corners.
pub struct Card<'a> {
    /// Title displayed in the top border.
    title: Option<Span<'a>>,
    /// Border style.
    border_style: Style,
    /// Optional item count displayed on the right side of title bar.
    item_count: Option<usize>,
}

impl<'a> Card<'a> {
    /// Create a simple card with a title.
    pub fn new(title: impl Into<Span<'a>>) -> Self {
        Self {
            title: Some(title.into()),
            border_style: theme::frame(false),
            item_count: None,
        }
    }

    /// Create an empty card without a title.
    pub fn empty() -> Self {
        Self {
            title: None,
            border_style: theme::frame(false),
            item_count: None,
        }
    }

    /// Set whether this card is focused.
    pub fn focused(mut self, focused: bool) -> Self {
        self.border_style = theme::frame(focused);
        self
    }

    /// Set custom border style.
    pub fn border_style(mut self, style: Style) -> Self {
        self.border_style = style;
        self
    }

    /// Set item count to display.
    pub fn item_count(mut self, count: usize) -> Self {
        self.item_count = Some(count);
        self
    }

    /// Area inside the border with one column of padding on each side.
    pub fn inner(area: Rect) -> Rect {
        Rect::new(
            area.x + 2,
            area.y + 1,
            area.width.saturating_sub(4),
            area.height.saturating_sub(2),
        )
    }
}

impl Widget for Card<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width < 2 || area.height < 2 {
            return;
        }

        let border_style = self.border_style;
        let right = area.x + area.width - 1;
        let bottom = area.y + area.height - 1;

        // Corners
        buf.set_string(area.x, area.y, ROUNDED.top_left, border_style);
        buf.set_string(right, area.y, ROUNDED.top_right, border_style);
        buf.set_string(area.x, bottom, ROUNDED.bottom_left, border_style);
        buf.set_string(right, bottom, ROUNDED.bottom_right, border_style);

        for x in (area.x + 1)..right {
            buf.set_string(x, area.y, ROUNDED.horizontal_top, border_style);
            buf.set_string(x, bottom, ROUNDED.horizontal_bottom, border_style);
        }

        for y in (area.y + 1)..bottom {
            buf.set_string(area.x, y, ROUNDED.vertical_left, border_style);
            buf.set_string(right, y, ROUNDED.vertical_right, border_style);
        }

        if let Some(title) = self.title {
            let title_str = format!(" {} ", title.content.trim());
            let title_width = title_str.chars().count() as u16;
            if title_width <= area.width.saturating_sub(4) {
                buf.set_string(area.x + 1, area.y, &title_str, title.style);
            }
        }

        if let Some(count) = self.item_count {
            let count_str = format!(" {} items ", count);
            let count_width = count_str.len() as u16;
            if count_width + 2 < area.width {
                let count_x = area.x + area.width.saturating_sub(count_width + 1);
                buf.set_string(count_x, area.y, &count_str, theme::muted());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_draws_title_and_count() {
        let area = Rect::new(0, 0, 30, 4);
        let mut buf = Buffer::empty(area);
        Card::new("Ports").item_count(3).render(area, &mut buf);

        let top: String = (0..area.width)
            .map(|x| buf[(x, 0)].symbol().to_string())
            .collect();
        assert!(top.starts_with("╭ Ports "));
        assert!(top.contains(" 3 items "));
        assert!(top.ends_with('╮'));
    }

    #[test]
    fn test_tiny_area_is_ignored() {
        let area = Rect::new(0, 0, 1, 1);
        let mut buf = Buffer::empty(area);
        Card::empty().render(area, &mut buf);
        assert_eq!(buf[(0, 0)].symbol(), " ");
    }
}
