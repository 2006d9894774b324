//! Single-line text input used for the reply box and the search filter.

use ratatui::{
    layout::{Position, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthStr;

/// Height of an input box: border + text line + border.
pub const INPUT_HEIGHT: u16 = 3;

#[derive(Default)]
pub struct LineInput {
    pub text: String,
    /// Cursor position (character offset into `text`).
    pub cursor_pos: usize,
}

impl LineInput {
    /// Start editing with `text`, cursor at the end.
    pub fn with_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            cursor_pos: text.chars().count(),
        }
    }

    pub fn insert_char(&mut self, c: char) {
        let byte_pos = self.char_to_byte(self.cursor_pos);
        self.text.insert(byte_pos, c);
        self.cursor_pos += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor_pos > 0 {
            let byte_pos = self.char_to_byte(self.cursor_pos);
            let prev_byte_pos = self.char_to_byte(self.cursor_pos - 1);
            self.text.drain(prev_byte_pos..byte_pos);
            self.cursor_pos -= 1;
        }
    }

    pub fn delete(&mut self) {
        if self.cursor_pos < self.text.chars().count() {
            let byte_pos = self.char_to_byte(self.cursor_pos);
            let next_byte_pos = self.char_to_byte(self.cursor_pos + 1);
            self.text.drain(byte_pos..next_byte_pos);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor_pos = self.cursor_pos.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor_pos < self.text.chars().count() {
            self.cursor_pos += 1;
        }
    }

    pub fn move_home(&mut self) {
        self.cursor_pos = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor_pos = self.text.chars().count();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor_pos = 0;
    }

    fn char_to_byte(&self, char_pos: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.text.len())
    }

    /// Display width of the text before the cursor.
    fn cursor_column(&self) -> u16 {
        let before = &self.text[..self.char_to_byte(self.cursor_pos)];
        UnicodeWidthStr::width(before) as u16
    }
}

/// Render an input box titled `title`, placing the terminal cursor when focused.
pub fn render(area: Rect, frame: &mut Frame, input: &LineInput, title: &str, placeholder: &str, focused: bool) {
    let border_style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(if focused {
            BorderType::Double
        } else {
            BorderType::Plain
        })
        .border_style(border_style)
        .title(format!(" {} ", title));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let line = if input.text.is_empty() && !focused {
        Line::from(Span::styled(placeholder, Style::default().fg(Color::DarkGray)))
    } else {
        Line::from(input.text.as_str())
    };

    // Keep the cursor visible on long input by scrolling horizontally.
    let column = input.cursor_column();
    let scroll = column.saturating_sub(inner.width.saturating_sub(1));
    frame.render_widget(Paragraph::new(line).scroll((0, scroll)), inner);

    if focused {
        frame.set_cursor_position(Position::new(inner.x + column - scroll, inner.y));
    }
}
