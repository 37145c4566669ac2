//! Character LCD abstraction.
//!
//! The physical HD44780 wiring is outside this crate; the device only needs
//! a grid of character cells it can clear and write into.

/// A fixed grid of character cells.
pub trait CharDisplay: Send {
    fn clear(&mut self);

    /// Write `text` starting at `(row, col)`. Characters past the last column
    /// are clipped, and an out-of-range row is ignored.
    fn write_at(&mut self, row: usize, col: usize, text: &str);

    /// Blank one row.
    fn clear_row(&mut self, row: usize);
}

/// An in-memory LCD. Every change is logged at `debug` so a headless run
/// still shows what the panel would display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LcdBuffer {
    cols: usize,
    cells: Vec<Vec<char>>,
}

impl LcdBuffer {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            cells: vec![vec![' '; cols]; rows],
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.cells.len()
    }

    /// The visible rows, trailing blanks trimmed.
    pub fn snapshot(&self) -> Vec<String> {
        self.cells
            .iter()
            .map(|row| row.iter().collect::<String>().trim_end().to_string())
            .collect()
    }

    pub fn row(&self, row: usize) -> Option<String> {
        self.snapshot().into_iter().nth(row)
    }

    fn log_row(&self, row: usize) {
        if let Some(cells) = self.cells.get(row) {
            tracing::debug!("lcd[{row}] |{}|", cells.iter().collect::<String>());
        }
    }
}

impl CharDisplay for LcdBuffer {
    fn clear(&mut self) {
        for row in &mut self.cells {
            row.fill(' ');
        }
        tracing::debug!("lcd cleared");
    }

    fn write_at(&mut self, row: usize, col: usize, text: &str) {
        let Some(cells) = self.cells.get_mut(row) else {
            return;
        };
        for (cell, c) in cells.iter_mut().skip(col).zip(text.chars()) {
            *cell = c;
        }
        self.log_row(row);
    }

    fn clear_row(&mut self, row: usize) {
        if let Some(cells) = self.cells.get_mut(row) {
            cells.fill(' ');
        }
        self.log_row(row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn new_buffer_is_blank() {
        let lcd = LcdBuffer::new(20, 4);
        assert_eq!(lcd.snapshot(), vec![""; 4]);
        assert_eq!(lcd.cols(), 20);
        assert_eq!(lcd.rows(), 4);
    }

    #[test]
    fn write_clips_at_last_column() {
        let mut lcd = LcdBuffer::new(5, 2);
        lcd.write_at(1, 2, "abcdef");
        assert_eq!(lcd.row(1).unwrap(), "  abc");
    }

    #[test]
    fn write_to_missing_row_is_ignored() {
        let mut lcd = LcdBuffer::new(5, 2);
        lcd.write_at(7, 0, "abc");
        assert_eq!(lcd.snapshot(), vec!["", ""]);
    }

    #[test]
    fn clear_row_leaves_others() {
        let mut lcd = LcdBuffer::new(8, 2);
        lcd.write_at(0, 0, "top");
        lcd.write_at(1, 0, "bottom");
        lcd.clear_row(1);
        assert_eq!(lcd.snapshot(), vec!["top", ""]);
        lcd.clear();
        assert_eq!(lcd.snapshot(), vec!["", ""]);
    }
}
