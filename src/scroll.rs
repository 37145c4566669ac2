//! Scrolls the wrapped message lines through the LCD rows.
//!
//! Messages that fit are drawn from the first line every time. Longer ones
//! move up one line per scroll step, and the cursor runs through every line
//! (not just `lines - rows` positions), so the tail of the message scrolls
//! off the top before it starts over.

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScrollEngine {
    cursor: usize,
}

impl ScrollEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Start again from the first line; called whenever the message changes.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// One scroll step: return the window of lines to draw and advance.
    ///
    /// The window holds at most `rows` lines and stops early when the
    /// message runs out.
    pub fn step<'a, S: AsRef<str>>(&mut self, lines: &'a [S], rows: usize) -> Vec<&'a str> {
        if lines.len() < rows {
            self.cursor = 0;
            return lines.iter().map(S::as_ref).collect();
        }

        let window = lines
            .iter()
            .skip(self.cursor)
            .take(rows)
            .map(S::as_ref)
            .collect();

        self.cursor += 1;
        if self.cursor >= lines.len() {
            self.cursor = 0;
        }

        window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn lines(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("line {i}")).collect()
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(3)]
    fn short_messages_never_scroll(#[case] count: usize) {
        let lines = lines(count);
        let mut engine = ScrollEngine::new();
        for _ in 0..10 {
            let window = engine.step(&lines, 4);
            assert_eq!(window.len(), count);
            assert_eq!(engine.cursor(), 0);
        }
    }

    #[rstest]
    #[case(4)]
    #[case(5)]
    #[case(12)]
    fn full_cycle_returns_cursor_to_zero(#[case] count: usize) {
        let lines = lines(count);
        let mut engine = ScrollEngine::new();
        for step in 0..count {
            assert_eq!(engine.cursor(), step);
            engine.step(&lines, 4);
        }
        assert_eq!(engine.cursor(), 0);
    }

    #[test]
    fn tail_scrolls_off_before_restart() {
        let lines = lines(6);
        let mut engine = ScrollEngine::new();
        let windows: Vec<Vec<&str>> = (0..7).map(|_| engine.step(&lines, 4)).collect();

        assert_eq!(windows[0], vec!["line 0", "line 1", "line 2", "line 3"]);
        assert_eq!(windows[2], vec!["line 2", "line 3", "line 4", "line 5"]);
        assert_eq!(windows[4], vec!["line 4", "line 5"]);
        assert_eq!(windows[5], vec!["line 5"]);
        assert_eq!(windows[6], windows[0]);
    }

    #[test]
    fn reset_starts_from_the_top() {
        let lines = lines(8);
        let mut engine = ScrollEngine::new();
        engine.step(&lines, 4);
        engine.step(&lines, 4);
        engine.reset();
        assert_eq!(engine.step(&lines, 4)[0], "line 0");
    }
}
