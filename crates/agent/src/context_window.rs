//! Rolling context window over the chat history.
//!
//! Grows by one per appended message; once it exceeds `max_context` it
//! snaps back to `fit_context`. Only a bound is computed, the history itself
//! is never touched.

use parley_config::ContextConfig;

#[derive(Debug, Clone)]
pub struct ContextWindow {
    max: usize,
    fit: usize,
    n: usize,
}

impl ContextWindow {
    /// Window for a history that already holds `loaded` messages.
    pub fn new(config: &ContextConfig, loaded: usize) -> Self {
        Self {
            max: config.max_context,
            fit: config.fit_context,
            n: loaded.min(config.fit_context),
        }
    }

    pub fn on_append(&mut self) {
        self.n += 1;
        if self.n > self.max {
            self.n = self.fit;
        }
    }

    /// Current window size.
    pub fn size(&self) -> usize {
        self.n
    }

    /// How many of the newest `history_len` messages to show the model.
    pub fn bound(&self, history_len: usize) -> usize {
        self.n.min(history_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max: usize, fit: usize) -> ContextConfig {
        ContextConfig {
            max_context: max,
            fit_context: fit,
        }
    }

    #[test]
    fn resets_to_fit_after_exceeding_max() {
        let mut window = ContextWindow::new(&config(6, 3), 0);
        let sizes: Vec<usize> = (0..7)
            .map(|_| {
                window.on_append();
                window.size()
            })
            .collect();
        assert_eq!(sizes, vec![1, 2, 3, 4, 5, 6, 3]);
    }

    #[test]
    fn never_exceeds_max() {
        let mut window = ContextWindow::new(&config(5, 2), 0);
        for _ in 0..100 {
            window.on_append();
            assert!(window.size() <= 5);
            assert!(window.size() >= 1);
        }
    }

    #[test]
    fn startup_size_is_capped_by_fit() {
        assert_eq!(ContextWindow::new(&config(40, 20), 500).size(), 20);
        assert_eq!(ContextWindow::new(&config(40, 20), 7).size(), 7);
    }

    #[test]
    fn bound_never_exceeds_history() {
        let mut window = ContextWindow::new(&config(10, 4), 0);
        for _ in 0..4 {
            window.on_append();
        }
        assert_eq!(window.bound(2), 2);
        assert_eq!(window.bound(100), 4);
    }
}
