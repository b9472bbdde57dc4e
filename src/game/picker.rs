pub trait QuestionPicker {
    /// Returns an index in `0..len`. Never called with `len == 0`.
    fn pick_index(&mut self, len: usize) -> usize;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngPicker;

impl ThreadRngPicker {
    pub fn new() -> Self {
        Self
    }
}

impl QuestionPicker for ThreadRngPicker {
    fn pick_index(&mut self, len: usize) -> usize {
        use rand::Rng;
        // ThreadRng is !Send and must not be held inside a session
        rand::rng().random_range(0..len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_rng_picker_stays_in_bounds() {
        let mut picker = ThreadRngPicker::new();

        for _ in 0..100 {
            let index = picker.pick_index(10);
            assert!(index < 10);
        }

        // Only one choice available
        assert_eq!(picker.pick_index(1), 0);
    }
}
