/// Frame clock fed by animation-frame timestamps (milliseconds)
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameClock {
    last_ms: Option<f64>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds since the previous call; 0 on the first call and for
    /// timestamps that go backwards
    pub fn delta(&mut self, now_ms: f64) -> f32 {
        let delta = match self.last_ms {
            Some(last) => ((now_ms - last) / 1000.0).max(0.0) as f32,
            None => 0.0,
        };
        self.last_ms = Some(now_ms);
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    #[test]
    #[wasm_bindgen_test]
    fn test_first_delta_is_zero() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.delta(1234.0), 0.0);
        assert!((clock.delta(1250.0) - 0.016).abs() < 1e-6);
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_backwards_time_clamps() {
        let mut clock = FrameClock::new();
        clock.delta(500.0);
        assert_eq!(clock.delta(400.0), 0.0);
        assert_eq!(clock.delta(900.0), 0.5);
    }
}
