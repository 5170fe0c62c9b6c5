use std::time::{SystemTime, UNIX_EPOCH};

/// Clock used to timestamp statistics produced inside the controller
pub trait Timer: Send + Sync {
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Clone, Default)]
pub struct SystemTimer();

impl Timer for SystemTimer {
    fn now_ms(&self) -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::{SystemTimer, Timer};

    #[test]
    fn system_timer_moves_forward() {
        let timer = SystemTimer();
        let first = timer.now_ms();
        assert!(first > 0);
        assert!(timer.now_ms() >= first);
    }
}
