use std::time::Duration;

use tokio::time::Instant;

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Deadline of the next repeating timer callback. Ticks that were missed, for example while the
/// process was suspended, are collapsed into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticker {
    next: Instant,
    period: Duration,
}

impl Ticker {
    pub fn starting_at(now: Instant, period: Duration) -> Self {
        Self {
            next: now + period,
            period,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.next
    }

    pub fn advance(&mut self, now: Instant) {
        self.next += self.period;
        if self.next <= now {
            self.next = now + self.period;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::Ticker;

    #[test]
    fn test_advance_skips_missed_ticks() {
        let start = Instant::now();
        let mut ticker = Ticker::starting_at(start, Duration::from_secs(1));
        assert_eq!(ticker.deadline(), start + Duration::from_secs(1));

        ticker.advance(start + Duration::from_secs(1));
        assert_eq!(ticker.deadline(), start + Duration::from_secs(2));

        ticker.advance(start + Duration::from_secs(30));
        assert_eq!(ticker.deadline(), start + Duration::from_secs(31));
    }
}
