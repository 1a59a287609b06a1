//! Progress logging for long encode runs.

use std::time::Instant;

use tracing::info;

pub struct EncodeProgress {
    interval: usize,
    records: usize,
    next_log: usize,
    started: Instant,
}

impl EncodeProgress {
    pub fn new(interval: usize) -> Self {
        let interval = interval.max(1);
        Self {
            interval,
            records: 0,
            next_log: interval,
            started: Instant::now(),
        }
    }

    /// Count `n` more records; logs each time an interval boundary is crossed.
    pub fn advance(&mut self, n: usize) {
        self.records += n;
        if self.records >= self.next_log {
            let elapsed = self.started.elapsed().as_secs_f64();
            let rate = if elapsed > 0.0 {
                self.records as f64 / elapsed
            } else {
                0.0
            };
            info!(
                records = self.records,
                records_per_sec = rate.round() as u64,
                "encode progress"
            );
            while self.next_log <= self.records {
                self.next_log += self.interval;
            }
        }
    }

    pub fn records(&self) -> usize {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_records() {
        let mut p = EncodeProgress::new(10);
        p.advance(4);
        p.advance(15);
        assert_eq!(p.records(), 19);
        assert_eq!(p.next_log, 20);
    }
}
