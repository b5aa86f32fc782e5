use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Paces send attempts so that at most `rate` begin within any rolling
/// one-second window. The first `rate` sends of a batch go out unpaced;
/// after that each acquire waits until the oldest send in the window is a
/// full second old. State lives only for one batch invocation.
pub struct SendPacer {
    rate: usize,
    recent: VecDeque<Instant>,
}

impl SendPacer {
    pub fn new(rate: u32) -> Self {
        let rate = rate.max(1) as usize;
        Self {
            rate,
            recent: VecDeque::with_capacity(rate),
        }
    }

    /// Blocks the calling path until the next send is allowed, then records
    /// the send as begun.
    pub async fn acquire(&mut self) {
        self.prune(Instant::now());
        if self.recent.len() >= self.rate
            && let Some(&oldest) = self.recent.front()
        {
            tokio::time::sleep_until(oldest + Duration::from_secs(1)).await;
            self.prune(Instant::now());
        }
        self.recent.push_back(Instant::now());
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&front) = self.recent.front() {
            if now.duration_since(front) >= Duration::from_secs(1) {
                self.recent.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn burst_up_to_rate_is_unpaced() {
        let mut pacer = SendPacer::new(3);
        let start = Instant::now();
        for _ in 0..3 {
            pacer.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn five_sends_at_two_per_second_take_two_seconds() {
        let mut pacer = SendPacer::new(2);
        let start = Instant::now();
        for _ in 0..5 {
            pacer.acquire().await;
        }
        // ceil(5/2) - 1 seconds of enforced pacing delay.
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_one_spaces_sends_a_second_apart() {
        let mut pacer = SendPacer::new(1);
        let start = Instant::now();
        for _ in 0..4 {
            pacer.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_time_refills_the_window() {
        let mut pacer = SendPacer::new(2);
        pacer.acquire().await;
        pacer.acquire().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        let start = Instant::now();
        pacer.acquire().await;
        pacer.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_rate_is_clamped_to_one() {
        let mut pacer = SendPacer::new(0);
        let start = Instant::now();
        pacer.acquire().await;
        pacer.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }
}
