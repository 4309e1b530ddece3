//! `RoundRobinBalancer` — default `Balancer` implementation.

use transport_core::balancer::{Balancer, Channel};

#[derive(Default)]
pub struct RoundRobinBalancer {
    channels: Vec<Channel>,
    cursor: usize,
}

impl RoundRobinBalancer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Balancer for RoundRobinBalancer {
    fn add(&mut self, channel: Channel) {
        self.channels.push(channel);
    }

    fn next(&mut self) -> Option<Channel> {
        if self.channels.is_empty() {
            return None;
        }
        let channel = self.channels[self.cursor];
        self.cursor = (self.cursor + 1) % self.channels.len();
        Some(channel)
    }

    fn len(&self) -> usize {
        self.channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fairness_over_many_rounds() {
        let mut balancer = RoundRobinBalancer::new();
        for i in 0..4 {
            balancer.add(Channel { worker_id: i, ring_fd: i as i32 });
        }
        let mut counts = [0u32; 4];
        for _ in 0..100 {
            let c = balancer.next().unwrap();
            counts[c.worker_id] += 1;
        }
        let min = *counts.iter().min().unwrap();
        let max = *counts.iter().max().unwrap();
        assert!(max - min <= 1);
    }

    #[test]
    fn empty_balancer_yields_none() {
        let mut balancer = RoundRobinBalancer::new();
        assert!(balancer.next().is_none());
    }
}
