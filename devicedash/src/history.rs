//! Small utilities to manage bounded history buffers for charts.

use std::collections::VecDeque;

use crate::types::Stats;

pub fn push_capped<T>(dq: &mut VecDeque<T>, v: T, cap: usize) {
    if dq.len() == cap {
        dq.pop_front();
    }
    dq.push_back(v);
}

// Online/error counts per stats sample, for the fleet activity sparklines
pub struct ActivityHistory {
    pub online: VecDeque<u64>,
    pub errors: VecDeque<u64>,
    last: Option<Stats>,
    cap: usize,
}

impl ActivityHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            online: VecDeque::with_capacity(cap),
            errors: VecDeque::with_capacity(cap),
            last: None,
            cap,
        }
    }

    pub fn push(&mut self, s: &Stats) {
        push_capped(&mut self.online, s.online_devices as u64, self.cap);
        push_capped(&mut self.errors, s.error_devices as u64, self.cap);
        self.last = Some(*s);
    }

    pub fn latest(&self) -> Option<&Stats> {
        self.last.as_ref()
    }

    pub fn peak_online(&self) -> u64 {
        self.online.iter().copied().max().unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.online.clear();
        self.errors.clear();
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_capped_drops_oldest() {
        let mut dq = VecDeque::new();
        for v in 0..5 {
            push_capped(&mut dq, v, 3);
        }
        assert_eq!(dq, VecDeque::from(vec![2, 3, 4]));
    }

    #[test]
    fn activity_tracks_online_and_errors() {
        let mut h = ActivityHistory::new(2);
        let s = |online, error| Stats {
            total_devices: 10,
            online_devices: online,
            offline_devices: 0,
            error_devices: error,
        };
        h.push(&s(4, 1));
        h.push(&s(7, 0));
        h.push(&s(5, 2));
        assert_eq!(h.online, VecDeque::from(vec![7, 5]));
        assert_eq!(h.errors, VecDeque::from(vec![0, 2]));
        assert_eq!(h.peak_online(), 7);
        assert_eq!(h.latest().map(|x| x.online_devices), Some(5));
        h.clear();
        assert!(h.latest().is_none());
    }
}
