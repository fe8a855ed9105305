// preflight_dashboard/src/monitor.rs

//! 话题监视器：根据消息到达时间的有界滑动窗口，给出 "是否存活" 与 "频率多少"。
//!
//! 频率为窗口内相邻到达间隔均值的倒数；样本不足两个、间隔均值为零或
//! 最近一次到达已超过存活超时，频率都为 0，绝不会是 NaN 或无穷大。
//!
//! 周期性的存活检查每隔一个超时周期运行一次：若超时时间内没有新的到达，
//! 窗口被清空。检查执行之前登记的到达都会被计入，
//! 因此一个话题最多被误报为失活一个检查周期，下一条消息到达即自行恢复。

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// 窗口最少保留两个样本，否则无法得到间隔
const MIN_WINDOW_SIZE: usize = 2;

#[derive(Debug, Clone)]
pub struct TopicMonitor {
    window_size: usize,
    liveness_timeout: Duration,
    arrivals: VecDeque<Instant>,
    last_arrival: Option<Instant>,
    next_check: Option<Instant>,
}

impl TopicMonitor {
    pub fn new(window_size: usize, liveness_timeout: Duration) -> Self {
        let window_size = window_size.max(MIN_WINDOW_SIZE);
        Self {
            window_size,
            liveness_timeout,
            arrivals: VecDeque::with_capacity(window_size),
            last_arrival: None,
            next_check: None,
        }
    }

    /// 登记一次消息到达。
    pub fn observe(&mut self, at: Instant) {
        self.arrivals.push_back(at);
        while self.arrivals.len() > self.window_size {
            self.arrivals.pop_front();
        }
        self.last_arrival = Some(match self.last_arrival {
            Some(last) if last > at => last,
            _ => at,
        });
    }

    /// `now` 时刻的频率估计 (Hz)，恒为有限的非负数。
    pub fn rate_at(&self, now: Instant) -> f64 {
        if !self.is_live_at(now) || self.arrivals.len() < 2 {
            return 0.0;
        }
        let (Some(first), Some(last)) = (self.arrivals.front(), self.arrivals.back()) else {
            return 0.0;
        };
        let gaps = (self.arrivals.len() - 1) as f64;
        let mean_gap = last.saturating_duration_since(*first).as_secs_f64() / gaps;
        if mean_gap <= 0.0 || !mean_gap.is_finite() {
            return 0.0;
        }
        let rate = 1.0 / mean_gap;
        if rate.is_finite() {
            rate
        } else {
            0.0
        }
    }

    pub fn current_rate(&self) -> f64 {
        self.rate_at(Instant::now())
    }

    /// 最近一次到达是否仍在超时时间之内。
    pub fn is_live_at(&self, now: Instant) -> bool {
        self.last_arrival
            .map_or(false, |last| now.saturating_duration_since(last) <= self.liveness_timeout)
    }

    pub fn is_live(&self) -> bool {
        self.is_live_at(Instant::now())
    }

    /// 开始周期性存活检查，第一次检查在一个超时周期之后。
    pub fn start(&mut self, now: Instant) {
        self.next_check = Some(now + self.liveness_timeout);
    }

    /// 执行一次存活检查并安排下一次。话题在本次检查中由存活变为失活时返回 `true`。
    pub fn check_liveness(&mut self, now: Instant) -> bool {
        self.next_check = Some(now + self.liveness_timeout);
        if self.is_live_at(now) || self.arrivals.is_empty() {
            return false;
        }
        self.arrivals.clear();
        true
    }

    /// 若检查已到期则执行检查。
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next_check {
            Some(deadline) if deadline <= now => self.check_liveness(now),
            _ => false,
        }
    }

    /// 清空窗口并停止周期性检查。
    pub fn reset(&mut self) {
        self.arrivals.clear();
        self.last_arrival = None;
        self.next_check = None;
    }

    pub fn next_check(&self) -> Option<Instant> {
        self.next_check
    }

    pub fn last_arrival(&self) -> Option<Instant> {
        self.last_arrival
    }

    pub fn sample_count(&self) -> usize {
        self.arrivals.len()
    }

    pub fn liveness_timeout(&self) -> Duration {
        self.liveness_timeout
    }
}
