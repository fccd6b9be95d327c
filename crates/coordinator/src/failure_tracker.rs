use std::collections::BTreeMap;

use dashmap::DashMap;
use tracing::{info, warn};

use psmaster_core::{MasterResult, PsFailureReporter, PsId};

/// 汇总其他进程对PS失败的间接观测
///
/// 只做计数和阈值告警；是否据此重启PS由外部的PS管理方决定。
#[derive(Debug)]
pub struct PsFailureTracker {
    suspect_threshold: u64,
    counts: DashMap<PsId, u64>,
}

impl PsFailureTracker {
    pub fn new(suspect_threshold: u64) -> Self {
        Self {
            suspect_threshold,
            counts: DashMap::new(),
        }
    }

    pub fn failure_count(&self, ps: PsId) -> u64 {
        self.counts.get(&ps).map(|c| *c).unwrap_or(0)
    }

    /// 累计失败观测达到阈值的PS（升序）
    pub fn suspects(&self) -> Vec<PsId> {
        let mut suspects: Vec<PsId> = self
            .counts
            .iter()
            .filter(|entry| *entry.value() >= self.suspect_threshold)
            .map(|entry| *entry.key())
            .collect();
        suspects.sort();
        suspects
    }

    /// PS重新启动后清零
    pub fn reset(&self, ps: PsId) {
        if self.counts.remove(&ps).is_some() {
            info!("清除 {} 的失败观测计数", ps);
        }
    }
}

impl PsFailureReporter for PsFailureTracker {
    fn report_failures(&self, reporter: &str, counters: &BTreeMap<PsId, u32>) -> MasterResult<()> {
        for (ps, count) in counters {
            let mut total = self.counts.entry(*ps).or_insert(0);
            let before = *total;
            *total += u64::from(*count);

            if before < self.suspect_threshold && *total >= self.suspect_threshold {
                warn!(
                    "{} 的失败观测累计达到 {} 次 (最近上报方: {})",
                    ps, *total, reporter
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_accumulate_across_reporters() {
        let tracker = PsFailureTracker::new(3);
        let mut counters = BTreeMap::new();
        counters.insert(PsId(1), 2);
        counters.insert(PsId(2), 1);

        tracker.report_failures("worker_0_0_attempt_0", &counters).unwrap();
        assert!(tracker.suspects().is_empty());

        tracker.report_failures("ps_agent_0_attempt_0", &counters).unwrap();
        assert_eq!(tracker.failure_count(PsId(1)), 4);
        assert_eq!(tracker.suspects(), vec![PsId(1)]);

        tracker.reset(PsId(1));
        assert_eq!(tracker.failure_count(PsId(1)), 0);
        assert!(tracker.suspects().is_empty());
    }
}
