use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::PathBuf;

/// Deficit round robin over weight buckets.
///
/// Buckets accrue credit equal to their weight when the rotation enters
/// them and spend one credit per dequeued job, so a bucket with weight 10
/// drains ten jobs for every one a weight-1 bucket drains. The scheduler
/// owns only cursor and deficits; the bucket contents are rebuilt from the
/// live queue listing on every selection.
#[derive(Debug)]
pub struct DrrScheduler {
    order: Vec<String>,
    deficits: HashMap<String, u64>,
    cursor: usize,
}

impl DrrScheduler {
    pub fn new(weights: &BTreeMap<String, u64>) -> Self {
        let order = Self::key_order(weights);
        // Start on the last bucket so the first selection begins by
        // entering (and crediting) the first bucket in the rotation.
        let cursor = order.len().saturating_sub(1);
        Self {
            order,
            deficits: HashMap::new(),
            cursor,
        }
    }

    /// Rotation order: the non-default weight keys in sorted order, with
    /// `default` always at the end.
    pub fn key_order(weights: &BTreeMap<String, u64>) -> Vec<String> {
        let mut order: Vec<String> = weights.keys().filter(|k| *k != "default").cloned().collect();
        order.push("default".to_string());
        order
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Selects the next job. A full rotation without a serviceable bucket
    /// re-seeds every deficit to its weight and tries once more; if that
    /// rotation also comes up empty there is nothing to schedule.
    pub fn select(
        &mut self,
        buckets: &mut BTreeMap<String, VecDeque<PathBuf>>,
        weights: &BTreeMap<String, u64>,
    ) -> Option<PathBuf> {
        if self.order.is_empty() {
            return None;
        }
        for attempt in 0..2 {
            if attempt == 1 {
                for key in &self.order {
                    self.deficits.insert(key.clone(), weight_of(weights, key));
                }
            }
            let mut advanced = 0usize;
            loop {
                let key = self.order[self.cursor].clone();
                let has_jobs = buckets.get(&key).is_some_and(|jobs| !jobs.is_empty());
                if has_jobs {
                    let deficit = self.deficits.entry(key.clone()).or_insert(0);
                    if *deficit >= 1 {
                        *deficit -= 1;
                        return buckets.get_mut(&key).and_then(VecDeque::pop_front);
                    }
                } else {
                    // An idle bucket must not bank credit while it has
                    // nothing to spend it on.
                    self.deficits.insert(key, 0);
                }
                if advanced >= self.order.len() {
                    break;
                }
                self.cursor = (self.cursor + 1) % self.order.len();
                let entered = self.order[self.cursor].clone();
                *self.deficits.entry(entered.clone()).or_insert(0) += weight_of(weights, &entered);
                advanced += 1;
            }
        }
        None
    }
}

fn weight_of(weights: &BTreeMap<String, u64>, key: &str) -> u64 {
    weights
        .get(key)
        .copied()
        .unwrap_or(u64::from(key == "default"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(pairs: &[(&str, u64)]) -> BTreeMap<String, u64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn full_buckets(weights: &BTreeMap<String, u64>, per_key: usize) -> BTreeMap<String, VecDeque<PathBuf>> {
        weights
            .keys()
            .map(|key| {
                let jobs = (0..per_key)
                    .map(|i| PathBuf::from(format!("{key}_job_{i}.txt")))
                    .collect();
                (key.clone(), jobs)
            })
            .collect()
    }

    fn count_selections(
        scheduler: &mut DrrScheduler,
        weights: &BTreeMap<String, u64>,
        rounds: usize,
    ) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for _ in 0..rounds {
            // Queue listings are rebuilt per tick, so refill every round.
            let mut buckets = full_buckets(weights, 5);
            let Some(job) = scheduler.select(&mut buckets, weights) else {
                break;
            };
            let name = job.file_name().unwrap().to_string_lossy().into_owned();
            let key = name.split("_job_").next().unwrap().to_string();
            *counts.entry(key).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn default_ends_the_rotation() {
        let weights = weights(&[("background", 6), ("default", 10), ("test", 1)]);
        assert_eq!(
            DrrScheduler::key_order(&weights),
            vec!["background".to_string(), "test".to_string(), "default".to_string()]
        );
    }

    #[test]
    fn high_weight_bucket_dominates_proportionally() {
        let weights = weights(&[("background", 6), ("default", 10), ("test", 1)]);
        let mut scheduler = DrrScheduler::new(&weights);
        let counts = count_selections(&mut scheduler, &weights, 200);

        let default_count = counts.get("default").copied().unwrap_or(0);
        let test_count = counts.get("test").copied().unwrap_or(0);
        let background_count = counts.get("background").copied().unwrap_or(0);
        assert!(
            default_count > test_count * 5,
            "default must dominate test by more than 5x, got default={default_count} test={test_count}"
        );
        assert!(background_count >= test_count);
    }

    #[test]
    fn empty_bucket_does_not_bank_credit() {
        let weights = weights(&[("burst", 50), ("default", 1)]);
        let mut scheduler = DrrScheduler::new(&weights);

        // Many rounds with the burst bucket empty.
        for _ in 0..20 {
            let mut buckets = BTreeMap::new();
            buckets.insert(
                "default".to_string(),
                VecDeque::from([PathBuf::from("default_job_0.txt")]),
            );
            let picked = scheduler.select(&mut buckets, &weights).expect("job");
            assert_eq!(picked, PathBuf::from("default_job_0.txt"));
        }

        // Once burst jobs appear they get at most one weight's worth of
        // service before default is reached again.
        let mut burst_before_default = 0;
        loop {
            let mut buckets = full_buckets(&weights, 100);
            let picked = scheduler.select(&mut buckets, &weights).expect("job");
            if picked.to_string_lossy().starts_with("burst") {
                burst_before_default += 1;
            } else {
                break;
            }
        }
        assert!(
            burst_before_default <= 50,
            "stale credit must not accumulate, got {burst_before_default}"
        );
    }

    #[test]
    fn zero_weight_bucket_starves() {
        let weights = weights(&[("muted", 0), ("default", 2)]);
        let mut scheduler = DrrScheduler::new(&weights);
        for _ in 0..10 {
            let mut buckets = full_buckets(&weights, 3);
            let picked = scheduler.select(&mut buckets, &weights).expect("job");
            assert!(picked.to_string_lossy().starts_with("default"));
        }
    }

    #[test]
    fn all_empty_returns_none() {
        let weights = weights(&[("default", 10)]);
        let mut scheduler = DrrScheduler::new(&weights);
        let mut buckets = BTreeMap::new();
        assert!(scheduler.select(&mut buckets, &weights).is_none());
    }
}
