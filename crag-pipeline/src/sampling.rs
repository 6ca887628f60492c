use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Options for [`stratified_sample`].
#[derive(Debug, Clone)]
pub struct SampleOptions {
    /// Total number of rows wanted.
    pub target: usize,
    /// Seed for row selection and the final shuffle.
    pub seed: u64,
    /// Give every category at least one row when the target allows it.
    pub ensure_each_category: bool,
    /// Shuffle the combined sample instead of keeping it grouped by category.
    pub shuffle: bool,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            target: 12_000,
            seed: 42,
            ensure_each_category: true,
            shuffle: true,
        }
    }
}

/// Rows planned for one category.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub category: String,
    pub available: usize,
    /// Exact proportional share `target * available / total`.
    pub quota: f64,
    pub take: usize,
}

/// Split `target` rows across categories in proportion to their counts.
///
/// Uses largest remainder rounding, so the takes sum to `min(target, total)`
/// and each take is the floor or ceiling of its exact quota. A category is
/// never asked for more rows than it has. Returned in descending order of
/// available rows, ties by name.
pub fn allocate(
    counts: &BTreeMap<String, usize>,
    target: usize,
    ensure_each_category: bool,
) -> Vec<Allocation> {
    let total: usize = counts.values().sum();
    let mut plan: Vec<Allocation> = counts
        .iter()
        .filter(|(_, &n)| n > 0)
        .map(|(category, &available)| Allocation {
            category: category.clone(),
            available,
            quota: if total == 0 {
                0.0
            } else {
                target as f64 * available as f64 / total as f64
            },
            take: 0,
        })
        .collect();
    plan.sort_by(|a, b| b.available.cmp(&a.available).then_with(|| a.category.cmp(&b.category)));

    if total == 0 || target == 0 {
        return plan;
    }
    if target >= total {
        for a in &mut plan {
            a.take = a.available;
        }
        return plan;
    }

    // Integer arithmetic keeps floors and remainders exact.
    let mut remainders: Vec<(usize, u128)> = Vec::with_capacity(plan.len());
    for (i, a) in plan.iter_mut().enumerate() {
        let scaled = target as u128 * a.available as u128;
        a.take = (scaled / total as u128) as usize;
        remainders.push((i, scaled % total as u128));
    }
    let assigned: usize = plan.iter().map(|a| a.take).sum();
    let mut leftover = target - assigned;

    // Plan is already ordered by size then name, a stable sort keeps that as the tie-break.
    remainders.sort_by(|a, b| b.1.cmp(&a.1));
    for (i, remainder) in remainders {
        if leftover == 0 || remainder == 0 {
            break;
        }
        plan[i].take += 1;
        leftover -= 1;
    }

    if ensure_each_category && target >= plan.len() {
        for i in 0..plan.len() {
            if plan[i].take > 0 {
                continue;
            }
            let donor = plan
                .iter()
                .enumerate()
                .filter(|(j, a)| *j != i && a.take > 1)
                .max_by(|(_, a), (_, b)| a.take.cmp(&b.take).then_with(|| b.category.cmp(&a.category)))
                .map(|(j, _)| j);
            if let Some(j) = donor {
                plan[j].take -= 1;
                plan[i].take = 1;
            }
        }
    }

    plan
}

/// Draw a sample whose per-category proportions follow the source.
///
/// `key` extracts the grouping key. Rows are chosen without replacement with
/// a seeded generator, so the same seed and input always give the same
/// sample. Categories smaller than their share are kept whole.
pub fn stratified_sample<T, F>(items: &[T], key: F, options: &SampleOptions) -> (Vec<T>, Vec<Allocation>)
where
    T: Clone,
    F: Fn(&T) -> &str,
{
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, item) in items.iter().enumerate() {
        groups.entry(key(item).to_string()).or_default().push(i);
    }
    let counts: BTreeMap<String, usize> = groups.iter().map(|(k, v)| (k.clone(), v.len())).collect();
    let plan = allocate(&counts, options.target, options.ensure_each_category);

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut sample: Vec<T> = Vec::with_capacity(plan.iter().map(|a| a.take).sum());

    for (category, members) in &groups {
        let take = plan
            .iter()
            .find(|a| &a.category == category)
            .map_or(0, |a| a.take.min(members.len()));
        if take == 0 {
            continue;
        }
        let mut picked: Vec<usize> = if take == members.len() {
            members.clone()
        } else {
            rand::seq::index::sample(&mut rng, members.len(), take)
                .into_vec()
                .into_iter()
                .map(|i| members[i])
                .collect()
        };
        picked.sort_unstable();
        sample.extend(picked.into_iter().map(|i| items[i].clone()));

        tracing::debug!(category = %category, available = members.len(), take, "Sampled category");
    }

    if options.shuffle {
        sample.shuffle(&mut rng);
    }

    (sample, plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(pairs: &[(&str, usize)]) -> BTreeMap<String, usize> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn take_of(plan: &[Allocation], category: &str) -> usize {
        plan.iter().find(|a| a.category == category).map_or(0, |a| a.take)
    }

    #[test]
    fn allocation_sums_to_target() {
        let plan = allocate(&counts(&[("a", 500), ("b", 300), ("c", 199), ("d", 1)]), 97, false);
        assert_eq!(plan.iter().map(|a| a.take).sum::<usize>(), 97);
        for a in &plan {
            assert!((a.take as f64 - a.quota).abs() < 1.0, "{a:?}");
        }
    }

    #[test]
    fn largest_remainder_gets_the_extra_row() {
        // quotas 12.6 and 7.4
        let plan = allocate(&counts(&[("a", 63), ("b", 37)]), 20, true);
        assert_eq!(take_of(&plan, "a"), 13);
        assert_eq!(take_of(&plan, "b"), 7);
        assert_eq!(plan[0].category, "a");
    }

    #[test]
    fn small_category_gets_one_row_when_requested() {
        let c = counts(&[("big", 990), ("tiny", 10)]);
        let strict = allocate(&c, 20, false);
        assert_eq!(take_of(&strict, "tiny"), 0);
        assert_eq!(take_of(&strict, "big"), 20);

        let fair = allocate(&c, 20, true);
        assert_eq!(take_of(&fair, "tiny"), 1);
        assert_eq!(take_of(&fair, "big"), 19);
    }

    #[test]
    fn target_above_total_keeps_everything() {
        let plan = allocate(&counts(&[("a", 3), ("b", 2)]), 50, true);
        assert_eq!(take_of(&plan, "a"), 3);
        assert_eq!(take_of(&plan, "b"), 2);
    }

    #[test]
    fn zero_target_and_empty_input() {
        let plan = allocate(&counts(&[("a", 3)]), 0, true);
        assert_eq!(take_of(&plan, "a"), 0);
        assert!(allocate(&BTreeMap::new(), 10, true).is_empty());

        let items: Vec<(String, u32)> = Vec::new();
        let (sample, plan) = stratified_sample(&items, |i| i.0.as_str(), &SampleOptions::default());
        assert!(sample.is_empty());
        assert!(plan.is_empty());
    }

    #[test]
    fn sample_is_deterministic_for_a_seed() {
        let items: Vec<(String, u32)> = (0..200)
            .map(|i| (if i % 4 == 0 { "x" } else { "y" }.to_string(), i))
            .collect();
        let opts = SampleOptions { target: 40, ..SampleOptions::default() };
        let (first, _) = stratified_sample(&items, |i| i.0.as_str(), &opts);
        let (second, _) = stratified_sample(&items, |i| i.0.as_str(), &opts);
        assert_eq!(first, second);

        let other = SampleOptions { seed: 7, ..opts };
        let (third, _) = stratified_sample(&items, |i| i.0.as_str(), &other);
        assert_ne!(first, third);
    }

    #[test]
    fn sample_draws_without_replacement() {
        let items: Vec<(String, u32)> = (0..50).map(|i| ("only".to_string(), i)).collect();
        let opts = SampleOptions { target: 30, shuffle: false, ..SampleOptions::default() };
        let (sample, _) = stratified_sample(&items, |i| i.0.as_str(), &opts);
        let mut ids: Vec<u32> = sample.iter().map(|i| i.1).collect();
        assert_eq!(ids.len(), 30);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        ids.dedup();
        assert_eq!(ids.len(), 30);
    }
}
