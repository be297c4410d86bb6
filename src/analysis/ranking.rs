//! Top-N selection of the slowest summaries.

use super::summary::Summary;
use std::cmp::Ordering;

/// Display count used when none (or a non-positive one) is configured.
pub const DEFAULT_DISPLAY_COUNT: usize = 20;

/// Coerce a configured display count: anything below 1 becomes the default.
pub fn display_count(requested: i64) -> usize {
    if requested <= 0 {
        DEFAULT_DISPLAY_COUNT
    } else {
        usize::try_from(requested).unwrap_or(usize::MAX)
    }
}

/// Slowest first by average duration, then ascending id.
pub fn compare(a: &Summary, b: &Summary) -> Ordering {
    b.average_duration()
        .cmp(&a.average_duration())
        .then_with(|| a.id.cmp(&b.id))
}

/// The `count` slowest summaries with `order` set to their 1-based rank.
/// A count of zero means [`DEFAULT_DISPLAY_COUNT`].
pub fn rank<'a, I>(summaries: I, count: usize) -> Vec<Summary>
where
    I: IntoIterator<Item = &'a Summary>,
{
    let count = if count == 0 { DEFAULT_DISPLAY_COUNT } else { count };
    let mut ranked: Vec<&Summary> = summaries.into_iter().collect();
    ranked.sort_by(|a, b| compare(a, b));
    ranked.truncate(count);
    number(ranked)
}

/// Every child of `senior_id`, ranked, for drill-down lists.
pub fn children_of<'a, I>(summaries: I, senior_id: &str) -> Vec<Summary>
where
    I: IntoIterator<Item = &'a Summary>,
{
    let mut children: Vec<&Summary> = summaries
        .into_iter()
        .filter(|s| s.senior_id.as_deref() == Some(senior_id))
        .collect();
    children.sort_by(|a, b| compare(a, b));
    number(children)
}

fn number(sorted: Vec<&Summary>) -> Vec<Summary> {
    sorted
        .into_iter()
        .zip(1u32..)
        .map(|(s, order)| {
            let mut s = s.clone();
            s.order = order;
            s
        })
        .collect()
}
