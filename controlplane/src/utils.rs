use std::cmp::Ordering;

// Compares two collections ignoring their order.
//
// Both sides are stably sorted by `key` and then compared element-wise with
// `eq`. Collections of different lengths never match.
pub fn unordered_eq<T, K, E>(
    left: &[T],
    right: &[T],
    key: for<'a> fn(&'a T) -> &'a K,
    eq: E,
) -> bool
where
    K: Ord + ?Sized,
    E: Fn(&T, &T) -> bool,
{
    if left.len() != right.len() {
        return false;
    }

    let by_key = |a: &&T, b: &&T| -> Ordering { key(*a).cmp(key(*b)) };
    let mut left_sorted: Vec<&T> = left.iter().collect();
    left_sorted.sort_by(by_key);
    let mut right_sorted: Vec<&T> = right.iter().collect();
    right_sorted.sort_by(by_key);

    left_sorted
        .iter()
        .zip(right_sorted.iter())
        .all(|(l, r)| eq(*l, *r))
}
