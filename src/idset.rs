// Identifier set helpers used by the reconciliation step. Both functions keep
// the caller's ordering so progress output follows the input file.

use std::collections::HashSet;
use std::hash::Hash;

/// Remove repeated items, keeping the first occurrence of each.
pub fn deduplicate<T>(items: impl IntoIterator<Item = T>) -> Vec<T>
where
    T: Eq + Hash + Clone,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Elements of `a` that do not appear anywhere in `b`, in the order of `a`.
pub fn difference<'b, T>(a: &[T], b: impl IntoIterator<Item = &'b T>) -> Vec<T>
where
    T: Eq + Hash + Clone + 'b,
{
    let exclude: HashSet<&T> = b.into_iter().collect();
    a.iter()
        .filter(|item| !exclude.contains(item))
        .cloned()
        .collect()
}
