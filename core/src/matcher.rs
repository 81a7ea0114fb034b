//! Combination matching
//!
//! A selection matches a resource when it holds exactly the same element
//! ids as the required combination, compared as multisets. Order never
//! matters, duplicates always do.

use forage_types::ElementId;

/// Returns true iff `selected` is a permutation of `required`.
///
/// Fails closed on a length mismatch. An empty requirement only matches an
/// empty selection.
pub fn matches(required: &[ElementId], selected: &[ElementId]) -> bool {
    if required.len() != selected.len() {
        return false;
    }

    let mut required: Vec<&ElementId> = required.iter().collect();
    let mut selected: Vec<&ElementId> = selected.iter().collect();
    required.sort_unstable();
    selected.sort_unstable();

    required == selected
}
