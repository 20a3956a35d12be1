//! # Column Break Corrections
//!
//! Rules applied to a fill result before it is committed. The search itself
//! only knows heights; these rules make the breaks read naturally: no
//! heading left hanging at the foot of a column, ordered lists that keep
//! counting in the next column, no stranded word fragments, and at least
//! one node per column so the layout always terminates.

use crate::config::FlowConfig;
use crate::markup;
use crate::model::ColumnPlacement;

/// Result of a word-level split: accepted and rejected text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextSplit {
    pub added: String,
    pub remaining: String,
}

/// Keep short word runs away from a column break.
///
/// A rejected run shorter than `orphan_length` characters is pulled into the
/// column. Then an accepted run shorter than the threshold is pushed out to
/// the next column whole.
pub fn protect_orphans(split: TextSplit, orphan_length: usize) -> TextSplit {
    let TextSplit {
        mut added,
        mut remaining,
    } = split;

    if remaining.chars().count() < orphan_length {
        added = join_words(&added, &remaining);
        remaining = String::new();
    }
    if added.chars().count() < orphan_length {
        remaining = join_words(&added, &remaining);
        added = String::new();
    }
    TextSplit { added, remaining }
}

fn join_words(first: &str, second: &str) -> String {
    match (first.is_empty(), second.is_empty()) {
        (_, true) => first.to_string(),
        (true, false) => second.to_string(),
        (false, false) => format!("{} {}", first, second),
    }
}

/// Move trailing non-last nodes (headings by default) back to the front of
/// `remaining`. Returns how many nodes moved.
///
/// When the node moved back is the accepted half of a split, it is merged
/// into its other half rather than creating two adjacent fragments.
pub fn hold_back_headings(placement: &mut ColumnPlacement, config: &FlowConfig) -> usize {
    let mut moved = 0;
    while let Some(last) = placement.added.last() {
        if !config.is_non_last(last.tag_name()) {
            break;
        }
        let Some(node) = placement.added.pop() else {
            break;
        };
        if placement.split_boundary {
            if let Some(rest) = placement.remaining.first_mut() {
                let merged = join_words(node.value(), rest.value());
                rest.set_value(&merged);
            }
            placement.split_boundary = false;
        } else {
            placement.remaining.insert(0, node);
        }
        moved += 1;
    }
    moved
}

/// Number the continuation of an ordered list split across the break.
///
/// If the column ends with the first half of an `ol` and the next column
/// starts with its second half, the second half gets `start` set to one
/// past the last item shown. Returns the start value applied.
pub fn continue_ordered_list(placement: &mut ColumnPlacement) -> Option<usize> {
    if !placement.split_boundary {
        return None;
    }
    let list = placement.added.last().filter(|n| n.tag_name() == "ol")?;
    let items = markup::parse(list.value());
    let shown = items
        .iter()
        .rev()
        .take_while(|item| item.tag_name() == "li")
        .count();
    if shown == 0 {
        return None;
    }
    let first = list
        .attribute("start")
        .and_then(|s| s.trim().parse::<usize>().ok())
        .unwrap_or(1);
    let start = first + shown;

    let next = placement.remaining.first_mut().filter(|n| n.tag_name() == "ol")?;
    next.set_attribute("start", &start.to_string());
    Some(start)
}

/// Force progress: a column that accepted nothing takes the next node whole,
/// even if it overflows. Returns true when the guard fired.
pub fn ensure_progress(placement: &mut ColumnPlacement) -> bool {
    if !placement.added.is_empty() || placement.remaining.is_empty() {
        return false;
    }
    let node = placement.remaining.remove(0);
    placement.added.push(node);
    placement.split_boundary = false;
    true
}
