//! # Column-Fill Search
//!
//! Decides how much of the unplaced content fits into one column.
//!
//! ## How a column is filled
//!
//! 1. Whole nodes first. Starting at a hint (roughly how many nodes the
//!    previous columns took), serialize the prefix `nodes[..=i]`, measure it
//!    and step `i` up while it fits and down while it overflows. The search
//!    stops as soon as the direction reverses. This is a single-step hill
//!    climb, not a bisection: the hint is usually within a node or two of
//!    the answer, so it costs a handful of measurements.
//! 2. Then the boundary node. The first node that did not fit is opened up:
//!    its value is re-parsed into sub-nodes and the search recurses into
//!    them, with the already accepted markup and the node's own tags as
//!    context so every measurement sees the whole column. A node that holds
//!    only text is split word by word instead.
//!
//! List items, table rows and block containers are never opened; a column
//! boundary falls before or after them.
//!
//! Measurement is delegated to a [`Measure`] oracle. The search only ever
//! compares a measured height with the budget.

pub mod column_break;

use log::trace;

use crate::config::FlowConfig;
use crate::markup;
use crate::measure::Measure;
use crate::model::{serialize, ColumnPlacement, ContentNode, NodeSequence};

pub use column_break::TextSplit;

/// Which way the hill climb moves after a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// The probe fit: try one more.
    Grow,
    /// The probe overflowed: try one less.
    Shrink,
}

impl Direction {
    fn step(self) -> isize {
        match self {
            Direction::Grow => 1,
            Direction::Shrink => -1,
        }
    }
}

/// Markup surrounding the fragment under test: content already accepted
/// into the column, plus the open/close tags of every ancestor being split.
#[derive(Debug, Clone, Default)]
struct SplitContext {
    existing: String,
    prefix: String,
    suffix: String,
}

impl SplitContext {
    fn wrap(&self, html: &str) -> String {
        format!("{}{}{}{}", self.existing, self.prefix, html, self.suffix)
    }

    /// Context for the children of a node opened by `open`/`close`, after
    /// `accepted` siblings have already been placed.
    fn descend(&self, accepted: &str, open: &str, close: &str) -> SplitContext {
        SplitContext {
            existing: format!("{}{}{}", self.existing, self.prefix, accepted),
            prefix: open.to_string(),
            suffix: format!("{}{}", close, self.suffix),
        }
    }
}

/// Fills one column against a height budget.
pub struct ColumnFiller<'a> {
    oracle: &'a dyn Measure,
    config: &'a FlowConfig,
    budget: f64,
    column_width: f64,
}

impl<'a> ColumnFiller<'a> {
    pub fn new(
        oracle: &'a dyn Measure,
        config: &'a FlowConfig,
        budget: f64,
        column_width: f64,
    ) -> Self {
        Self {
            oracle,
            config,
            budget,
            column_width,
        }
    }

    /// Split `nodes` into what fits this column and what is left over.
    ///
    /// `start_hint` is the node count to test first. The result may end
    /// with a partial node whose complement heads `remaining`.
    pub fn fill(&self, nodes: NodeSequence, start_hint: usize) -> ColumnPlacement {
        self.fill_within(
            nodes,
            start_hint,
            self.config.measuring_tag(),
            &SplitContext::default(),
        )
    }

    fn fill_within(
        &self,
        mut nodes: NodeSequence,
        start_hint: usize,
        default_tag: Option<&str>,
        context: &SplitContext,
    ) -> ColumnPlacement {
        if nodes.is_empty() {
            return ColumnPlacement::default();
        }
        let len = nodes.len();
        let start = start_hint.min(len - 1) as isize;

        let (mut test, direction) = hill_climb(len, start, |i| {
            self.probe(&context.wrap(&serialize(&nodes[..=i], default_tag)))
        });
        test = test.max(-1);
        // The final probe grew past a fit into an overflow: drop that node.
        if direction == Some(Direction::Grow) && test != len as isize {
            test -= 1;
        }

        let split_at = ((test + 1).max(0) as usize).min(len);
        let remaining = nodes.split_off(split_at);
        let mut placement = ColumnPlacement {
            added: nodes,
            remaining,
            split_boundary: false,
        };
        self.split_boundary(&mut placement, default_tag, context);
        placement
    }

    /// Try to move part of the first rejected node into the column.
    fn split_boundary(
        &self,
        placement: &mut ColumnPlacement,
        default_tag: Option<&str>,
        context: &SplitContext,
    ) {
        let Some(head) = placement.remaining.first() else {
            return;
        };
        if self.config.is_non_split(head.tag_name()) || head.is_void() {
            return;
        }

        let mut accepted = serialize(&placement.added, None);
        // `serialize` separates the two halves with a space when committing.
        if head.has_leading_space() && !accepted.is_empty() {
            accepted.push(' ');
        }
        let (open, close) = head.wrapping_tags(default_tag);
        let inner = context.descend(&accepted, &open, &close);
        let sub_nodes = markup::parse(head.value());

        let (added_value, remaining_value) = if sub_nodes.len() == 1 && sub_nodes[0].is_text() {
            let split =
                self.fill_text(&sub_nodes[0], &inner.existing, &inner.prefix, &inner.suffix);
            if split.added.trim().is_empty() {
                return;
            }
            (split.added, split.remaining)
        } else {
            let nested = self.fill_within(sub_nodes, 0, None, &inner);
            if nested.added.is_empty() {
                return;
            }
            (
                serialize(&nested.added, None),
                serialize(&nested.remaining, None),
            )
        };

        trace!(
            target: "colflow::layout",
            "split <{}> at {} of {} chars",
            head.tag_name(),
            added_value.chars().count(),
            head.len()
        );
        let partial = head.with_value(&added_value);
        placement.added.push(partial);
        placement.remaining[0].set_value(&remaining_value);
        if placement.remaining[0].is_empty() {
            placement.remaining.remove(0);
        } else {
            placement.split_boundary = true;
        }
    }

    /// Word-level search inside a text-only node.
    ///
    /// `existing` is markup already accepted into the column; `prefix` and
    /// `suffix` are the tags the text sits inside.
    pub fn fill_text(
        &self,
        node: &ContentNode,
        existing: &str,
        prefix: &str,
        suffix: &str,
    ) -> TextSplit {
        let words: Vec<&str> = if node.is_empty() {
            Vec::new()
        } else {
            node.value().split(' ').collect()
        };
        if words.is_empty() {
            return TextSplit::default();
        }

        // Scale the word count by the share of the column still free.
        let existing_height = self.oracle.measure_height(existing, self.column_width);
        let full_height = self
            .oracle
            .measure_height(&format!("{}{}{}", prefix, node.value(), suffix), self.column_width);
        let fraction = (self.budget - existing_height) / full_height;
        let start = if fraction.is_finite() && fraction < 1.0 {
            ((words.len() as f64 * fraction).floor().max(0.0) as usize).min(words.len() - 1)
        } else {
            0
        };

        // Cut positions run from 0 to words.len() inclusive.
        let positions = words.len() + 1;
        let (mut test, direction) = hill_climb(positions, start as isize, |i| {
            self.probe(&format!("{}{}{}{}", existing, prefix, words[..i].join(" "), suffix))
        });
        test = test.max(0);
        if direction == Some(Direction::Grow) && test != positions as isize {
            test -= 1;
        }
        let cut = (test.max(0) as usize).min(words.len());

        let split = TextSplit {
            added: words[..cut].join(" "),
            remaining: words[cut..].join(" "),
        };
        if self.config.protect_against_orphans {
            column_break::protect_orphans(split, self.config.orphan_length)
        } else {
            split
        }
    }

    fn probe(&self, html: &str) -> Direction {
        let height = self.oracle.measure_height(html, self.column_width);
        trace!(
            target: "colflow::layout",
            "probe {} chars: {:.1} / {:.1}",
            html.len(),
            height,
            self.budget
        );
        if height > self.budget {
            Direction::Shrink
        } else {
            Direction::Grow
        }
    }
}

/// Step an index through `[0, len)` one unit at a time until the measured
/// direction reverses or the index leaves the range. Returns the index after
/// the last step and the last direction taken.
fn hill_climb(
    len: usize,
    start: isize,
    mut probe_at: impl FnMut(usize) -> Direction,
) -> (isize, Option<Direction>) {
    let mut test = start;
    let mut previous: Option<Direction> = None;
    let mut direction: Option<Direction> = None;
    while test >= 0 && (test as usize) < len && (previous.is_none() || direction == previous) {
        previous = direction;
        let next = probe_at(test as usize);
        direction = Some(next);
        test += next.step();
    }
    (test, direction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Height = number of visible characters, tags excluded.
    fn text_height(html: &str, _width: f64) -> f64 {
        let mut inside = false;
        let mut count = 0;
        for c in html.chars() {
            match c {
                '<' => inside = true,
                '>' => inside = false,
                _ if !inside => count += 1,
                _ => {}
            }
        }
        count as f64
    }

    fn config(protect: bool) -> FlowConfig {
        FlowConfig {
            protect_against_orphans: protect,
            orphan_length: 10,
            ..Default::default()
        }
    }

    fn paragraphs(texts: &[&str]) -> NodeSequence {
        texts.iter().map(|t| ContentNode::new("p", "", t)).collect()
    }

    fn values(nodes: &[ContentNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.value()).collect()
    }

    fn fits_below_four(i: usize) -> Direction {
        if i < 4 {
            Direction::Grow
        } else {
            Direction::Shrink
        }
    }

    #[test]
    fn hill_climb_grows_until_overflow() {
        let (test, dir) = hill_climb(10, 0, fits_below_four);
        assert_eq!((test, dir), (3, Some(Direction::Shrink)));
    }

    #[test]
    fn hill_climb_shrinks_until_fit() {
        let (test, dir) = hill_climb(10, 8, fits_below_four);
        assert_eq!((test, dir), (4, Some(Direction::Grow)));
    }

    #[test]
    fn hill_climb_runs_off_the_end() {
        let (test, dir) = hill_climb(3, 0, |_| Direction::Grow);
        assert_eq!((test, dir), (3, Some(Direction::Grow)));
        let (test, dir) = hill_climb(3, 0, |_| Direction::Shrink);
        assert_eq!((test, dir), (-1, Some(Direction::Shrink)));
    }

    #[test]
    fn everything_fits() {
        let config = config(false);
        let filler = ColumnFiller::new(&text_height, &config, 100.0, 100.0);
        let placement = filler.fill(paragraphs(&["aaaa", "bbbb", "cccc"]), 0);
        assert_eq!(placement.added.len(), 3);
        assert!(placement.remaining.is_empty());
    }

    #[test]
    fn whole_nodes_stop_at_budget() {
        let config = FlowConfig {
            non_split_tags: vec!["p".to_string()],
            ..config(false)
        };
        let filler = ColumnFiller::new(&text_height, &config, 10.0, 100.0);
        let placement = filler.fill(paragraphs(&["aaaa", "bbbb", "cccc"]), 0);
        assert_eq!(values(&placement.added), vec!["aaaa", "bbbb"]);
        assert_eq!(values(&placement.remaining), vec!["cccc"]);
    }

    #[test]
    fn high_hint_shrinks_back() {
        let config = FlowConfig {
            non_split_tags: vec!["p".to_string()],
            ..config(false)
        };
        let filler = ColumnFiller::new(&text_height, &config, 10.0, 100.0);
        let placement = filler.fill(paragraphs(&["aaaa", "bbbb", "cccc", "dddd"]), 3);
        assert_eq!(values(&placement.added), vec!["aaaa", "bbbb"]);
        assert_eq!(placement.remaining.len(), 2);
    }

    #[test]
    fn boundary_paragraph_splits_by_words() {
        let config = config(false);
        let filler = ColumnFiller::new(&text_height, &config, 20.0, 100.0);
        // "aaaa" (4) + 15 chars of words fit in 20.
        let placement = filler.fill(paragraphs(&["aaaa", "one two three four five six"]), 0);
        assert_eq!(values(&placement.added), vec!["aaaa", "one two three"]);
        assert_eq!(values(&placement.remaining), vec!["four five six"]);
        assert!(placement.split_boundary);
        assert_eq!(placement.added[1].tag_name(), "p");
    }

    #[test]
    fn nested_list_splits_between_items() {
        let config = config(false);
        let filler = ColumnFiller::new(&text_height, &config, 10.0, 100.0);
        let list = ContentNode::new(
            "ul",
            "",
            "<li>one</li><li>two</li><li>three</li><li>four</li>",
        );
        let placement = filler.fill(vec![list], 0);
        assert_eq!(values(&placement.added), vec!["<li>one</li><li>two</li>"]);
        assert_eq!(
            values(&placement.remaining),
            vec!["<li>three</li><li>four</li>"]
        );
        assert_eq!(placement.remaining[0].tag_name(), "ul");
    }

    #[test]
    fn inline_boundary_keeps_sibling_space_while_measuring() {
        let config = config(false);
        let filler = ColumnFiller::new(&text_height, &config, 10.0, 100.0);
        let nodes = markup::parse("<p>xx <i>aa bb cc dd</i></p>");
        let placement = filler.fill(nodes, 0);
        let committed = serialize(&placement.added, None);
        assert_eq!(committed, "<p>xx <i>aa bb</i></p>");
        assert!(text_height(&committed, 100.0) <= 10.0);
        assert_eq!(values(&placement.remaining), vec!["<i>cc dd</i>"]);
    }

    #[test]
    fn stray_angle_bracket_survives_a_split() {
        let config = config(false);
        // A bare `<` is text here, not the start of a tag.
        let oracle = |html: &str, w: f64| text_height(&html.replace("< ", "# "), w);
        let filler = ColumnFiller::new(&oracle, &config, 9.0, 100.0);
        let placement = filler.fill(paragraphs(&["a < b cc dd ee"]), 0);
        assert_eq!(values(&placement.added), vec!["a < b cc"]);
        assert_eq!(values(&placement.remaining), vec!["dd ee"]);
    }

    #[test]
    fn non_split_tags_move_whole() {
        let config = config(false);
        let filler = ColumnFiller::new(&text_height, &config, 10.0, 100.0);
        let nodes = vec![
            ContentNode::new("p", "", "aaaa"),
            ContentNode::new("div", "", "bbbbbbbbbbbbbbbb"),
        ];
        let placement = filler.fill(nodes, 0);
        assert_eq!(values(&placement.added), vec!["aaaa"]);
        assert_eq!(values(&placement.remaining), vec!["bbbbbbbbbbbbbbbb"]);
        assert!(!placement.split_boundary);
    }

    #[test]
    fn oversized_first_node_is_not_accepted() {
        let config = FlowConfig {
            non_split_tags: vec!["p".to_string()],
            ..config(false)
        };
        let filler = ColumnFiller::new(&text_height, &config, 3.0, 100.0);
        let placement = filler.fill(paragraphs(&["aaaaaaa", "b"]), 0);
        assert!(placement.added.is_empty());
        assert_eq!(placement.remaining.len(), 2);
    }

    #[test]
    fn untagged_text_is_measured_as_paragraph() {
        let config = config(false);
        let seen = std::cell::RefCell::new(Vec::new());
        let oracle = |html: &str, w: f64| {
            seen.borrow_mut().push(html.to_string());
            text_height(html, w)
        };
        let filler = ColumnFiller::new(&oracle, &config, 100.0, 100.0);
        filler.fill(vec![ContentNode::text("loose")], 0);
        assert_eq!(seen.borrow()[0], "<p>loose</p>");
    }

    #[test]
    fn text_split_conserves_words() {
        let config = config(false);
        let filler = ColumnFiller::new(&text_height, &config, 12.0, 100.0);
        let node = ContentNode::text("alpha beta gamma delta epsilon");
        let split = filler.fill_text(&node, "", "<p>", "</p>");
        assert_eq!(split.added, "alpha beta");
        assert_eq!(
            format!("{} {}", split.added, split.remaining),
            "alpha beta gamma delta epsilon"
        );
    }

    #[test]
    fn text_split_accounts_for_existing_content() {
        let config = config(false);
        let filler = ColumnFiller::new(&text_height, &config, 12.0, 100.0);
        let node = ContentNode::text("alpha beta gamma");
        let split = filler.fill_text(&node, "<p>xxxxxx</p>", "<p>", "</p>");
        assert_eq!(split.added, "alpha");
        assert_eq!(split.remaining, "beta gamma");
    }

    #[test]
    fn text_split_with_orphan_protection() {
        let config = config(true);
        let filler = ColumnFiller::new(&text_height, &config, 14.0, 100.0);
        // "aaaa bbbb cccc" fits; the 4-char rest is an orphan and is pulled in.
        let node = ContentNode::text("aaaa bbbb cccc dddd");
        let split = filler.fill_text(&node, "", "", "");
        assert_eq!(split.added, "aaaa bbbb cccc dddd");
        assert_eq!(split.remaining, "");
    }

    #[test]
    fn ratio_estimate_saves_measurements() {
        let config = config(false);
        let calls = Cell::new(0);
        let oracle = |html: &str, w: f64| {
            calls.set(calls.get() + 1);
            text_height(html, w)
        };
        let filler = ColumnFiller::new(&oracle, &config, 200.0, 100.0);
        let text: Vec<String> = (0..100).map(|i| format!("w{:03}", i)).collect();
        let node = ContentNode::text(&text.join(" "));
        let split = filler.fill_text(&node, "", "", "");
        assert_eq!(split.added.split(' ').count(), 40);
        assert!(calls.get() < 10, "took {} measurements", calls.get());
    }
}
