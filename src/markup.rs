//! # Tree Builder
//!
//! Turns a markup string into a flat sequence of top-level [`ContentNode`]s.
//!
//! This is deliberately not an HTML parser. It scans tag boundaries, tracks
//! nesting depth and cuts the input only where depth returns to zero. Nested
//! elements stay inside their parent's value as raw markup. Unbalanced input
//! never fails: depth may drift and the result is simply less tidy.

use log::trace;

use crate::model::{normalize_whitespace, ContentNode, NodeSequence, VOID_TAGS};

/// Parse markup into top-level nodes.
pub fn parse(markup: &str) -> NodeSequence {
    let normalized = normalize(markup);
    let mut builder = TreeBuilder::default();
    for shard in normalized.split('<') {
        builder.feed(shard);
    }
    let nodes = builder.finish();
    trace!(target: "colflow::markup", "parsed {} top-level nodes", nodes.len());
    nodes
}

/// Rewrite void elements to self-closing form and collapse whitespace.
///
/// `<br>`, `<hr class="x">` and `<img src="a.png">` become `<br/>`,
/// `<hr class="x"/>` and `<img src="a.png"/>`. Newlines and tabs become
/// spaces, and whitespace runs collapse to one space.
pub fn normalize(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len() + 16);
    let mut rest = markup;
    while let Some(lt) = rest.find('<') {
        out.push_str(&rest[..lt]);
        let tag = &rest[lt + 1..];
        match tag.find('>') {
            Some(gt) if is_void_tag(&tag[..gt]) => {
                let inner = tag[..gt].trim_end();
                out.push('<');
                out.push_str(inner);
                if !inner.ends_with('/') {
                    out.push('/');
                }
                out.push('>');
                rest = &tag[gt + 1..];
            }
            _ => {
                out.push('<');
                rest = tag;
            }
        }
    }
    out.push_str(rest);
    collapse_whitespace(&out)
}

fn is_void_tag(inner: &str) -> bool {
    let name_end = inner
        .find(|c: char| c.is_whitespace() || c == '/')
        .unwrap_or(inner.len());
    let name = &inner[..name_end];
    VOID_TAGS.iter().any(|v| v.eq_ignore_ascii_case(name))
}

/// Like [`normalize_whitespace`] but keeps a single space at either end.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Split a tag head like `a href="x"` into `("a", "href=\"x\"")`.
fn split_tag_head(head: &str) -> (&str, &str) {
    let head = head.trim();
    match head.find(' ') {
        Some(space) => (&head[..space], head[space + 1..].trim()),
        None => (head, ""),
    }
}

/// The node being accumulated while scanning.
#[derive(Debug, Default)]
struct PendingNode {
    tag_name: String,
    attributes: String,
    raw: String,
}

impl PendingNode {
    fn is_blank(&self) -> bool {
        self.tag_name.is_empty() && self.raw.trim().is_empty()
    }
}

#[derive(Debug, Default)]
struct TreeBuilder {
    nodes: NodeSequence,
    depth: i32,
    pending: PendingNode,
    /// At least one shard was fed, so the next one followed a `<`.
    started: bool,
    /// Whitespace was seen between the last emitted node and the next one.
    gap: bool,
}

impl TreeBuilder {
    fn feed(&mut self, shard: &str) {
        let mut shard = shard;
        let mut after_lt = std::mem::replace(&mut self.started, true);
        loop {
            if shard.trim().is_empty() {
                if !shard.is_empty() && self.depth <= 0 && self.pending.is_blank() {
                    self.gap = true;
                }
                return;
            }

            let Some(gt) = shard.find('>') else {
                if after_lt {
                    // A stray `<`: keep it as text.
                    self.push_raw(shard);
                    return;
                }
                // Plain text with no tag boundary ends the current node.
                self.pending.raw.push_str(shard);
                self.flush();
                return;
            };

            if shard.starts_with('/') {
                self.depth -= 1;
                if self.depth == 0 {
                    self.flush();
                    self.pending.raw.push_str(&shard[gt + 1..]);
                } else {
                    self.push_raw(shard);
                }
                return;
            }

            if shard[..gt].ends_with('/') {
                if self.depth != 0 {
                    self.push_raw(shard);
                    return;
                }
                self.flush();
                let (name, attributes) = split_tag_head(&shard[..gt - 1]);
                let node = ContentNode::new(name, attributes, "").with_leading_space(self.gap);
                self.nodes.push(node);
                self.gap = false;
                // Whatever follows the void element is scanned as a new shard.
                shard = &shard[gt + 1..];
                after_lt = false;
                continue;
            }

            if self.depth == 0 {
                self.flush();
                let (name, attributes) = split_tag_head(&shard[..gt]);
                self.pending.tag_name = name.to_ascii_lowercase();
                self.pending.attributes = attributes.to_string();
                self.pending.raw.push_str(&shard[gt + 1..]);
            } else {
                self.push_raw(shard);
            }
            self.depth += 1;
            return;
        }
    }

    fn push_raw(&mut self, shard: &str) {
        self.pending.raw.push('<');
        self.pending.raw.push_str(shard);
    }

    /// Emit the pending node, unless it is untagged blank text.
    fn flush(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        if pending.is_blank() {
            if !pending.raw.is_empty() {
                self.gap = true;
            }
            return;
        }
        let node = if pending.tag_name.is_empty() {
            let leading = self.gap || pending.raw.starts_with(char::is_whitespace);
            self.gap = pending.raw.ends_with(char::is_whitespace);
            ContentNode::text(&pending.raw).with_leading_space(leading)
        } else {
            let leading = self.gap;
            self.gap = false;
            ContentNode::new(&pending.tag_name, &pending.attributes, &pending.raw)
                .with_leading_space(leading)
        };
        self.nodes.push(node);
    }

    fn finish(mut self) -> NodeSequence {
        if !normalize_whitespace(&self.pending.raw).is_empty() || !self.pending.tag_name.is_empty()
        {
            self.flush();
        }
        self.nodes
    }
}
