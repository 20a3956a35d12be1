//! # Content Model
//!
//! The unit of pagination is a [`ContentNode`]: one top-level markup element
//! or one run of untagged text. Nested markup is *not* decomposed here. A
//! node's value keeps its children as inline markup, and the fill search
//! re-parses that value lazily, only when it has to look inside a node that
//! straddles a column boundary.
//!
//! Nodes are plain values. Splitting a node across a column break produces
//! two independent nodes sharing the tag name and attributes of the original.

use quick_xml::events::BytesStart;
use serde::Serialize;

/// Elements that never carry content and serialize as `<tag .../>`.
pub const VOID_TAGS: [&str; 3] = ["br", "img", "hr"];

/// An ordered run of nodes in document order.
pub type NodeSequence = Vec<ContentNode>;

/// One markup element or text run at a given nesting boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentNode {
    tag_name: String,
    attributes: String,
    value: String,
    length: usize,
    /// Whitespace separated this node from the previous sibling in the source.
    leading_space: bool,
}

impl ContentNode {
    pub fn new(tag_name: &str, attributes: &str, value: &str) -> Self {
        let mut node = Self {
            tag_name: tag_name.to_ascii_lowercase(),
            attributes: attributes.trim().to_string(),
            ..Default::default()
        };
        node.set_value(value);
        node
    }

    /// An untagged run of text.
    pub fn text(value: &str) -> Self {
        Self::new("", "", value)
    }

    pub(crate) fn with_leading_space(mut self, leading_space: bool) -> Self {
        self.leading_space = leading_space;
        self
    }

    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    pub fn attributes(&self) -> &str {
        &self.attributes
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Character count of the normalized value.
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn has_leading_space(&self) -> bool {
        self.leading_space
    }

    /// Replace the payload. Whitespace runs collapse to one space and both
    /// ends are trimmed, so the stored value is always normalized.
    pub fn set_value(&mut self, value: &str) {
        self.value = normalize_whitespace(value);
        self.length = self.value.chars().count();
    }

    /// A copy of this node carrying a different payload.
    pub fn with_value(&self, value: &str) -> Self {
        let mut node = self.clone();
        node.set_value(value);
        node
    }

    /// Append raw attribute text, e.g. `start="4"`.
    pub fn push_attribute(&mut self, attribute: &str) {
        if !self.attributes.is_empty() {
            self.attributes.push(' ');
        }
        self.attributes.push_str(attribute.trim());
    }

    /// Value of attribute `name`, if present.
    pub fn attribute(&self, name: &str) -> Option<String> {
        attribute_pairs(&self.attributes)
            .into_iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    /// Set attribute `name`, replacing any earlier occurrence.
    pub fn set_attribute(&mut self, name: &str, value: &str) {
        if self.attribute(name).is_none() {
            self.push_attribute(&format!("{name}=\"{value}\""));
            return;
        }
        let mut rebuilt: Vec<String> = attribute_pairs(&self.attributes)
            .into_iter()
            .filter(|(key, _)| !key.eq_ignore_ascii_case(name))
            .map(|(key, value)| format!("{key}=\"{value}\""))
            .collect();
        rebuilt.push(format!("{name}=\"{value}\""));
        self.attributes = rebuilt.join(" ");
    }

    pub fn is_text(&self) -> bool {
        self.tag_name.is_empty()
    }

    pub fn is_void(&self) -> bool {
        VOID_TAGS.contains(&self.tag_name.as_str())
    }

    /// Opening and closing tags that wrap this node's value. Untagged nodes
    /// borrow `default_tag` when one is given and are otherwise unwrapped.
    pub fn wrapping_tags(&self, default_tag: Option<&str>) -> (String, String) {
        match self.effective_tag(default_tag) {
            Some(tag) => (self.open_tag(tag), format!("</{tag}>")),
            None => (String::new(), String::new()),
        }
    }

    /// Serialize back to markup.
    ///
    /// Empty non-void elements without attributes serialize to nothing.
    pub fn to_html(&self, default_tag: Option<&str>) -> String {
        if self.is_void() {
            return if self.attributes.is_empty() {
                format!("<{}/>", self.tag_name)
            } else {
                format!("<{} {}/>", self.tag_name, self.attributes)
            };
        }
        if self.attributes.is_empty() && self.value.is_empty() {
            return String::new();
        }
        match self.effective_tag(default_tag) {
            Some(tag) => format!("{}{}</{}>", self.open_tag(tag), self.value, tag),
            None => self.value.clone(),
        }
    }

    fn effective_tag<'a>(&'a self, default_tag: Option<&'a str>) -> Option<&'a str> {
        if self.tag_name.is_empty() {
            default_tag.filter(|t| !t.is_empty())
        } else {
            Some(&self.tag_name)
        }
    }

    fn open_tag(&self, tag: &str) -> String {
        if self.attributes.is_empty() {
            format!("<{tag}>")
        } else {
            format!("<{tag} {}>", self.attributes)
        }
    }
}

/// Concatenate node markup, restoring the source spacing between siblings.
pub fn serialize(nodes: &[ContentNode], default_tag: Option<&str>) -> String {
    let mut html = String::new();
    for node in nodes {
        let part = node.to_html(default_tag);
        if part.is_empty() {
            continue;
        }
        if node.leading_space && !html.is_empty() {
            html.push(' ');
        }
        html.push_str(&part);
    }
    html
}

/// Parse raw attribute text such as `id="a" start=3 reversed` into
/// key/value pairs. Unquoted and valueless attributes are accepted.
pub fn attribute_pairs(attributes: &str) -> Vec<(String, String)> {
    let content = format!("x {}", attributes.trim());
    let tag = BytesStart::from_content(content.as_str(), 1);
    tag.html_attributes()
        .flatten()
        .map(|attr| {
            (
                String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                String::from_utf8_lossy(&attr.value).into_owned(),
            )
        })
        .collect()
}

/// Collapse every whitespace run to a single space and trim both ends.
pub fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for word in text.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Partition of a node sequence produced by one fill pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnPlacement {
    /// Nodes accepted into the column.
    pub added: NodeSequence,
    /// Nodes left for the following columns.
    pub remaining: NodeSequence,
    /// The last node of `added` and the first of `remaining` are two halves
    /// of one source node.
    pub split_boundary: bool,
}

impl ColumnPlacement {
    pub fn added_chars(&self) -> usize {
        self.added.iter().map(ContentNode::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_is_normalized_on_set() {
        let node = ContentNode::new("P", " class=\"lead\" ", "  Hello \n\t  world  ");
        assert_eq!(node.tag_name(), "p");
        assert_eq!(node.attributes(), "class=\"lead\"");
        assert_eq!(node.value(), "Hello world");
        assert_eq!(node.len(), 11);
    }

    #[test]
    fn renormalizing_is_a_no_op() {
        let mut node = ContentNode::text("a  b   c");
        let once = node.value().to_string();
        node.set_value(&once);
        assert_eq!(node.value(), once);
        assert_eq!(node.len(), once.chars().count());
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let node = ContentNode::text("spalte ø æ å");
        assert_eq!(node.len(), 12);
    }

    #[test]
    fn with_value_is_independent() {
        let original = ContentNode::new("p", "id=\"x\"", "first");
        let mut copy = original.with_value("second");
        copy.push_attribute("start=\"2\"");
        assert_eq!(original.value(), "first");
        assert_eq!(original.attributes(), "id=\"x\"");
        assert_eq!(copy.value(), "second");
        assert_eq!(copy.attributes(), "id=\"x\" start=\"2\"");
    }

    #[test]
    fn set_attribute_replaces_existing_value() {
        let mut list = ContentNode::new("ol", "type=\"a\" start=\"3\"", "<li>x</li>");
        assert_eq!(list.attribute("start").as_deref(), Some("3"));
        list.set_attribute("start", "7");
        assert_eq!(list.attributes(), "type=\"a\" start=\"7\"");

        let mut plain = ContentNode::new("ol", "", "<li>x</li>");
        plain.set_attribute("start", "2");
        assert_eq!(plain.attributes(), "start=\"2\"");
    }

    #[test]
    fn serializes_elements() {
        assert_eq!(ContentNode::new("p", "", "A").to_html(None), "<p>A</p>");
        assert_eq!(
            ContentNode::new("ol", "type=\"a\"", "<li>x</li>").to_html(None),
            "<ol type=\"a\"><li>x</li></ol>"
        );
        assert_eq!(ContentNode::new("br", "", "").to_html(None), "<br/>");
        assert_eq!(
            ContentNode::new("img", "src=\"a.png\"", "").to_html(None),
            "<img src=\"a.png\"/>"
        );
    }

    #[test]
    fn empty_elements_are_suppressed() {
        assert_eq!(ContentNode::new("p", "", "   ").to_html(None), "");
        assert_eq!(
            ContentNode::new("p", "class=\"gap\"", "").to_html(None),
            "<p class=\"gap\"></p>"
        );
    }

    #[test]
    fn text_uses_default_tag_only_when_asked() {
        let node = ContentNode::text("plain");
        assert_eq!(node.to_html(None), "plain");
        assert_eq!(node.to_html(Some("p")), "<p>plain</p>");
        assert_eq!(
            node.wrapping_tags(Some("p")),
            ("<p>".to_string(), "</p>".to_string())
        );
        assert_eq!(node.wrapping_tags(None), (String::new(), String::new()));
    }

    #[test]
    fn serialize_restores_sibling_spacing() {
        let nodes = vec![
            ContentNode::text("Hello"),
            ContentNode::new("b", "", "world").with_leading_space(true),
            ContentNode::text("again").with_leading_space(true),
            ContentNode::text("!"),
        ];
        assert_eq!(serialize(&nodes, None), "Hello <b>world</b> again!");
    }
}
