use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

/// A generic managed-object tree node.
///
/// APIC-style exports describe a fabric as a hierarchy of managed objects.
/// Every object carries its class tag (`fvTenant`, `fvBD`, `l3extOut`, ...),
/// a flat string attribute map, and an ordered list of child objects. The
/// node itself knows nothing about any particular class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoNode {
    /// Managed-object class tag.
    pub class: String,
    /// Object attributes keyed by name.
    pub attributes: BTreeMap<String, String>,
    /// Child objects in document order.
    pub children: Vec<MoNode>,
}

impl MoNode {
    /// Create a new node with no attributes or children.
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Return the attribute value for `name`, if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Return the attribute value for `name` if it is present and non-blank.
    pub fn attr_nonempty(&self, name: &str) -> Option<&str> {
        self.attr(name)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Return the first child with the provided class tag.
    pub fn get_child(&self, class: &str) -> Option<&MoNode> {
        self.children.iter().find(|child| child.class == class)
    }

    /// Return all children with the provided class tag.
    pub fn get_children(&self, class: &str) -> Vec<&MoNode> {
        self.children
            .iter()
            .filter(|child| child.class == class)
            .collect()
    }

    /// Return the first node of the provided class in document order,
    /// searching depth first and including `self`.
    pub fn find_class(&self, class: &str) -> Option<&MoNode> {
        if self.class == class {
            return Some(self);
        }
        self.children
            .iter()
            .find_map(|child| child.find_class(class))
    }

    /// Total number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(MoNode::node_count).sum::<usize>()
    }
}

impl Display for MoNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.class)?;
        for (key, value) in &self.attributes {
            write!(f, " {}=\"{}\"", key, value)?;
        }

        if self.children.is_empty() {
            return write!(f, "/>");
        }

        write!(f, ">")?;
        for child in &self.children {
            write!(f, "{}", child)?;
        }
        write!(f, "</{}>", self.class)
    }
}

#[cfg(test)]
mod tests {
    use super::MoNode;

    #[test]
    fn attr_nonempty_skips_blank_values() {
        let mut node = MoNode::new("fvBD");
        node.attributes.insert("name".to_string(), "bd1".to_string());
        node.attributes.insert("descr".to_string(), "  ".to_string());

        assert_eq!(node.attr_nonempty("name"), Some("bd1"));
        assert_eq!(node.attr_nonempty("descr"), None);
        assert_eq!(node.attr("descr"), Some("  "));
    }

    #[test]
    fn get_children_filters_by_class() {
        let mut tenant = MoNode::new("fvTenant");
        tenant.children.push(MoNode::new("fvCtx"));
        tenant.children.push(MoNode::new("fvBD"));
        tenant.children.push(MoNode::new("fvBD"));

        assert_eq!(tenant.get_children("fvBD").len(), 2);
        assert!(tenant.get_child("fvCtx").is_some());
        assert!(tenant.get_child("vzBrCP").is_none());
        assert_eq!(tenant.node_count(), 4);
    }

    #[test]
    fn find_class_searches_descendants() {
        let mut root = MoNode::new("imdata");
        let mut uni = MoNode::new("polUni");
        let mut tenant = MoNode::new("fvTenant");
        tenant.children.push(MoNode::new("fvBD"));
        uni.children.push(tenant);
        root.children.push(uni);

        assert_eq!(root.find_class("fvBD").map(|n| n.class.as_str()), Some("fvBD"));
        assert_eq!(root.find_class("imdata").map(|n| n.class.as_str()), Some("imdata"));
        assert!(root.find_class("vzBrCP").is_none());
    }
}
