//! Brace-matching parser producing the tree of `{...}` references.
//!
//! The tree is an arena: nodes are appended when their closing brace is
//! found, which makes arena order a post-order walk (every child precedes its
//! parent) and leaves the root as the final node.

/// Character opening a reference.
pub const LEFT_DELIMITER: u8 = b'{';
/// Character closing a reference.
pub const RIGHT_DELIMITER: u8 = b'}';
/// Character suppressing brace matching for the next byte.
pub const ESCAPE: u8 = b'\\';

/// Index of a node inside a [`TemplateTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// Returns the raw arena index.
    pub fn index(self) -> usize {
        self.0
    }
}

/// One matched `{...}` group, or the root spanning the whole source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateNode {
    left: usize,
    right: usize,
    root: bool,
    children: Vec<NodeId>,
}

impl TemplateNode {
    /// Byte range covered by the node. For a group this includes both braces;
    /// for the root it is the entire source.
    pub fn span(&self) -> std::ops::Range<usize> {
        if self.root {
            self.left..self.right
        } else {
            self.left..self.right + 1
        }
    }

    /// Returns true for the root node.
    pub fn is_root(&self) -> bool {
        self.root
    }

    /// Nested groups directly inside this node, ordered by position.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Parsed reference structure of one template string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateTree {
    nodes: Vec<TemplateNode>,
}

impl TemplateTree {
    /// Returns the root node identifier.
    pub fn root(&self) -> NodeId {
        NodeId(self.nodes.len() - 1)
    }

    /// Returns the node stored under `id`.
    pub fn node(&self, id: NodeId) -> &TemplateNode {
        &self.nodes[id.0]
    }

    /// Iterates node identifiers children-first, ending with the root.
    pub fn post_order(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Number of nodes including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A tree always holds its root, so it is never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns true when the source contains at least one matched group.
    pub fn has_references(&self) -> bool {
        self.nodes.len() > 1
    }
}

/// Parses `source` into a [`TemplateTree`].
///
/// Never fails: unbalanced closing braces are literal text, and groups still
/// open at a newline or at the end of input are dropped while the groups that
/// completed inside them move up to the root.
pub fn parse_template(source: &str) -> TemplateTree {
    let mut nodes: Vec<TemplateNode> = Vec::new();
    let mut open: Vec<usize> = Vec::new();
    let mut frames: Vec<Vec<NodeId>> = Vec::new();
    let mut root_children: Vec<NodeId> = Vec::new();
    let mut escaped = false;

    // Delimiters are ASCII, so scanning bytes never splits a multi-byte char
    // at a position we act on.
    for (idx, byte) in source.bytes().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            ESCAPE => escaped = true,
            LEFT_DELIMITER => {
                open.push(idx);
                frames.push(Vec::new());
            }
            RIGHT_DELIMITER => {
                let (Some(left), Some(children)) = (open.pop(), frames.pop()) else {
                    continue;
                };
                let id = NodeId(nodes.len());
                nodes.push(TemplateNode {
                    left,
                    right: idx,
                    root: false,
                    children,
                });
                match frames.last_mut() {
                    Some(frame) => frame.push(id),
                    None => root_children.push(id),
                }
            }
            b'\n' => {
                open.clear();
                for frame in frames.drain(..) {
                    root_children.extend(frame);
                }
            }
            _ => {}
        }
    }
    for frame in frames.drain(..) {
        root_children.extend(frame);
    }
    root_children.sort_by_key(|id| nodes[id.0].left);

    nodes.push(TemplateNode {
        left: 0,
        right: source.len(),
        root: true,
        children: root_children,
    });
    TemplateTree { nodes }
}

/// Removes the escape character in front of literal braces.
pub fn unescape_braces(text: &str) -> String {
    text.replace("\\{", "{").replace("\\}", "}")
}
