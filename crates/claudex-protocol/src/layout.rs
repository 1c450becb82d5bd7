use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitDirection {
    Horizontal,
    Vertical,
}

/// Wire form of a session's pane layout tree: a leaf names a pane id, a
/// split always has exactly two children (the tree only ever grows by
/// replacing one leaf with a split of the old leaf and a new one).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayoutNode {
    Leaf {
        leaf: String,
    },
    Split {
        split: SplitDirection,
        children: Box<(LayoutNode, LayoutNode)>,
    },
}

impl LayoutNode {
    pub fn leaf(pane_id: impl Into<String>) -> Self {
        LayoutNode::Leaf { leaf: pane_id.into() }
    }

    pub fn split(direction: SplitDirection, left: LayoutNode, right: LayoutNode) -> Self {
        LayoutNode::Split {
            split: direction,
            children: Box::new((left, right)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_round_trips() {
        let node = LayoutNode::leaf("pane-1");
        let json = serde_json::to_string(&node).unwrap();
        let back: LayoutNode = serde_json::from_str(&json).unwrap();
        assert_eq!(node, back);
    }

    #[test]
    fn split_round_trips() {
        let node = LayoutNode::split(
            SplitDirection::Vertical,
            LayoutNode::leaf("a"),
            LayoutNode::leaf("b"),
        );
        let json = serde_json::to_string(&node).unwrap();
        let back: LayoutNode = serde_json::from_str(&json).unwrap();
        assert_eq!(node, back);
    }
}
