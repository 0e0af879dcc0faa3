//! Text rendering of content trees for logs and debugging.

use termtree::Tree;

use crate::domain::arena::{ContentNode, ContentTree, NodeId};

pub trait ToTermTree {
    fn to_term_tree(&self) -> Tree<String>;
}

fn label(node: &ContentNode) -> String {
    let mut label = format!(
        "<{}:{}> {}",
        node.relationship(),
        node.value_kind(),
        node.concept_name().code_meaning
    );
    let value = node.value().to_string();
    if !value.is_empty() {
        label.push_str(" = ");
        label.push_str(&value);
    }
    if let Some(annotation) = node.annotation() {
        label.push_str(&format!(" [{}]", annotation));
    }
    label
}

impl ToTermTree for ContentTree {
    fn to_term_tree(&self) -> Tree<String> {
        fn build_tree(tree: &ContentTree, id: NodeId) -> Tree<String> {
            let root = tree.get(id).map(label).unwrap_or_default();
            let leaves: Vec<_> = tree
                .children(id)
                .iter()
                .map(|&child| build_tree(tree, child))
                .collect();
            Tree::new(root).with_leaves(leaves)
        }

        match self.roots() {
            [] => Tree::new("Empty tree".to_string()),
            [root] => build_tree(self, *root),
            roots => Tree::new("Content".to_string())
                .with_leaves(roots.iter().map(|&root| build_tree(self, root))),
        }
    }
}
