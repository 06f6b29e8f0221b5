use crate::handle::{Handle, HandleOracle};

pub const SEARCH_MAX_DEPTH: usize = 4;
pub const SEARCH_MAX_BREADTH: usize = 64;

/// Navigation over the host's transform hierarchy.
pub trait TransformTree {
    /// Direct child lookup by name. Cheap when the host supports it.
    fn find_child_by_name(&self, parent: Handle, name: &str) -> Option<Handle>;

    fn node_name(&self, transform: Handle) -> Option<String>;

    fn first_child(&self, transform: Handle) -> Option<Handle>;

    fn next_sibling(&self, transform: Handle) -> Option<Handle>;
}

/// The slice of the host scene graph both trackers need.
pub trait LiveGraph: HandleOracle + TransformTree + Send + Sync {
    fn game_object_of(&self, transform: Handle) -> Option<Handle>;

    fn transform_of(&self, game_object: Handle) -> Option<Handle>;

    fn set_draw_self(&self, game_object: Handle, visible: bool);

    fn motion_skipped(&self, motion: Handle) -> bool;

    fn camera_distance_sq(&self, transform: Handle) -> Option<f64>;
}

/// Finds a descendant transform by name.
///
/// Tries the host's direct lookup first, then walks the hierarchy itself:
/// siblings before children, never deeper than [`SEARCH_MAX_DEPTH`] and never
/// more than [`SEARCH_MAX_BREADTH`] siblings per level.
pub fn find_transform(tree: &(impl TransformTree + ?Sized), root: Handle, name: &str) -> Option<Handle> {
    if let Some(found) = tree.find_child_by_name(root, name) {
        return Some(found);
    }
    tree.first_child(root)
        .and_then(|child| search(tree, child, name, 0, 0))
}

fn search(
    tree: &(impl TransformTree + ?Sized),
    node: Handle,
    name: &str,
    depth: usize,
    breadth: usize,
) -> Option<Handle> {
    if depth >= SEARCH_MAX_DEPTH || breadth >= SEARCH_MAX_BREADTH {
        return None;
    }
    if tree.node_name(node).as_deref() == Some(name) {
        return Some(node);
    }

    if let Some(found) = tree
        .next_sibling(node)
        .and_then(|sibling| search(tree, sibling, name, depth, breadth + 1))
    {
        return Some(found);
    }

    tree.first_child(node)
        .and_then(|child| search(tree, child, name, depth + 1, 0))
}

/// Names of a transform's direct children, capped at [`SEARCH_MAX_BREADTH`].
pub fn child_names(tree: &(impl TransformTree + ?Sized), parent: Handle) -> Vec<(Handle, String)> {
    let mut names = Vec::new();
    let mut cursor = tree.first_child(parent);
    while let Some(node) = cursor {
        if names.len() >= SEARCH_MAX_BREADTH {
            break;
        }
        if let Some(name) = tree.node_name(node) {
            names.push((node, name));
        }
        cursor = tree.next_sibling(node);
    }
    names
}
