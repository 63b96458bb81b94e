//! Expression trees for symbolic regression.
//!
//! A tree is either a primitive call with exactly `arity` children, a
//! reference to an input column, or a constant frozen at creation time.
//! Nodes are addressed by paths (child-index lists from the root), which is
//! how the variation operators pick and replace subtrees.

pub mod primitives;

use serde::{Deserialize, Serialize};

pub use primitives::{sanitize_name, Op, PrimitiveSet};

/// A path from the root to a node: `[]` is the root, `[0]` the root's first
/// child, `[0, 1]` that child's second child, and so on.
pub type Path = Vec<usize>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Primitive call; the child count always equals the op's arity.
    Call(Op, Vec<Expr>),
    /// Input column by index.
    Var(usize),
    /// Ephemeral constant, drawn once and frozen.
    Const(f64),
}

impl Expr {
    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        match self {
            Expr::Call(_, children) => 1 + children.iter().map(Expr::size).sum::<usize>(),
            Expr::Var(_) | Expr::Const(_) => 1,
        }
    }

    /// Longest root-to-leaf path, with the root counting as 1.
    pub fn depth(&self) -> usize {
        match self {
            Expr::Call(_, children) => {
                1 + children.iter().map(Expr::depth).max().unwrap_or(0)
            }
            Expr::Var(_) | Expr::Const(_) => 1,
        }
    }

    /// Enumerate every node path in DFS pre-order (root first).
    pub fn node_paths(&self) -> Vec<Path> {
        let mut paths = Vec::with_capacity(self.size());
        self.collect_paths(&mut paths, &mut Vec::new());
        paths
    }

    fn collect_paths(&self, paths: &mut Vec<Path>, current: &mut Path) {
        paths.push(current.clone());
        if let Expr::Call(_, children) = self {
            for (i, child) in children.iter().enumerate() {
                current.push(i);
                child.collect_paths(paths, current);
                current.pop();
            }
        }
    }

    /// The subtree rooted at `path`. An invalid path resolves to the nearest
    /// ancestor that exists, so paths produced by [`Expr::node_paths`] are
    /// always exact.
    pub fn subtree(&self, path: &[usize]) -> &Expr {
        match path.split_first() {
            None => self,
            Some((&idx, rest)) => match self {
                Expr::Call(_, children) if idx < children.len() => {
                    children[idx].subtree(rest)
                }
                _ => self,
            },
        }
    }

    /// Return a new tree with the node at `path` replaced by `replacement`.
    /// The original is left untouched.
    pub fn replace_subtree(&self, path: &[usize], replacement: Expr) -> Expr {
        match path.split_first() {
            None => replacement,
            Some((&idx, rest)) => match self {
                Expr::Call(op, children) if idx < children.len() => {
                    let mut new_children = children.clone();
                    new_children[idx] = children[idx].replace_subtree(rest, replacement);
                    Expr::Call(*op, new_children)
                }
                _ => self.clone(),
            },
        }
    }

    /// Printed functional form, e.g. `add(mul(x, 2.5), x)`. Two trees are
    /// considered structurally equal iff their printed forms match.
    pub fn format(&self, variables: &[String]) -> String {
        match self {
            Expr::Call(op, children) => {
                let args: Vec<String> =
                    children.iter().map(|c| c.format(variables)).collect();
                format!("{}({})", op.name(), args.join(", "))
            }
            Expr::Var(i) => variables
                .get(*i)
                .cloned()
                .unwrap_or_else(|| format!("x{i}")),
            Expr::Const(c) => format_const(*c),
        }
    }
}

fn format_const(c: f64) -> String {
    if c == c.trunc() {
        format!("{c:.1}")
    } else {
        format!("{c}")
    }
}
