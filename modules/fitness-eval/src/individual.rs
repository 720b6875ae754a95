//! Individuals as handed over by the evolutionary loop.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A program tree of named nodes. Leaves are terminals, inner nodes functions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProgramTree {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ProgramTree>,
}

impl ProgramTree {
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    pub fn node(name: impl Into<String>, children: Vec<ProgramTree>) -> Self {
        Self {
            name: name.into(),
            children,
        }
    }

    pub fn size(&self) -> usize {
        1 + self.children.iter().map(ProgramTree::size).sum::<usize>()
    }

    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(ProgramTree::depth).max().unwrap_or(0)
    }
}

/// S-expression form, e.g. `(add insertioncost (mul slack ttd))`.
impl fmt::Display for ProgramTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.children.is_empty() {
            return f.write_str(&self.name);
        }
        write!(f, "({}", self.name)?;
        for child in &self.children {
            write!(f, " {child}")?;
        }
        f.write_str(")")
    }
}

/// One member of the population. Read-only to the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    pub id: String,
    pub tree: ProgramTree,
}

impl Individual {
    pub fn new(id: impl Into<String>, tree: ProgramTree) -> Self {
        Self {
            id: id.into(),
            tree,
        }
    }
}
