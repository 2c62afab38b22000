//! The hierarchical node tree and its cursor.
//!
//! Nodes are labelled by path components; a node optionally holds the FCO
//! record for its path and a child map. The node for `c₁/…/cₖ` exists only
//! while some scan that covered it put it (or a descendant's record)
//! there; removing the last record under a node collapses the empty
//! ancestors.

use std::collections::BTreeMap;
use std::io::Cursor as IoCursor;

use crate::db::blockfile::{BlockFile, NIL};
use crate::error::{Error, Result};
use crate::fco::name::FcoName;
use crate::fco::object::Fco;
use crate::wire::{read, write};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbNode {
    record: Option<Fco>,
    children: BTreeMap<String, DbNode>,
}

impl DbNode {
    fn is_empty(&self) -> bool {
        self.record.is_none() && self.children.is_empty()
    }

    fn record_count(&self) -> usize {
        usize::from(self.record.is_some())
            + self.children.values().map(DbNode::record_count).sum::<usize>()
    }
}

/// The in-memory database tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbTree {
    root: DbNode,
}

impl DbTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn node_at(&self, comps: &[String]) -> Option<&DbNode> {
        let mut node = &self.root;
        for comp in comps {
            node = node.children.get(comp)?;
        }
        Some(node)
    }

    fn node_at_mut(&mut self, comps: &[String]) -> Option<&mut DbNode> {
        let mut node = &mut self.root;
        for comp in comps {
            node = node.children.get_mut(comp)?;
        }
        Some(node)
    }

    fn ensure_path(&mut self, comps: &[String]) -> &mut DbNode {
        let mut node = &mut self.root;
        for comp in comps {
            node = node.children.entry(comp.clone()).or_default();
        }
        node
    }

    /// Number of FCO records stored in the whole tree.
    pub fn record_count(&self) -> usize {
        self.root.record_count()
    }

    /// Looks up the record stored for `name`.
    pub fn lookup(&self, name: &FcoName) -> Option<&Fco> {
        let comps: Vec<String> = name.iter().map(str::to_owned).collect();
        self.node_at(&comps)?.record.as_ref()
    }

    /// Visits, in name order, every record in the subtree rooted at
    /// `start` (inclusive).
    pub fn for_each_record(&self, start: &FcoName, visit: &mut dyn FnMut(&FcoName, &Fco)) {
        let comps: Vec<String> = start.iter().map(str::to_owned).collect();
        if let Some(node) = self.node_at(&comps) {
            Self::walk(node, &mut start.clone(), visit);
        }
    }

    fn walk(node: &DbNode, name: &mut FcoName, visit: &mut dyn FnMut(&FcoName, &Fco)) {
        if let Some(record) = &node.record {
            visit(name, record);
        }
        for (comp, child) in &node.children {
            name.push(comp);
            Self::walk(child, name, visit);
            name.pop();
        }
    }

    /// Removes empty nodes along `name`'s ancestry, bottom-up.
    pub fn collapse(&mut self, name: &FcoName) {
        let comps: Vec<String> = name.iter().map(str::to_owned).collect();
        for depth in (1..=comps.len()).rev() {
            let (parent_comps, tail) = comps.split_at(depth - 1);
            let comp = &tail[0];
            let Some(parent) = self.node_at_mut(parent_comps) else { return };
            let empty = parent.children.get(comp).map(DbNode::is_empty).unwrap_or(false);
            if empty {
                parent.children.remove(comp);
            } else {
                break;
            }
        }
    }

    pub fn cursor(&mut self) -> DbCursor<'_> {
        DbCursor { tree: self, path: Vec::new() }
    }

    /// Stores the tree into a block image, bottom-up, reusing freed
    /// blocks ascending-first.
    pub fn store(&self, image: &mut BlockFile) {
        image.recycle();
        let root_addr = Self::store_node(&self.root, image);
        image.set_root(root_addr);
    }

    fn store_node(node: &DbNode, image: &mut BlockFile) -> u32 {
        let child_addrs: Vec<(&String, u32)> = node
            .children
            .iter()
            .map(|(comp, child)| (comp, Self::store_node(child, image)))
            .collect();

        let mut bytes = Vec::new();
        write::option(&mut bytes, node.record.as_ref(), |fco, dest| fco.write(dest))
            .expect("writing to memory cannot fail");
        write::usize_as_u32(&mut bytes, child_addrs.len()).expect("memory write");
        for (comp, addr) in child_addrs {
            write::string(&mut bytes, comp).expect("memory write");
            write::u32(&mut bytes, addr).expect("memory write");
        }
        image.store_record(&bytes)
    }

    /// Materializes a tree from a validated block image.
    pub fn load(image: &BlockFile) -> Result<DbTree> {
        if image.root() == NIL {
            return Ok(DbTree::new());
        }
        let mut visited = 0usize;
        let root = Self::load_node(image, image.root(), &mut visited)?;
        Ok(DbTree { root })
    }

    fn load_node(image: &BlockFile, addr: u32, visited: &mut usize) -> Result<DbNode> {
        *visited += 1;
        if *visited > image.block_count() + 1 {
            return Err(Error::BadFreeList);
        }
        let bytes = image.read_record(addr)?;
        let mut src = IoCursor::new(bytes);
        let record = read::option(&mut src, |s| Fco::read(s))?;
        let count = read::u32_as_usize(&mut src)?;
        let mut children = BTreeMap::new();
        for _ in 0..count {
            let comp = read::string(&mut src)?;
            let child_addr = read::u32(&mut src)?;
            children.insert(comp, Self::load_node(image, child_addr, visited)?);
        }
        Ok(DbNode { record, children })
    }
}

/// A navigating handle over the tree.
///
/// The cursor starts above the root; `seek_to` positions it at a path.
pub struct DbCursor<'a> {
    tree: &'a mut DbTree,
    path: Vec<String>,
}

impl DbCursor<'_> {
    /// The name of the current position.
    pub fn name(&self) -> FcoName {
        let mut name = FcoName::new();
        for comp in &self.path {
            name.push(comp);
        }
        name
    }

    /// Positions the cursor at `name`. With `create`, missing nodes along
    /// the way are created; without it, a missing node leaves the cursor
    /// unmoved and returns `false`.
    pub fn seek_to(&mut self, name: &FcoName, create: bool) -> bool {
        let comps: Vec<String> = name.iter().map(str::to_owned).collect();
        if create {
            self.tree.ensure_path(&comps);
        } else if self.tree.node_at(&comps).is_none() {
            return false;
        }
        self.path = comps;
        true
    }

    pub fn seek_parent(&mut self) -> bool {
        if self.path.is_empty() {
            return false;
        }
        self.path.pop();
        true
    }

    pub fn seek_first_child(&mut self) -> bool {
        let Some(node) = self.tree.node_at(&self.path) else { return false };
        match node.children.keys().next() {
            Some(comp) => {
                let comp = comp.clone();
                self.path.push(comp);
                true
            }
            None => false,
        }
    }

    pub fn seek_next_sibling(&mut self) -> bool {
        let Some(current) = self.path.last().cloned() else { return false };
        let parent_path = &self.path[..self.path.len() - 1];
        let Some(parent) = self.tree.node_at(parent_path) else { return false };
        let next = parent
            .children
            .range::<String, _>((
                std::ops::Bound::Excluded(current.clone()),
                std::ops::Bound::Unbounded,
            ))
            .next()
            .map(|(comp, _)| comp.clone());
        match next {
            Some(comp) => {
                *self.path.last_mut().expect("non-empty path") = comp;
                true
            }
            None => false,
        }
    }

    pub fn has_fco_data(&self) -> bool {
        self.tree
            .node_at(&self.path)
            .map(|node| node.record.is_some())
            .unwrap_or(false)
    }

    pub fn read_fco(&self) -> Result<Fco> {
        self.tree
            .node_at(&self.path)
            .and_then(|node| node.record.clone())
            .ok_or_else(|| Error::NotInDatabase(self.name().as_string()))
    }

    pub fn write_fco(&mut self, fco: Fco) {
        let node = self.tree.ensure_path(&self.path);
        node.record = Some(fco);
    }

    pub fn delete_fco(&mut self) -> Option<Fco> {
        self.tree.node_at_mut(&self.path).and_then(|node| node.record.take())
    }

    /// Removes the current subtree when no record lives anywhere in it;
    /// the cursor moves to the parent. Returns `false` (and moves nothing)
    /// when records remain.
    pub fn remove_empty_subtree(&mut self) -> bool {
        let Some(node) = self.tree.node_at(&self.path) else { return false };
        if node.record_count() > 0 {
            return false;
        }
        if self.path.is_empty() {
            // the synthetic top node just loses its children
            self.tree.root.children.clear();
            return true;
        }
        let comp = self.path.last().cloned().expect("non-empty path");
        let parent_path = self.path[..self.path.len() - 1].to_vec();
        if let Some(parent) = self.tree.node_at_mut(&parent_path) {
            parent.children.remove(&comp);
        }
        self.path = parent_path;
        true
    }
}
