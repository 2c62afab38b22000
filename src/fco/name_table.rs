//! Process-wide interning of path components.
//!
//! Each distinct component string is held exactly once, paired with the
//! node for its lowercase fold (the fold of an already-lowercase component
//! is the node itself). Names hold strong handles; the table itself only
//! holds weak ones, so a component's entry dies with the last name that
//! uses it. Stale weak entries are swept once the map crosses a watermark.
//!
//! Case policy is a property of the table, not of individual names. The
//! filesystem genre is case-sensitive; tests may build private tables with
//! either policy.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, Weak};

/// Interned component handle. Equality of handles is pointer equality.
pub type Comp = Arc<NameNode>;

/// A single interned component and its lowercase fold.
pub struct NameNode {
    text: Box<str>,
    /// `None` when the text is its own fold.
    folded: Option<Arc<NameNode>>,
}

impl NameNode {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn folded_text(&self) -> &str {
        match &self.folded {
            Some(node) => &node.text,
            None => &self.text,
        }
    }
}

impl std::fmt::Debug for NameNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NameNode").field("text", &self.text).finish()
    }
}

/// Whether component comparison folds case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasePolicy {
    Sensitive,
    Insensitive,
}

/// The component intern table.
pub struct NameTable {
    case: CasePolicy,
    inner: Mutex<Inner>,
}

struct Inner {
    map: HashMap<Box<str>, Weak<NameNode>>,
    sweep_at: usize,
}

impl NameTable {
    pub fn new(case: CasePolicy) -> Self {
        Self { case, inner: Mutex::new(Inner { map: HashMap::new(), sweep_at: 1024 }) }
    }

    pub fn case_policy(&self) -> CasePolicy {
        self.case
    }

    /// Interns a component string. Idempotent: two calls with equal strings
    /// return the same node.
    pub fn intern(&self, text: &str) -> Comp {
        let mut inner = self.inner.lock().expect("name table poisoned");
        let node = Self::intern_locked(&mut inner.map, text);
        if inner.map.len() >= inner.sweep_at {
            inner.map.retain(|_, weak| weak.strong_count() > 0);
            inner.sweep_at = (inner.map.len() * 2).max(1024);
        }
        node
    }

    fn intern_locked(map: &mut HashMap<Box<str>, Weak<NameNode>>, text: &str) -> Comp {
        if let Some(node) = map.get(text).and_then(Weak::upgrade) {
            return node;
        }
        let folded_text = text.to_lowercase();
        let folded =
            if folded_text == text { None } else { Some(Self::intern_locked(map, &folded_text)) };
        let node = Arc::new(NameNode { text: text.into(), folded });
        map.insert(text.into(), Arc::downgrade(&node));
        node
    }

    /// Number of live entries. Intended for tests.
    pub fn live_len(&self) -> usize {
        let inner = self.inner.lock().expect("name table poisoned");
        inner.map.values().filter(|weak| weak.strong_count() > 0).count()
    }
}

static TABLE: OnceLock<NameTable> = OnceLock::new();

/// The process-wide table for the filesystem genre.
pub fn table() -> &'static NameTable {
    TABLE.get_or_init(|| NameTable::new(CasePolicy::Sensitive))
}

/// Interns a component in the process-wide table.
pub fn intern(text: &str) -> Comp {
    table().intern(text)
}

/// The node for a component's lowercase fold; the component itself when
/// already lowercase.
pub fn folded(node: &Comp) -> Comp {
    match &node.folded {
        Some(fold) => Arc::clone(fold),
        None => Arc::clone(node),
    }
}

/// The comparison key of a component under the given policy.
pub fn cmp_key(node: &NameNode, case: CasePolicy) -> &str {
    match case {
        CasePolicy::Sensitive => node.text(),
        CasePolicy::Insensitive => node.folded_text(),
    }
}
