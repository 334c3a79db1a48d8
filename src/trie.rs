//! Case-optional longest-prefix token recognizer over bytes.
//!
//! Grounded in the 256-way fanout node layout of
//! `original_source/src/http/parser/utility/trie.hpp`, but made mutable
//! (`insert`/`erase`) per the registry's need to add and remove MIME tokens
//! at runtime, rather than being built once from a fixed value list.
//!
//! The original mirrors each *character node* under both `c` and its
//! case-flipped sibling (`trie.hpp:115-130`), so every level of the walk
//! accepts either case. A Rust node can't cheaply have two parents share
//! ownership of one child without reference counting, which would cost
//! this trie its `Send` bound (it lives inside a `Mutex`-guarded registry
//! shared across threads). The same per-level acceptance falls out of
//! normalizing the indexing byte to lowercase at every node instead: case
//! folding happens once per byte, at every depth, rather than once for the
//! whole token, so mixed-case input (`"Sun"`, `"GMT"`, `"Text/Plain"`)
//! matches exactly as the mirrored tries do.

/// Result of a `Trie::find` call.
#[derive(Debug, PartialEq, Eq)]
pub struct Match<'a, V> {
    /// Number of bytes consumed by the longest matching token. Zero means no
    /// token matched.
    pub used_size: usize,
    pub value: Option<&'a V>,
}

struct Node<V> {
    children: [Option<Box<Node<V>>>; 256],
    value: Option<V>,
}

impl<V> Node<V> {
    fn new() -> Self {
        Node {
            children: std::array::from_fn(|_| None),
            value: None,
        }
    }
}

/// A mutable, case-optional trie keyed on byte tokens.
pub struct Trie<V> {
    root: Node<V>,
    case_insensitive: bool,
}

impl<V> Trie<V> {
    pub fn new(case_insensitive: bool) -> Self {
        Trie {
            root: Node::new(),
            case_insensitive,
        }
    }

    /// Inserts `token -> value`. Returns `false` (and leaves the trie
    /// unchanged) if the token is empty or already present.
    pub fn insert(&mut self, token: &[u8], value: V) -> bool {
        if token.is_empty() {
            return false;
        }

        if self.contains(token) {
            return false;
        }

        let case_insensitive = self.case_insensitive;
        let mut node = &mut self.root;
        for &b in token {
            let idx = normalize(case_insensitive, b);
            node = node.children[idx as usize].get_or_insert_with(|| Box::new(Node::new()));
        }
        node.value = Some(value);
        true
    }

    fn contains(&self, token: &[u8]) -> bool {
        let mut node = &self.root;
        for &b in token {
            match &node.children[normalize(self.case_insensitive, b) as usize] {
                Some(child) => node = child,
                None => return false,
            }
        }
        node.value.is_some()
    }

    /// Removes `token`. Returns `false` if the token was not present.
    /// Removing a prefix of another token leaves the longer token intact:
    /// only the terminal node's value is cleared, never the node itself
    /// (its children, if any, survive).
    pub fn erase(&mut self, token: &[u8]) -> bool {
        if !self.contains(token) {
            return false;
        }

        let case_insensitive = self.case_insensitive;
        let mut node = &mut self.root;
        for &b in token {
            let idx = normalize(case_insensitive, b);
            match node.children[idx as usize].as_mut() {
                Some(child) => node = child,
                None => return false,
            }
        }
        node.value = None;
        true
    }

    /// Finds the longest registered token that is a prefix of `data`,
    /// considering at most `max_len` bytes of `data`. Returns
    /// `used_size == 0` (and `value = None`) if no token matched.
    pub fn find(&self, data: &[u8], max_len: usize) -> Match<'_, V> {
        let limit = max_len.min(data.len());

        let mut node = &self.root;
        let mut best: Match<'_, V> = Match {
            used_size: 0,
            value: None,
        };

        for i in 0..limit {
            let idx = normalize(self.case_insensitive, data[i]);
            match &node.children[idx as usize] {
                Some(child) => {
                    node = child;
                    if let Some(v) = &node.value {
                        best = Match {
                            used_size: i + 1,
                            value: Some(v),
                        };
                    }
                }
                None => break,
            }
        }

        best
    }
}

/// Folds `b` to lowercase when the trie is case-insensitive, so every
/// level of the walk (insert, erase, or find) indexes children on the
/// same byte regardless of the case the caller used at that position.
fn normalize(case_insensitive: bool, b: u8) -> u8 {
    if case_insensitive {
        b.to_ascii_lowercase()
    } else {
        b
    }
}
