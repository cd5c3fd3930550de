//! Accumulation of JSON-Patch mutations for admission responses
//!
//! Every mutation this service emits is a `replace`; the gateway splices
//! the accumulated list into the stored object. List order mirrors
//! emission order, so callers (and tests) can reason about patches by
//! position.

use json_patch::{Patch, PatchOperation, ReplaceOperation};
use jsonptr::PointerBuf;
use serde_json::Value;

/// An ordered set of `replace` operations
#[derive(Debug, Default)]
pub struct PatchSet {
    ops: Vec<ReplaceOperation>,
}

impl PatchSet {
    /// An empty patch set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a replace operation for the pointer assembled from `path`
    pub fn replace(&mut self, path: &[&str], value: Value) {
        self.ops.push(ReplaceOperation {
            path: PointerBuf::from_tokens(path.iter().copied()),
            value,
        });
    }

    /// Whether no mutation has been recorded
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of recorded operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// The emitted pointer paths, in emission order
    pub fn paths(&self) -> Vec<String> {
        self.ops.iter().map(|op| op.path.to_string()).collect()
    }

    /// Finish into the wire-level patch document
    pub fn into_patch(self) -> Patch {
        Patch(self.ops.into_iter().map(PatchOperation::Replace).collect())
    }
}
