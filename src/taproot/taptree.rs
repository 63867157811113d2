//! TapTree implementation for Taproot script commitments
//!
//! `TapTree::build` combines leaves pairwise, left to right, one level at a
//! time; a node left over at the end of a level is carried up unchanged.
//! `TapTree::from_node` takes an explicit branch structure instead. In both
//! cases leaves are indexed in depth-first, left-to-right order.

use crate::error::{Result, TaprootError};
use crate::script::Script;
use crate::taproot::control_block::ControlBlock;
use crate::utils::*;

pub const TAPSCRIPT_LEAF_VERSION: u8 = 0xc0;

/// Maximum merkle path length (BIP341)
pub const TAPROOT_CONTROL_MAX_NODE_COUNT: usize = 128;

/// Represents a TapLeaf (script in the taptree)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapLeaf {
    pub script: Script,
    pub version: u8,
}

impl TapLeaf {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            version: TAPSCRIPT_LEAF_VERSION,
        }
    }

    /// Leaf with a custom version; the low bit is reserved for the parity
    pub fn with_version(script: Script, version: u8) -> Result<Self> {
        if version & 0x01 != 0 {
            return Err(TaprootError::InvalidLeafVersion(version));
        }
        Ok(Self { script, version })
    }

    /// Compute the tagged hash of this leaf
    pub fn leaf_hash(&self) -> [u8; 32] {
        self.script.leaf_hash(self.version)
    }
}

/// Represents a node in the TapTree (either leaf or branch)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapNode {
    Leaf(TapLeaf),
    Branch(Box<TapNode>, Box<TapNode>),
}

impl TapNode {
    pub fn leaf(leaf: TapLeaf) -> Self {
        TapNode::Leaf(leaf)
    }

    pub fn branch(left: TapNode, right: TapNode) -> Self {
        TapNode::Branch(Box::new(left), Box::new(right))
    }

    /// Compute the hash of this node
    pub fn node_hash(&self) -> [u8; 32] {
        match self {
            TapNode::Leaf(leaf) => leaf.leaf_hash(),
            TapNode::Branch(left, right) => tapbranch_hash(&left.node_hash(), &right.node_hash()),
        }
    }
}

/// Compute TapBranch hash (BIP341)
/// Child hashes are lexicographically sorted before concatenation
pub fn tapbranch_hash(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let (first, second) = if left < right {
        (left, right)
    } else {
        (right, left)
    };

    let mut data = Vec::with_capacity(64);
    data.extend_from_slice(first);
    data.extend_from_slice(second);

    tagged_hash("TapBranch", &data)
}

/// Fold a leaf hash with its merkle proof, bottom-up
pub fn compute_root_from_proof(leaf_hash: &[u8; 32], proof: &[[u8; 32]]) -> [u8; 32] {
    proof
        .iter()
        .fold(*leaf_hash, |acc, sibling| tapbranch_hash(&acc, sibling))
}

/// A script tree with its root hash and one inclusion proof per leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapTree {
    root: TapNode,
    root_hash: [u8; 32],
    leaves: Vec<TapLeaf>,
    proofs: Vec<Vec<[u8; 32]>>,
}

impl TapTree {
    /// Build a balanced tree from leaves in insertion order
    pub fn build(leaves: Vec<TapLeaf>) -> Result<Self> {
        if leaves.is_empty() {
            return Err(TaprootError::EmptyTree);
        }

        let mut level: Vec<TapNode> = leaves.into_iter().map(TapNode::Leaf).collect();
        while level.len() > 1 {
            let mut next = Vec::with_capacity(level.len().div_ceil(2));
            let mut nodes = level.into_iter();
            while let Some(left) = nodes.next() {
                match nodes.next() {
                    Some(right) => next.push(TapNode::branch(left, right)),
                    None => next.push(left),
                }
            }
            level = next;
        }

        match level.pop() {
            Some(root) => Self::from_node(root),
            None => Err(TaprootError::EmptyTree),
        }
    }

    /// Build from scripts, all at the tapscript leaf version
    pub fn from_scripts(scripts: Vec<Script>) -> Result<Self> {
        Self::build(scripts.into_iter().map(TapLeaf::new).collect())
    }

    /// Use an explicit branch structure
    pub fn from_node(root: TapNode) -> Result<Self> {
        let (root_hash, collected) = collect_leaves(&root, 0)?;

        let (leaves, proofs): (Vec<_>, Vec<_>) = collected.into_iter().unzip();
        log::debug!(
            "tap tree root {} over {} leaves",
            hex::encode(root_hash),
            leaves.len()
        );

        Ok(Self {
            root,
            root_hash,
            leaves,
            proofs,
        })
    }

    pub fn root(&self) -> &TapNode {
        &self.root
    }

    /// Get the merkle root of this tree
    pub fn root_hash(&self) -> [u8; 32] {
        self.root_hash
    }

    pub fn leaves(&self) -> &[TapLeaf] {
        &self.leaves
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn leaf(&self, index: usize) -> Result<&TapLeaf> {
        self.leaves
            .get(index)
            .ok_or(TaprootError::LeafIndexOutOfRange {
                index,
                leaves: self.leaves.len(),
            })
    }

    /// Sibling hashes from the leaf up to the root
    pub fn proof_for(&self, index: usize) -> Result<&[[u8; 32]]> {
        self.proofs
            .get(index)
            .map(Vec::as_slice)
            .ok_or(TaprootError::LeafIndexOutOfRange {
                index,
                leaves: self.leaves.len(),
            })
    }

    /// Index of the first leaf carrying this script
    pub fn position(&self, script: &Script) -> Option<usize> {
        self.leaves.iter().position(|leaf| &leaf.script == script)
    }

    /// Control block for spending `index` from an output built over
    /// `internal_key` with this tree
    pub fn control_block(
        &self,
        index: usize,
        internal_key: &[u8; 32],
        output_key_parity: bool,
    ) -> Result<ControlBlock> {
        let leaf = self.leaf(index)?;
        let proof = self.proof_for(index)?;
        ControlBlock::new(leaf.version, output_key_parity, *internal_key, proof.to_vec())
    }
}

/// Depth-first walk returning the node hash and each leaf with its proof.
/// Stops with `TreeTooDeep` once `depth` passes the control block limit.
fn collect_leaves(
    node: &TapNode,
    depth: usize,
) -> Result<([u8; 32], Vec<(TapLeaf, Vec<[u8; 32]>)>)> {
    if depth > TAPROOT_CONTROL_MAX_NODE_COUNT {
        return Err(TaprootError::TreeTooDeep(depth));
    }
    match node {
        TapNode::Leaf(leaf) => Ok((leaf.leaf_hash(), vec![(leaf.clone(), Vec::new())])),
        TapNode::Branch(left, right) => {
            let (left_hash, mut left_leaves) = collect_leaves(left, depth + 1)?;
            let (right_hash, right_leaves) = collect_leaves(right, depth + 1)?;
            for (_, proof) in left_leaves.iter_mut() {
                proof.push(right_hash);
            }
            left_leaves.extend(right_leaves.into_iter().map(|(leaf, mut proof)| {
                proof.push(left_hash);
                (leaf, proof)
            }));
            Ok((tapbranch_hash(&left_hash, &right_hash), left_leaves))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(byte: u8) -> TapLeaf {
        TapLeaf::new(Script::p2pk_tapscript(&[byte; 32]))
    }

    #[test]
    fn test_tapleaf_hash() {
        let script = Script::p2pk_tapscript(&[0x00; 32]);
        let leaf = TapLeaf::new(script.clone());

        let mut preimage = vec![0xc0, 0x22];
        preimage.extend_from_slice(&script.to_bytes());
        assert_eq!(leaf.leaf_hash(), tagged_hash("TapLeaf", &preimage));
    }

    #[test]
    fn test_leaf_version_must_be_even() {
        let script = Script::p2pk_tapscript(&[0x01; 32]);
        assert_eq!(
            TapLeaf::with_version(script.clone(), 0xc1),
            Err(TaprootError::InvalidLeafVersion(0xc1))
        );
        assert!(TapLeaf::with_version(script, 0xc2).is_ok());
    }

    #[test]
    fn test_tapbranch_hash() {
        let left = [0x01u8; 32];
        let right = [0x02u8; 32];

        let hash1 = tapbranch_hash(&left, &right);
        let hash2 = tapbranch_hash(&right, &left);

        // Order shouldn't matter (lexicographic sorting)
        assert_eq!(hash1, hash2);

        let mut data = left.to_vec();
        data.extend_from_slice(&right);
        assert_eq!(hash1, tagged_hash("TapBranch", &data));
    }

    #[test]
    fn test_empty_tree() {
        assert_eq!(TapTree::build(vec![]), Err(TaprootError::EmptyTree));
    }

    #[test]
    fn test_single_leaf_tree() {
        let tree = TapTree::build(vec![leaf(0x01)]).unwrap();
        assert_eq!(tree.root_hash(), leaf(0x01).leaf_hash());
        assert!(tree.proof_for(0).unwrap().is_empty());
        assert!(matches!(
            tree.proof_for(1),
            Err(TaprootError::LeafIndexOutOfRange { index: 1, leaves: 1 })
        ));
    }

    #[test]
    fn test_two_leaf_tree() {
        let (a, b) = (leaf(0x01), leaf(0x02));
        let (ha, hb) = (a.leaf_hash(), b.leaf_hash());
        let tree = TapTree::build(vec![a, b]).unwrap();

        let (lo, hi) = if ha < hb { (ha, hb) } else { (hb, ha) };
        let mut data = lo.to_vec();
        data.extend_from_slice(&hi);
        assert_eq!(tree.root_hash(), tagged_hash("TapBranch", &data));

        assert_eq!(tree.proof_for(0).unwrap(), &[hb]);
        assert_eq!(tree.proof_for(1).unwrap(), &[ha]);
    }

    #[test]
    fn test_three_leaf_tree_carries_odd_leaf() {
        let leaves = vec![leaf(0x01), leaf(0x02), leaf(0x03)];
        let hashes: Vec<_> = leaves.iter().map(TapLeaf::leaf_hash).collect();
        let tree = TapTree::build(leaves).unwrap();

        let ab = tapbranch_hash(&hashes[0], &hashes[1]);
        assert_eq!(tree.root_hash(), tapbranch_hash(&ab, &hashes[2]));
        assert_eq!(tree.proof_for(0).unwrap(), &[hashes[1], hashes[2]]);
        assert_eq!(tree.proof_for(2).unwrap(), &[ab]);
    }

    #[test]
    fn test_proofs_fold_to_root() {
        for count in 1..=9u8 {
            let tree = TapTree::build((0..count).map(leaf).collect()).unwrap();
            for (i, l) in tree.leaves().iter().enumerate() {
                let proof = tree.proof_for(i).unwrap();
                assert_eq!(
                    compute_root_from_proof(&l.leaf_hash(), proof),
                    tree.root_hash()
                );
            }
        }
    }

    #[test]
    fn test_explicit_structure() {
        // ((A, B), C) built by hand equals the balanced three-leaf build,
        // while (A, (B, C)) does not
        let balanced = TapTree::build(vec![leaf(1), leaf(2), leaf(3)]).unwrap();
        let left_heavy = TapTree::from_node(TapNode::branch(
            TapNode::branch(TapNode::leaf(leaf(1)), TapNode::leaf(leaf(2))),
            TapNode::leaf(leaf(3)),
        ))
        .unwrap();
        let right_heavy = TapTree::from_node(TapNode::branch(
            TapNode::leaf(leaf(1)),
            TapNode::branch(TapNode::leaf(leaf(2)), TapNode::leaf(leaf(3))),
        ))
        .unwrap();

        assert_eq!(balanced.root_hash(), left_heavy.root_hash());
        assert_ne!(balanced.root_hash(), right_heavy.root_hash());
        assert_eq!(right_heavy.proof_for(0).unwrap().len(), 1);
        assert_eq!(right_heavy.proof_for(2).unwrap().len(), 2);
    }

    #[test]
    fn test_tree_too_deep() {
        let mut node = TapNode::leaf(leaf(0));
        for i in 0..=TAPROOT_CONTROL_MAX_NODE_COUNT {
            node = TapNode::branch(node, TapNode::leaf(leaf(i as u8)));
        }
        assert_eq!(
            TapTree::from_node(node),
            Err(TaprootError::TreeTooDeep(TAPROOT_CONTROL_MAX_NODE_COUNT + 1))
        );
    }

    #[test]
    fn test_tree_too_deep_stops_at_limit() {
        let mut node = TapNode::leaf(leaf(0));
        for _ in 0..5_000 {
            node = TapNode::branch(TapNode::leaf(leaf(1)), node);
        }
        assert_eq!(
            collect_leaves(&node, 0).map(|(hash, _)| hash),
            Err(TaprootError::TreeTooDeep(TAPROOT_CONTROL_MAX_NODE_COUNT + 1))
        );
        assert!(TapTree::from_node(node).is_err());
    }

    #[test]
    fn test_control_block() {
        let tree = TapTree::build(vec![leaf(1), leaf(2), leaf(3)]).unwrap();
        let internal_key = [0x02u8; 32];

        let control_block = tree.control_block(0, &internal_key, true).unwrap();
        let encoded = control_block.encode();

        // 1 (version) + 32 (pubkey) + 64 (2 hashes)
        assert_eq!(encoded.len(), 97);
        assert_eq!(encoded[0], 0xc1);
        assert_eq!(tree.position(&leaf(3).script), Some(2));
        assert!(tree.control_block(3, &internal_key, false).is_err());
    }
}
