//! Group engine.
//!
//! Owns one incremental Merkle tree per group together with its admin, root
//! history, root-expiry window and consumed nullifiers. Groups are created by
//! the bound registry (or by whoever the engine is bound to when used
//! standalone); every other mutation is restricted to the group admin.
//! Signal verification is open to anyone.

use crate::address::Address;
use crate::error::{Error, Result};
use crate::merkle::{IncrementalMerkleTree, MerkleProof, RootHistory};
use crate::types::{hash_signal, zero_value_for, Context, Event, GroupId, PublicInputs, Word};
use crate::verifier::ProofVerifier;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A membership group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    id: GroupId,
    admin: Address,
    tree: IncrementalMerkleTree,
    root_history: RootHistory,
    /// Seconds after its production that a non-current root stays
    /// acceptable; 0 means forever.
    merkle_tree_duration: u64,
    /// Consumed nullifier hashes and the external nullifier they were used with.
    nullifiers: BTreeMap<Word, Word>,
}

impl Group {
    #[must_use]
    pub fn id(&self) -> GroupId {
        self.id
    }

    #[must_use]
    pub fn admin(&self) -> Address {
        self.admin
    }

    #[must_use]
    pub fn is_admin(&self, caller: &Address) -> bool {
        self.admin == *caller
    }

    #[must_use]
    pub fn tree(&self) -> &IncrementalMerkleTree {
        &self.tree
    }

    #[must_use]
    pub fn root_history(&self) -> &RootHistory {
        &self.root_history
    }

    #[must_use]
    pub fn merkle_tree_duration(&self) -> u64 {
        self.merkle_tree_duration
    }

    #[must_use]
    pub fn is_nullifier_used(&self, nullifier_hash: &Word) -> bool {
        self.nullifiers.contains_key(nullifier_hash)
    }

    /// Checks that `root` may back a proof at `timestamp`.
    ///
    /// The current root is always accepted. Older roots must be in the
    /// history and, when an expiry window is set, younger than the window.
    pub fn check_root(&self, root: &Word, timestamp: u64) -> Result<()> {
        if *root == self.tree.root() {
            return Ok(());
        }
        let inserted_at = self
            .root_history
            .inserted_at(root)
            .ok_or(Error::MerkleTreeRootIsNotPartOfTheGroup)?;
        if self.merkle_tree_duration != 0
            && timestamp > inserted_at.saturating_add(self.merkle_tree_duration)
        {
            return Err(Error::MerkleTreeRootIsExpired);
        }
        Ok(())
    }
}

/// Serializable state of the group engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemaphoreState {
    /// Identity the engine uses when it is the caller.
    pub address: Address,
    /// The only caller allowed to create groups and rebind the registry.
    pub registry: Address,
    pub groups: BTreeMap<GroupId, Group>,
}

/// The group engine, parameterized by its proof backend.
pub struct Semaphore<V> {
    state: SemaphoreState,
    verifier: V,
    events: Vec<Event>,
}

impl<V: ProofVerifier> Semaphore<V> {
    /// Creates an engine at `address` bound to `registry`.
    ///
    /// Binding to an operator address instead of a registry runs the engine
    /// standalone.
    pub fn new(address: Address, registry: Address, verifier: V) -> Self {
        Self::from_state(
            SemaphoreState {
                address,
                registry,
                groups: BTreeMap::new(),
            },
            verifier,
        )
    }

    pub fn from_state(state: SemaphoreState, verifier: V) -> Self {
        Self {
            state,
            verifier,
            events: Vec::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> &SemaphoreState {
        &self.state
    }

    #[must_use]
    pub fn address(&self) -> Address {
        self.state.address
    }

    #[must_use]
    pub fn registry(&self) -> Address {
        self.state.registry
    }

    #[must_use]
    pub fn verifier(&self) -> &V {
        &self.verifier
    }

    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Drains the events emitted so far.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    fn emit(&mut self, event: Event) {
        info!("{event:?}");
        self.events.push(event);
    }

    /// Rebinds the registry. Only the currently bound registry may do this.
    pub fn update_registry(&mut self, ctx: &Context, new_registry: Address) -> Result<()> {
        if ctx.caller != self.state.registry {
            debug!("update_registry rejected: {} is not the registry", ctx.caller);
            return Err(Error::NotRegistry);
        }
        if new_registry.is_zero() {
            return Err(Error::InvalidAddress);
        }

        let old_registry = std::mem::replace(&mut self.state.registry, new_registry);
        self.emit(Event::RegistryUpdated {
            old_registry,
            new_registry,
        });
        Ok(())
    }

    /// Creates a group whose historical roots never expire.
    pub fn create_group(
        &mut self,
        ctx: &Context,
        group_id: GroupId,
        depth: u8,
        admin: Address,
    ) -> Result<()> {
        self.create_group_with_expiry(ctx, group_id, depth, admin, 0)
    }

    /// Creates a group whose non-current roots expire `merkle_tree_duration`
    /// seconds after they were produced (0 disables expiry).
    ///
    /// # Errors
    /// * `NotRegistry` unless called by the bound registry
    /// * `InvalidAddress` for a zero admin
    /// * `GroupAlreadyExists`
    /// * `InvalidDepth` for a depth outside `1..=32`
    pub fn create_group_with_expiry(
        &mut self,
        ctx: &Context,
        group_id: GroupId,
        depth: u8,
        admin: Address,
        merkle_tree_duration: u64,
    ) -> Result<()> {
        if ctx.caller != self.state.registry {
            debug!("create_group {group_id} rejected: {} is not the registry", ctx.caller);
            return Err(Error::NotRegistry);
        }
        if admin.is_zero() {
            return Err(Error::InvalidAddress);
        }
        if self.state.groups.contains_key(&group_id) {
            return Err(Error::GroupAlreadyExists(group_id));
        }

        let zero_value = zero_value_for(group_id);
        let tree = IncrementalMerkleTree::new(depth, zero_value)?;
        let mut root_history = RootHistory::default();
        root_history.push(tree.root(), ctx.timestamp);

        self.state.groups.insert(
            group_id,
            Group {
                id: group_id,
                admin,
                tree,
                root_history,
                merkle_tree_duration,
                nullifiers: BTreeMap::new(),
            },
        );

        self.emit(Event::GroupCreated {
            group_id,
            merkle_tree_depth: depth,
            zero_value,
        });
        self.emit(Event::GroupAdminUpdated {
            group_id,
            old_admin: Address::ZERO,
            new_admin: admin,
        });
        Ok(())
    }

    fn group(&self, group_id: GroupId) -> Result<&Group> {
        self.state
            .groups
            .get(&group_id)
            .ok_or(Error::GroupDoesNotExist(group_id))
    }

    fn admin_group_mut(&mut self, ctx: &Context, group_id: GroupId) -> Result<&mut Group> {
        let group = self
            .state
            .groups
            .get_mut(&group_id)
            .ok_or(Error::GroupDoesNotExist(group_id))?;
        if !group.is_admin(&ctx.caller) {
            debug!(
                "{} is not the admin of group {group_id} ({})",
                ctx.caller, group.admin
            );
            return Err(Error::CallerIsNotTheGroupAdmin(group_id));
        }
        Ok(group)
    }

    /// Hands the group over to `new_admin` immediately.
    pub fn update_group_admin(
        &mut self,
        ctx: &Context,
        group_id: GroupId,
        new_admin: Address,
    ) -> Result<()> {
        let group = self.admin_group_mut(ctx, group_id)?;
        if new_admin.is_zero() {
            return Err(Error::InvalidAddress);
        }
        let old_admin = std::mem::replace(&mut group.admin, new_admin);

        self.emit(Event::GroupAdminUpdated {
            group_id,
            old_admin,
            new_admin,
        });
        Ok(())
    }

    pub fn update_group_merkle_tree_duration(
        &mut self,
        ctx: &Context,
        group_id: GroupId,
        new_duration: u64,
    ) -> Result<()> {
        let group = self.admin_group_mut(ctx, group_id)?;
        let old_duration = std::mem::replace(&mut group.merkle_tree_duration, new_duration);

        self.emit(Event::GroupMerkleTreeDurationUpdated {
            group_id,
            old_duration,
            new_duration,
        });
        Ok(())
    }

    /// Appends a member and returns the new root.
    pub fn add_member(
        &mut self,
        ctx: &Context,
        group_id: GroupId,
        identity_commitment: Word,
    ) -> Result<Word> {
        let group = self.admin_group_mut(ctx, group_id)?;
        let index = group.tree.number_of_leaves();
        let root = group.tree.insert(identity_commitment)?;
        group.root_history.push(root, ctx.timestamp);

        self.emit(Event::MemberAdded {
            group_id,
            index,
            identity_commitment,
            merkle_tree_root: root,
        });
        Ok(root)
    }

    /// Appends several members and returns the final root.
    ///
    /// The whole batch is validated before any leaf is inserted, so either
    /// every member is added or none is.
    pub fn add_members(
        &mut self,
        ctx: &Context,
        group_id: GroupId,
        identity_commitments: &[Word],
    ) -> Result<Word> {
        let group = self.admin_group_mut(ctx, group_id)?;
        let tree = &group.tree;
        let free = tree.capacity() - tree.number_of_leaves();
        if identity_commitments.len() as u64 > free {
            return Err(Error::FullTree);
        }
        for identity_commitment in identity_commitments {
            tree.validate_leaf(identity_commitment)?;
        }
        if identity_commitments.is_empty() {
            return Ok(tree.root());
        }

        let start_index = tree.number_of_leaves();
        let mut root = tree.root();
        for identity_commitment in identity_commitments {
            root = group.tree.insert(*identity_commitment)?;
            group.root_history.push(root, ctx.timestamp);
        }

        self.emit(Event::MembersAdded {
            group_id,
            start_index,
            identity_commitments: identity_commitments.to_vec(),
            merkle_tree_root: root,
        });
        Ok(root)
    }

    /// Replaces the member at `index`, authorized by its Merkle path.
    pub fn update_member(
        &mut self,
        ctx: &Context,
        group_id: GroupId,
        index: u64,
        identity_commitment: Word,
        new_identity_commitment: Word,
        proof_siblings: &[Word],
    ) -> Result<Word> {
        let group = self.admin_group_mut(ctx, group_id)?;
        let root = group.tree.update(
            index,
            identity_commitment,
            new_identity_commitment,
            proof_siblings,
        )?;
        group.root_history.push(root, ctx.timestamp);

        self.emit(Event::MemberUpdated {
            group_id,
            index,
            identity_commitment,
            new_identity_commitment,
            merkle_tree_root: root,
        });
        Ok(root)
    }

    /// Resets the member at `index` to the group's zero value.
    pub fn remove_member(
        &mut self,
        ctx: &Context,
        group_id: GroupId,
        index: u64,
        identity_commitment: Word,
        proof_siblings: &[Word],
    ) -> Result<Word> {
        let group = self.admin_group_mut(ctx, group_id)?;
        let root = group
            .tree
            .remove(index, identity_commitment, proof_siblings)?;
        group.root_history.push(root, ctx.timestamp);

        self.emit(Event::MemberRemoved {
            group_id,
            index,
            identity_commitment,
            merkle_tree_root: root,
        });
        Ok(root)
    }

    /// Verifies a member's signal and consumes its nullifier.
    ///
    /// # Errors
    /// * `GroupDoesNotExist`
    /// * `MerkleTreeRootIsNotPartOfTheGroup` / `MerkleTreeRootIsExpired`
    /// * `YouAreUsingTheSameNullifierTwice`
    /// * `InvalidProof` if the backend rejects the proof
    #[allow(clippy::too_many_arguments)]
    pub fn verify_proof(
        &mut self,
        ctx: &Context,
        group_id: GroupId,
        merkle_tree_root: Word,
        signal: Word,
        nullifier_hash: Word,
        external_nullifier: Word,
        proof: &[u8],
    ) -> Result<()> {
        let group = self.group(group_id)?;
        if let Err(e) = group.check_root(&merkle_tree_root, ctx.timestamp) {
            debug!("Proof for group {group_id} rejected: {e} (root {merkle_tree_root})");
            return Err(e);
        }
        if group.is_nullifier_used(&nullifier_hash) {
            debug!("Proof for group {group_id} rejected: nullifier {nullifier_hash} already used");
            return Err(Error::YouAreUsingTheSameNullifierTwice(group_id));
        }

        let public_inputs = PublicInputs {
            merkle_tree_root,
            nullifier_hash,
            signal_hash: hash_signal(&signal),
            external_nullifier,
        };
        if !self.verifier.verify_proof(proof, &public_inputs) {
            debug!("Proof for group {group_id} rejected by the verifier");
            return Err(Error::InvalidProof);
        }

        if let Some(group) = self.state.groups.get_mut(&group_id) {
            group.nullifiers.insert(nullifier_hash, external_nullifier);
        }
        self.emit(Event::ProofVerified {
            group_id,
            merkle_tree_root,
            nullifier_hash,
            signal,
            external_nullifier,
        });
        Ok(())
    }

    /// The group record, if it exists.
    #[must_use]
    pub fn get_group(&self, group_id: GroupId) -> Option<&Group> {
        self.state.groups.get(&group_id)
    }

    pub fn get_group_admin(&self, group_id: GroupId) -> Result<Address> {
        Ok(self.group(group_id)?.admin)
    }

    pub fn get_merkle_tree_root(&self, group_id: GroupId) -> Result<Word> {
        Ok(self.group(group_id)?.tree.root())
    }

    pub fn get_merkle_tree_depth(&self, group_id: GroupId) -> Result<u8> {
        Ok(self.group(group_id)?.tree.depth())
    }

    pub fn get_number_of_merkle_tree_leaves(&self, group_id: GroupId) -> Result<u64> {
        Ok(self.group(group_id)?.tree.number_of_leaves())
    }

    pub fn is_nullifier_used(&self, group_id: GroupId, nullifier_hash: &Word) -> Result<bool> {
        Ok(self.group(group_id)?.is_nullifier_used(nullifier_hash))
    }

    /// Inclusion proof for the member at `index`, usable for
    /// [`Self::update_member`] and [`Self::remove_member`].
    pub fn get_merkle_proof(&self, group_id: GroupId, index: u64) -> Result<MerkleProof> {
        let tree = &self.group(group_id)?.tree;
        tree.merkle_proof(index)
            .ok_or(Error::LeafIndexOutOfRange {
                index,
                number_of_leaves: tree.number_of_leaves(),
            })
    }
}
