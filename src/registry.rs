//! Reputation registry.
//!
//! The registry owns reputation records and is the only caller the bound
//! group engine accepts for group creation. A reputation admin may create
//! groups while the reputation is valid; the admin becomes the group admin.

use crate::address::Address;
use crate::error::{Error, Result};
use crate::semaphore::Semaphore;
use crate::types::{Context, Event, GroupId, Reputation, ReputationId};
use crate::verifier::ProofVerifier;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Serializable state of the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryState {
    /// Identity the registry uses when calling the group engine.
    pub address: Address,
    /// Privileged registrar allowed to add and remove reputations.
    pub owner: Address,
    pub semaphore: Option<Address>,
    pub reputations: BTreeMap<ReputationId, Reputation>,
}

/// Registry of reputations gating group creation.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    state: RegistryState,
    events: Vec<Event>,
}

impl Registry {
    /// Creates a registry at `address` owned by `owner`, not yet bound to a
    /// group engine.
    pub fn new(address: Address, owner: Address) -> Self {
        Self::from_state(RegistryState {
            address,
            owner,
            semaphore: None,
            reputations: BTreeMap::new(),
        })
    }

    pub fn from_state(state: RegistryState) -> Self {
        Self {
            state,
            events: Vec::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> &RegistryState {
        &self.state
    }

    #[must_use]
    pub fn address(&self) -> Address {
        self.state.address
    }

    #[must_use]
    pub fn owner(&self) -> Address {
        self.state.owner
    }

    #[must_use]
    pub fn semaphore(&self) -> Option<Address> {
        self.state.semaphore
    }

    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    fn emit(&mut self, event: Event) {
        info!("{event:?}");
        self.events.push(event);
    }

    fn only_owner(&self, ctx: &Context) -> Result<()> {
        if ctx.caller != self.state.owner {
            debug!("{} is not the registry owner", ctx.caller);
            return Err(Error::CallerIsNotOwner);
        }
        Ok(())
    }

    fn admin_reputation_mut(
        &mut self,
        ctx: &Context,
        id: ReputationId,
    ) -> Result<&mut Reputation> {
        let reputation = self
            .state
            .reputations
            .get_mut(&id)
            .ok_or(Error::ReputationDoesNotExist(id))?;
        if !reputation.is_admin(&ctx.caller) {
            debug!("{} is not the admin of reputation {id}", ctx.caller);
            return Err(Error::NotReputationAdmin(id));
        }
        Ok(reputation)
    }

    /// Hands the registry over to `new_owner`.
    pub fn transfer_ownership(&mut self, ctx: &Context, new_owner: Address) -> Result<()> {
        self.only_owner(ctx)?;
        if new_owner.is_zero() {
            return Err(Error::InvalidAddress);
        }
        let previous_owner = std::mem::replace(&mut self.state.owner, new_owner);

        self.emit(Event::OwnershipTransferred {
            previous_owner,
            new_owner,
        });
        Ok(())
    }

    /// Binds the group engine this registry creates groups in.
    pub fn update_semaphore(&mut self, ctx: &Context, new_semaphore: Address) -> Result<()> {
        self.only_owner(ctx)?;
        if new_semaphore.is_zero() {
            return Err(Error::InvalidAddress);
        }
        let old_semaphore = self.state.semaphore.replace(new_semaphore);

        self.emit(Event::SemaphoreUpdated {
            old_semaphore,
            new_semaphore,
        });
        Ok(())
    }

    /// Registers a reputation.
    ///
    /// # Errors
    /// * `CallerIsNotOwner`
    /// * `InvalidAddress` for a zero admin
    /// * `ReputationIdAlreadyExists`
    /// * `InvalidReputationTime` if `valid_from > valid_until`
    #[allow(clippy::too_many_arguments)]
    pub fn add_reputation(
        &mut self,
        ctx: &Context,
        id: ReputationId,
        admin: Address,
        name: impl Into<String>,
        content_uri: impl Into<String>,
        valid_from: u64,
        valid_until: u64,
    ) -> Result<()> {
        self.only_owner(ctx)?;
        if admin.is_zero() {
            return Err(Error::InvalidAddress);
        }
        if self.state.reputations.contains_key(&id) {
            return Err(Error::ReputationIdAlreadyExists(id));
        }
        if valid_from > valid_until {
            return Err(Error::InvalidReputationTime {
                valid_from,
                valid_until,
            });
        }

        let name = name.into();
        self.state.reputations.insert(
            id,
            Reputation {
                id,
                admin,
                name: name.clone(),
                content_uri: content_uri.into(),
                valid_from,
                valid_until,
            },
        );
        self.emit(Event::ReputationAdded { id, name });
        Ok(())
    }

    pub fn update_reputation_uri(
        &mut self,
        ctx: &Context,
        id: ReputationId,
        content_uri: impl Into<String>,
    ) -> Result<()> {
        let reputation = self.admin_reputation_mut(ctx, id)?;
        reputation.content_uri = content_uri.into();
        info!("Reputation {id} content URI set to {}", reputation.content_uri);
        Ok(())
    }

    pub fn update_reputation_name(
        &mut self,
        ctx: &Context,
        id: ReputationId,
        name: impl Into<String>,
    ) -> Result<()> {
        let reputation = self.admin_reputation_mut(ctx, id)?;
        reputation.name = name.into();
        info!("Reputation {id} renamed to {}", reputation.name);
        Ok(())
    }

    pub fn update_reputation_admin(
        &mut self,
        ctx: &Context,
        id: ReputationId,
        new_admin: Address,
    ) -> Result<()> {
        let reputation = self.admin_reputation_mut(ctx, id)?;
        if new_admin.is_zero() {
            return Err(Error::InvalidAddress);
        }
        reputation.admin = new_admin;
        info!("Reputation {id} admin set to {new_admin}");
        Ok(())
    }

    /// Deletes a reputation. Groups it created are left untouched.
    pub fn remove_reputation(&mut self, ctx: &Context, id: ReputationId) -> Result<()> {
        self.only_owner(ctx)?;
        let reputation = self
            .state
            .reputations
            .remove(&id)
            .ok_or(Error::ReputationDoesNotExist(id))?;

        self.emit(Event::ReputationRemoved {
            id,
            name: reputation.name,
        });
        Ok(())
    }

    #[must_use]
    pub fn reputation_info(&self, id: ReputationId) -> Option<&Reputation> {
        self.state.reputations.get(&id)
    }

    /// Creates a group whose historical roots never expire.
    pub fn create_group<V: ProofVerifier>(
        &mut self,
        ctx: &Context,
        semaphore: &mut Semaphore<V>,
        reputation_id: ReputationId,
        group_id: GroupId,
        depth: u8,
    ) -> Result<()> {
        self.create_group_with_expiry(ctx, semaphore, reputation_id, group_id, depth, 0)
    }

    /// Creates a group in the bound engine with the caller as its admin.
    ///
    /// # Errors
    /// * `SemaphoreNotBound` if `semaphore` is not the bound engine
    /// * `NotReputationAdmin` unless the caller administers a reputation that
    ///   is valid at `ctx.timestamp`
    /// * any error of [`Semaphore::create_group_with_expiry`]
    #[allow(clippy::too_many_arguments)]
    pub fn create_group_with_expiry<V: ProofVerifier>(
        &mut self,
        ctx: &Context,
        semaphore: &mut Semaphore<V>,
        reputation_id: ReputationId,
        group_id: GroupId,
        depth: u8,
        merkle_tree_duration: u64,
    ) -> Result<()> {
        if self.state.semaphore != Some(semaphore.address()) {
            debug!(
                "Registry {} is not bound to engine {}",
                self.state.address,
                semaphore.address()
            );
            return Err(Error::SemaphoreNotBound);
        }
        let authorized = self
            .state
            .reputations
            .get(&reputation_id)
            .is_some_and(|r| r.is_admin(&ctx.caller) && r.is_valid_at(ctx.timestamp));
        if !authorized {
            debug!(
                "{} may not create groups for reputation {reputation_id} at {}",
                ctx.caller, ctx.timestamp
            );
            return Err(Error::NotReputationAdmin(reputation_id));
        }

        let registry_ctx = Context::new(self.state.address, ctx.timestamp);
        semaphore.create_group_with_expiry(
            &registry_ctx,
            group_id,
            depth,
            ctx.caller,
            merkle_tree_duration,
        )?;
        info!("Reputation {reputation_id} created group {group_id}");
        Ok(())
    }
}
