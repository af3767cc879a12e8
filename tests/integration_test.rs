use semaphore_registry::{
    types::{hash_signal, zero_value_for},
    Address, Context, Deployment, Error, ErrorKind, Event, MockVerifier, PublicInputs, Word,
};

const T0: u64 = 1_700_000_000;
const REPUTATION: u64 = 1000;
const GROUP: u64 = 1000;

fn owner() -> Address {
    Address::from_low_u64(1)
}

fn admin_a() -> Address {
    Address::from_low_u64(0xa)
}

fn outsider() -> Address {
    Address::from_low_u64(0xb)
}

/// A deployment with reputation 1000 valid over `[T0, T0 + 999]`.
fn deployment() -> Deployment<MockVerifier> {
    let mut deployment = Deployment::deploy(owner(), MockVerifier, T0).unwrap();
    deployment
        .registry
        .add_reputation(
            &Context::new(owner(), T0),
            REPUTATION,
            admin_a(),
            "YOU",
            "https://example.org",
            T0,
            T0 + 999,
        )
        .unwrap();
    deployment.registry.take_events();
    deployment.semaphore.take_events();
    deployment
}

fn deployment_with_group(depth: u8, expiry: u64) -> Deployment<MockVerifier> {
    let mut deployment = deployment();
    let Deployment {
        semaphore,
        registry,
        ..
    } = &mut deployment;
    registry
        .create_group_with_expiry(
            &Context::new(admin_a(), T0),
            semaphore,
            REPUTATION,
            GROUP,
            depth,
            expiry,
        )
        .unwrap();
    semaphore.take_events();
    deployment
}

fn signal_proof(root: Word, nullifier_hash: Word, signal: Word, external: Word) -> Vec<u8> {
    MockVerifier::prove(&PublicInputs {
        merkle_tree_root: root,
        nullifier_hash,
        signal_hash: hash_signal(&signal),
        external_nullifier: external,
    })
}

#[test]
fn test_create_group_through_registry() {
    let mut deployment = deployment();
    let Deployment {
        semaphore,
        registry,
        ..
    } = &mut deployment;

    registry
        .create_group(&Context::new(admin_a(), T0 + 5), semaphore, REPUTATION, GROUP, 20)
        .unwrap();

    assert_eq!(
        semaphore.take_events(),
        vec![
            Event::GroupCreated {
                group_id: GROUP,
                merkle_tree_depth: 20,
                zero_value: zero_value_for(GROUP),
            },
            Event::GroupAdminUpdated {
                group_id: GROUP,
                old_admin: Address::ZERO,
                new_admin: admin_a(),
            },
        ]
    );
    assert_eq!(semaphore.get_merkle_tree_depth(GROUP), Ok(20));
    assert_eq!(semaphore.get_number_of_merkle_tree_leaves(GROUP), Ok(0));
}

#[test]
fn test_create_group_by_non_admin_is_rejected() {
    let mut deployment = deployment();
    let Deployment {
        semaphore,
        registry,
        ..
    } = &mut deployment;

    let result = registry.create_group(
        &Context::new(outsider(), T0 + 5),
        semaphore,
        REPUTATION,
        GROUP,
        20,
    );
    assert_eq!(result, Err(Error::NotReputationAdmin(REPUTATION)));
    assert!(semaphore.get_group(GROUP).is_none());
    assert!(semaphore.take_events().is_empty());
}

#[test]
fn test_direct_group_creation_bypassing_registry_is_rejected() {
    let mut deployment = deployment();
    for caller in [owner(), admin_a()] {
        assert_eq!(
            deployment
                .semaphore
                .create_group(&Context::new(caller, T0), GROUP, 20, admin_a()),
            Err(Error::NotRegistry)
        );
    }
}

#[test]
fn test_registry_rebinding_requires_current_registry() {
    let mut deployment = deployment();
    let registry_address = deployment.contracts.registry;

    assert_eq!(
        deployment
            .semaphore
            .update_registry(&Context::new(owner(), T0), owner()),
        Err(Error::NotRegistry)
    );
    deployment
        .semaphore
        .update_registry(&Context::new(registry_address, T0), owner())
        .unwrap();
    assert_eq!(deployment.semaphore.registry(), owner());

    // The registry is no longer trusted by the engine.
    let Deployment {
        semaphore,
        registry,
        ..
    } = &mut deployment;
    assert_eq!(
        registry.create_group(&Context::new(admin_a(), T0), semaphore, REPUTATION, GROUP, 20),
        Err(Error::NotRegistry)
    );
}

#[test]
fn test_signal_verification_and_nullifier_reuse() {
    let mut deployment = deployment_with_group(20, 0);
    let semaphore = &mut deployment.semaphore;
    let ctx = Context::new(admin_a(), T0 + 10);

    let root = semaphore.add_member(&ctx, GROUP, Word::from_u64(111)).unwrap();
    semaphore.take_events();

    let nullifier_hash = Word::from_u64(0xdead);
    let external = Word::from_u64(GROUP);
    let proof = signal_proof(root, nullifier_hash, Word::from_u64(1), external);

    semaphore
        .verify_proof(
            &ctx,
            GROUP,
            root,
            Word::from_u64(1),
            nullifier_hash,
            external,
            &proof,
        )
        .unwrap();
    assert_eq!(
        semaphore.take_events(),
        vec![Event::ProofVerified {
            group_id: GROUP,
            merkle_tree_root: root,
            nullifier_hash,
            signal: Word::from_u64(1),
            external_nullifier: external,
        }]
    );

    // Same nullifier with another signal and a valid proof for it.
    let proof = signal_proof(root, nullifier_hash, Word::from_u64(2), external);
    let error = semaphore
        .verify_proof(
            &ctx,
            GROUP,
            root,
            Word::from_u64(2),
            nullifier_hash,
            external,
            &proof,
        )
        .unwrap_err();
    assert_eq!(error, Error::YouAreUsingTheSameNullifierTwice(GROUP));
    assert_eq!(error.kind(), ErrorKind::StateConflict);
}

#[test]
fn test_nullifier_reuse_with_other_root_and_external_nullifier() {
    let mut deployment = deployment_with_group(20, 0);
    let semaphore = &mut deployment.semaphore;
    let ctx = Context::new(admin_a(), T0);

    let first_root = semaphore.add_member(&ctx, GROUP, Word::from_u64(1)).unwrap();
    let second_root = semaphore.add_member(&ctx, GROUP, Word::from_u64(2)).unwrap();
    let nullifier_hash = Word::from_u64(77);
    let signal = Word::from_u64(5);

    let proof = signal_proof(first_root, nullifier_hash, signal, Word::from_u64(3));
    semaphore
        .verify_proof(
            &ctx,
            GROUP,
            first_root,
            signal,
            nullifier_hash,
            Word::from_u64(3),
            &proof,
        )
        .unwrap();

    // A well-formed proof for the current root and another external nullifier.
    let proof = signal_proof(second_root, nullifier_hash, signal, Word::from_u64(4));
    assert_eq!(
        semaphore.verify_proof(
            &ctx,
            GROUP,
            second_root,
            signal,
            nullifier_hash,
            Word::from_u64(4),
            &proof,
        ),
        Err(Error::YouAreUsingTheSameNullifierTwice(GROUP))
    );
}

#[test]
fn test_expired_root_is_rejected() {
    let mut deployment = deployment_with_group(20, 100);
    let semaphore = &mut deployment.semaphore;

    let old_root = semaphore
        .add_member(&Context::new(admin_a(), T0), GROUP, Word::from_u64(1))
        .unwrap();
    semaphore
        .add_member(&Context::new(admin_a(), T0 + 1), GROUP, Word::from_u64(2))
        .unwrap();

    let nullifier_hash = Word::from_u64(7);
    let external = Word::from_u64(8);
    let signal = Word::from_u64(9);
    let proof = signal_proof(old_root, nullifier_hash, signal, external);

    let error = semaphore
        .verify_proof(
            &Context::new(outsider(), T0 + 101),
            GROUP,
            old_root,
            signal,
            nullifier_hash,
            external,
            &proof,
        )
        .unwrap_err();
    assert_eq!(error, Error::MerkleTreeRootIsExpired);
    assert_eq!(error.kind(), ErrorKind::ProofRejection);
    assert_eq!(semaphore.is_nullifier_used(GROUP, &nullifier_hash), Ok(false));

    semaphore
        .verify_proof(
            &Context::new(outsider(), T0 + 100),
            GROUP,
            old_root,
            signal,
            nullifier_hash,
            external,
            &proof,
        )
        .unwrap();
}

#[test]
fn test_current_root_never_expires() {
    let mut deployment = deployment_with_group(10, 1);
    let semaphore = &mut deployment.semaphore;
    let root = semaphore
        .add_member(&Context::new(admin_a(), T0), GROUP, Word::from_u64(1))
        .unwrap();

    let proof = signal_proof(root, Word::from_u64(2), Word::from_u64(3), Word::from_u64(4));
    semaphore
        .verify_proof(
            &Context::new(outsider(), T0 + 1_000_000),
            GROUP,
            root,
            Word::from_u64(3),
            Word::from_u64(2),
            Word::from_u64(4),
            &proof,
        )
        .unwrap();
}

#[test]
fn test_unknown_root_and_group() {
    let mut deployment = deployment_with_group(10, 0);
    let semaphore = &mut deployment.semaphore;
    let ctx = Context::new(outsider(), T0);
    let proof = [0u8; 32];

    assert_eq!(
        semaphore.verify_proof(
            &ctx,
            GROUP + 1,
            Word::from_u64(1),
            Word::from_u64(1),
            Word::from_u64(1),
            Word::from_u64(1),
            &proof
        ),
        Err(Error::GroupDoesNotExist(GROUP + 1))
    );
    assert_eq!(
        semaphore.verify_proof(
            &ctx,
            GROUP,
            Word::from_u64(1),
            Word::from_u64(1),
            Word::from_u64(1),
            Word::from_u64(1),
            &proof
        ),
        Err(Error::MerkleTreeRootIsNotPartOfTheGroup)
    );
}

#[test]
fn test_full_group_rejects_insert() {
    let mut deployment = deployment_with_group(2, 0);
    let semaphore = &mut deployment.semaphore;
    let ctx = Context::new(admin_a(), T0);

    let leaves: Vec<Word> = (1..=4).map(Word::from_u64).collect();
    semaphore.add_members(&ctx, GROUP, &leaves).unwrap();
    assert_eq!(semaphore.get_number_of_merkle_tree_leaves(GROUP), Ok(4));
    assert_eq!(
        semaphore.get_group(GROUP).unwrap().root_history().len(),
        5
    );

    let root = semaphore.get_merkle_tree_root(GROUP).unwrap();
    assert_eq!(
        semaphore.add_member(&ctx, GROUP, Word::from_u64(5)),
        Err(Error::FullTree)
    );
    assert_eq!(semaphore.get_merkle_tree_root(GROUP), Ok(root));
}

#[test]
fn test_group_admin_transfer() {
    let mut deployment = deployment_with_group(10, 0);
    let semaphore = &mut deployment.semaphore;

    assert_eq!(
        semaphore.update_group_admin(&Context::new(outsider(), T0), GROUP, outsider()),
        Err(Error::CallerIsNotTheGroupAdmin(GROUP))
    );
    semaphore
        .update_group_admin(&Context::new(admin_a(), T0), GROUP, outsider())
        .unwrap();
    assert_eq!(
        semaphore.take_events(),
        vec![Event::GroupAdminUpdated {
            group_id: GROUP,
            old_admin: admin_a(),
            new_admin: outsider(),
        }]
    );
    assert_eq!(
        semaphore.add_member(&Context::new(admin_a(), T0), GROUP, Word::from_u64(1)),
        Err(Error::CallerIsNotTheGroupAdmin(GROUP))
    );
    semaphore
        .add_member(&Context::new(outsider(), T0), GROUP, Word::from_u64(1))
        .unwrap();
}

#[test]
fn test_member_update_and_removal_keep_old_roots_valid() {
    let mut deployment = deployment_with_group(10, 0);
    let semaphore = &mut deployment.semaphore;
    let ctx = Context::new(admin_a(), T0);

    let leaves: Vec<Word> = (1..=3).map(Word::from_u64).collect();
    let first_root = semaphore.add_members(&ctx, GROUP, &leaves).unwrap();

    let path = semaphore.get_merkle_proof(GROUP, 0).unwrap();
    semaphore
        .update_member(&ctx, GROUP, 0, Word::from_u64(1), Word::from_u64(10), &path.siblings)
        .unwrap();
    let path = semaphore.get_merkle_proof(GROUP, 2).unwrap();
    semaphore
        .remove_member(&ctx, GROUP, 2, Word::from_u64(3), &path.siblings)
        .unwrap();

    let events = semaphore.take_events();
    assert!(matches!(events[1], Event::MemberUpdated { index: 0, .. }));
    assert!(matches!(events[2], Event::MemberRemoved { index: 2, .. }));

    // Leaf count is unchanged by removal.
    assert_eq!(semaphore.get_number_of_merkle_tree_leaves(GROUP), Ok(3));
    assert!(semaphore
        .get_group(GROUP)
        .unwrap()
        .check_root(&first_root, T0 + 10_000)
        .is_ok());
}

#[test]
fn test_reputation_lifecycle_does_not_touch_groups() {
    let mut deployment = deployment_with_group(10, 0);
    deployment
        .registry
        .remove_reputation(&Context::new(owner(), T0), REPUTATION)
        .unwrap();
    assert!(deployment.registry.reputation_info(REPUTATION).is_none());
    assert_eq!(deployment.semaphore.get_group_admin(GROUP), Ok(admin_a()));

    let Deployment {
        semaphore,
        registry,
        ..
    } = &mut deployment;
    assert_eq!(
        registry.create_group(&Context::new(admin_a(), T0), semaphore, REPUTATION, GROUP + 1, 10),
        Err(Error::NotReputationAdmin(REPUTATION))
    );
}
