use semaphore_registry::{
    types::hash_signal, Address, Context, Deployment, Error, Halo2Verifier, ProofVerifier,
    PublicInputs, SignalProver, Word, CIRCUIT_K,
};

fn inputs() -> PublicInputs {
    PublicInputs {
        merkle_tree_root: Word::from_u64(11),
        nullifier_hash: Word::from_u64(22),
        signal_hash: hash_signal(&Word::from_u64(33)),
        external_nullifier: Word::from_u64(44),
    }
}

#[test]
fn test_circuit_proof_generation_and_verification() {
    let prover = SignalProver::new(CIRCUIT_K).unwrap();
    let verifier = Halo2Verifier::new(CIRCUIT_K).unwrap();

    let proof = prover.prove(&inputs()).unwrap();
    assert!(!proof.is_empty());
    assert!(verifier.verify_proof(&proof, &inputs()), "Proof should be valid");
}

#[test]
fn test_proof_is_bound_to_every_public_input() {
    let prover = SignalProver::new(CIRCUIT_K).unwrap();
    let verifier = Halo2Verifier::new(CIRCUIT_K).unwrap();
    let proof = prover.prove(&inputs()).unwrap();

    let tampered: [fn(&mut PublicInputs); 4] = [
        |i| i.merkle_tree_root = Word::from_u64(12),
        |i| i.nullifier_hash = Word::from_u64(23),
        |i| i.signal_hash = hash_signal(&Word::from_u64(34)),
        |i| i.external_nullifier = Word::from_u64(45),
    ];
    for tamper in tampered {
        let mut other = inputs();
        tamper(&mut other);
        assert!(!verifier.verify_proof(&proof, &other));
    }
}

#[test]
fn test_malformed_proofs_are_rejected() {
    let prover = SignalProver::new(CIRCUIT_K).unwrap();
    let verifier = Halo2Verifier::new(CIRCUIT_K).unwrap();
    let proof = prover.prove(&inputs()).unwrap();

    assert!(!verifier.verify_proof(&[], &inputs()));
    assert!(!verifier.verify_proof(&proof[..proof.len() / 2], &inputs()));
    assert!(!verifier.verify_proof(&[0xffu8; 64], &inputs()));

    let small = Halo2Verifier::new(CIRCUIT_K)
        .unwrap()
        .with_max_proof_size(proof.len() - 1);
    assert!(!small.verify_proof(&proof, &inputs()));
}

#[test]
fn test_out_of_range_inputs() {
    let prover = SignalProver::new(CIRCUIT_K).unwrap();
    let mut bad = inputs();
    bad.external_nullifier = Word([0xffu8; 32]);
    assert!(prover.prove(&bad).is_err());

    let verifier = Halo2Verifier::new(CIRCUIT_K).unwrap();
    let proof = prover.prove(&inputs()).unwrap();
    assert!(!verifier.verify_proof(&proof, &bad));
}

#[test]
fn test_group_engine_with_halo2_backend() {
    let owner = Address::from_low_u64(1);
    let admin = Address::from_low_u64(2);
    let verifier = Halo2Verifier::new(CIRCUIT_K).unwrap();
    let prover = SignalProver::new(CIRCUIT_K).unwrap();

    let mut deployment = Deployment::deploy(owner, verifier, 0).unwrap();
    deployment
        .registry
        .add_reputation(&Context::new(owner, 0), 1, admin, "YOU", "uri", 0, 100)
        .unwrap();
    let Deployment {
        semaphore,
        registry,
        ..
    } = &mut deployment;
    let ctx = Context::new(admin, 1);
    registry.create_group(&ctx, semaphore, 1, 1, 16).unwrap();
    let root = semaphore.add_member(&ctx, 1, Word::from_u64(5)).unwrap();

    let signal = Word::from_u64(33);
    let public_inputs = PublicInputs {
        merkle_tree_root: root,
        nullifier_hash: Word::from_u64(22),
        signal_hash: hash_signal(&signal),
        external_nullifier: Word::from_u64(1),
    };
    let proof = prover.prove(&public_inputs).unwrap();

    assert_eq!(
        semaphore.verify_proof(
            &ctx,
            1,
            root,
            Word::from_u64(34),
            public_inputs.nullifier_hash,
            public_inputs.external_nullifier,
            &proof
        ),
        Err(Error::InvalidProof)
    );
    semaphore
        .verify_proof(
            &ctx,
            1,
            root,
            signal,
            public_inputs.nullifier_hash,
            public_inputs.external_nullifier,
            &proof,
        )
        .unwrap();
    assert_eq!(
        semaphore.is_nullifier_used(1, &public_inputs.nullifier_hash),
        Ok(true)
    );
}
