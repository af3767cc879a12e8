//! Halo2 backend for signal proofs.
//!
//! # Scope
//!
//! [`SignalCircuit`] exposes the four public signals of a membership proof
//! (Merkle root, nullifier hash, signal hash, external nullifier) through an
//! instance column and binds each one to an advice cell with a copy
//! constraint. A proof produced for one tuple therefore never verifies for
//! another tuple.
//!
//! The membership relation itself (a Merkle path from the member's
//! commitment to the root, and nullifier derivation from the member's
//! secret) is a circuit concern outside this crate: the group engine treats
//! any backend as an opaque [`ProofVerifier`].

use crate::types::PublicInputs;
use crate::verifier::{ProofVerifier, DEFAULT_MAX_PROOF_SIZE};
use anyhow::{Context, Result};
use halo2_proofs::{
    circuit::{Layouter, SimpleFloorPlanner, Value},
    plonk::{
        create_proof, keygen_pk, keygen_vk, verify_proof, Advice, Circuit, Column,
        ConstraintSystem, Error, Instance, ProvingKey, SingleVerifier, VerifyingKey,
    },
    poly::commitment::Params,
    transcript::{Blake2bRead, Blake2bWrite, Challenge255},
};
use log::debug;
use pasta_curves::{pallas, vesta};
use rand::rngs::OsRng;

#[derive(Debug, Clone, Copy)]
pub struct SignalConfig {
    pub advice: Column<Advice>,
    pub instance: Column<Instance>,
}

#[derive(Debug, Default, Clone)]
pub struct SignalCircuit {
    /// Public signals in instance order.
    pub inputs: [pallas::Base; PublicInputs::ARITY],
}

impl Circuit<pallas::Base> for SignalCircuit {
    type Config = SignalConfig;
    type FloorPlanner = SimpleFloorPlanner;

    fn without_witnesses(&self) -> Self {
        Self::default()
    }

    fn configure(meta: &mut ConstraintSystem<pallas::Base>) -> Self::Config {
        let advice = meta.advice_column();
        let instance = meta.instance_column();
        meta.enable_equality(advice);
        meta.enable_equality(instance);

        SignalConfig { advice, instance }
    }

    fn synthesize(
        &self,
        config: Self::Config,
        mut layouter: impl Layouter<pallas::Base>,
    ) -> Result<(), Error> {
        let cells = layouter.assign_region(
            || "public signals",
            |mut region| {
                self.inputs
                    .iter()
                    .enumerate()
                    .map(|(row, value)| {
                        region.assign_advice(
                            || format!("signal {row}"),
                            config.advice,
                            row,
                            || Value::known(*value),
                        )
                    })
                    .collect::<Result<Vec<_>, Error>>()
            },
        )?;

        for (row, cell) in cells.iter().enumerate() {
            layouter.constrain_instance(cell.cell(), config.instance, row)?;
        }

        Ok(())
    }
}

/// Generates signal proofs with a cached proving key.
pub struct SignalProver {
    params: Params<vesta::Affine>,
    pk: ProvingKey<vesta::Affine>,
}

impl SignalProver {
    /// Sets up parameters of size `2^k` and derives the proving key.
    pub fn new(k: u32) -> Result<Self, Error> {
        let params = Params::<vesta::Affine>::new(k);
        let circuit = SignalCircuit::default();
        let vk = keygen_vk(&params, &circuit)?;
        let pk = keygen_pk(&params, vk, &circuit)?;
        Ok(Self { params, pk })
    }

    /// Produces a proof transcript for `public_inputs`.
    ///
    /// # Errors
    /// Returns an error if an input is not a field element or proving fails.
    pub fn prove(&self, public_inputs: &PublicInputs) -> Result<Vec<u8>> {
        let inputs = public_inputs
            .to_fields()
            .context("Public inputs must be lower than the field modulus")?;
        let circuit = SignalCircuit { inputs };

        let mut transcript = Blake2bWrite::<_, vesta::Affine, Challenge255<_>>::init(vec![]);
        let instances: &[&[&[pallas::Base]]] = &[&[&inputs[..]]];
        create_proof(
            &self.params,
            &self.pk,
            &[circuit],
            instances,
            OsRng,
            &mut transcript,
        )
        .map_err(|e| anyhow::anyhow!("Proof generation failed: {e:?}"))?;

        let proof = transcript.finalize();
        debug!("Generated signal proof of {} bytes", proof.len());
        Ok(proof)
    }
}

/// [`ProofVerifier`] backed by the Halo2 signal circuit.
pub struct Halo2Verifier {
    params: Params<vesta::Affine>,
    vk: VerifyingKey<vesta::Affine>,
    max_proof_size: usize,
}

impl Halo2Verifier {
    /// Sets up parameters of size `2^k` and derives the verifying key.
    pub fn new(k: u32) -> Result<Self, Error> {
        let params = Params::<vesta::Affine>::new(k);
        let vk = keygen_vk(&params, &SignalCircuit::default())?;
        Ok(Self {
            params,
            vk,
            max_proof_size: DEFAULT_MAX_PROOF_SIZE,
        })
    }

    #[must_use]
    pub fn with_max_proof_size(mut self, max_proof_size: usize) -> Self {
        self.max_proof_size = max_proof_size;
        self
    }
}

impl ProofVerifier for Halo2Verifier {
    fn verify_proof(&self, proof: &[u8], public_inputs: &PublicInputs) -> bool {
        if proof.is_empty() || proof.len() > self.max_proof_size {
            debug!("Rejecting proof of {} bytes", proof.len());
            return false;
        }
        let Some(inputs) = public_inputs.to_fields() else {
            debug!("Rejecting proof with out-of-range public inputs");
            return false;
        };

        let strategy = SingleVerifier::new(&self.params);
        let mut transcript = Blake2bRead::<_, vesta::Affine, Challenge255<_>>::init(proof);
        let instances: &[&[&[pallas::Base]]] = &[&[&inputs[..]]];

        match verify_proof(&self.params, &self.vk, strategy, instances, &mut transcript) {
            Ok(_) => true,
            Err(e) => {
                debug!("Signal proof rejected: {e:?}");
                false
            }
        }
    }
}
