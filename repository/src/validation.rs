//! Block validator chain.
//!
//! The ingestion loop runs every candidate block through an ordered
//! collection of validators before handing it to the repository. Each
//! validator checks one rule; the chain appends every failure so the caller
//! sees the full list, not just the first.

use thiserror::Error;

use crate::block::Block;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub String);

/// A single validation rule.
pub trait BlockValidator: Send + Sync {
    fn validate(&self, block: &Block) -> Result<(), ValidationError>;
}

/// Closures are validators.
impl<F> BlockValidator for F
where
    F: Fn(&Block) -> Result<(), ValidationError> + Send + Sync,
{
    fn validate(&self, block: &Block) -> Result<(), ValidationError> {
        self(block)
    }
}

/// An ordered collection of validators.
#[derive(Default)]
pub struct ValidatorChain {
    validators: Vec<Box<dyn BlockValidator>>,
}

impl ValidatorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a validator; validators run in insertion order.
    pub fn push(&mut self, validator: Box<dyn BlockValidator>) {
        self.validators.push(validator);
    }

    /// Run every validator, collecting all failures in order. An empty
    /// result means the block passed.
    pub fn validate(&self, block: &Block) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for validator in &self.validators {
            if let Err(e) = validator.validate(block) {
                errors.push(e);
            }
        }
        errors
    }
}
