//! Grouping of independent operations for parallel validation.

use std::collections::BTreeMap;
use std::thread;

use super::{StateView, ValidationOutcome, Validator, WitnessBinding};
use crate::contract::{Operation, SealDefinition, TypeName};
use crate::schema::Schema;

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Resource<'a> {
    Seal(&'a SealDefinition),
    Global(&'a TypeName),
}

fn resources(operation: &Operation) -> impl Iterator<Item = Resource<'_>> {
    operation
        .inputs()
        .iter()
        .chain(operation.outputs().map(|(_, seal, _)| seal))
        .map(Resource::Seal)
        .chain(operation.globals().keys().map(Resource::Global))
}

/// Partitions operations, given in topological order, into consecutive
/// batches whose members touch disjoint seals and global types.
///
/// Every operation lands in a later batch than any earlier operation it
/// shares a resource with, so dependencies and conflicting spends are
/// always separated. Members of one batch may be validated in parallel
/// against the state left by the previous batches.
#[must_use]
pub fn independent_batches(operations: &[Operation]) -> Vec<Vec<usize>> {
    let mut last_batch: BTreeMap<Resource<'_>, usize> = BTreeMap::new();
    let mut batches: Vec<Vec<usize>> = Vec::new();

    for (index, operation) in operations.iter().enumerate() {
        let batch = resources(operation)
            .filter_map(|resource| last_batch.get(&resource).map(|b| b + 1))
            .max()
            .unwrap_or(0);
        for resource in resources(operation) {
            last_batch.insert(resource, batch);
        }
        if batches.len() <= batch {
            batches.resize_with(batch + 1, Vec::new);
        }
        batches[batch].push(index);
    }
    batches
}

impl Validator {
    /// Validates independent operations against the same view, one thread
    /// per operation. Outcomes are returned in input order.
    ///
    /// Callers must ensure the operations are independent, e.g. by taking
    /// them from one [`independent_batches`] group.
    pub fn validate_batch(
        &self,
        schema: &Schema,
        view: &dyn StateView,
        batch: &[(&Operation, Option<WitnessBinding<'_>>)],
    ) -> Vec<ValidationOutcome> {
        if let [(operation, witness)] = batch {
            return vec![self.validate(schema, view, operation, *witness)];
        }
        thread::scope(|scope| {
            let handles: Vec<_> = batch
                .iter()
                .map(|(operation, witness)| {
                    scope.spawn(move || self.validate(schema, view, operation, *witness))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                })
                .collect()
        })
    }
}
