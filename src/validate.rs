//! Validation pipeline without cache or hooks.
//!
//! structural contract -> naming law -> (pack/registry) integrity -> prefixes.
//! [`CanonEngine`](crate::CanonEngine) runs the same pipeline with its own
//! naming configuration, cache and monitoring.

use serde_json::Value;

use crate::error::Result;
use crate::integrity::{check_integrity, IntegrityRules, IntegrityScope};
use crate::naming::NamingLaw;
use crate::shapes::{
    CanonShape, CodedShape, ConceptShape, KernelRegistryShape, PackShape, ValueSetShape,
    ValueShape,
};

pub fn validate_concept(input: &Value) -> Result<ConceptShape> {
    validate_coded(&NamingLaw::default(), input)
}

pub fn validate_value_set(input: &Value) -> Result<ValueSetShape> {
    validate_coded(&NamingLaw::default(), input)
}

pub fn validate_value(input: &Value) -> Result<ValueShape> {
    validate_coded(&NamingLaw::default(), input)
}

pub fn validate_pack(input: &Value) -> Result<PackShape> {
    validate_pack_with(&NamingLaw::default(), input)
}

pub fn validate_kernel_registry(input: &Value) -> Result<KernelRegistryShape> {
    validate_registry_with(&NamingLaw::default(), input)
}

pub(crate) fn validate_coded<T: CodedShape>(law: &NamingLaw, input: &Value) -> Result<T> {
    let shape = T::validate(input)?;
    law.check(&shape)?;
    Ok(shape)
}

pub(crate) fn validate_pack_with(law: &NamingLaw, input: &Value) -> Result<PackShape> {
    let pack = PackShape::validate(input)?;
    check_scope(
        law,
        &IntegrityRules::for_scope(IntegrityScope::Pack),
        &pack.concepts,
        &pack.value_sets,
        &pack.values,
    )?;
    Ok(pack)
}

pub(crate) fn validate_registry_with(
    law: &NamingLaw,
    input: &Value,
) -> Result<KernelRegistryShape> {
    let registry = KernelRegistryShape::validate(input)?;
    check_scope(
        law,
        &IntegrityRules::from_flags(&registry.validation),
        &registry.concepts,
        &registry.value_sets,
        &registry.values,
    )?;
    Ok(registry)
}

fn check_scope(
    law: &NamingLaw,
    rules: &IntegrityRules,
    concepts: &[ConceptShape],
    value_sets: &[ValueSetShape],
    values: &[ValueShape],
) -> Result<()> {
    concepts.iter().try_for_each(|c| law.check(c))?;
    value_sets.iter().try_for_each(|vs| law.check(vs))?;
    values.iter().try_for_each(|v| law.check(v))?;
    check_integrity(rules, concepts, value_sets, values)?;
    law.check_prefixes(value_sets, values)
}
