use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Field-keyed messages for a single branch payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BranchErrors(pub BTreeMap<String, Vec<String>>);

impl BranchErrors {
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Structured validation errors: a mapping from external field name to one
/// or more messages, with parallel per-branch error objects aligned to
/// branch order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldErrors {
    #[serde(flatten)]
    pub fields: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "BranchErrors::is_empty")]
    pub reference_branch: BranchErrors,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub treatment_branches: Vec<BranchErrors>,
}

impl FieldErrors {
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Grow the treatment-branch error array to `len` empty slots so
    /// per-branch errors stay aligned with the incoming branch order.
    pub fn align_treatment_branches(&mut self, len: usize) {
        while self.treatment_branches.len() < len {
            self.treatment_branches.push(BranchErrors::default());
        }
    }

    pub fn treatment_branch(&mut self, index: usize) -> &mut BranchErrors {
        self.align_treatment_branches(index + 1);
        &mut self.treatment_branches[index]
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
            && self.reference_branch.is_empty()
            && self.treatment_branches.iter().all(BranchErrors::is_empty)
    }

    pub fn messages_for(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn into_result(self) -> Result<(), OperationError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(OperationError::Validation(self))
        }
    }
}

#[derive(Debug, Error)]
pub enum OperationError {
    /// Business-rule or structural violations, field-keyed. Never a panic,
    /// never an exception path.
    #[error("validation failed")]
    Validation(FieldErrors),
    /// Referenced entity does not exist; distinct from validation errors.
    #[error("{0} was not found")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl OperationError {
    pub fn validation_errors(&self) -> Option<&FieldErrors> {
        match self {
            OperationError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_errors_convert_to_ok() {
        assert!(FieldErrors::default().into_result().is_ok());
    }

    #[test]
    fn branch_error_slots_stay_aligned() {
        let mut errors = FieldErrors::default();
        errors.treatment_branch(2).add("name", "duplicate");
        assert_eq!(errors.treatment_branches.len(), 3);
        assert!(errors.treatment_branches[0].is_empty());
        assert!(!errors.treatment_branches[2].is_empty());
        assert!(!errors.is_empty());
    }

    #[test]
    fn serializes_field_map_flat_with_nested_branches() {
        let mut errors = FieldErrors::default();
        errors.add("name", "required");
        errors.reference_branch.add("description", "blank");
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["name"][0], "required");
        assert_eq!(json["referenceBranch"]["description"][0], "blank");
    }
}
