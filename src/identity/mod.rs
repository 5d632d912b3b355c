//! Deterministic resource identifiers.
//!
//! Every id and composite key emitted by the converter goes through [`sanitize`], so the same
//! input always produces the same `[a-z0-9-]` string regardless of the resource type.

use std::collections::HashMap;

use thiserror::Error;

use crate::segment::{Repetition, Segment, non_empty};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("no usable identifier")]
    NoUsableIdentifier,
}

/// A primary identifier value plus an optional namespace (assigning authority, namespace id).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityIdentifier {
    pub value: String,
    pub namespace: Option<String>,
}

impl EntityIdentifier {
    pub fn new(value: impl Into<String>, namespace: Option<&str>) -> Self {
        Self {
            value: value.into(),
            namespace: namespace.and_then(non_empty).map(str::to_string),
        }
    }

    /// CX: ID number in component 1, assigning authority in component 4.
    pub fn from_cx(rep: &Repetition) -> Self {
        Self::new(rep.component(1).trim(), Some(rep.component(4)))
    }

    /// EI: entity identifier in component 1, namespace id in component 2.
    pub fn from_ei(rep: &Repetition) -> Self {
        Self::new(rep.component(1).trim(), Some(rep.component(2)))
    }

    /// EI read from a segment field, empty when the field is blank.
    pub fn ei_field(segment: &Segment, field: usize) -> Self {
        segment.first(field).map(Self::from_ei).unwrap_or_default()
    }

    pub fn is_usable(&self) -> bool {
        !self.value.trim().is_empty()
    }
}

/// Lowercase, then replace every character outside `[a-z0-9-]` with `-`.
pub fn sanitize(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '-' => c,
            _ => '-',
        })
        .collect()
}

/// Pick the first usable candidate and turn it into an id.
///
/// The namespace is appended as `{value}-{namespace}` only when it differs from the value.
pub fn build_id<'a, I>(candidates: I) -> Result<String, IdentityError>
where
    I: IntoIterator<Item = &'a EntityIdentifier>,
{
    let candidate = candidates
        .into_iter()
        .find(|c| c.is_usable())
        .ok_or(IdentityError::NoUsableIdentifier)?;

    let value = candidate.value.trim();
    let id = match candidate.namespace.as_deref() {
        Some(ns) if ns != value => format!("{value}-{ns}"),
        _ => value.to_string(),
    };

    Ok(sanitize(&id))
}

/// Join the non-blank parts with `-` and sanitize the result.
pub fn composite_key(parts: &[&str]) -> String {
    let joined = parts
        .iter()
        .filter_map(|p| non_empty(p))
        .collect::<Vec<_>>()
        .join("-");
    sanitize(&joined)
}

/// Kebab-case for mapping ids: lowercase, runs of other characters collapse to one `-`,
/// no leading or trailing dash.
pub fn to_kebab_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut pending_dash = false;
    for c in value.trim().to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Parsed diagnosis priority; invalid or non-positive values sort after every valid one.
fn priority_rank(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|p| *p > 0)
}

fn rank_before(candidate: Option<u32>, current: Option<u32>) -> bool {
    match (candidate, current) {
        (Some(a), Some(b)) => a < b,
        (Some(_), None) => true,
        _ => false,
    }
}

/// Collapse records sharing a key to the one with the best priority.
///
/// Groups keep the order in which their key was first seen; ties keep the first record.
pub fn dedup_by_priority<T, K, P>(items: Vec<T>, key: K, priority: P) -> Vec<T>
where
    K: Fn(&T) -> (String, String),
    P: Fn(&T) -> Option<u32>,
{
    let mut slots: HashMap<(String, String), usize> = HashMap::new();
    let mut selected: Vec<T> = Vec::new();

    for item in items {
        let k = key(&item);
        match slots.get(&k) {
            Some(&index) => {
                if rank_before(priority(&item), priority(&selected[index])) {
                    selected[index] = item;
                }
            }
            None => {
                slots.insert(k, selected.len());
                selected.push(item);
            }
        }
    }

    selected
}

/// DG1 dedup key: diagnosis code and its display (DG1-3.2, falling back to DG1-4).
pub fn diagnosis_key(dg1: &Segment) -> (String, String) {
    let code = dg1.component(3, 1).trim().to_string();
    let display = dg1
        .opt_component(3, 2)
        .or_else(|| dg1.opt_value(4))
        .unwrap_or("")
        .to_string();
    (code, display)
}

/// Deduplicate DG1 segments by [`diagnosis_key`], keeping the lowest DG1-15 priority.
pub fn select_diagnoses<'a>(diagnoses: &[&'a Segment]) -> Vec<&'a Segment> {
    dedup_by_priority(diagnoses.to_vec(), |dg1| diagnosis_key(dg1), |dg1| {
        priority_rank(dg1.value(15))
    })
}
