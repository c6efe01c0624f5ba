//! Duplicate concept name resolution.

use std::collections::HashSet;

use crate::db::ConceptRepository;
use crate::error::Result;
use crate::models::{ConceptNameType, DemotedName, ImportedConcept};

/// Demote incoming names that would clash with existing identity names.
///
/// A name clashes when another local concept already carries an
/// identity-bearing name with the same text and locale, or when the incoming
/// concept itself repeats a fully-specified name within one locale. Clashing
/// names become index terms; nothing is dropped and the concept is never
/// rejected. Returns the demoted names.
pub async fn change_duplicate_concept_names_to_index_terms<R: ConceptRepository>(
    repo: &R,
    concept: &mut ImportedConcept,
) -> Result<Vec<DemotedName>> {
    let mut demoted = Vec::new();
    let mut seen_fully_specified: HashSet<(String, String)> = HashSet::new();

    for name in &mut concept.names {
        if !name.is_identity_bearing() {
            continue;
        }

        let repeated = name.name_type == ConceptNameType::FullySpecified
            && !seen_fully_specified.insert((name.name.clone(), name.locale.clone()));

        let owner = if repeated {
            None
        } else {
            repo.find_identity_owner(&name.name, &name.locale, &concept.uuid)
                .await?
        };

        if !repeated && owner.is_none() {
            continue;
        }

        tracing::debug!(
            "Demoting name '{}' ({}) of concept {} to index term; already used by {}",
            name.name,
            name.locale,
            concept.uuid,
            owner.as_deref().unwrap_or("the same concept")
        );

        demoted.push(DemotedName {
            concept_uuid: concept.uuid.clone(),
            name: name.name.clone(),
            locale: name.locale.clone(),
            previous_type: name.name_type,
        });
        name.demote_to_index_term();
    }

    Ok(demoted)
}
