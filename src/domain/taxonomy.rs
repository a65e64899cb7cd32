use crate::domain::models::OperationTypeMapping;

/// Classification stored for pairs nobody has curated yet.
pub const NEW_CLASSIFICATION: &str = "new";

/// Known (operation type, subtype prefix) pairs for one write batch.
///
/// Loaded once when the batch starts. Pairs learned during the batch are
/// added so later lines of the same batch match them; pairs learned by
/// concurrent batches stay invisible until the next load.
#[derive(Debug, Clone, Default)]
pub struct TaxonomySnapshot {
    known: Vec<(String, Option<String>)>,
}

impl TaxonomySnapshot {
    pub fn new<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, Option<String>)>,
    {
        Self {
            known: pairs.into_iter().collect(),
        }
    }

    pub fn from_mappings(mappings: &[OperationTypeMapping]) -> Self {
        Self::new(
            mappings
                .iter()
                .map(|m| (m.operation_type.clone(), m.subtype_prefix.clone())),
        )
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    pub fn matches(&self, operation_type: &str, bonus_subtype: Option<&str>) -> bool {
        self.known.iter().any(|(known_type, prefix)| {
            known_type == operation_type
                && match (prefix.as_deref(), bonus_subtype) {
                    (None, None) => true,
                    (Some(prefix), Some(subtype)) => subtype.starts_with(prefix),
                    _ => false,
                }
        })
    }

    /// Returns the mapping to persist when the pair is not yet known.
    pub fn learn(
        &mut self,
        operation_type: &str,
        bonus_subtype: Option<&str>,
    ) -> Option<OperationTypeMapping> {
        if self.matches(operation_type, bonus_subtype) {
            return None;
        }
        self.known
            .push((operation_type.to_string(), bonus_subtype.map(str::to_string)));
        Some(OperationTypeMapping {
            operation_type: operation_type.to_string(),
            subtype_prefix: bonus_subtype.map(str::to_string),
            classification: Some(NEW_CLASSIFICATION.to_string()),
        })
    }
}
