use crate::{
    document_index::{DocumentIndex, FacetField},
    error::Result,
};

/// Upper bound on distinct values per facet; tag, language and owner
/// cardinalities stay far below it.
pub const FACET_TERM_LIMIT: usize = 100_000;

/// Count snippets per distinct value of `field`, most common first.
///
/// Order among equal counts is unspecified.
pub fn summarize<I: DocumentIndex + ?Sized>(
    index: &I,
    field: FacetField,
) -> Result<Vec<(String, u64)>> {
    let counts = index.facet(field, FACET_TERM_LIMIT)?;
    tracing::debug!(field = %field.field(), values = counts.len(), "summarized");
    Ok(counts)
}
