use crate::schemes::Registry;

/// Canonical citation-direction class a provider-specific relation type
/// folds into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationClass {
    Cites,
    IsCitedBy,
    IsPartOf,
    Discard,
}

/// Folds a provider relation vocabulary into the canonical classes.
///
/// Matching is case-insensitive and whitespace-trimmed. DataCite, Crossref
/// and JaLC each spell the same semantic relation differently; everything
/// downstream branches on the class, never on the provider string. An
/// `IsPartOf` relation only counts when the target identifier belongs to a
/// container scheme (issn/isbn) -- a part-of link to anything else carries no
/// citation information and is discarded.
pub fn classify(relation_type: &str, target_scheme: &str) -> RelationClass {
    match relation_type.trim().to_lowercase().as_str() {
        "references" | "cites" => RelationClass::Cites,
        "isreferencedby" | "iscitedby" => RelationClass::IsCitedBy,
        "ispartof" if Registry::is_container_scheme(target_scheme) => RelationClass::IsPartOf,
        _ => RelationClass::Discard,
    }
}
