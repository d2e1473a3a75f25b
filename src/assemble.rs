use crate::models::{Agent, Container, ProcessedEntity, RelationBuckets};
use crate::relations::{classify, RelationClass};
use crate::resolve::Resolver;
use crate::schemes::Registry;
use serde_json::{Map, Value};

/// Attribute keys copied onto the processed entity unchanged
const KEYS_TO_KEEP: [&str; 6] = [
    "titles",
    "publicationYear",
    "dates",
    "types",
    "updated",
    "publisher",
];

const CREATOR_KEYS: [&str; 4] = ["givenName", "familyName", "name", "nameType"];
const CONTRIBUTOR_KEYS: [&str; 5] = [
    "givenName",
    "familyName",
    "name",
    "nameType",
    "contributorType",
];
const CONTAINER_KEYS: [&str; 6] = ["type", "title", "firstPage", "volume", "issue", "lastPage"];

enum AgentKind {
    Creator,
    Contributor,
}

/// Builds a `ProcessedEntity` from a candidate's attribute map, or `None`
/// when no citation relation survives validation.
///
/// Relation entries are resolved first. If the Cites and IsCitedBy buckets
/// both come out empty the candidate is dropped before any other identifier
/// on it is resolved -- creators, contributors, the identifier list and the
/// container all carry potentially expensive authority checks that would be
/// wasted on a discarded entity.
pub fn assemble(
    doi: String,
    attributes: &Map<String, Value>,
    resolver: &Resolver,
) -> Option<ProcessedEntity> {
    let related_identifiers = resolve_relations(attributes.get("relatedIdentifiers"), resolver);
    if !related_identifiers.has_citations() {
        return None;
    }

    let kept: Map<String, Value> = attributes
        .iter()
        .filter(|(k, _)| KEYS_TO_KEEP.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let creators = resolve_agents(attributes.get("creators"), AgentKind::Creator, resolver);
    let contributors = resolve_agents(
        attributes.get("contributors"),
        AgentKind::Contributor,
        resolver,
    );
    let identifiers = resolve_identifiers(attributes.get("identifiers"), resolver);
    let container = resolve_container(attributes.get("container"), resolver);

    Some(ProcessedEntity {
        doi,
        kept,
        related_identifiers,
        creators,
        contributors,
        identifiers,
        container,
    })
}

/// Classifies and resolves the raw relation entries into buckets. An entry
/// needs all of `relationType`, `relatedIdentifierType` and
/// `relatedIdentifier`; anything else is skipped.
fn resolve_relations(relations: Option<&Value>, resolver: &Resolver) -> RelationBuckets {
    let mut buckets = RelationBuckets::default();
    let Some(entries) = relations.and_then(Value::as_array) else {
        return buckets;
    };

    for entry in entries {
        let Some(relation_type) = entry.get("relationType").and_then(Value::as_str) else {
            continue;
        };
        let Some(scheme) = entry.get("relatedIdentifierType").and_then(Value::as_str) else {
            continue;
        };
        let Some(target) = entry.get("relatedIdentifier").map(as_id_string) else {
            continue;
        };

        let class = classify(relation_type, scheme);
        if class == RelationClass::Discard {
            continue;
        }
        if let Some(normalized) = resolver.resolve(&target, scheme) {
            buckets.push(class, normalized);
        }
    }

    buckets
}

/// Keeps creator/contributor entries that name a person, restricted to
/// editors for contributors, with allow-listed fields and resolved agent
/// identifiers (possibly none).
fn resolve_agents(agents: Option<&Value>, kind: AgentKind, resolver: &Resolver) -> Vec<Agent> {
    let Some(entries) = agents.and_then(Value::as_array) else {
        return Vec::new();
    };

    let allowed: &[&str] = match kind {
        AgentKind::Creator => &CREATOR_KEYS,
        AgentKind::Contributor => &CONTRIBUTOR_KEYS,
    };

    let mut processed = Vec::new();
    for entry in entries {
        let Some(obj) = entry.as_object() else {
            continue;
        };
        let has_split_name = non_empty(obj.get("givenName")) && non_empty(obj.get("familyName"));
        if !has_split_name && !non_empty(obj.get("name")) {
            continue;
        }
        if matches!(kind, AgentKind::Contributor) {
            if let Some(contributor_type) = obj.get("contributorType").and_then(Value::as_str) {
                if contributor_type != "Editor" {
                    continue;
                }
            }
        }

        let mut name_identifiers = Vec::new();
        if let Some(name_ids) = obj.get("nameIdentifiers").and_then(Value::as_array) {
            for nid in name_ids {
                let Some(scheme) = nid.get("nameIdentifierScheme").and_then(Value::as_str) else {
                    continue;
                };
                if !Registry::is_agent_scheme(scheme) {
                    continue;
                }
                let Some(raw) = nid.get("nameIdentifier").map(as_id_string) else {
                    continue;
                };
                if let Some(normalized) = resolver.resolve(&raw, scheme) {
                    if !name_identifiers.contains(&normalized) {
                        name_identifiers.push(normalized);
                    }
                }
            }
        }

        let fields: Map<String, Value> = obj
            .iter()
            .filter(|(k, _)| allowed.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        processed.push(Agent {
            fields,
            name_identifiers,
        });
    }

    processed
}

/// Resolves the generic identifier list. Entries whose scheme is `doi` are
/// excluded outright: a DOI here is assumed to duplicate (or contradict) the
/// entity's primary DOI.
fn resolve_identifiers(identifiers: Option<&Value>, resolver: &Resolver) -> Vec<String> {
    let Some(entries) = identifiers.and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut processed = Vec::new();
    for entry in entries {
        let Some(scheme) = entry.get("identifierType").and_then(Value::as_str) else {
            continue;
        };
        let folded = scheme.trim().to_lowercase();
        if folded == "doi" || !Registry::is_citation_scheme(&folded) {
            continue;
        }
        let Some(raw) = entry.get("identifier").map(as_id_string) else {
            continue;
        };
        if let Some(normalized) = resolver.resolve(&raw, &folded) {
            if !processed.contains(&normalized) {
                processed.push(normalized);
            }
        }
    }

    processed
}

/// Projects the container record onto its allow-list and resolves its
/// identifier when the scheme is a container scheme. The identifier list has
/// at most one entry; it is empty when the identifier is absent, of the
/// wrong scheme, or fails validation.
fn resolve_container(container: Option<&Value>, resolver: &Resolver) -> Option<Container> {
    let obj = container.and_then(Value::as_object)?;
    if obj.is_empty() {
        return None;
    }

    let fields: Map<String, Value> = obj
        .iter()
        .filter(|(k, _)| CONTAINER_KEYS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let mut identifier = Vec::new();
    if let Some(scheme) = obj.get("identifierType").and_then(Value::as_str) {
        if Registry::is_container_scheme(scheme) {
            if let Some(raw) = obj.get("identifier").map(as_id_string) {
                if let Some(normalized) = resolver.resolve(&raw, scheme) {
                    identifier.push(normalized);
                }
            }
        }
    }

    Some(Container { fields, identifier })
}

/// Identifier values arrive as strings or bare numbers depending on the
/// provider's serializer.
fn as_id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn non_empty(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::String(s)) if !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use serde_json::json;

    fn attributes(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn entity_without_citations_is_dropped_before_other_resolution() {
        let registry = Registry::new();
        let cache = MemoryCache::new();
        let resolver = Resolver::new(&registry, &cache);

        let attrs = attributes(json!({
            "relatedIdentifiers": [
                {"relationType": "IsSupplementTo", "relatedIdentifierType": "doi",
                 "relatedIdentifier": "10.1016/j.joi.2016.08.002"},
                {"relationType": "IsPartOf", "relatedIdentifierType": "url",
                 "relatedIdentifier": "https://example.org"}
            ],
            "creators": [
                {"name": "Doe, Jane",
                 "nameIdentifiers": [{"nameIdentifierScheme": "orcid",
                                      "nameIdentifier": "0000-0003-0530-4305"}]}
            ]
        }));

        let before = resolver.ids_resolved() + resolver.ids_rejected();
        assert!(assemble("doi:10.1/x".to_string(), &attrs, &resolver).is_none());
        // nothing on the entity was resolved: all entries were
        // Discard-classified, so resolution never ran
        assert_eq!(resolver.ids_resolved() + resolver.ids_rejected(), before);
    }

    #[test]
    fn surviving_entity_keeps_buckets_and_aux_fields() {
        let registry = Registry::new();
        let cache = MemoryCache::new();
        let resolver = Resolver::new(&registry, &cache);

        let attrs = attributes(json!({
            "titles": [{"title": "A study"}],
            "publicationYear": 2018,
            "publisher": "PeerJ",
            "subjects": [{"subject": "dropped"}],
            "relatedIdentifiers": [
                {"relationType": "References", "relatedIdentifierType": "DOI",
                 "relatedIdentifier": "10.1016/j.joi.2016.08.002"},
                {"relationType": "IsReferencedBy", "relatedIdentifierType": "pmid",
                 "relatedIdentifier": "1284"},
                {"relationType": "IsPartOf", "relatedIdentifierType": "issn",
                 "relatedIdentifier": "2167-8359"}
            ]
        }));

        let entity = assemble("doi:10.7717/peerj.4375".to_string(), &attrs, &resolver).unwrap();
        assert_eq!(entity.doi, "doi:10.7717/peerj.4375");
        assert_eq!(
            entity.related_identifiers.cites,
            vec!["doi:10.1016/j.joi.2016.08.002"]
        );
        assert_eq!(entity.related_identifiers.is_cited_by, vec!["pmid:1284"]);
        assert_eq!(entity.related_identifiers.is_part_of, vec!["issn:2167-8359"]);
        assert_eq!(entity.kept.get("publisher"), Some(&json!("PeerJ")));
        assert_eq!(entity.kept.get("publicationYear"), Some(&json!(2018)));
        assert!(entity.kept.get("subjects").is_none());
    }

    #[test]
    fn duplicate_relation_targets_are_deduplicated() {
        let registry = Registry::new();
        let cache = MemoryCache::new();
        let resolver = Resolver::new(&registry, &cache);

        let attrs = attributes(json!({
            "relatedIdentifiers": [
                {"relationType": "Cites", "relatedIdentifierType": "doi",
                 "relatedIdentifier": "10.1016/j.joi.2016.08.002"},
                {"relationType": "References", "relatedIdentifierType": "doi",
                 "relatedIdentifier": "https://doi.org/10.1016/J.JOI.2016.08.002"}
            ]
        }));

        let entity = assemble("doi:10.1/x".to_string(), &attrs, &resolver).unwrap();
        assert_eq!(entity.related_identifiers.cites.len(), 1);
    }

    #[test]
    fn identifiers_list_excludes_doi_scheme() {
        let registry = Registry::new();
        let cache = MemoryCache::new();
        let resolver = Resolver::new(&registry, &cache);

        let attrs = attributes(json!({
            "relatedIdentifiers": [
                {"relationType": "Cites", "relatedIdentifierType": "doi",
                 "relatedIdentifier": "10.1016/j.joi.2016.08.002"}
            ],
            "identifiers": [
                {"identifierType": "pmid", "identifier": 1248},
                {"identifierType": "doi", "identifier": "10.9999/should.be.dropped"}
            ]
        }));

        let entity = assemble("doi:10.1/x".to_string(), &attrs, &resolver).unwrap();
        assert_eq!(entity.identifiers, vec!["pmid:1248"]);
    }

    #[test]
    fn creators_need_a_name_and_keep_only_allowed_fields() {
        let registry = Registry::new();
        let cache = MemoryCache::new();
        let resolver = Resolver::new(&registry, &cache);

        let attrs = attributes(json!({
            "relatedIdentifiers": [
                {"relationType": "Cites", "relatedIdentifierType": "doi",
                 "relatedIdentifier": "10.1016/j.joi.2016.08.002"}
            ],
            "creators": [
                {"givenName": "Silvio", "familyName": "Peroni", "affiliation": ["UniBo"],
                 "nameIdentifiers": [{"nameIdentifierScheme": "orcid",
                                      "nameIdentifier": "https://orcid.org/0000-0003-0530-4305"}]},
                {"givenName": "OnlyGiven"},
                {"name": "Consortium X"}
            ]
        }));

        let entity = assemble("doi:10.1/x".to_string(), &attrs, &resolver).unwrap();
        assert_eq!(entity.creators.len(), 2);
        assert_eq!(
            entity.creators[0].name_identifiers,
            vec!["orcid:0000-0003-0530-4305"]
        );
        assert!(entity.creators[0].fields.get("affiliation").is_none());
        assert_eq!(
            entity.creators[1].fields.get("name"),
            Some(&json!("Consortium X"))
        );
        assert!(entity.creators[1].name_identifiers.is_empty());
    }

    #[test]
    fn contributors_restricted_to_editors() {
        let registry = Registry::new();
        let cache = MemoryCache::new();
        let resolver = Resolver::new(&registry, &cache);

        let attrs = attributes(json!({
            "relatedIdentifiers": [
                {"relationType": "Cites", "relatedIdentifierType": "doi",
                 "relatedIdentifier": "10.1016/j.joi.2016.08.002"}
            ],
            "contributors": [
                {"name": "Doe, Jane", "contributorType": "Editor"},
                {"name": "Roe, Richard", "contributorType": "DataCurator"},
                {"name": "Untyped, Uma"}
            ]
        }));

        let entity = assemble("doi:10.1/x".to_string(), &attrs, &resolver).unwrap();
        let names: Vec<_> = entity
            .contributors
            .iter()
            .map(|c| c.fields.get("name").unwrap().as_str().unwrap())
            .collect();
        // an absent contributorType is not a rejection
        assert_eq!(names, vec!["Doe, Jane", "Untyped, Uma"]);
    }

    #[test]
    fn container_keeps_allow_list_and_single_identifier() {
        let registry = Registry::new();
        let cache = MemoryCache::new();
        let resolver = Resolver::new(&registry, &cache);

        let attrs = attributes(json!({
            "relatedIdentifiers": [
                {"relationType": "Cites", "relatedIdentifierType": "doi",
                 "relatedIdentifier": "10.1016/j.joi.2016.08.002"}
            ],
            "container": {
                "type": "Journal",
                "title": "PeerJ",
                "volume": "6",
                "issue": "2",
                "firstPage": "e4375",
                "identifier": "2167-8359",
                "identifierType": "ISSN",
                "extraneous": "dropped"
            }
        }));

        let entity = assemble("doi:10.1/x".to_string(), &attrs, &resolver).unwrap();
        let container = entity.container.unwrap();
        assert_eq!(container.identifier, vec!["issn:2167-8359"]);
        assert_eq!(container.fields.get("title"), Some(&json!("PeerJ")));
        assert!(container.fields.get("extraneous").is_none());
        assert!(container.fields.get("identifierType").is_none());
    }

    #[test]
    fn container_with_unresolvable_identifier_keeps_empty_list() {
        let registry = Registry::new();
        let cache = MemoryCache::new();
        let resolver = Resolver::new(&registry, &cache);

        let attrs = attributes(json!({
            "relatedIdentifiers": [
                {"relationType": "Cites", "relatedIdentifierType": "doi",
                 "relatedIdentifier": "10.1016/j.joi.2016.08.002"}
            ],
            "container": {"title": "Some venue", "identifier": "not-an-issn",
                          "identifierType": "issn"}
        }));

        let entity = assemble("doi:10.1/x".to_string(), &attrs, &resolver).unwrap();
        assert_eq!(entity.container.unwrap().identifier, Vec::<String>::new());
    }
}
