//! RDF to JSON-LD node objects.
//!
//! Quads are first written as expanded JSON-LD by oxigraph's serializer, then
//! framed: node objects are merged by `@id`, `rdf:type` becomes `@type`,
//! plain strings and single values are unwrapped, referenced nodes are
//! embedded and named graphs referenced from the default graph (proof
//! graphs) are inlined as `{"@id": ..., "@graph": [...]}`. IRIs stay
//! expanded; the presentation envelope carries the `@context`.

use std::collections::{BTreeMap, HashMap, HashSet};

use oxigraph::io::{JsonLdProfileSet, RdfFormat, RdfSerializer};
use oxigraph::model::Quad;
use serde_json::{Map, Value, json};

use crate::error::Result;
use crate::vocab::{RDF_TYPE, VC_TYPE};

/// Turns the quads of one derived credential into a JSON document.
pub trait DocumentSerializer: Send + Sync {
    fn credential_to_json(&self, quads: &[Quad]) -> Result<Value>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLdSerializer;

impl DocumentSerializer for JsonLdSerializer {
    fn credential_to_json(&self, quads: &[Quad]) -> Result<Value> {
        let framer = Framer::new(quads)?;
        let root = framer
            .default
            .order
            .iter()
            .find(|id| {
                framer.default.props[*id]
                    .iter()
                    .any(|(p, o)| p == RDF_TYPE && value_id(o) == Some(VC_TYPE))
            })
            .cloned();
        match root {
            Some(root) => Ok(framer.node(&framer.default, &root, &mut HashSet::new())),
            None => Ok(framer.graph(&framer.default)),
        }
    }
}

/// Serialize arbitrary quads as a `{"@graph": [...]}` document.
pub fn graph_to_json(quads: &[Quad]) -> Result<Value> {
    let framer = Framer::new(quads)?;
    Ok(framer.graph(&framer.default))
}

/// Expanded JSON-LD, one top-level item per node object or named graph.
fn expand(quads: &[Quad]) -> Result<Vec<Value>> {
    let mut serializer = RdfSerializer::from_format(RdfFormat::JsonLd {
        profile: JsonLdProfileSet::default(),
    })
    .for_writer(Vec::new());
    for quad in quads {
        serializer.serialize_quad(quad)?;
    }
    let bytes = serializer.finish()?;
    Ok(match serde_json::from_slice::<Value>(&bytes)? {
        Value::Array(items) => items,
        other => vec![other],
    })
}

// =============================================================================
// NODE MAPS
// =============================================================================

/// Subjects of one graph with their expanded property values, in first-seen
/// order.
#[derive(Default)]
struct NodeMap {
    order: Vec<String>,
    props: HashMap<String, Vec<(String, Value)>>,
}

impl NodeMap {
    fn merge(&mut self, node: Map<String, Value>) {
        let Some(id) = node.get("@id").and_then(Value::as_str).map(str::to_string) else {
            return;
        };
        if !self.props.contains_key(&id) {
            self.order.push(id.clone());
        }
        let props = self.props.entry(id).or_default();
        for (key, values) in node {
            if let Value::Array(values) = values {
                props.extend(values.into_iter().map(|v| (key.clone(), v)));
            }
        }
    }

    /// Subjects nobody in this graph points to; all subjects if that is none.
    fn roots(&self) -> Vec<&String> {
        let referenced: HashSet<&str> = self
            .props
            .values()
            .flatten()
            .filter(|(p, _)| p != RDF_TYPE)
            .filter_map(|(_, o)| value_id(o))
            .collect();
        let roots: Vec<&String> = self
            .order
            .iter()
            .filter(|id| !referenced.contains(id.as_str()))
            .collect();
        if roots.is_empty() {
            self.order.iter().collect()
        } else {
            roots
        }
    }
}

struct Framer {
    default: NodeMap,
    graphs: HashMap<String, NodeMap>,
}

impl Framer {
    fn new(quads: &[Quad]) -> Result<Self> {
        let mut default = NodeMap::default();
        let mut graphs: HashMap<String, NodeMap> = HashMap::new();
        for item in expand(quads)? {
            let Value::Object(mut object) = item else {
                continue;
            };
            match object.remove("@graph") {
                Some(Value::Array(nodes)) => {
                    let Some(name) = object.get("@id").and_then(Value::as_str) else {
                        continue;
                    };
                    let graph = graphs.entry(name.to_string()).or_default();
                    for node in nodes {
                        if let Value::Object(node) = node {
                            graph.merge(node);
                        }
                    }
                }
                _ => default.merge(object),
            }
        }
        Ok(Self { default, graphs })
    }

    fn graph(&self, map: &NodeMap) -> Value {
        let mut visiting = HashSet::new();
        let nodes: Vec<Value> = map
            .roots()
            .into_iter()
            .map(|id| self.node(map, id, &mut visiting))
            .collect();
        json!({ "@graph": nodes })
    }

    fn node(&self, map: &NodeMap, id: &str, visiting: &mut HashSet<String>) -> Value {
        let mut object = Map::new();
        object.insert("@id".to_string(), json!(id));
        let Some(props) = map.props.get(id) else {
            return Value::Object(object);
        };
        visiting.insert(id.to_string());

        let mut types = Vec::new();
        let mut values: BTreeMap<&str, Vec<Value>> = BTreeMap::new();
        for (predicate, value) in props {
            if predicate == RDF_TYPE {
                if let Some(type_id) = value_id(value) {
                    types.push(json!(type_id));
                    continue;
                }
            }
            let framed = self.value(map, value, visiting);
            values.entry(predicate.as_str()).or_default().push(framed);
        }

        if !types.is_empty() {
            object.insert("@type".to_string(), unwrap_singleton(types));
        }
        for (key, vals) in values {
            object.insert(key.to_string(), unwrap_singleton(vals));
        }

        visiting.remove(id);
        Value::Object(object)
    }

    fn value(&self, map: &NodeMap, value: &Value, visiting: &mut HashSet<String>) -> Value {
        let Some(id) = value_id(value) else {
            return compact_value(value);
        };
        if let Some(graph) = self.graphs.get(id) {
            let mut graph_visiting = HashSet::new();
            let nodes: Vec<Value> = graph
                .roots()
                .into_iter()
                .map(|node| self.node(graph, node, &mut graph_visiting))
                .collect();
            return json!({ "@id": id, "@graph": nodes });
        }
        if map.props.contains_key(id) && !visiting.contains(id) {
            return self.node(map, id, visiting);
        }
        json!({ "@id": id })
    }
}

fn unwrap_singleton(mut values: Vec<Value>) -> Value {
    if values.len() == 1 {
        values.remove(0)
    } else {
        Value::Array(values)
    }
}

fn value_id(value: &Value) -> Option<&str> {
    value.get("@id").and_then(Value::as_str)
}

/// `{"@value": "x"}` is an `xsd:string` and becomes `"x"`.
fn compact_value(value: &Value) -> Value {
    match value.as_object() {
        Some(object) if object.len() == 1 => object
            .get("@value")
            .cloned()
            .unwrap_or_else(|| value.clone()),
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use oxigraph::model::vocab::xsd;
    use oxigraph::model::{BlankNode, GraphName, Literal, NamedNode};

    fn iri(s: &str) -> NamedNode {
        NamedNode::new_unchecked(s)
    }

    fn credential() -> Vec<Quad> {
        let cred = iri("http://example.org/cred/1");
        let subject = iri("did:example:xyz");
        let proof = BlankNode::new_unchecked("p0");
        let sig = BlankNode::new_unchecked("s0");
        vec![
            Quad::new(cred.clone(), iri(RDF_TYPE), iri(VC_TYPE), GraphName::DefaultGraph),
            Quad::new(
                cred.clone(),
                iri("https://www.w3.org/2018/credentials#credentialSubject"),
                subject.clone(),
                GraphName::DefaultGraph,
            ),
            Quad::new(
                subject.clone(),
                iri("http://schema.org/name"),
                Literal::new_simple_literal("John Smith"),
                GraphName::DefaultGraph,
            ),
            Quad::new(
                subject,
                iri("http://schema.org/birthDate"),
                Literal::new_typed_literal("2000-01-01", xsd::DATE),
                GraphName::DefaultGraph,
            ),
            Quad::new(
                cred,
                iri("https://w3id.org/security#proof"),
                proof.clone(),
                GraphName::DefaultGraph,
            ),
            Quad::new(
                sig,
                iri(RDF_TYPE),
                iri("https://w3id.org/security#BbsTermwiseSignature2021"),
                proof,
            ),
        ]
    }

    #[test]
    fn credential_is_rooted_at_the_vc_node() {
        let json = JsonLdSerializer.credential_to_json(&credential()).unwrap();
        assert_eq!(json["@id"], "http://example.org/cred/1");
        assert_eq!(json["@type"], VC_TYPE);
        let subject = &json["https://www.w3.org/2018/credentials#credentialSubject"];
        assert_eq!(subject["@id"], "did:example:xyz");
        assert_eq!(subject["http://schema.org/name"], "John Smith");
        assert_eq!(
            subject["http://schema.org/birthDate"],
            json!({ "@value": "2000-01-01", "@type": "http://www.w3.org/2001/XMLSchema#date" })
        );
    }

    #[test]
    fn proof_graph_is_inlined() {
        let json = JsonLdSerializer.credential_to_json(&credential()).unwrap();
        let proof = &json["https://w3id.org/security#proof"];
        assert_eq!(proof["@id"], "_:p0");
        assert_eq!(proof["@graph"][0]["@id"], "_:s0");
        assert_eq!(
            proof["@graph"][0]["@type"],
            "https://w3id.org/security#BbsTermwiseSignature2021"
        );
    }

    #[test]
    fn cycles_fall_back_to_references() {
        let a = iri("http://example.org/a");
        let b = iri("http://example.org/b");
        let knows = iri("http://schema.org/knows");
        let quads = vec![
            Quad::new(a.clone(), iri(RDF_TYPE), iri(VC_TYPE), GraphName::DefaultGraph),
            Quad::new(a.clone(), knows.clone(), b.clone(), GraphName::DefaultGraph),
            Quad::new(b, knows.clone(), a, GraphName::DefaultGraph),
        ];
        let json = JsonLdSerializer.credential_to_json(&quads).unwrap();
        assert_eq!(
            json["http://schema.org/knows"]["http://schema.org/knows"],
            json!({ "@id": "http://example.org/a" })
        );
    }

    #[test]
    fn multiple_values_become_arrays() {
        let s = iri("http://example.org/s");
        let p = iri("http://schema.org/name");
        let quads = vec![
            Quad::new(s.clone(), p.clone(), Literal::new_simple_literal("a"), GraphName::DefaultGraph),
            Quad::new(
                s,
                p,
                Literal::new_language_tagged_literal_unchecked("b", "en"),
                GraphName::DefaultGraph,
            ),
        ];
        let json = graph_to_json(&quads).unwrap();
        assert_eq!(
            json["@graph"][0]["http://schema.org/name"],
            json!(["a", { "@value": "b", "@language": "en" }])
        );
    }

    #[test]
    fn interleaved_subjects_are_merged() {
        let a = iri("http://example.org/a");
        let b = iri("http://example.org/b");
        let name = iri("http://schema.org/name");
        let quads = vec![
            Quad::new(a.clone(), name.clone(), Literal::new_simple_literal("x"), GraphName::DefaultGraph),
            Quad::new(b, name.clone(), Literal::new_simple_literal("y"), GraphName::DefaultGraph),
            Quad::new(a, name, Literal::new_simple_literal("z"), GraphName::DefaultGraph),
        ];
        let json = graph_to_json(&quads).unwrap();
        let nodes = json["@graph"].as_array().unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0]["@id"], "http://example.org/a");
        assert_eq!(nodes[0]["http://schema.org/name"], json!(["x", "z"]));
        assert_eq!(nodes[1]["http://schema.org/name"], "y");
    }
}
