//! SPARQL 1.1 JSON results.

use std::collections::BTreeMap;

use oxigraph::model::{Literal, Term};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::vocab::XSD_STRING;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Head {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vars: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Results {
    pub bindings: Vec<BTreeMap<String, TermJson>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonResults {
    pub head: Head,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Results>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boolean: Option<bool>,
}

/// One bound term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TermJson {
    Uri {
        value: String,
    },
    Literal {
        value: String,
        #[serde(rename = "xml:lang", default, skip_serializing_if = "Option::is_none")]
        lang: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        datatype: Option<String>,
    },
    Bnode {
        value: String,
    },
}

impl From<&Term> for TermJson {
    fn from(term: &Term) -> Self {
        match term {
            Term::NamedNode(nn) => TermJson::Uri {
                value: nn.as_str().to_string(),
            },
            Term::BlankNode(bn) => TermJson::Bnode {
                value: bn.as_str().to_string(),
            },
            Term::Literal(literal) => {
                let datatype = literal.datatype().as_str();
                TermJson::Literal {
                    value: literal.value().to_string(),
                    lang: literal.language().map(str::to_string),
                    datatype: (literal.language().is_none() && datatype != XSD_STRING)
                        .then(|| datatype.to_string()),
                }
            }
            #[allow(unreachable_patterns)]
            _ => TermJson::Literal {
                value: term.to_string(),
                lang: None,
                datatype: None,
            },
        }
    }
}

impl JsonResults {
    /// Results of a SELECT evaluation.
    pub fn select(vars: Vec<String>, rows: &[Vec<(String, Term)>]) -> Self {
        Self {
            head: Head { vars },
            results: Some(Results {
                bindings: rows.iter().map(|row| binding_map(row)).collect(),
            }),
            boolean: None,
        }
    }

    /// Results of an ASK evaluation that still reports its rows.
    pub fn ask(vars: Vec<String>, rows: &[Vec<(String, Term)>]) -> Self {
        let mut results = Self::select(vars, rows);
        results.boolean = Some(!rows.is_empty());
        results
    }

    /// Bare ASK answer.
    pub fn boolean(value: bool) -> Self {
        Self {
            head: Head::default(),
            results: None,
            boolean: Some(value),
        }
    }

    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

fn binding_map(row: &[(String, Term)]) -> BTreeMap<String, TermJson> {
    row.iter()
        .map(|(name, term)| (name.clone(), TermJson::from(term)))
        .collect()
}

/// The presentation as the plain literal bound to `vp`.
pub fn presentation_literal(vp: &Value) -> Result<Term> {
    Ok(Literal::new_simple_literal(serde_json::to_string_pretty(vp)?).into())
}
