//! Command-line parameters and their rendering into command strings

use crate::error::{BioprovError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role a parameter plays in the data flow of a program.
///
/// Provenance export uses this to classify edges: inputs are "used" entities,
/// outputs are "generated" entities, everything else is an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Input,
    Output,
    Misc,
    #[default]
    None,
}

impl ParamKind {
    /// Input and output parameters are rewritten whenever a preset is bound to a sample
    pub fn is_file(self) -> bool {
        matches!(self, ParamKind::Input | ParamKind::Output)
    }
}

impl FromStr for ParamKind {
    type Err = BioprovError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "input" => Ok(ParamKind::Input),
            "output" => Ok(ParamKind::Output),
            "misc" => Ok(ParamKind::Misc),
            "" | "none" => Ok(ParamKind::None),
            other => Err(BioprovError::InvalidKind {
                kind: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParamKind::Input => "input",
            ParamKind::Output => "output",
            ParamKind::Misc => "misc",
            ParamKind::None => "none",
        };
        f.write_str(s)
    }
}

/// A single command-line argument.
///
/// `cmd_string` is rendered once at construction. Mutating `value` afterwards
/// does not update it; call [`Parameter::rerender`] to bring it back in sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_kind")]
    pub kind: ParamKind,
    #[serde(default = "default_keyword_argument")]
    pub keyword_argument: bool,
    #[serde(default = "default_position")]
    pub position: i64,
    #[serde(default)]
    pub cmd_string: String,
}

fn deserialize_kind<'de, D>(deserializer: D) -> std::result::Result<ParamKind, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        Some(kind) => kind.parse().map_err(serde::de::Error::custom),
        None => Ok(ParamKind::None),
    }
}

fn default_keyword_argument() -> bool {
    true
}

fn default_position() -> i64 {
    -1
}

impl Parameter {
    /// Keyword argument `key value` with no particular kind
    pub fn new<K: Into<String>, V: ToString>(key: K, value: V) -> Self {
        Self::build(key.into(), value.to_string(), ParamKind::None, true, -1)
    }

    /// Keyword argument with an explicit data-flow kind
    pub fn with_kind<K: Into<String>, V: ToString>(key: K, value: V, kind: ParamKind) -> Self {
        Self::build(key.into(), value.to_string(), kind, true, -1)
    }

    /// A flag without a value, e.g. `--force`
    pub fn flag<K: Into<String>>(key: K) -> Self {
        Self::build(key.into(), String::new(), ParamKind::Misc, true, -1)
    }

    /// Positional argument inserted at `position` in the flattened token list.
    /// Negative positions append at the end.
    pub fn positional<K: Into<String>, V: ToString>(
        key: K,
        value: V,
        kind: ParamKind,
        position: i64,
    ) -> Self {
        Self::build(key.into(), value.to_string(), kind, false, position)
    }

    fn build(key: String, value: String, kind: ParamKind, keyword_argument: bool, position: i64) -> Self {
        let mut param = Self {
            tag: key.clone(),
            key,
            value,
            description: None,
            kind,
            keyword_argument,
            position,
            cmd_string: String::new(),
        };
        param.rerender();
        param
    }

    /// Override the symbolic tag (defaults to the key)
    pub fn tagged<T: Into<String>>(mut self, tag: T) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn described<D: Into<String>>(mut self, description: D) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Parse a kind given as free text, rejecting anything outside the allowed set
    pub fn set_kind_str(&mut self, kind: &str) -> Result<()> {
        self.kind = kind.parse()?;
        Ok(())
    }

    /// Re-derive `cmd_string` from the current key, value and formatting rule
    pub fn rerender(&mut self) {
        self.cmd_string = if !self.keyword_argument {
            self.value.clone()
        } else if self.value.is_empty() {
            self.key.clone()
        } else {
            format!("{} {}", self.key, self.value)
        };
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parameter with command string '{}'", self.cmd_string)
    }
}

/// Render an ordered parameter mapping into a parameter string.
///
/// Keyword arguments are emitted in mapping order. Positional arguments are
/// then spliced into the whitespace-split token list at their `position`.
pub fn render_params(params: &IndexMap<String, Parameter>) -> String {
    let mut tokens: Vec<String> = Vec::new();
    let mut positional: Vec<&Parameter> = Vec::new();

    for param in params.values() {
        if param.keyword_argument {
            tokens.extend(param.cmd_string.split_whitespace().map(str::to_string));
        } else {
            positional.push(param);
        }
    }

    for param in positional {
        if param.value.is_empty() {
            continue;
        }
        let idx = if param.position < 0 || param.position as usize > tokens.len() {
            tokens.len()
        } else {
            param.position as usize
        };
        tokens.insert(idx, param.value.clone());
    }

    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_rendering() {
        let p = Parameter::new("-i", "input.fna");
        assert_eq!(p.cmd_string, "-i input.fna");
        assert_eq!(p.tag, "-i");
        assert_eq!(p.kind, ParamKind::None);

        let flag = Parameter::flag("--force");
        assert_eq!(flag.cmd_string, "--force");
    }

    #[test]
    fn test_numeric_values_are_coerced() {
        let p = Parameter::new("-outfmt", 6);
        assert_eq!(p.value, "6");
        assert_eq!(p.cmd_string, "-outfmt 6");
    }

    #[test]
    fn test_value_mutation_requires_rerender() {
        let mut p = Parameter::new("-o", "a.txt");
        p.value = "b.txt".to_string();
        assert_eq!(p.cmd_string, "-o a.txt");
        p.rerender();
        assert_eq!(p.cmd_string, "-o b.txt");
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("input".parse::<ParamKind>().unwrap(), ParamKind::Input);
        assert_eq!("none".parse::<ParamKind>().unwrap(), ParamKind::None);
        let err = "intput".parse::<ParamKind>().unwrap_err();
        assert!(matches!(err, BioprovError::InvalidKind { .. }));

        let mut p = Parameter::new("-x", "1");
        assert!(p.set_kind_str("bogus").is_err());
        assert_eq!(p.kind, ParamKind::None);
    }

    #[test]
    fn test_kind_validated_on_load() {
        let ok: Parameter =
            serde_json::from_str(r#"{"key": "-i", "value": "a.fa", "kind": null}"#).unwrap();
        assert_eq!(ok.kind, ParamKind::None);
        assert!(ok.keyword_argument);

        let bad = serde_json::from_str::<Parameter>(r#"{"key": "-i", "kind": "sideways"}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_positional_splicing() {
        let mut params = IndexMap::new();
        params.insert("-a".to_string(), Parameter::new("-a", "1"));
        params.insert(
            "first".to_string(),
            Parameter::positional("first", "head.txt", ParamKind::Input, 0),
        );
        params.insert("-b".to_string(), Parameter::new("-b", "2"));
        params.insert(
            "last".to_string(),
            Parameter::positional("last", "tail.txt", ParamKind::Input, -1),
        );
        assert_eq!(render_params(&params), "head.txt -a 1 -b 2 tail.txt");
    }

    #[test]
    fn test_position_past_end_appends() {
        let mut params = IndexMap::new();
        params.insert("-a".to_string(), Parameter::new("-a", "1"));
        params.insert(
            "in".to_string(),
            Parameter::positional("in", "x.fa", ParamKind::Input, 42),
        );
        assert_eq!(render_params(&params), "-a 1 x.fa");
    }

    #[test]
    fn test_empty_mapping_renders_empty() {
        assert_eq!(render_params(&IndexMap::new()), "");
    }
}
