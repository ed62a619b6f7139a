use crate::error::CompilerError;
use crate::parameter::ParameterValue;
use crate::syntax::CommandKind;
use crate::types::DataType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledParameter {
    pub data_type: DataType,
    pub value: ParameterValue,
}

impl CompiledParameter {
    pub fn new(data_type: DataType, value: ParameterValue) -> Self {
        Self { data_type, value }
    }

    pub fn int(data_type: DataType, value: i32) -> Self {
        Self::new(data_type, ParameterValue::Int(value))
    }
}

/// An executable command. `parameters` are in physical order, with expressions storing
/// the return variable followed by the postfix list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledCommand {
    pub index: usize,
    pub line: usize,
    pub syntax_id: u32,
    pub kind: CommandKind,
    pub parameters: Vec<CompiledParameter>,
    /// Expression layout in source order: operator codes, and `-(n + 1)` for the n-th
    /// postfix entry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub infix: Vec<i32>,
    #[serde(default)]
    pub jump: Option<usize>,
}

/// A comment, blank line or commented command, attached before the standard command at
/// `reference_index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxiliaryCommand {
    pub reference_index: usize,
    pub line: usize,
    pub syntax_id: u32,
    pub kind: CommandKind,
    #[serde(default)]
    pub inner_syntax_id: Option<u32>,
    pub parameters: Vec<CompiledParameter>,
}

/// The flattened script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeArray {
    pub standard: Vec<CompiledCommand>,
    pub auxiliary: Vec<AuxiliaryCommand>,
    pub variables: Vec<String>,
}

impl CodeArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: CompiledCommand) {
        self.standard.push(command);
    }

    pub fn push_auxiliary(&mut self, command: AuxiliaryCommand) {
        self.auxiliary.push(command);
    }

    pub fn add_variable(&mut self, name: &str) -> usize {
        if let Some(pos) = self.variables.iter().position(|x| x == name) {
            pos
        } else {
            self.variables.push(name.to_string());
            self.variables.len() - 1
        }
    }

    pub fn len(&self) -> usize {
        self.standard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.standard.is_empty()
    }

    pub fn to_json(&self) -> Result<String, CompilerError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, CompilerError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variables_are_deduplicated() {
        let mut code = CodeArray::new();
        assert_eq!(code.add_variable("ship"), 0);
        assert_eq!(code.add_variable("sector"), 1);
        assert_eq!(code.add_variable("ship"), 0);
        assert_eq!(code.variables, vec!["ship", "sector"]);
    }

    #[test]
    fn json_layout() {
        let mut code = CodeArray::new();
        code.push(CompiledCommand {
            index: 0,
            line: 1,
            syntax_id: 103,
            kind: CommandKind::Standard,
            parameters: vec![CompiledParameter::int(DataType::Null, 0)],
            infix: Vec::new(),
            jump: None,
        });

        let json = code.to_json().unwrap();
        assert!(json.contains("\"syntax_id\": 103"));
        assert!(!json.contains("infix"));
        assert_eq!(CodeArray::from_json(&json).unwrap(), code);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            CodeArray::from_json("{\"standard\": 5}"),
            Err(CompilerError::Json(_))
        ));
    }
}
