use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Game/language version a script is compiled for.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum GameVersion {
    Threat,
    Reunion,
    #[default]
    TerranConflict,
    AlbionPrelude,
}

impl fmt::Display for GameVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            GameVersion::Threat => "X2: The Threat",
            GameVersion::Reunion => "X3: Reunion",
            GameVersion::TerranConflict => "X3: Terran Conflict",
            GameVersion::AlbionPrelude => "X3: Albion Prelude",
        };
        write!(f, "{}", name)
    }
}

/// Type of a value stored in a parameter.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Null,
    Variable,
    Constant,    // [THIS], [TRUE]
    Integer,
    String,
    Object,      // {Argon Prime}
    Operator,    // expression operators
}

/// Declared type of a parameter slot in a command syntax.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    Value,
    Number,
    String,
    Boolean,
    Variable,
    ReturnValue,
    ReturnValueIf,
    ReturnValueIfStart,
    InterruptReturnValueIf,
    RefObj,
    Comment,
    ScriptName,
    LabelName,
    LabelNumber,
    ExpressionParameter,
    VArgParameter,
    Ship,
    Station,
    Sector,
    Ware,
    Race,
    ObjectClass,
}

impl ParameterType {
    /// Return value slots that may instead carry a conditional.
    pub fn is_conditional_return(&self) -> bool {
        matches!(
            self,
            ParameterType::ReturnValueIf
                | ParameterType::ReturnValueIfStart
                | ParameterType::InterruptReturnValueIf
        )
    }

    pub fn is_return_value(&self) -> bool {
        *self == ParameterType::ReturnValue || self.is_conditional_return()
    }

    /// Whether a value of type `data` can be converted to this parameter type.
    pub fn accepts(&self, data: DataType) -> bool {
        use DataType as D;

        match self {
            ParameterType::Variable => data == D::Variable,
            ParameterType::ReturnValue => matches!(data, D::Variable | D::Null),
            ParameterType::ReturnValueIf
            | ParameterType::ReturnValueIfStart
            | ParameterType::InterruptReturnValueIf => {
                matches!(data, D::Variable | D::Null | D::Integer)
            }
            ParameterType::Number => matches!(data, D::Integer | D::Variable),
            ParameterType::Boolean => matches!(data, D::Integer | D::Variable | D::Constant),
            ParameterType::String | ParameterType::ScriptName => {
                matches!(data, D::String | D::Variable)
            }
            ParameterType::Comment | ParameterType::LabelName => data == D::String,
            ParameterType::LabelNumber => matches!(data, D::String | D::Integer),
            ParameterType::RefObj
            | ParameterType::Ship
            | ParameterType::Station
            | ParameterType::Sector
            | ParameterType::Ware
            | ParameterType::Race
            | ParameterType::ObjectClass => {
                matches!(data, D::Variable | D::Constant | D::Object | D::Null)
            }
            ParameterType::Value | ParameterType::VArgParameter => data != D::Operator,
            ParameterType::ExpressionParameter => true,
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ParameterType::Value => "value",
            ParameterType::Number => "number",
            ParameterType::String => "string",
            ParameterType::Boolean => "boolean",
            ParameterType::Variable => "variable",
            ParameterType::ReturnValue
            | ParameterType::ReturnValueIf
            | ParameterType::ReturnValueIfStart
            | ParameterType::InterruptReturnValueIf => "return value",
            ParameterType::RefObj => "reference object",
            ParameterType::Comment => "comment",
            ParameterType::ScriptName => "script name",
            ParameterType::LabelName => "label name",
            ParameterType::LabelNumber => "label",
            ParameterType::ExpressionParameter => "expression operand",
            ParameterType::VArgParameter => "argument",
            ParameterType::Ship => "ship",
            ParameterType::Station => "station",
            ParameterType::Sector => "sector",
            ParameterType::Ware => "ware",
            ParameterType::Race => "race",
            ParameterType::ObjectClass => "object class",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions() {
        assert!(ParameterType::Number.accepts(DataType::Integer));
        assert!(ParameterType::Number.accepts(DataType::Variable));
        assert!(!ParameterType::Number.accepts(DataType::String));
        assert!(ParameterType::Sector.accepts(DataType::Object));
        assert!(!ParameterType::Variable.accepts(DataType::Integer));
        assert!(ParameterType::ReturnValueIf.accepts(DataType::Integer));
        assert!(!ParameterType::Value.accepts(DataType::Operator));
    }

    #[test]
    fn version_names_round_trip_through_json() {
        let json = serde_json::to_string(&GameVersion::AlbionPrelude).unwrap();
        assert_eq!(json, "\"albion_prelude\"");
        let version: GameVersion = serde_json::from_str("\"reunion\"").unwrap();
        assert_eq!(version, GameVersion::Reunion);
    }
}
