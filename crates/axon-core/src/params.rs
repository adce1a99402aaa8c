//! Parametric data registry: per-device-type parameter declarations and
//! their resolution against parser-supplied name/value blocks.

use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};

/// Where in the netlist a parameter block came from, for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLocation {
    /// Netlist file, if known.
    pub file: Option<String>,
    /// 1-based line number; 0 when unknown.
    pub line: u32,
}

impl SourceLocation {
    /// A location for programmatically built blocks.
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: Some(file.into()),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), line) if line > 0 => write!(f, "{file}:{line}"),
            (Some(file), _) => write!(f, "{file}"),
            (None, line) if line > 0 => write!(f, "line {line}"),
            _ => write!(f, "<unknown>"),
        }
    }
}

/// Declaration level of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamLevel {
    /// Declared on the model statement, shared by all instances.
    Model,
    /// Declared per device occurrence.
    Instance,
}

impl fmt::Display for ParamLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamLevel::Model => write!(f, "model"),
            ParamLevel::Instance => write!(f, "instance"),
        }
    }
}

/// One declared parameter.
#[derive(Debug, Clone)]
struct ParamSpec {
    name: String,
    default: f64,
    unit: &'static str,
    level: ParamLevel,
}

/// The set of parameters a device type accepts, with defaults and units.
///
/// Pure metadata: populated once per device type, then used to resolve every
/// model/instance parameter block of that type.
#[derive(Debug, Clone, Default)]
pub struct ParamRegistry {
    specs: Vec<ParamSpec>,
}

impl ParamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a parameter. Declaring the same name twice at the same level
    /// is a bug in the device type and is rejected.
    pub fn declare(
        &mut self,
        name: impl Into<String>,
        default: f64,
        unit: &'static str,
        level: ParamLevel,
    ) -> Result<&mut Self> {
        let name = name.into();
        if self
            .specs
            .iter()
            .any(|s| s.level == level && s.name == name)
        {
            return Err(Error::DuplicateParameter { name, level });
        }
        self.specs.push(ParamSpec {
            name,
            default,
            unit,
            level,
        });
        Ok(self)
    }

    /// Unit string of a declared parameter, if declared at the given level.
    pub fn unit(&self, name: &str, level: ParamLevel) -> Option<&'static str> {
        self.specs
            .iter()
            .find(|s| s.level == level && s.name == name)
            .map(|s| s.unit)
    }

    /// Resolve a parser-supplied block against the declarations at `level`.
    ///
    /// Missing parameters take their default with the given-flag clear;
    /// supplied parameters are passed through with the given-flag set. A name
    /// absent from the registry is surfaced as `UnknownParameter`, never
    /// swallowed.
    pub fn resolve(&self, level: ParamLevel, block: &ParamBlock) -> Result<ResolvedParams> {
        let mut values = HashMap::new();
        let mut given = HashMap::new();
        for spec in self.specs.iter().filter(|s| s.level == level) {
            values.insert(spec.name.clone(), spec.default);
            given.insert(spec.name.clone(), false);
        }
        for (name, value) in &block.entries {
            match values.get_mut(name) {
                Some(slot) => {
                    *slot = *value;
                    given.insert(name.clone(), true);
                }
                None => {
                    return Err(Error::UnknownParameter {
                        name: name.clone(),
                        location: block.location.clone(),
                    });
                }
            }
        }
        Ok(ResolvedParams { values, given })
    }
}

/// An ordered name/value list from one model or instance declaration, as
/// handed over by the parser layer.
#[derive(Debug, Clone, Default)]
pub struct ParamBlock {
    pub entries: Vec<(String, f64)>,
    pub location: SourceLocation,
}

impl ParamBlock {
    pub fn new(location: SourceLocation) -> Self {
        Self {
            entries: Vec::new(),
            location,
        }
    }

    /// Append a name/value pair, builder style.
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.entries.push((name.into(), value));
        self
    }
}

/// Resolved parameter values plus "was this explicitly supplied" flags.
#[derive(Debug, Clone)]
pub struct ResolvedParams {
    values: HashMap<String, f64>,
    given: HashMap<String, bool>,
}

impl ResolvedParams {
    /// Value of a declared parameter. Errors if the name was never declared;
    /// device types query only names from their own registry, so a miss is a
    /// wiring bug reported upward rather than a panic.
    pub fn require(&self, name: &str) -> Result<f64> {
        self.values
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownParameter {
                name: name.to_string(),
                location: SourceLocation::unknown(),
            })
    }

    /// Whether the parameter was explicitly supplied (not defaulted).
    pub fn given(&self, name: &str) -> bool {
        self.given.get(name).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ParamRegistry {
        let mut reg = ParamRegistry::new();
        reg.declare("C", 1e-6, "F", ParamLevel::Model).unwrap();
        reg.declare("G", 1e-3, "S", ParamLevel::Model).unwrap();
        reg.declare("AREA", 1.0, "", ParamLevel::Instance).unwrap();
        reg
    }

    #[test]
    fn test_defaults_and_given_flags() {
        let reg = registry();
        let block = ParamBlock::new(SourceLocation::unknown()).with("C", 2e-6);
        let resolved = reg.resolve(ParamLevel::Model, &block).unwrap();

        assert_eq!(resolved.require("C").unwrap(), 2e-6);
        assert!(resolved.given("C"));
        assert_eq!(resolved.require("G").unwrap(), 1e-3);
        assert!(!resolved.given("G"));
    }

    #[test]
    fn test_duplicate_declaration_rejected() {
        let mut reg = registry();
        let err = reg.declare("C", 0.0, "F", ParamLevel::Model).unwrap_err();
        assert!(matches!(err, Error::DuplicateParameter { .. }));

        // Same name at the other level is a distinct parameter.
        reg.declare("C", 0.0, "F", ParamLevel::Instance).unwrap();
    }

    #[test]
    fn test_unknown_parameter_surfaces_location() {
        let reg = registry();
        let block = ParamBlock::new(SourceLocation::new("cell.cir", 12)).with("BOGUS", 1.0);
        let err = reg.resolve(ParamLevel::Model, &block).unwrap_err();
        match err {
            Error::UnknownParameter { name, location } => {
                assert_eq!(name, "BOGUS");
                assert_eq!(location.to_string(), "cell.cir:12");
            }
            other => panic!("expected UnknownParameter, got {other:?}"),
        }
    }

    #[test]
    fn test_levels_resolve_independently() {
        let reg = registry();
        let block = ParamBlock::new(SourceLocation::unknown()).with("AREA", 2.0);
        // AREA is instance-level; resolving the same block at model level
        // must reject it.
        assert!(reg.resolve(ParamLevel::Model, &block).is_err());
        let inst = reg.resolve(ParamLevel::Instance, &block).unwrap();
        assert_eq!(inst.require("AREA").unwrap(), 2.0);
    }

    #[test]
    fn test_unit_lookup() {
        let reg = registry();
        assert_eq!(reg.unit("C", ParamLevel::Model), Some("F"));
        assert_eq!(reg.unit("C", ParamLevel::Instance), None);
    }
}
