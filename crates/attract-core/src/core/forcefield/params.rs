use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_DIELECTRIC_SCALE: f64 = 20.0;

/// Largest accepted atom type id. The pair table is dense in type ids.
pub const MAX_TYPE_ID: usize = 4096;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(tag = "model", rename_all = "kebab-case")]
pub enum Dielectric {
    /// `eps(r) = scale * r`, giving a `1/r²` Coulomb law.
    DistanceDependent { scale: f64 },
    /// `eps(r) = value`, giving a `1/r` Coulomb law.
    Constant { value: f64 },
}

impl Default for Dielectric {
    fn default() -> Self {
        Dielectric::DistanceDependent {
            scale: DEFAULT_DIELECTRIC_SCALE,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(default)]
pub struct GlobalParams {
    pub dielectric: Dielectric,
    /// Onset of the switching function in Angstrom; no switching when absent.
    pub switch_on: Option<f64>,
}

/// One row of the per-type table: bead radius and van der Waals amplitude.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct TypeParam {
    pub type_id: usize,
    pub radius: f64,
    pub amplitude: f64,
}

/// Combined 8-6 coefficients for one pair of types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairCoefficients {
    pub repulsive: f64,
    pub attractive: f64,
}

impl PairCoefficients {
    fn combine(a: &TypeParam, b: &TypeParam) -> Self {
        let rbc = 0.5 * (a.radius + b.radius);
        let eps = (a.amplitude * b.amplitude).sqrt();
        let rbc2 = rbc * rbc;
        let rbc6 = rbc2 * rbc2 * rbc2;
        Self {
            repulsive: eps * rbc6 * rbc2,
            attractive: eps * rbc6,
        }
    }
}

#[derive(Debug, Error)]
pub enum ParamLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("CSV parsing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Invalid force-field parameters: {0}")]
    InvalidTypeTable(String),
}

#[derive(Debug, Deserialize, Default)]
struct GlobalsFile {
    #[serde(default)]
    globals: GlobalParams,
}

/// Immutable ATTRACT parameter table.
///
/// Type ids map to slots of a compact table of known types; pair coefficients for
/// every pair of known types are combined once at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct AttractParams {
    globals: GlobalParams,
    slots: Vec<Option<usize>>,
    types: Vec<TypeParam>,
    pairs: Vec<PairCoefficients>,
}

impl AttractParams {
    pub fn new(globals: GlobalParams, types: Vec<TypeParam>) -> Result<Self, ParamLoadError> {
        validate_globals(&globals)?;

        if let Some(param) = types.iter().find(|t| t.type_id > MAX_TYPE_ID) {
            return Err(ParamLoadError::InvalidTypeTable(format!(
                "type id {} exceeds the maximum of {MAX_TYPE_ID}",
                param.type_id
            )));
        }
        let width = types.iter().map(|t| t.type_id + 1).max().unwrap_or(0);
        let mut slots: Vec<Option<usize>> = vec![None; width];
        for (slot_index, param) in types.iter().enumerate() {
            if !(param.radius.is_finite() && param.radius >= 0.0) {
                return Err(ParamLoadError::InvalidTypeTable(format!(
                    "type {} has invalid radius {}",
                    param.type_id, param.radius
                )));
            }
            if !(param.amplitude.is_finite() && param.amplitude >= 0.0) {
                return Err(ParamLoadError::InvalidTypeTable(format!(
                    "type {} has invalid amplitude {}",
                    param.type_id, param.amplitude
                )));
            }
            let slot = &mut slots[param.type_id];
            if slot.is_some() {
                return Err(ParamLoadError::InvalidTypeTable(format!(
                    "type {} is defined more than once",
                    param.type_id
                )));
            }
            *slot = Some(slot_index);
        }

        let pairs = types
            .iter()
            .flat_map(|a| types.iter().map(move |b| PairCoefficients::combine(a, b)))
            .collect();

        Ok(Self {
            globals,
            slots,
            types,
            pairs,
        })
    }

    /// Loads global settings from a TOML file and the per-type table from a CSV file
    /// with the header `type_id,radius,amplitude`.
    pub fn load(globals_path: &Path, types_path: &Path) -> Result<Self, ParamLoadError> {
        let globals = Self::load_globals(globals_path)?;
        let types = Self::load_types_csv(types_path)?;
        Self::new(globals, types)
    }

    fn load_globals(path: &Path) -> Result<GlobalParams, ParamLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ParamLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let file: GlobalsFile = toml::from_str(&content).map_err(|e| ParamLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Ok(file.globals)
    }

    fn load_types_csv(path: &Path) -> Result<Vec<TypeParam>, ParamLoadError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| ParamLoadError::Csv {
                path: path.to_string_lossy().to_string(),
                source: e,
            })?;

        reader
            .deserialize::<TypeParam>()
            .map(|record| {
                record.map_err(|e| ParamLoadError::Csv {
                    path: path.to_string_lossy().to_string(),
                    source: e,
                })
            })
            .collect()
    }

    pub fn globals(&self) -> &GlobalParams {
        &self.globals
    }

    fn slot(&self, type_id: usize) -> Option<usize> {
        self.slots.get(type_id).copied().flatten()
    }

    pub fn type_param(&self, type_id: usize) -> Option<&TypeParam> {
        self.slot(type_id).map(|slot| &self.types[slot])
    }

    pub fn has_type(&self, type_id: usize) -> bool {
        self.slot(type_id).is_some()
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    #[inline]
    pub fn pair(&self, type_a: usize, type_b: usize) -> Option<&PairCoefficients> {
        let (a, b) = (self.slot(type_a)?, self.slot(type_b)?);
        self.pairs.get(a * self.types.len() + b)
    }
}

fn validate_globals(globals: &GlobalParams) -> Result<(), ParamLoadError> {
    let dielectric_ok = match globals.dielectric {
        Dielectric::DistanceDependent { scale } => scale.is_finite() && scale > 0.0,
        Dielectric::Constant { value } => value.is_finite() && value > 0.0,
    };
    if !dielectric_ok {
        return Err(ParamLoadError::InvalidTypeTable(format!(
            "dielectric must be positive, got {:?}",
            globals.dielectric
        )));
    }
    if let Some(switch_on) = globals.switch_on {
        if !(switch_on.is_finite() && switch_on > 0.0) {
            return Err(ParamLoadError::InvalidTypeTable(format!(
                "switching onset must be positive, got {switch_on}"
            )));
        }
    }
    Ok(())
}
