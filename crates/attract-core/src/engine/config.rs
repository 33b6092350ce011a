use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_HISTORY_SIZE: usize = 10;
pub const DEFAULT_GRADIENT_TOLERANCE: f64 = 1e-6;
pub const DEFAULT_FUNCTION_TOLERANCE: f64 = 1e-14;
pub const DEFAULT_MAX_LINE_SEARCH_STEPS: usize = 20;
pub const DEFAULT_PAIRLIST_SKIN: f64 = 1.0;
pub const DEFAULT_FINAL_CUTOFF: f64 = 500.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}

/// Settings of the bounded L-BFGS minimizer.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct MinimizerConfig {
    /// Number of correction pairs kept in the limited-memory Hessian approximation.
    pub history_size: usize,
    /// Convergence threshold on the infinity norm of the projected gradient.
    pub gradient_tolerance: f64,
    /// Convergence threshold on the relative decrease of the objective per iteration.
    pub function_tolerance: f64,
    /// Objective evaluations allowed per line search.
    pub max_line_search_steps: usize,
    /// Keep a copy of the variables after every accepted iteration.
    pub record_trajectory: bool,
}

impl Default for MinimizerConfig {
    fn default() -> Self {
        Self {
            history_size: DEFAULT_HISTORY_SIZE,
            gradient_tolerance: DEFAULT_GRADIENT_TOLERANCE,
            function_tolerance: DEFAULT_FUNCTION_TOLERANCE,
            max_line_search_steps: DEFAULT_MAX_LINE_SEARCH_STEPS,
            record_trajectory: false,
        }
    }
}

impl MinimizerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_size == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "history_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.gradient_tolerance >= 0.0) {
            return Err(ConfigError::InvalidValue {
                parameter: "gradient_tolerance",
                reason: format!("must be non-negative, got {}", self.gradient_tolerance),
            });
        }
        if !(self.function_tolerance >= 0.0) {
            return Err(ConfigError::InvalidValue {
                parameter: "function_tolerance",
                reason: format!("must be non-negative, got {}", self.function_tolerance),
            });
        }
        if self.max_line_search_steps == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "max_line_search_steps",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Cutoff handling of the ATTRACT force field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceFieldConfig {
    /// Interaction cutoff in Angstrom; pairs at or beyond it do not interact.
    pub cutoff: f64,
    /// Extra pairlist radius that lets a pairlist be reused while atoms move less than
    /// half of it.
    pub pairlist_skin: f64,
}

impl ForceFieldConfig {
    pub fn new(cutoff: f64) -> Self {
        Self {
            cutoff,
            pairlist_skin: DEFAULT_PAIRLIST_SKIN,
        }
    }

    pub fn with_skin(mut self, skin: f64) -> Self {
        self.pairlist_skin = skin;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_cutoff("cutoff", self.cutoff)?;
        if !(self.pairlist_skin.is_finite() && self.pairlist_skin >= 0.0) {
            return Err(ConfigError::InvalidValue {
                parameter: "pairlist_skin",
                reason: format!("must be finite and non-negative, got {}", self.pairlist_skin),
            });
        }
        Ok(())
    }
}

/// One minimization pass of a docking run.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct DockingStage {
    pub cutoff: f64,
    pub max_iterations: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DockingConfig {
    /// Minimization passes applied in order to every start pose.
    pub stages: Vec<DockingStage>,
    /// Cutoff used to score the final pose.
    pub final_cutoff: f64,
    pub minimizer: MinimizerConfig,
    pub pairlist_skin: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DockingFile {
    stages: Option<Vec<DockingStage>>,
    final_cutoff: Option<f64>,
    pairlist_skin: Option<f64>,
    minimizer: Option<MinimizerConfig>,
}

impl DockingConfig {
    /// Reads a docking configuration from a TOML file.
    ///
    /// ```toml
    /// final_cutoff = 500.0
    ///
    /// [[stages]]
    /// cutoff = 100.0
    /// max_iterations = 50
    ///
    /// [minimizer]
    /// history_size = 10
    /// ```
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let file: DockingFile = toml::from_str(&content).map_err(|e| ConfigError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;

        let mut builder = DockingConfigBuilder::new();
        builder.stages = file.stages;
        builder.final_cutoff = file.final_cutoff;
        builder.pairlist_skin = file.pairlist_skin;
        builder.minimizer = file.minimizer;
        builder.build()
    }

    pub fn force_field_config(&self, cutoff: f64) -> ForceFieldConfig {
        ForceFieldConfig::new(cutoff).with_skin(self.pairlist_skin)
    }
}

#[derive(Default)]
pub struct DockingConfigBuilder {
    stages: Option<Vec<DockingStage>>,
    final_cutoff: Option<f64>,
    minimizer: Option<MinimizerConfig>,
    pairlist_skin: Option<f64>,
}

impl DockingConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stages(mut self, stages: Vec<DockingStage>) -> Self {
        self.stages = Some(stages);
        self
    }
    pub fn stage(mut self, cutoff: f64, max_iterations: usize) -> Self {
        self.stages.get_or_insert_with(Vec::new).push(DockingStage {
            cutoff,
            max_iterations,
        });
        self
    }
    pub fn final_cutoff(mut self, cutoff: f64) -> Self {
        self.final_cutoff = Some(cutoff);
        self
    }
    pub fn minimizer(mut self, config: MinimizerConfig) -> Self {
        self.minimizer = Some(config);
        self
    }
    pub fn pairlist_skin(mut self, skin: f64) -> Self {
        self.pairlist_skin = Some(skin);
        self
    }

    pub fn build(self) -> Result<DockingConfig, ConfigError> {
        let stages = self
            .stages
            .filter(|stages| !stages.is_empty())
            .ok_or(ConfigError::MissingParameter("stages"))?;
        for stage in &stages {
            validate_cutoff("stages.cutoff", stage.cutoff)?;
        }

        let final_cutoff = self.final_cutoff.unwrap_or(DEFAULT_FINAL_CUTOFF);
        validate_cutoff("final_cutoff", final_cutoff)?;

        let minimizer = self.minimizer.unwrap_or_default();
        minimizer.validate()?;

        let pairlist_skin = self.pairlist_skin.unwrap_or(DEFAULT_PAIRLIST_SKIN);
        ForceFieldConfig::new(final_cutoff)
            .with_skin(pairlist_skin)
            .validate()?;

        Ok(DockingConfig {
            stages,
            final_cutoff,
            minimizer,
            pairlist_skin,
        })
    }
}

fn validate_cutoff(parameter: &'static str, cutoff: f64) -> Result<(), ConfigError> {
    if cutoff.is_finite() && cutoff > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            parameter,
            reason: format!("must be a positive, finite distance, got {cutoff}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn minimizer_config_defaults() {
        let config = MinimizerConfig::default();
        assert_eq!(config.history_size, 10);
        assert_eq!(config.gradient_tolerance, 1e-6);
        assert!(!config.record_trajectory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn minimizer_config_rejects_empty_history() {
        let config = MinimizerConfig {
            history_size: 0,
            ..MinimizerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                parameter: "history_size",
                ..
            })
        ));
    }

    #[test]
    fn force_field_config_validates_cutoff_and_skin() {
        assert!(ForceFieldConfig::new(10.0).validate().is_ok());
        assert!(ForceFieldConfig::new(0.0).validate().is_err());
        assert!(ForceFieldConfig::new(10.0).with_skin(-1.0).validate().is_err());
        assert!(ForceFieldConfig::new(10.0).with_skin(0.0).validate().is_ok());
    }

    #[test]
    fn builder_requires_stages() {
        let result = DockingConfigBuilder::new().final_cutoff(50.0).build();
        assert!(matches!(result, Err(ConfigError::MissingParameter("stages"))));
        let empty = DockingConfigBuilder::new().stages(vec![]).build();
        assert!(matches!(empty, Err(ConfigError::MissingParameter("stages"))));
    }

    #[test]
    fn builder_fills_defaults() {
        let config = DockingConfigBuilder::new()
            .stage(100.0, 50)
            .stage(20.0, 100)
            .build()
            .unwrap();
        assert_eq!(config.stages.len(), 2);
        assert_eq!(config.stages[1].cutoff, 20.0);
        assert_eq!(config.final_cutoff, DEFAULT_FINAL_CUTOFF);
        assert_eq!(config.pairlist_skin, DEFAULT_PAIRLIST_SKIN);
        assert_eq!(config.minimizer, MinimizerConfig::default());
    }

    #[test]
    fn builder_rejects_non_positive_stage_cutoff() {
        let result = DockingConfigBuilder::new().stage(-5.0, 10).build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                parameter: "stages.cutoff",
                ..
            })
        ));
    }

    #[test]
    fn load_reads_stages_and_minimizer_settings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("docking.toml");
        fs::write(
            &path,
            r#"
            final_cutoff = 300.0

            [[stages]]
            cutoff = 100.0
            max_iterations = 50

            [[stages]]
            cutoff = 25.0
            max_iterations = 200

            [minimizer]
            history_size = 5
            record_trajectory = true
            "#,
        )
        .unwrap();

        let config = DockingConfig::load(&path).unwrap();
        assert_eq!(
            config.stages,
            vec![
                DockingStage {
                    cutoff: 100.0,
                    max_iterations: 50
                },
                DockingStage {
                    cutoff: 25.0,
                    max_iterations: 200
                },
            ]
        );
        assert_eq!(config.final_cutoff, 300.0);
        assert_eq!(config.minimizer.history_size, 5);
        assert!(config.minimizer.record_trajectory);
        assert_eq!(config.minimizer.gradient_tolerance, DEFAULT_GRADIENT_TOLERANCE);
        assert_eq!(config.force_field_config(25.0).pairlist_skin, DEFAULT_PAIRLIST_SKIN);
    }

    #[test]
    fn load_fails_for_missing_file() {
        let dir = tempdir().unwrap();
        let result = DockingConfig::load(&dir.path().join("missing.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn load_fails_for_unknown_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("typo.toml");
        fs::write(&path, "final_cutof = 10.0\n").unwrap();
        assert!(matches!(DockingConfig::load(&path), Err(ConfigError::Toml { .. })));
    }

    #[test]
    fn load_without_stages_reports_missing_parameter() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nostages.toml");
        fs::write(&path, "final_cutoff = 10.0\n").unwrap();
        assert!(matches!(
            DockingConfig::load(&path),
            Err(ConfigError::MissingParameter("stages"))
        ));
    }
}
