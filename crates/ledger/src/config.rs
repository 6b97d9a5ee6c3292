use serde::Deserialize;

use crate::error::LedgerError;
use crate::extract::column_index;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Engine settings. Every field has a default, so an empty TOML document
/// yields the stock configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub modernization: ModernizationColumns,
    pub maintenance: MaintenanceColumns,
    pub rules: RuleSettings,
    pub markers: Markers,
}

// ---------------------------------------------------------------------------
// Column contracts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModernizationColumns {
    pub ot: String,
    pub pole: String,
    pub n1_code: String,
    pub n1_power: String,
    pub n2_code: String,
    pub n2_power: String,
    pub aspect: String,
    pub sync: String,
    /// Optional column; sheets without it record no soil type.
    pub soil: String,
    /// Inclusive column-letter range holding removed-material quantities.
    pub removed_range: [String; 2],
}

impl Default for ModernizationColumns {
    fn default() -> Self {
        Self {
            ot: "2.Nro de O.T.".into(),
            pole: "1.NODO DEL POSTE.".into(),
            n1_code: "2.CODIGO DE LUMINARIA INSTALADA N1.".into(),
            n1_power: "3.POTENCIA DE LUMINARIA INSTALADA (W)".into(),
            n2_code: "6.CODIGO DE LUMINARIA INSTALADA N2.".into(),
            n2_power: "7.POTENCIA DE LUMINARIA INSTALADA (W)".into(),
            aspect: "1. Describa Aspectos que Considere se deben tener en cuenta.".into(),
            sync: "FECHA DE SINCRONIZACION".into(),
            soil: "TIPO DE TERRENO".into(),
            removed_range: ["BH".into(), "BO".into()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MaintenanceColumns {
    pub ot: String,
    pub node: String,
}

impl Default for MaintenanceColumns {
    fn default() -> Self {
        Self {
            ot: "6.Nro.Orden Energis".into(),
            node: "5.Nodo".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Rule settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuleSettings {
    /// Arms at or above this length (meters) need the basket rig.
    pub arm_basket_threshold_m: f64,
    /// Fixed quantity charged per qualifying node by soil-recovery lines.
    pub soil_recovery_quantity: f64,
    /// Soil labels (substring match, accent-folded) classified as hard surface.
    pub hard_soil_labels: Vec<String>,
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self {
            arm_basket_threshold_m: 3.0,
            soil_recovery_quantity: 0.3,
            hard_soil_labels: vec![
                "DURO".into(),
                "DURA".into(),
                "PAVIMENTO".into(),
                "CONCRETO".into(),
                "ASFALTO".into(),
                "ANDEN".into(),
                "HARD".into(),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Null markers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Markers {
    /// Installed/removed material names that stand for "nothing".
    pub material_blacklist: Vec<String>,
    /// Luminaire code values that stand for "no luminaire".
    pub code_null_markers: Vec<String>,
    /// Observation texts that carry no information.
    pub observation_null_markers: Vec<String>,
    /// Normalized pole ids treated as "not attributable to a pole".
    pub pole_sentinels: Vec<String>,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            material_blacklist: vec![
                "NINGUNO".into(),
                "SIN DATOS".into(),
                "NA".into(),
                "N/A".into(),
                "NONE".into(),
            ],
            code_null_markers: vec![
                "NO".into(),
                "NA".into(),
                "N/A".into(),
                "NONE".into(),
                "NINGUNO".into(),
                "SIN DATOS".into(),
                "SIN CODIGO".into(),
            ],
            observation_null_markers: vec![
                "NO".into(),
                "NA".into(),
                "N/A".into(),
                "NINGUNO".into(),
                "NINGUNA".into(),
                "SIN OBSERVACIONES".into(),
                "NONE".into(),
            ],
            pole_sentinels: vec![
                "NA".into(),
                "NAN".into(),
                "NONE".into(),
                "NULL".into(),
                "SINNODO".into(),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl EngineConfig {
    pub fn from_toml(input: &str) -> Result<Self, LedgerError> {
        let config: EngineConfig =
            toml::from_str(input).map_err(|e| LedgerError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        let [start, end] = &self.modernization.removed_range;
        let start_idx = column_index(start).ok_or_else(|| {
            LedgerError::ConfigValidation(format!("removed_range start '{start}' is not a column letter"))
        })?;
        let end_idx = column_index(end).ok_or_else(|| {
            LedgerError::ConfigValidation(format!("removed_range end '{end}' is not a column letter"))
        })?;
        if start_idx > end_idx {
            return Err(LedgerError::ConfigValidation(format!(
                "removed_range {start}..{end} is reversed"
            )));
        }

        if !(self.rules.arm_basket_threshold_m > 0.0) {
            return Err(LedgerError::ConfigValidation(
                "arm_basket_threshold_m must be positive".into(),
            ));
        }
        if !(self.rules.soil_recovery_quantity > 0.0) {
            return Err(LedgerError::ConfigValidation(
                "soil_recovery_quantity must be positive".into(),
            ));
        }

        let required = [
            ("modernization.ot", &self.modernization.ot),
            ("modernization.pole", &self.modernization.pole),
            ("modernization.sync", &self.modernization.sync),
            ("maintenance.ot", &self.maintenance.ot),
            ("maintenance.node", &self.maintenance.node),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(LedgerError::ConfigValidation(format!("{name} must not be blank")));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
