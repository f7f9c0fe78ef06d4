//! Run configuration.
//!
//! Every value has a default matching the observed open-data layout, so an
//! empty TOML file (or no file at all) is a valid configuration. Callers
//! override individual fields afterwards (CLI flags, HTTP form fields).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Amount, ConfigError};

/// Top-level settings, one TOML table per section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub filter: FilterConfig,
    pub columns: ColumnMap,
    pub debts: SourceFormat,
    pub plans: PlanConfig,
    pub service: ServiceConfig,
}

impl Settings {
    /// Load settings from a TOML file and validate them.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings = toml::from_str(&text)?;
        debug!(path = %path.display(), "loaded settings");
        settings.validate()?;
        Ok(settings)
    }

    /// Load from `path` if given, otherwise use the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.filter.validate()?;
        self.debts.validate()?;
        self.plans.format.validate()?;
        Ok(())
    }
}

/// Record filter parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Two-letter region code rows must match exactly.
    pub jurisdiction: String,
    /// Rows must carry a consolidated amount strictly greater than this.
    pub minimum_amount: Amount,
    /// Substring marking a legal-entity (head office) identifier.
    pub entity_marker: String,
    /// Debtor names containing any of these (case-insensitive) are dropped.
    pub exclusion_terms: Vec<String>,
    /// Administrative columns removed from the detailed report, if present.
    pub drop_columns: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            jurisdiction: "RS".into(),
            minimum_amount: Amount::from_units(100_000),
            entity_marker: "/0001-".into(),
            exclusion_terms: [
                "MUNICIPIO",
                "MUNICÍPIO",
                "CONTABILIDADE",
                "CONTÁBIL",
                "CONTABIL",
                "CONTADOR",
                "CONTADORA",
                "CONTADORES",
                "FALENCIA",
                "FALÊNCIA",
                "MASSA FALIDA",
                "FALIDA",
                "FALIDO",
                "FILIAL",
                "RECUPERACAO JUDICIAL",
                "RECUPERAÇÃO JUDICIAL",
                "EM LIQUIDACAO",
                "EM LIQUIDAÇÃO",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            drop_columns: [
                "TIPO_PESSOA",
                "TIPO_DEVEDOR",
                "UNIDADE_RESPONSAVEL",
                "NUMERO_INSCRICAO",
                "TIPO_CREDITO",
                "DATA_INSCRICAO",
                "INDICADOR_AJUIZADO",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_threshold(self.minimum_amount)?;
        if self.jurisdiction.trim().is_empty() {
            return Err(ConfigError::Invalid("jurisdiction must not be empty".into()));
        }
        Ok(())
    }
}

/// Reject non-positive minimum amounts.
pub fn validate_threshold(minimum: Amount) -> Result<(), ConfigError> {
    if minimum.is_positive() {
        Ok(())
    } else {
        Err(ConfigError::InvalidThreshold(minimum.to_string()))
    }
}

/// Names of the four predicate columns in the raw debt table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub taxpayer_id: String,
    pub debtor_name: String,
    pub jurisdiction: String,
    pub consolidated_amount: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            taxpayer_id: "CPF_CNPJ".into(),
            debtor_name: "NOME_DEVEDOR".into(),
            jurisdiction: "UF_DEVEDOR".into(),
            consolidated_amount: "VALOR_CONSOLIDADO".into(),
        }
    }
}

/// Character encoding of a delimited source file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding {
    #[default]
    Latin1,
    Utf8,
}

/// Layout of a delimited text file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceFormat {
    pub delimiter: char,
    pub encoding: TextEncoding,
    /// Zero-based row index of the header; rows before it are preamble.
    pub header_row: usize,
}

impl Default for SourceFormat {
    fn default() -> Self {
        Self {
            delimiter: ';',
            encoding: TextEncoding::Latin1,
            header_row: 0,
        }
    }
}

impl SourceFormat {
    /// The delimiter as a single byte, as the CSV reader needs it.
    pub fn delimiter_byte(&self) -> Result<u8, ConfigError> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| {
                ConfigError::Invalid(format!("delimiter {:?} is not ASCII", self.delimiter))
            })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.delimiter_byte().map(|_| ())
    }
}

/// How debtors are matched against installment plans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchStrategy {
    /// Inner join: one matched row per (debtor, plan) pair plus an unmatched list.
    #[default]
    RowLevel,
    /// Plans aggregated per taxpayer, left-joined onto every debtor with a flag.
    Summarized,
}

impl std::str::FromStr for MatchStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "row" | "row-level" | "inner" => Ok(Self::RowLevel),
            "summary" | "summarized" | "left" => Ok(Self::Summarized),
            other => Err(ConfigError::Invalid(format!(
                "unknown match strategy {other:?} (expected `row` or `summary`)"
            ))),
        }
    }
}

/// Source-side names of the allow-listed plan columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanColumns {
    pub negotiation_type: String,
    pub modality: String,
    pub status: String,
    pub installments_granted: String,
    pub installments_overdue: String,
    pub consolidated_value: String,
    pub principal_value: String,
    pub penalty_value: String,
    pub interest_value: String,
    pub legal_charge_value: String,
}

impl Default for PlanColumns {
    fn default() -> Self {
        Self {
            negotiation_type: "Tipo de Negociação".into(),
            modality: "Modalidade da Negociação".into(),
            status: "Situação da Negociação".into(),
            installments_granted: "Qtde de Parcelas Concedidas".into(),
            installments_overdue: "Qtde de Parcelas em Atraso".into(),
            consolidated_value: "Valor Consolidado".into(),
            principal_value: "Valor do Principal".into(),
            penalty_value: "Valor da Multa".into(),
            interest_value: "Valor dos Juros".into(),
            legal_charge_value: "Valor do Encargo Legal".into(),
        }
    }
}

impl PlanColumns {
    /// Source names ordered like [`crate::schema::plan::NEGOTIATION_FIELDS`].
    pub fn source_names(&self) -> [&str; 10] {
        [
            &self.negotiation_type,
            &self.modality,
            &self.status,
            &self.installments_granted,
            &self.installments_overdue,
            &self.consolidated_value,
            &self.principal_value,
            &self.penalty_value,
            &self.interest_value,
            &self.legal_charge_value,
        ]
    }
}

/// Installment-plan source settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    pub format: SourceFormat,
    /// Identifier column as named in the plan export; renamed to `taxpayer_id`.
    pub id_column: String,
    pub columns: PlanColumns,
    /// File-name prefix used when scanning a directory for plan exports.
    pub file_prefix: String,
    /// File extension used when scanning a directory for plan exports.
    pub file_extension: String,
    pub strategy: MatchStrategy,
    /// Joins distinct values in the summarized strategy.
    pub separator: String,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            format: SourceFormat {
                delimiter: ';',
                encoding: TextEncoding::Utf8,
                header_row: 2,
            },
            id_column: "CPF/CNPJ do Optante".into(),
            columns: PlanColumns::default(),
            file_prefix: "painel do ".into(),
            file_extension: "csv".into(),
            strategy: MatchStrategy::RowLevel,
            separator: " | ".into(),
        }
    }
}

/// HTTP service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind: String,
    /// Origins allowed by CORS; empty allows any origin.
    pub cors_origins: Vec<String>,
    /// Raw debt files loaded for every submitted job.
    pub debt_files: Vec<PathBuf>,
    /// Finished jobs kept in memory; the oldest are evicted past this.
    pub max_finished_jobs: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".into(),
            cors_origins: vec!["http://localhost:5173".into()],
            debt_files: Vec::new(),
            max_finished_jobs: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_validate() {
        Settings::default().validate().unwrap();
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.plans.format.header_row, 2);
        assert_eq!(settings.columns.taxpayer_id, "CPF_CNPJ");
    }

    #[test]
    fn partial_toml_overrides_fields() {
        let text = r#"
            [filter]
            jurisdiction = "SP"
            minimum_amount = "250.000,00"

            [plans]
            strategy = "summarized"
            separator = "; "
        "#;
        let settings: Settings = toml::from_str(text).unwrap();
        assert_eq!(settings.filter.jurisdiction, "SP");
        assert_eq!(settings.filter.minimum_amount, Amount::from_units(250_000));
        assert_eq!(settings.filter.entity_marker, "/0001-");
        assert_eq!(settings.plans.strategy, MatchStrategy::Summarized);
        assert_eq!(settings.plans.format.header_row, 2);
        assert_eq!(settings.plans.id_column, "CPF/CNPJ do Optante");
    }

    #[test]
    fn example_file_matches_defaults() {
        let text = include_str!("../../../debtleads.example.toml");
        let settings: Settings = toml::from_str(text).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[filter]\nminimum_amount = 5000").unwrap();
        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.filter.minimum_amount, Amount::from_units(5_000));
    }

    #[test]
    fn load_rejects_non_positive_threshold() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[filter]\nminimum_amount = 0").unwrap();
        let err = Settings::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidThreshold(_)));
    }

    #[test]
    fn load_missing_file_errors() {
        let err = Settings::load(Path::new("/nonexistent/debtleads.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn non_ascii_delimiter_rejected() {
        let format = SourceFormat {
            delimiter: '§',
            ..SourceFormat::default()
        };
        assert!(format.validate().is_err());
        assert_eq!(SourceFormat::default().delimiter_byte().unwrap(), b';');
    }

    #[test]
    fn strategy_from_str() {
        assert_eq!("row".parse::<MatchStrategy>().unwrap(), MatchStrategy::RowLevel);
        assert_eq!("Summary".parse::<MatchStrategy>().unwrap(), MatchStrategy::Summarized);
        assert!("outer".parse::<MatchStrategy>().is_err());
    }
}
