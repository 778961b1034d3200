//! # Configuração do parser de citações
//!
//! A configuração escolhe o modo de tokenização, as features emitidas e
//! avaliadas, o inventário de rótulos, o backend de modelo e as dicas de
//! nomes de autor. Pode vir de JSON (string ou arquivo) ou dos padrões
//! embutidos por modo.
//!
//! Toda validação acontece na carga, via [`ParserConfig::validated`]:
//! depois dela nenhuma operação do pipeline volta a checar nomes de
//! features ou dependências.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::features::{FeatureSpec, DEFAULT_FEATURE_ORDER};
use crate::normalize::{lower_canonical, strip_punct};
use crate::tokenizer::TokenizerMode;
use crate::training::recognized_labels;

/// Backend de rotulagem de sequências.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelBackend {
    /// Rotulador heurístico em memória, sem dependências externas.
    #[default]
    Heuristic,
    /// Rotulador externo estilo CRF++ via processo.
    External {
        binary: PathBuf,
        model_file: PathBuf,
    },
}

/// Configuração completa do pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserConfig {
    #[serde(default)]
    pub mode: TokenizerMode,

    /// Colunas emitidas, na ordem do vetor.
    #[serde(default = "default_feature_order")]
    pub feature_order: Vec<String>,

    /// Features avaliadas. Vazio = fecho de dependências de `feature_order`.
    #[serde(default)]
    pub token_features: BTreeSet<String>,

    /// Rótulos reconhecidos. Vazio = inventário padrão do modo.
    #[serde(default)]
    pub labels: Vec<String>,

    #[serde(default)]
    pub backend: ModelBackend,

    /// Possíveis nomes de autor (dica para a feature `author-hint`).
    /// Normalizados na validação: sem pontuação de borda e em minúsculas.
    #[serde(default)]
    pub author_hints: Vec<String>,
}

fn default_feature_order() -> Vec<String> {
    DEFAULT_FEATURE_ORDER.iter().map(|s| s.to_string()).collect()
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self::default_for_mode(TokenizerMode::Plain)
    }
}

impl ParserConfig {
    /// Configuração padrão para um modo de tokenização.
    pub fn default_for_mode(mode: TokenizerMode) -> Self {
        Self {
            mode,
            feature_order: default_feature_order(),
            token_features: BTreeSet::new(),
            labels: recognized_labels(mode).iter().map(|s| s.to_string()).collect(),
            backend: ModelBackend::default(),
            author_hints: Vec::new(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    /// Valida e completa a configuração:
    ///
    /// - `token_features` vazio ganha o fecho de dependências da ordem;
    /// - `labels` vazio ganha o inventário padrão do modo;
    /// - `author_hints` são normalizadas para a forma comparada pela feature.
    ///
    /// Qualquer inconsistência (feature desconhecida, dependência fora do
    /// conjunto avaliado, ordem vazia) é erro aqui, antes de qualquer parse.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        if self.token_features.is_empty() {
            let spec = FeatureSpec::from_order(self.feature_order.iter().cloned())?;
            self.token_features = spec.token_features;
        } else {
            self.feature_spec().validate()?;
        }

        if self.labels.is_empty() {
            self.labels = recognized_labels(self.mode)
                .iter()
                .map(|s| s.to_string())
                .collect();
        }

        self.author_hints = self
            .author_hints
            .iter()
            .map(|h| lower_canonical(&strip_punct(h)))
            .collect();

        Ok(self)
    }

    /// Visão da configuração como spec de features.
    pub fn feature_spec(&self) -> FeatureSpec {
        FeatureSpec {
            feature_order: self.feature_order.clone(),
            token_features: self.token_features.clone(),
        }
    }
}
