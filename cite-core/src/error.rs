//! # Erros do pipeline de citações
//!
//! Três famílias, todas fatais para a operação corrente (não há retry nem
//! resultado parcial em `parse`):
//!
//! - [`ConfigError`]: configuração de features ou rótulos inconsistente.
//!   Detectada na carga, antes de qualquer processamento.
//! - [`AlignError`]: dados de treinamento inválidos (marcadores trocados,
//!   contagens divergentes). Fatal por linha; as linhas anteriores já
//!   alinhadas não se perdem.
//! - [`AdapterError`]: o rotulador externo rejeitou um vetor ou falhou.
//!
//! Cada variante carrega contexto suficiente (linha, rótulo, contagens)
//! para reproduzir o problema sem re-executar os estágios anteriores.

use thiserror::Error;

/// Configuração inválida: erro de quem montou a configuração, não dos dados.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("feature desconhecida na configuração: '{name}'")]
    UnknownFeature { name: String },

    #[error("token_features não contém '{dependency}', exigida pela feature '{feature}'")]
    MissingDependency { feature: String, dependency: String },

    #[error("feature_order vazio: nenhuma coluna a emitir")]
    EmptyOrder,

    #[error("rótulo não reconhecido '{label}' na linha: {line}")]
    UnknownLabel { label: String, line: String },

    #[error("falha ao ler configuração: {0}")]
    Load(String),
}

/// Dados de treinamento que não alinham com a tokenização.
#[derive(Debug, Error)]
pub enum AlignError {
    #[error(
        "marcadores divergentes: esperado </{expected}>, encontrado </{found}> na linha: {line}"
    )]
    MarkerMismatch {
        expected: String,
        found: String,
        line: String,
    },

    #[error(
        "{tokens} tokens mas {labels} rótulos na linha: {line}\n  tokens: [{token_texts}]\n  rótulos: [{label_names}]"
    )]
    CountMismatch {
        tokens: usize,
        labels: usize,
        line: String,
        token_texts: String,
        label_names: String,
    },

    #[error("marcação inválida ({reason}) na entrada: {input}")]
    BadMarkup { reason: String, input: String },
}

/// Falhas na fronteira com o modelo de rotulagem de sequências.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("vetor de features malformado na posição {index}: {reason}")]
    MalformedVector { index: usize, reason: String },

    #[error("falha ao invocar o processo externo '{command}': {source}")]
    Process {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("o rotulador externo terminou com erro: {stderr}")]
    Engine { stderr: String },

    #[error("saída do rotulador sem rótulo para a posição {index}")]
    MissingLabel { index: usize },
}

/// Erro unificado exposto pela fachada do pipeline.
#[derive(Debug, Error)]
pub enum CiteError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Align(#[from] AlignError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}
