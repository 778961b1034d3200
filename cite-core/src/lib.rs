//! # cite-core — Parser de Referências Bibliográficas
//!
//! Este crate implementa um pipeline completo para transformar uma citação
//! bibliográfica crua (ex.: a linha de uma seção de referências) em um
//! registro estruturado de campos: autor, título, periódico, data, páginas
//! e afins. Ele foi projetado para ser didático, modular e extensível.
//!
//! ## Arquitetura do Sistema
//!
//! O sistema segue uma arquitetura de pipeline linear, onde o dado flui e é
//! transformado passo a passo:
//!
//! 1.  **Entrada**: A citação crua (String), com ou sem marcação estrutural.
//! 2.  **Tokenização** ([`tokenizer`]): A citação é dividida em tokens por
//!     espaços em branco; no modo estrutural, cada token guarda uma
//!     referência ao nó de marcação que o continha.
//! 3.  **Extração de Features** ([`features`]): Cada token vira um vetor de
//!     características nomeadas (capitalização, classe numérica, afixos,
//!     posição relativa...), em ordem configurável.
//! 4.  **Rotulagem** ([`model`]): Os vetores alimentam um rotulador de
//!     sequências atrás da fronteira [`ModelAdapter`] — heurístico em
//!     memória ou um CRF externo via processo.
//! 5.  **Montagem** ([`assembler`]): Tokens com o mesmo rótulo são
//!     reagrupados em campos, normalizados, e o registro final sai com a
//!     citação original em `raw_string`.
//!
//! Para treinamento, o [`training`] alinha referências anotadas
//! (`<author>Smith, J.</author> ...`) com a mesma tokenização do parse, e o
//! [`pos`] realinha saída de um tagger gramatical externo com os tokens.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use cite_core::{CitationPipeline, ParserConfig, TokenizerMode};
//!
//! // 1. Instancia o pipeline com a configuração padrão do modo texto puro
//! let config = ParserConfig::default_for_mode(TokenizerMode::Plain);
//! let pipeline = CitationPipeline::new(config).unwrap();
//!
//! // 2. Analisa uma citação
//! let parsed = pipeline
//!     .parse("Smith, J. (2001). A Study of Things. Journal of Examples, 12(3), 45-67.")
//!     .unwrap();
//!
//! // 3. Campos estruturados
//! for (label, value) in &parsed.record.fields {
//!     println!("{label}: {value}");
//! }
//! ```
//!
//! ## Módulos Principais
//!
//! - [`pipeline`]: Orquestrador que conecta todos os estágios.
//! - [`tokenizer`]: Segmentação em dois modos (texto puro / estrutural).
//! - [`features`]: Engenharia de características configurável.
//! - [`training`]: Alinhamento de corpus anotado para gerar dados de treino.
//! - [`corpus`]: Referências anotadas embutidas para demonstração e testes.

pub mod assembler;
pub mod config;
pub mod corpus;
pub mod error;
pub mod features;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod pos;
pub mod tokenizer;
pub mod training;

pub use assembler::{LabeledRecord, RAW_STRING};
pub use config::{ModelBackend, ParserConfig};
pub use error::{AdapterError, AlignError, CiteError, ConfigError};
pub use model::{ExternalCrfModel, HeuristicModel, ModelAdapter, ScriptedModel};
pub use pipeline::{CitationPipeline, ParsedCitation, PipelineEvent, TrainingData};
pub use tokenizer::{Token, TokenSequence, TokenizerMode};
