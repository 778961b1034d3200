//! # Pipeline de citações — orquestrador com eventos observáveis
//!
//! O pipeline coordena todos os módulos (tokenizador, features, adaptador
//! de modelo, montagem) e pode emitir eventos em cada passo via um canal
//! Rust (`mpsc`), permitindo que o servidor WebSocket transmita o
//! progresso em tempo real para o cliente.
//!
//! Cada chamada de `parse` cria o próprio adaptador de modelo: o pipeline
//! em si é imutável e pode ser compartilhado entre threads, mas um
//! adaptador nunca serve duas operações ao mesmo tempo.

use std::collections::BTreeMap;
use std::sync::mpsc;

use serde::{Deserialize, Serialize};

use crate::assembler::{assemble, LabeledRecord, RAW_STRING};
use crate::config::{ModelBackend, ParserConfig};
use crate::error::CiteError;
use crate::features::compute_vectors;
use crate::model::{ExternalCrfModel, HeuristicModel, ModelAdapter};
use crate::tokenizer::{tokenize, Token};
use crate::training::{align_corpus, UNLABELED};

/// Resultado de um parse: registro de campos, probabilidade agregada por
/// rótulo e probabilidade do caminho completo.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedCitation {
    pub record: LabeledRecord,
    pub field_probabilities: BTreeMap<String, f64>,
    pub sequence_probability: f64,
}

/// Eventos emitidos pelo pipeline durante o processamento.
///
/// Permitem que a UI visualize o raciocínio passo-a-passo: tokens, colunas
/// de features, rótulo e confiança de cada posição, e o registro final.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PipelineEvent {
    /// **Passo 1**: tokenização concluída.
    TokenizationDone { tokens: Vec<Token>, total: usize },
    /// **Passo 2**: colunas de features de um token.
    FeaturesComputed {
        token_index: usize,
        token_text: String,
        columns: Vec<String>,
    },
    /// **Passo 3**: rótulo atribuído a um token pelo modelo.
    LabelAssigned {
        token_index: usize,
        token_text: String,
        label: String,
        confidence: f64,
    },
    /// **Conclusão**: registro montado e estatísticas de tempo.
    Done {
        record: LabeledRecord,
        field_probabilities: BTreeMap<String, f64>,
        sequence_probability: f64,
        total_tokens: usize,
        processing_ms: u64,
    },
    /// **Falha**: erro irrecuperável nesta operação.
    Error { message: String },
}

/// Dados de treinamento prontos para o treinador externo: um token por
/// linha (colunas de features + rótulo no fim), sequências separadas por
/// linha em branco.
#[derive(Debug)]
pub struct TrainingData {
    pub content: String,
    pub references: usize,
    /// Linhas do corpus que não alinharam, com número de linha (1-based).
    pub failures: Vec<(usize, CiteError)>,
}

/// Fachada do parser de citações.
pub struct CitationPipeline {
    config: ParserConfig,
}

impl CitationPipeline {
    /// Cria o pipeline validando a configuração. Depois daqui nenhuma
    /// operação volta a checar nomes de features ou rótulos.
    pub fn new(config: ParserConfig) -> Result<Self, CiteError> {
        Ok(Self {
            config: config.validated()?,
        })
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Um adaptador novo por operação, conforme o backend configurado.
    fn make_model(&self) -> Box<dyn ModelAdapter> {
        match &self.config.backend {
            ModelBackend::Heuristic => {
                Box::new(HeuristicModel::new(self.config.feature_order.clone()))
            }
            ModelBackend::External { binary, model_file } => {
                Box::new(ExternalCrfModel::new(binary.clone(), model_file.clone()))
            }
        }
    }

    /// Analisa uma citação e devolve o registro rotulado.
    ///
    /// Entrada em branco devolve um registro contendo apenas `raw_string`.
    pub fn parse(&self, text: &str) -> Result<ParsedCitation, CiteError> {
        let mut model = self.make_model();
        self.parse_with_model(text, model.as_mut())
    }

    /// Variante com adaptador fornecido pelo chamador (testes, reuso).
    pub fn parse_with_model(
        &self,
        text: &str,
        model: &mut dyn ModelAdapter,
    ) -> Result<ParsedCitation, CiteError> {
        let sequence = tokenize(text, self.config.mode)?;

        if sequence.is_empty() {
            let mut record = LabeledRecord::default();
            record
                .fields
                .insert(RAW_STRING.to_string(), text.to_string());
            return Ok(ParsedCitation {
                record,
                field_probabilities: BTreeMap::new(),
                sequence_probability: 0.0,
            });
        }

        let vectors = compute_vectors(&sequence, &self.config.feature_spec(), &self.config.author_hints);

        // Protocolo do adaptador: reset → add → run → leituras
        model.reset();
        for vector in &vectors {
            model.add_vector(vector).map_err(CiteError::from)?;
        }
        model.run().map_err(CiteError::from)?;

        let assembly = assemble(text, &sequence, model)?;
        Ok(ParsedCitation {
            record: assembly.record,
            field_probabilities: assembly.probabilities,
            sequence_probability: model.sequence_probability(),
        })
    }

    /// Executa o parse enviando eventos de progresso pelo canal `tx`.
    ///
    /// # Fluxo de eventos
    /// 1. `TokenizationDone`
    /// 2. `FeaturesComputed` (um por token)
    /// 3. `LabelAssigned` (um por token)
    /// 4. `Done` — ou `Error` em qualquer falha
    pub fn parse_streaming(&self, text: &str, tx: mpsc::Sender<PipelineEvent>) {
        let start = std::time::Instant::now();

        let sequence = match tokenize(text, self.config.mode) {
            Ok(seq) => seq,
            Err(err) => {
                let _ = tx.send(PipelineEvent::Error {
                    message: err.to_string(),
                });
                return;
            }
        };

        let _ = tx.send(PipelineEvent::TokenizationDone {
            tokens: sequence.tokens().to_vec(),
            total: sequence.len(),
        });

        if sequence.is_empty() {
            let mut record = LabeledRecord::default();
            record
                .fields
                .insert(RAW_STRING.to_string(), text.to_string());
            let _ = tx.send(PipelineEvent::Done {
                record,
                field_probabilities: BTreeMap::new(),
                sequence_probability: 0.0,
                total_tokens: 0,
                processing_ms: start.elapsed().as_millis() as u64,
            });
            return;
        }

        let vectors = compute_vectors(&sequence, &self.config.feature_spec(), &self.config.author_hints);
        for (i, vector) in vectors.iter().enumerate() {
            let _ = tx.send(PipelineEvent::FeaturesComputed {
                token_index: i,
                token_text: vector.raw().to_string(),
                columns: vector.columns[1..].to_vec(),
            });
        }

        let mut model = self.make_model();
        model.reset();
        let fed = vectors.iter().try_for_each(|v| model.add_vector(v));
        if let Err(err) = fed.and_then(|()| model.run()) {
            let _ = tx.send(PipelineEvent::Error {
                message: err.to_string(),
            });
            return;
        }

        for (i, token) in sequence.iter().enumerate() {
            if let Some(label) = model.label_at(i) {
                let _ = tx.send(PipelineEvent::LabelAssigned {
                    token_index: i,
                    token_text: token.raw.clone(),
                    label: label.to_string(),
                    confidence: model.position_confidence(i),
                });
            }
        }

        match assemble(text, &sequence, model.as_ref()) {
            Ok(assembly) => {
                let _ = tx.send(PipelineEvent::Done {
                    record: assembly.record,
                    field_probabilities: assembly.probabilities,
                    sequence_probability: model.sequence_probability(),
                    total_tokens: sequence.len(),
                    processing_ms: start.elapsed().as_millis() as u64,
                });
            }
            Err(err) => {
                let _ = tx.send(PipelineEvent::Error {
                    message: err.to_string(),
                });
            }
        }
    }

    /// Gera os dados de treinamento a partir de um corpus anotado (uma
    /// referência marcada por linha).
    ///
    /// Cada token vira uma linha `texto colunas... rótulo`; referências são
    /// separadas por linha em branco. Linhas que não alinham não derrubam
    /// as demais — ficam em `failures`.
    pub fn write_training_data(&self, corpus: &str) -> TrainingData {
        let alignment = align_corpus(corpus, &self.config.labels);
        let spec = self.config.feature_spec();

        let mut groups: Vec<String> = Vec::with_capacity(alignment.aligned.len());
        for reference in &alignment.aligned {
            let vectors = compute_vectors(&reference.sequence, &spec, &self.config.author_hints);
            let lines: Vec<String> = vectors
                .iter()
                .zip(reference.sequence.iter())
                .map(|(vector, token)| {
                    let label = token.label.as_deref().unwrap_or(UNLABELED);
                    format!("{} {label}", vector.to_line())
                })
                .collect();
            groups.push(lines.join("\n"));
        }

        TrainingData {
            content: groups.join("\n\n"),
            references: alignment.aligned.len(),
            failures: alignment.failures,
        }
    }
}
