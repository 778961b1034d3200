//! # Fronteira com o modelo de rotulagem de sequências
//!
//! O modelo em si (treinamento, Viterbi, probabilidades) é um colaborador
//! externo opaco. O núcleo só conhece o protocolo [`ModelAdapter`], com
//! estado e uma sequência por vez, chamado sempre nesta ordem:
//!
//! 1. [`reset`](ModelAdapter::reset) — limpa qualquer sequência pendente;
//! 2. [`add_vector`](ModelAdapter::add_vector) — um vetor por token, na
//!    ordem dos índices;
//! 3. [`run`](ModelAdapter::run) — executa a inferência;
//! 4. leituras: rótulo por posição, probabilidade da sequência e confiança
//!    por posição.
//!
//! Um adaptador nunca é compartilhado entre dois `parse` concorrentes:
//! quem precisa de paralelismo usa um adaptador por operação.
//!
//! Três implementações:
//!
//! - [`HeuristicModel`]: rotulador em memória com pesos definidos à mão
//!   sobre as colunas de features — suficiente para demonstração e testes
//!   sem nenhum modelo treinado.
//! - [`ScriptedModel`]: fake determinístico que cicla uma lista fixa de
//!   rótulos; útil em testes do resto do pipeline.
//! - [`ExternalCrfModel`]: invoca um rotulador externo estilo CRF++
//!   (`crf_test -v1`) como processo opaco, via arquivo temporário.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::AdapterError;
use crate::features::FeatureVector;

/// Protocolo com o rotulador de sequências (ver doc do módulo).
pub trait ModelAdapter {
    /// Descarta qualquer sequência acumulada e resultados anteriores.
    fn reset(&mut self);

    /// Acrescenta o vetor de um token. Falha se o vetor é malformado para
    /// o motor subjacente.
    fn add_vector(&mut self, vector: &FeatureVector) -> Result<(), AdapterError>;

    /// Roda a inferência sobre a sequência acumulada.
    fn run(&mut self) -> Result<(), AdapterError>;

    /// Rótulo previsto para a posição `i` (após `run`).
    fn label_at(&self, i: usize) -> Option<&str>;

    /// Probabilidade do caminho completo de rótulos.
    fn sequence_probability(&self) -> f64;

    /// Confiança da atribuição na posição `i`.
    fn position_confidence(&self, i: usize) -> f64;

    /// Probabilidade agregada de um rótulo: produto das confianças de
    /// todas as posições que o receberam. Agregação feita aqui no núcleo,
    /// não no motor externo.
    fn tag_probability(&self, label: &str) -> f64 {
        let mut product = 1.0;
        let mut matched = false;
        let mut i = 0;
        while let Some(assigned) = self.label_at(i) {
            if assigned == label {
                product *= self.position_confidence(i);
                matched = true;
            }
            i += 1;
        }
        if matched {
            product
        } else {
            0.0
        }
    }
}

fn check_vector(index: usize, vector: &FeatureVector) -> Result<(), AdapterError> {
    if vector.columns.is_empty() {
        return Err(AdapterError::MalformedVector {
            index,
            reason: "vetor sem colunas".to_string(),
        });
    }
    if let Some(bad) = vector
        .columns
        .iter()
        .find(|c| c.is_empty() || c.chars().any(char::is_whitespace))
    {
        return Err(AdapterError::MalformedVector {
            index,
            reason: format!("coluna vazia ou com espaço: '{bad}'"),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Modelo heurístico em memória
// ---------------------------------------------------------------------------

/// Rotulador heurístico com pesos definidos à mão.
///
/// Num sistema de produção os pesos viriam de um CRF treinado; aqui eles
/// codificam as intuições mais fortes sobre citações: ano entre parênteses
/// é `date`, intervalo numérico é `pages`, maiúsculas no começo da string
/// tendem a ser `author`, trechos entre aspas tendem a ser `title`.
/// A confiança de cada posição é a softmax dos scores.
pub struct HeuristicModel {
    feature_order: Vec<String>,
    vectors: Vec<FeatureVector>,
    results: Vec<(String, f64)>,
    sequence_probability: f64,
}

/// Rótulos que o modelo heurístico sabe pontuar.
const HEURISTIC_LABELS: &[&str] = &[
    "author", "title", "journal", "date", "pages", "volume", "publisher", "location",
];

impl HeuristicModel {
    pub fn new(feature_order: Vec<String>) -> Self {
        Self {
            feature_order,
            vectors: Vec::new(),
            results: Vec::new(),
            sequence_probability: 0.0,
        }
    }

    /// Valor da coluna nomeada, se ela fizer parte de `feature_order`.
    fn column<'a>(&self, vector: &'a FeatureVector, name: &str) -> Option<&'a str> {
        let position = self.feature_order.iter().position(|f| f == name)?;
        vector.columns.get(position + 1).map(String::as_str)
    }

    fn score(&self, vector: &FeatureVector, fraction: f64, label: &str) -> f64 {
        let col = |name: &str| self.column(vector, name).unwrap_or("");
        let capitalization = col("capitalization");
        let numeric = col("numeric");
        let punctuation = col("punctuation");
        let author_hint = col("author-hint");

        match label {
            "author" => {
                let mut s = 0.0;
                if author_hint == "possibleAuthor" {
                    s += 5.0;
                }
                if matches!(capitalization, "InitCap" | "singleCap" | "AllCaps") {
                    s += 1.2;
                }
                // Autores abrem a citação
                s += 2.5 * (1.0 - fraction).powi(2);
                s
            }
            "title" => {
                let mut s = 0.6;
                if matches!(punctuation, "leadQuote" | "endQuote") {
                    s += 2.5;
                }
                if capitalization == "InitCap" {
                    s += 0.4;
                }
                // Miolo da citação
                s += 1.5 * (1.0 - (fraction - 0.4).abs() * 3.0).max(0.0);
                s
            }
            "journal" => {
                let mut s = 0.0;
                if capitalization == "InitCap" && fraction > 0.5 {
                    s += 1.8;
                }
                s += 1.0 * (1.0 - (fraction - 0.75).abs() * 4.0).max(0.0);
                s
            }
            "date" => {
                let mut s = 0.0;
                if numeric == "year" {
                    s += 6.0;
                }
                if punctuation == "braces" {
                    s += 0.8;
                }
                s
            }
            "pages" => {
                let mut s = 0.0;
                if numeric == "possiblePage" {
                    s += 6.5;
                }
                if matches!(col("lowercase"), "pp" | "p") || matches!(col("canonical"), "pp" | "p")
                {
                    s += 3.0;
                }
                s
            }
            "volume" => {
                let mut s = 0.0;
                if numeric == "number" {
                    s += 1.6;
                }
                if numeric == "hasDigit" && fraction > 0.6 {
                    s += 2.2;
                }
                s
            }
            "publisher" => {
                if capitalization == "InitCap" && fraction > 0.7 {
                    0.8
                } else {
                    0.0
                }
            }
            "location" => {
                if capitalization == "InitCap" && fraction > 0.8 {
                    0.6
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }
}

impl ModelAdapter for HeuristicModel {
    fn reset(&mut self) {
        self.vectors.clear();
        self.results.clear();
        self.sequence_probability = 0.0;
    }

    fn add_vector(&mut self, vector: &FeatureVector) -> Result<(), AdapterError> {
        check_vector(self.vectors.len(), vector)?;
        self.vectors.push(vector.clone());
        Ok(())
    }

    fn run(&mut self) -> Result<(), AdapterError> {
        self.results.clear();
        let total = self.vectors.len();
        let mut path_probability = 1.0;

        for (i, vector) in self.vectors.iter().enumerate() {
            let fraction = if total > 1 {
                i as f64 / (total - 1) as f64
            } else {
                0.0
            };
            let scores: Vec<f64> = HEURISTIC_LABELS
                .iter()
                .map(|label| self.score(vector, fraction, label))
                .collect();

            // Softmax para virar confiança
            let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let exp: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
            let z: f64 = exp.iter().sum();

            let best = scores
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(k, _)| k)
                .unwrap_or(0);
            let confidence = exp[best] / z;

            path_probability *= confidence;
            self.results
                .push((HEURISTIC_LABELS[best].to_string(), confidence));
        }

        self.sequence_probability = if self.results.is_empty() {
            0.0
        } else {
            path_probability
        };
        Ok(())
    }

    fn label_at(&self, i: usize) -> Option<&str> {
        self.results.get(i).map(|(label, _)| label.as_str())
    }

    fn sequence_probability(&self) -> f64 {
        self.sequence_probability
    }

    fn position_confidence(&self, i: usize) -> f64 {
        self.results.get(i).map(|(_, c)| *c).unwrap_or(0.0)
    }
}

// ---------------------------------------------------------------------------
// Fake determinístico
// ---------------------------------------------------------------------------

/// Fake em memória: cicla uma lista fixa de rótulos, com confiança
/// constante. Existe para testar o restante do pipeline sem modelo real.
pub struct ScriptedModel {
    script: Vec<String>,
    confidence: f64,
    results: Vec<String>,
    pending: usize,
}

impl ScriptedModel {
    pub fn new<S: Into<String>>(script: Vec<S>, confidence: f64) -> Self {
        Self {
            script: script.into_iter().map(Into::into).collect(),
            confidence,
            results: Vec::new(),
            pending: 0,
        }
    }
}

impl ModelAdapter for ScriptedModel {
    fn reset(&mut self) {
        self.pending = 0;
        self.results.clear();
    }

    fn add_vector(&mut self, vector: &FeatureVector) -> Result<(), AdapterError> {
        check_vector(self.pending, vector)?;
        self.pending += 1;
        Ok(())
    }

    fn run(&mut self) -> Result<(), AdapterError> {
        self.results = (0..self.pending)
            .map(|i| self.script[i % self.script.len()].clone())
            .collect();
        Ok(())
    }

    fn label_at(&self, i: usize) -> Option<&str> {
        self.results.get(i).map(String::as_str)
    }

    fn sequence_probability(&self) -> f64 {
        self.confidence.powi(self.results.len() as i32)
    }

    fn position_confidence(&self, i: usize) -> f64 {
        if i < self.results.len() {
            self.confidence
        } else {
            0.0
        }
    }
}

// ---------------------------------------------------------------------------
// Processo externo estilo CRF++
// ---------------------------------------------------------------------------

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Adaptador para um rotulador externo compatível com a interface do CRF++:
/// recebe um arquivo de vetores (um token por linha, colunas separadas por
/// espaço, sequências separadas por linha em branco) e imprime na saída o
/// rótulo e a confiança por posição (`-v1`), mais a probabilidade do
/// caminho numa linha `# 0.6012`.
pub struct ExternalCrfModel {
    binary: PathBuf,
    model_file: PathBuf,
    lines: Vec<String>,
    results: Vec<(String, f64)>,
    sequence_probability: f64,
}

impl ExternalCrfModel {
    pub fn new(binary: impl Into<PathBuf>, model_file: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            model_file: model_file.into(),
            lines: Vec::new(),
            results: Vec::new(),
            sequence_probability: 0.0,
        }
    }

    fn parse_output(&mut self, stdout: &str) -> Result<(), AdapterError> {
        self.results.clear();
        for line in stdout.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(rest) = trimmed.strip_prefix('#') {
                if let Ok(p) = rest.trim().parse::<f64>() {
                    self.sequence_probability = p;
                }
                continue;
            }
            let last = trimmed.split_whitespace().next_back().ok_or_else(|| {
                AdapterError::Engine {
                    stderr: format!("linha de saída vazia do rotulador: '{line}'"),
                }
            })?;
            let (label, confidence) = last.rsplit_once('/').ok_or_else(|| {
                AdapterError::Engine {
                    stderr: format!("coluna final sem 'rótulo/confiança': '{last}'"),
                }
            })?;
            let confidence: f64 =
                confidence
                    .parse()
                    .map_err(|_| AdapterError::Engine {
                        stderr: format!("confiança ilegível na saída: '{last}'"),
                    })?;
            self.results.push((label.to_string(), confidence));
        }
        Ok(())
    }
}

impl ModelAdapter for ExternalCrfModel {
    fn reset(&mut self) {
        self.lines.clear();
        self.results.clear();
        self.sequence_probability = 0.0;
    }

    fn add_vector(&mut self, vector: &FeatureVector) -> Result<(), AdapterError> {
        check_vector(self.lines.len(), vector)?;
        self.lines.push(vector.to_line());
        Ok(())
    }

    fn run(&mut self) -> Result<(), AdapterError> {
        let stamp = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let input_path = std::env::temp_dir().join(format!(
            "cite-core-{}-{stamp}.txt",
            std::process::id()
        ));
        let payload = format!("{}\n", self.lines.join("\n"));
        std::fs::write(&input_path, payload).map_err(|source| AdapterError::Process {
            command: format!("escrita de {}", input_path.display()),
            source,
        })?;

        let output = Command::new(&self.binary)
            .arg("-v1")
            .arg("-m")
            .arg(&self.model_file)
            .arg(&input_path)
            .output();
        let _ = std::fs::remove_file(&input_path);

        let output = output.map_err(|source| AdapterError::Process {
            command: self.binary.display().to_string(),
            source,
        })?;
        if !output.status.success() {
            return Err(AdapterError::Engine {
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        self.parse_output(&String::from_utf8_lossy(&output.stdout))
    }

    fn label_at(&self, i: usize) -> Option<&str> {
        self.results.get(i).map(|(label, _)| label.as_str())
    }

    fn sequence_probability(&self) -> f64 {
        self.sequence_probability
    }

    fn position_confidence(&self, i: usize) -> f64 {
        self.results.get(i).map(|(_, c)| *c).unwrap_or(0.0)
    }
}

/// Treinamento offline: invoca o treinador externo (estilo `crf_learn`)
/// com template, arquivo de dados gerado e caminho do modelo de saída.
/// O núcleo só inspeciona sucesso/falha.
pub fn train_model(
    trainer_binary: &Path,
    template: &Path,
    training_data: &Path,
    model_out: &Path,
) -> Result<(), AdapterError> {
    let output = Command::new(trainer_binary)
        .arg(template)
        .arg(training_data)
        .arg(model_out)
        .output()
        .map_err(|source| AdapterError::Process {
            command: trainer_binary.display().to_string(),
            source,
        })?;
    if !output.status.success() {
        return Err(AdapterError::Engine {
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{compute_vectors, FeatureSpec, DEFAULT_FEATURE_ORDER};
    use crate::tokenizer::{tokenize, TokenizerMode};

    fn vectors_for(text: &str) -> Vec<FeatureVector> {
        let seq = tokenize(text, TokenizerMode::Plain).unwrap();
        let spec = FeatureSpec::from_order(DEFAULT_FEATURE_ORDER.iter().copied()).unwrap();
        compute_vectors(&seq, &spec, &[])
    }

    fn run_protocol(model: &mut dyn ModelAdapter, vectors: &[FeatureVector]) {
        model.reset();
        for vector in vectors {
            model.add_vector(vector).unwrap();
        }
        model.run().unwrap();
    }

    #[test]
    fn test_heuristic_labels_year_as_date() {
        let vectors = vectors_for("Smith, J. (2001). A Study of Things.");
        let mut model = HeuristicModel::new(
            DEFAULT_FEATURE_ORDER.iter().map(|s| s.to_string()).collect(),
        );
        run_protocol(&mut model, &vectors);

        // "(2001)." é o índice 2
        assert_eq!(model.label_at(2), Some("date"));
        assert!(model.position_confidence(2) > 0.5);
        assert_eq!(model.label_at(0), Some("author"));
    }

    #[test]
    fn test_heuristic_labels_page_range() {
        let vectors = vectors_for("Journal of Examples, 12(3), 45-67.");
        let mut model = HeuristicModel::new(
            DEFAULT_FEATURE_ORDER.iter().map(|s| s.to_string()).collect(),
        );
        run_protocol(&mut model, &vectors);
        let last = vectors.len() - 1;
        assert_eq!(model.label_at(last), Some("pages"));
    }

    #[test]
    fn test_heuristic_sequence_probability_is_product() {
        let vectors = vectors_for("Smith 2001");
        let mut model = HeuristicModel::new(
            DEFAULT_FEATURE_ORDER.iter().map(|s| s.to_string()).collect(),
        );
        run_protocol(&mut model, &vectors);
        let product = model.position_confidence(0) * model.position_confidence(1);
        assert!((model.sequence_probability() - product).abs() < 1e-12);
    }

    #[test]
    fn test_scripted_model_cycles_and_aggregates() {
        let vectors = vectors_for("a b c d");
        let mut model = ScriptedModel::new(vec!["author", "title"], 0.5);
        run_protocol(&mut model, &vectors);

        assert_eq!(model.label_at(0), Some("author"));
        assert_eq!(model.label_at(1), Some("title"));
        assert_eq!(model.label_at(2), Some("author"));
        assert_eq!(model.label_at(3), Some("title"));
        assert_eq!(model.label_at(4), None);

        // Produto das confianças das posições com o rótulo
        assert!((model.tag_probability("author") - 0.25).abs() < 1e-12);
        assert_eq!(model.tag_probability("date"), 0.0);
    }

    #[test]
    fn test_malformed_vector_is_rejected() {
        let mut model = ScriptedModel::new(vec!["author"], 1.0);
        model.reset();
        let bad = FeatureVector {
            columns: vec!["ok".to_string(), String::new()],
        };
        let err = model.add_vector(&bad).unwrap_err();
        assert!(matches!(err, AdapterError::MalformedVector { .. }));
    }

    #[test]
    fn test_external_output_parser() {
        let mut model = ExternalCrfModel::new("/usr/bin/crf_test", "/tmp/model");
        let stdout = "# 0.601\n\
                      Smith, feat1 feat2 author/0.95\n\
                      (2001). feat1 feat2 date/0.99\n\n";
        model.parse_output(stdout).unwrap();
        assert_eq!(model.label_at(0), Some("author"));
        assert_eq!(model.label_at(1), Some("date"));
        assert!((model.sequence_probability() - 0.601).abs() < 1e-12);
        assert!((model.position_confidence(1) - 0.99).abs() < 1e-12);
    }
}
