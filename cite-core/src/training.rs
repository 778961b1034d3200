//! # Alinhador de referências anotadas (treinamento)
//!
//! Uma linha do corpus de treinamento é um fragmento marcado cujos filhos
//! de topo alternam segmentos rotulados (`<author>Smith, J.</author>`) e
//! texto solto sem rótulo. O alinhador expande a linha em um rótulo por
//! token:
//!
//! 1. Para cada segmento: decodifica o texto, tokeniza o trecho isolado,
//!    conta os tokens e empilha a mesma quantidade de cópias do rótulo
//!    (ou do marcador [`UNLABELED`] para trechos sem rótulo), enquanto
//!    acumula o texto num buffer com fronteiras de quebra de linha.
//! 2. Tokeniza o buffer acumulado **inteiro** e confere que a contagem
//!    bate com a soma por segmento — divergência é erro fatal de dados,
//!    reportando ambas as contagens, os tokens e os rótulos envolvidos.
//! 3. Atribui os rótulos aos tokens finais por posição.
//!
//! Rótulos fora do conjunto reconhecido do modo ativo são erro de
//! configuração/dados, nomeando o rótulo e a linha. Marcadores de abertura
//! e fechamento trocados são erro de alinhamento nomeando os dois nomes.

use quick_xml::errors::IllFormedError;
use quick_xml::events::Event;
use quick_xml::Reader;
use rayon::prelude::*;

use crate::error::{AlignError, CiteError, ConfigError};
use crate::tokenizer::{tokenize, TokenSequence, TokenizerMode};

/// Marcador usado para tokens de segmentos sem rótulo.
pub const UNLABELED: &str = "unlabeled";

/// Rótulos reconhecidos no modo texto puro (inventário clássico de campos
/// de citação).
pub const PLAIN_LABELS: &[&str] = &[
    "author",
    "booktitle",
    "date",
    "editor",
    "institution",
    "journal",
    "location",
    "note",
    "pages",
    "publisher",
    "tech",
    "title",
    "volume",
];

/// Rótulos reconhecidos no modo estrutural (inclui o marcador de item de
/// lista de referências).
pub const STRUCTURAL_LABELS: &[&str] = &[
    "author",
    "booktitle",
    "date",
    "editor",
    "institution",
    "journal",
    "location",
    "marker",
    "note",
    "pages",
    "publisher",
    "tech",
    "title",
    "volume",
];

/// Conjunto de rótulos padrão para um modo de tokenização.
pub fn recognized_labels(mode: TokenizerMode) -> &'static [&'static str] {
    match mode {
        TokenizerMode::Plain => PLAIN_LABELS,
        TokenizerMode::Structural => STRUCTURAL_LABELS,
    }
}

/// Resultado do alinhamento de uma linha: sequência tokenizada com os
/// rótulos já gravados nos tokens, e a lista posicional de rótulos.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedReference {
    pub sequence: TokenSequence,
    pub labels: Vec<String>,
}

/// Alinhamento de um corpus inteiro: linhas boas seguem adiante, falhas
/// ficam registradas com o número da linha (1-based).
#[derive(Debug)]
pub struct CorpusAlignment {
    pub aligned: Vec<AlignedReference>,
    pub failures: Vec<(usize, CiteError)>,
}

/// Segmento de topo de uma linha anotada: rótulo (se houver) e texto
/// decodificado.
type Segment = (Option<String>, String);

fn parse_segments(line: &str) -> Result<Vec<Segment>, AlignError> {
    let mut reader = Reader::from_str(line);
    // check_end_names fica no padrão (ligado): é ele quem denuncia
    // marcadores trocados

    let mut segments: Vec<Segment> = Vec::new();
    let mut depth = 0usize;
    let mut current_label: Option<String> = None;
    let mut buffer = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if depth == 0 {
                    current_label =
                        Some(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                    buffer.clear();
                }
                depth += 1;
            }
            Ok(Event::End(_)) => {
                depth = depth.checked_sub(1).ok_or_else(|| AlignError::BadMarkup {
                    reason: "fechamento sem abertura correspondente".to_string(),
                    input: line.to_string(),
                })?;
                if depth == 0 {
                    segments.push((current_label.take(), std::mem::take(&mut buffer)));
                }
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if depth == 0 {
                    segments.push((Some(name), String::new()));
                }
            }
            Ok(Event::Text(e)) => {
                let decoded = e
                    .unescape()
                    .map_err(|err| AlignError::BadMarkup {
                        reason: err.to_string(),
                        input: line.to_string(),
                    })?
                    .into_owned();
                if depth == 0 {
                    if !decoded.trim().is_empty() {
                        segments.push((None, decoded));
                    }
                } else {
                    buffer.push_str(&decoded);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(quick_xml::Error::IllFormed(IllFormedError::MismatchedEndTag {
                expected,
                found,
            })) => {
                return Err(AlignError::MarkerMismatch {
                    expected,
                    found,
                    line: line.to_string(),
                })
            }
            Err(err) => {
                return Err(AlignError::BadMarkup {
                    reason: err.to_string(),
                    input: line.to_string(),
                })
            }
        }
    }

    Ok(segments)
}

fn align_segments(
    segments: Vec<Segment>,
    recognized: &[String],
    line: &str,
) -> Result<AlignedReference, CiteError> {
    let mut labels: Vec<String> = Vec::new();
    let mut raw_buffer = String::new();

    for (label, text) in &segments {
        let name = match label {
            Some(l) => {
                if !recognized.iter().any(|r| r == l) {
                    return Err(ConfigError::UnknownLabel {
                        label: l.clone(),
                        line: line.to_string(),
                    }
                    .into());
                }
                l.clone()
            }
            None => UNLABELED.to_string(),
        };

        // Contagem do trecho isolado, pela mesma tokenização do buffer final
        let chunk = tokenize(text, TokenizerMode::Plain)?;
        for _ in 0..chunk.len() {
            labels.push(name.clone());
        }

        // Fronteira de quebra de linha entre trechos
        raw_buffer.push('\n');
        raw_buffer.push_str(text);
    }

    // Re-tokenização do buffer inteiro, de uma vez só
    let mut sequence = tokenize(&raw_buffer, TokenizerMode::Plain)?;

    if sequence.len() != labels.len() {
        return Err(AlignError::CountMismatch {
            tokens: sequence.len(),
            labels: labels.len(),
            line: line.to_string(),
            token_texts: sequence
                .iter()
                .map(|t| t.raw.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            label_names: labels.join(", "),
        }
        .into());
    }

    for (token, label) in sequence.tokens_mut().iter_mut().zip(&labels) {
        token.label = Some(label.clone());
    }

    Ok(AlignedReference { sequence, labels })
}

/// Alinha uma linha anotada do corpus contra o conjunto de rótulos
/// reconhecidos.
pub fn align_reference(line: &str, recognized: &[String]) -> Result<AlignedReference, CiteError> {
    let segments = parse_segments(line)?;
    align_segments(segments, recognized, line)
}

/// Alinha um corpus inteiro (uma referência anotada por linha).
///
/// As linhas são processadas em paralelo e o resultado volta à ordem do
/// arquivo; linhas em branco são ignoradas. Uma linha ruim não derruba as
/// demais — a falha fica em `failures` com o número da linha.
pub fn align_corpus(corpus: &str, recognized: &[String]) -> CorpusAlignment {
    let numbered: Vec<(usize, &str)> = corpus
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .collect();

    let mut results: Vec<(usize, Result<AlignedReference, CiteError>)> = numbered
        .par_iter()
        .map(|(index, line)| (*index, align_reference(line, recognized)))
        .collect();
    results.sort_by_key(|(index, _)| *index);

    let mut aligned = Vec::new();
    let mut failures = Vec::new();
    for (index, result) in results {
        match result {
            Ok(reference) => aligned.push(reference),
            Err(err) => failures.push((index + 1, err)),
        }
    }

    CorpusAlignment { aligned, failures }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_labels() -> Vec<String> {
        PLAIN_LABELS.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_align_well_formed_line() {
        let line = "<author>Smith, J.</author> ed. <title>A Study of Things.</title> \
                    <date>(2001).</date>";
        let aligned = align_reference(line, &plain_labels()).unwrap();

        assert_eq!(aligned.sequence.len(), aligned.labels.len());
        let pairs: Vec<(&str, &str)> = aligned
            .sequence
            .iter()
            .map(|t| (t.raw.as_str(), t.label.as_deref().unwrap()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("Smith,", "author"),
                ("J.", "author"),
                ("ed.", UNLABELED),
                ("A", "title"),
                ("Study", "title"),
                ("of", "title"),
                ("Things.", "title"),
                ("(2001).", "date"),
            ]
        );
    }

    #[test]
    fn test_align_decodes_entities() {
        let line = "<journal>Food &amp; Wine</journal>";
        let aligned = align_reference(line, &plain_labels()).unwrap();
        let raws: Vec<&str> = aligned.sequence.iter().map(|t| t.raw.as_str()).collect();
        assert_eq!(raws, ["Food", "&", "Wine"]);
        assert!(aligned.labels.iter().all(|l| l == "journal"));
    }

    #[test]
    fn test_mismatched_markers_name_both() {
        let line = "<author>Smith, J.</title>";
        let err = align_reference(line, &plain_labels()).unwrap_err();
        match err {
            CiteError::Align(AlignError::MarkerMismatch {
                expected, found, ..
            }) => {
                assert_eq!(expected, "author");
                assert_eq!(found, "title");
            }
            other => panic!("erro inesperado: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_label_is_config_error() {
        let line = "<banana>Smith</banana>";
        let err = align_reference(line, &plain_labels()).unwrap_err();
        match err {
            CiteError::Config(ConfigError::UnknownLabel { label, line }) => {
                assert_eq!(label, "banana");
                assert!(line.contains("banana"));
            }
            other => panic!("erro inesperado: {other:?}"),
        }
    }

    #[test]
    fn test_count_mismatch_reports_both_sides() {
        let err = AlignError::CountMismatch {
            tokens: 3,
            labels: 2,
            line: "x".to_string(),
            token_texts: "a, b, c".to_string(),
            label_names: "author, author".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains('3'));
        assert!(message.contains('2'));
        assert!(message.contains("a, b, c"));
    }

    #[test]
    fn test_corpus_keeps_good_lines_and_reports_bad_ones() {
        let corpus = "<author>Smith</author>\n\
                      <author>Jones</title>\n\
                      \n\
                      <title>Things</title>\n";
        let result = align_corpus(corpus, &plain_labels());
        assert_eq!(result.aligned.len(), 2);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].0, 2);
    }

    #[test]
    fn test_empty_segment_yields_no_labels() {
        let line = "<author></author><title>Things</title>";
        let aligned = align_reference(line, &plain_labels()).unwrap();
        assert_eq!(aligned.sequence.len(), 1);
        assert_eq!(aligned.labels, vec!["title".to_string()]);
    }
}
