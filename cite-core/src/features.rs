//! # Engenharia de features para rotulagem de citações
//!
//! Para cada token a engine calcula um conjunto configurável de features
//! nomeadas e monta o vetor que alimenta o modelo de rotulagem de
//! sequências. Duas listas governam o processo:
//!
//! - `token_features`: **quais** funções avaliar. A avaliação percorre os
//!   nomes em ordem lexicográfica — uma ordem total documentada e estável,
//!   reforçada pelas dependências declaradas de cada feature (ver
//!   [`FeatureDef::depends_on`]), validadas na carga da configuração.
//! - `feature_order`: **quais colunas emitir e em que ordem**. Features
//!   presentes em `token_features` mas ausentes de `feature_order` são
//!   calculadas e descartadas — existem só como dependência de outras.
//!
//! Cada função recebe a sequência inteira, o índice do token e a lista de
//! possíveis nomes de autor (dica, não verdade absoluta), podendo ler
//! qualquer token vizinho, mas nunca mutá-los fora do mecanismo de cache
//! das formas derivadas.
//!
//! ## Layout do vetor (contrato de fio com o adaptador)
//!
//! `[texto_cru, coluna_1, ..., coluna_n]` — e, na geração de dados de
//! treinamento, o rótulo como última coluna.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::error::ConfigError;
use crate::normalize::{looks_like_page_range, EMPTY_WORD};
use crate::tokenizer::TokenSequence;

/// Assinatura de uma função de feature: sequência completa, índice do token
/// e dicas de nomes de autor (já minúsculas e sem pontuação).
pub type FeatureFn = fn(&TokenSequence, usize, &[String]) -> String;

/// Definição de uma feature registrada.
pub struct FeatureDef {
    /// Features cujos valores/caches esta assume já calculados.
    pub depends_on: &'static [&'static str],
    func: FeatureFn,
}

/// Ordem de colunas usada pelas configurações padrão.
///
/// `lowercase` fica de fora de propósito: entra em `token_features` apenas
/// como dependência de `author-hint`.
pub const DEFAULT_FEATURE_ORDER: &[&str] = &[
    "canonical",
    "capitalization",
    "numeric",
    "punctuation",
    "last-char",
    "prefix1",
    "prefix2",
    "prefix3",
    "prefix4",
    "suffix1",
    "suffix2",
    "suffix3",
    "suffix4",
    "location",
    "author-hint",
    "node-position",
];

fn feat_canonical(seq: &TokenSequence, i: usize, _: &[String]) -> String {
    seq.tokens()[i].canonical().to_string()
}

fn feat_lowercase(seq: &TokenSequence, i: usize, _: &[String]) -> String {
    seq.tokens()[i].lower().to_string()
}

fn feat_capitalization(seq: &TokenSequence, i: usize, _: &[String]) -> String {
    let canonical = seq.tokens()[i].canonical();
    if canonical == EMPTY_WORD {
        return "others".to_string();
    }
    let chars: Vec<char> = canonical.chars().collect();
    let first_upper = chars[0].is_uppercase();
    let all_upper = chars.iter().all(|c| c.is_uppercase() || !c.is_alphabetic());
    let any_tail_upper = chars.iter().skip(1).any(|c| c.is_uppercase());

    if chars.len() == 1 && first_upper {
        "singleCap"
    } else if all_upper && first_upper {
        "AllCaps"
    } else if first_upper && !any_tail_upper {
        "InitCap"
    } else if any_tail_upper {
        "MixedCaps"
    } else {
        "others"
    }
    .to_string()
}

fn feat_numeric(seq: &TokenSequence, i: usize, _: &[String]) -> String {
    let token = &seq.tokens()[i];
    let canonical = token.canonical();
    if looks_like_page_range(&token.raw) {
        return "possiblePage".to_string();
    }
    if canonical.len() == 4 {
        if let Ok(value) = canonical.parse::<u32>() {
            if (1500..2100).contains(&value) {
                return "year".to_string();
            }
        }
    }
    let digits = canonical.chars().filter(|c| c.is_ascii_digit()).count();
    if digits > 0 && digits == canonical.chars().count() {
        "number"
    } else if digits > 0 && canonical.to_lowercase().ends_with(['t', 'd']) {
        // 1st, 2nd, 3rd, 4th...
        "ordinal"
    } else if digits > 0 {
        "hasDigit"
    } else {
        "noDigit"
    }
    .to_string()
}

fn feat_punctuation(seq: &TokenSequence, i: usize, _: &[String]) -> String {
    let raw = seq.tokens()[i].raw.as_str();
    let quotes = ['"', '\'', '\u{201c}', '\u{201d}', '\u{2018}', '\u{2019}'];
    let hyphens = raw.chars().filter(|c| *c == '-').count();

    if raw.starts_with(quotes) {
        "leadQuote"
    } else if raw.ends_with(quotes)
        || raw.trim_end_matches([',', '.', ';']).ends_with(quotes)
    {
        "endQuote"
    } else if hyphens > 1 {
        "multiHyphen"
    } else if raw.ends_with([',', ';', ':']) {
        "contPunct"
    } else if raw.ends_with(['.', '!', '?']) {
        "stopPunct"
    } else if raw.contains(['(', ')', '[', ']', '{', '}']) {
        "braces"
    } else {
        "others"
    }
    .to_string()
}

fn feat_last_char(seq: &TokenSequence, i: usize, _: &[String]) -> String {
    match seq.tokens()[i].raw.chars().last() {
        Some(c) if c.is_uppercase() => "A".to_string(),
        Some(c) if c.is_lowercase() => "a".to_string(),
        Some(c) if c.is_ascii_digit() => "0".to_string(),
        Some(c) => c.to_string(),
        None => "a".to_string(),
    }
}

fn prefix_of(canonical: &str, n: usize) -> String {
    if canonical == EMPTY_WORD {
        return EMPTY_WORD.to_string();
    }
    canonical.graphemes(true).take(n).collect()
}

fn suffix_of(canonical: &str, n: usize) -> String {
    if canonical == EMPTY_WORD {
        return EMPTY_WORD.to_string();
    }
    let graphemes: Vec<&str> = canonical.graphemes(true).collect();
    graphemes[graphemes.len().saturating_sub(n)..].concat()
}

macro_rules! affix_feature {
    ($name:ident, $builder:ident, $n:expr) => {
        fn $name(seq: &TokenSequence, i: usize, _: &[String]) -> String {
            $builder(seq.tokens()[i].canonical(), $n)
        }
    };
}

affix_feature!(feat_prefix1, prefix_of, 1);
affix_feature!(feat_prefix2, prefix_of, 2);
affix_feature!(feat_prefix3, prefix_of, 3);
affix_feature!(feat_prefix4, prefix_of, 4);
affix_feature!(feat_suffix1, suffix_of, 1);
affix_feature!(feat_suffix2, suffix_of, 2);
affix_feature!(feat_suffix3, suffix_of, 3);
affix_feature!(feat_suffix4, suffix_of, 4);

fn feat_location(seq: &TokenSequence, i: usize, _: &[String]) -> String {
    // Posição relativa na citação, em decis: loc0 = começo, loc9 = fim
    let bin = (i * 10) / seq.len().max(1);
    format!("loc{}", bin.min(9))
}

fn feat_author_hint(seq: &TokenSequence, i: usize, hints: &[String]) -> String {
    let lower = seq.tokens()[i].lower();
    if hints.iter().any(|h| h == lower) {
        "possibleAuthor".to_string()
    } else {
        "noAuthor".to_string()
    }
}

fn feat_node_position(seq: &TokenSequence, i: usize, _: &[String]) -> String {
    let token = &seq.tokens()[i];
    match (token.index_in_node, token.node_token_count) {
        (Some(_), Some(1)) => "sole",
        (Some(0), Some(_)) => "first",
        (Some(k), Some(n)) if k + 1 == n => "last",
        (Some(_), Some(_)) => "inside",
        _ => "plain",
    }
    .to_string()
}

fn feat_pos_tag(seq: &TokenSequence, i: usize, _: &[String]) -> String {
    seq.tokens()[i]
        .pos
        .clone()
        .unwrap_or_else(|| "none".to_string())
}

/// Registro global de features: nome → definição.
///
/// `BTreeMap` por dois motivos: iteração determinística e a mesma ordem
/// lexicográfica usada na avaliação.
pub fn registry() -> &'static BTreeMap<&'static str, FeatureDef> {
    static REGISTRY: OnceLock<BTreeMap<&'static str, FeatureDef>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map: BTreeMap<&'static str, FeatureDef> = BTreeMap::new();
        let mut add = |name: &'static str, depends_on: &'static [&'static str], func: FeatureFn| {
            map.insert(name, FeatureDef { depends_on, func });
        };
        add("author-hint", &["lowercase"], feat_author_hint);
        add("canonical", &[], feat_canonical);
        add("capitalization", &["canonical"], feat_capitalization);
        add("last-char", &[], feat_last_char);
        add("location", &[], feat_location);
        add("lowercase", &["canonical"], feat_lowercase);
        add("node-position", &[], feat_node_position);
        add("numeric", &["canonical"], feat_numeric);
        add("pos-tag", &[], feat_pos_tag);
        add("prefix1", &["canonical"], feat_prefix1);
        add("prefix2", &["canonical"], feat_prefix2);
        add("prefix3", &["canonical"], feat_prefix3);
        add("prefix4", &["canonical"], feat_prefix4);
        add("punctuation", &[], feat_punctuation);
        add("suffix1", &["canonical"], feat_suffix1);
        add("suffix2", &["canonical"], feat_suffix2);
        add("suffix3", &["canonical"], feat_suffix3);
        add("suffix4", &["canonical"], feat_suffix4);
        map
    })
}

/// Configuração de features: colunas emitidas e conjunto avaliado.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    /// Ordem das colunas do vetor emitido.
    pub feature_order: Vec<String>,
    /// Conjunto (lexicograficamente ordenado) de features avaliadas.
    /// Obrigatoriamente um superconjunto do fecho de dependências de
    /// `feature_order`.
    #[serde(default)]
    pub token_features: BTreeSet<String>,
}

impl FeatureSpec {
    /// Monta a spec a partir da ordem de colunas, completando
    /// `token_features` com o fecho de dependências.
    pub fn from_order<I, S>(order: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let feature_order: Vec<String> = order.into_iter().map(Into::into).collect();
        let token_features = dependency_closure(&feature_order)?;
        let spec = Self {
            feature_order,
            token_features,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Validação de carga: nomes conhecidos, ordem não-vazia e cobertura do
    /// fecho de dependências. Violações são erro de configuração, nunca de
    /// execução.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feature_order.is_empty() {
            return Err(ConfigError::EmptyOrder);
        }
        let known = registry();
        for name in self.feature_order.iter().chain(self.token_features.iter()) {
            if !known.contains_key(name.as_str()) {
                return Err(ConfigError::UnknownFeature { name: name.clone() });
            }
        }
        for name in &self.feature_order {
            if !self.token_features.contains(name) {
                return Err(ConfigError::MissingDependency {
                    feature: name.clone(),
                    dependency: name.clone(),
                });
            }
        }
        // Fecho transitivo sobre o conjunto avaliado
        for name in &self.token_features {
            let def = &known[name.as_str()];
            for dependency in def.depends_on {
                if !self.token_features.contains(*dependency) {
                    return Err(ConfigError::MissingDependency {
                        feature: name.clone(),
                        dependency: (*dependency).to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Fecho transitivo de dependências de uma lista de features.
fn dependency_closure(order: &[String]) -> Result<BTreeSet<String>, ConfigError> {
    let known = registry();
    let mut closure: BTreeSet<String> = BTreeSet::new();
    let mut pending: Vec<String> = order.to_vec();
    while let Some(name) = pending.pop() {
        let def = known
            .get(name.as_str())
            .ok_or(ConfigError::UnknownFeature { name: name.clone() })?;
        if closure.insert(name) {
            for dependency in def.depends_on {
                pending.push((*dependency).to_string());
            }
        }
    }
    Ok(closure)
}

/// Vetor de features de um token: texto cru, colunas em `feature_order` e,
/// no treinamento, o rótulo como última coluna.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub columns: Vec<String>,
}

impl FeatureVector {
    /// Texto cru do token (primeira coluna, sempre presente).
    pub fn raw(&self) -> &str {
        &self.columns[0]
    }

    /// Linha no formato de fio: colunas unidas por espaço simples.
    pub fn to_line(&self) -> String {
        self.columns.join(" ")
    }
}

/// Calcula os vetores de features de toda a sequência, alinhados por índice
/// com os tokens.
///
/// Assume uma spec já validada (ver [`FeatureSpec::validate`]): toda coluna
/// de `feature_order` tem valor calculado.
pub fn compute_vectors(
    sequence: &TokenSequence,
    spec: &FeatureSpec,
    author_hints: &[String],
) -> Vec<FeatureVector> {
    let known = registry();
    (0..sequence.len())
        .map(|i| {
            // BTreeSet itera em ordem lexicográfica: a ordem total de
            // avaliação independe de feature_order
            let mut values: BTreeMap<&str, String> = BTreeMap::new();
            for name in &spec.token_features {
                if let Some(def) = known.get(name.as_str()) {
                    values.insert(name.as_str(), (def.func)(sequence, i, author_hints));
                }
            }

            let mut columns = Vec::with_capacity(spec.feature_order.len() + 1);
            columns.push(sequence.tokens()[i].raw.clone());
            for name in &spec.feature_order {
                columns.push(values.get(name.as_str()).cloned().unwrap_or_default());
            }
            FeatureVector { columns }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::{tokenize, TokenizerMode};

    fn plain(text: &str) -> TokenSequence {
        tokenize(text, TokenizerMode::Plain).unwrap()
    }

    #[test]
    fn test_capitalization_classes() {
        let seq = plain("SMITH Smith smith S. sMith");
        let cap = |i| feat_capitalization(&seq, i, &[]);
        assert_eq!(cap(0), "AllCaps");
        assert_eq!(cap(1), "InitCap");
        assert_eq!(cap(2), "others");
        assert_eq!(cap(3), "singleCap");
        assert_eq!(cap(4), "MixedCaps");
    }

    #[test]
    fn test_numeric_classes() {
        let seq = plain("(2001). 45-67. 12(3), vol7 words");
        let num = |i| feat_numeric(&seq, i, &[]);
        assert_eq!(num(0), "year");
        assert_eq!(num(1), "possiblePage");
        assert_eq!(num(2), "hasDigit");
        assert_eq!(num(3), "hasDigit");
        assert_eq!(num(4), "noDigit");
    }

    #[test]
    fn test_affixes_are_grapheme_aware() {
        let seq = plain("Ávila");
        assert_eq!(feat_prefix2(&seq, 0, &[]), "Áv");
        assert_eq!(feat_suffix2(&seq, 0, &[]), "la");
        // Palavra mais curta que o afixo: devolve a palavra toda
        let seq = plain("de");
        assert_eq!(feat_prefix4(&seq, 0, &[]), "de");
        assert_eq!(feat_suffix4(&seq, 0, &[]), "de");
    }

    #[test]
    fn test_location_bins() {
        let seq = plain("a b c d e f g h i j");
        assert_eq!(feat_location(&seq, 0, &[]), "loc0");
        assert_eq!(feat_location(&seq, 9, &[]), "loc9");
        assert_eq!(feat_location(&seq, 5, &[]), "loc5");
    }

    #[test]
    fn test_author_hint() {
        let seq = plain("Smith, J. wrote");
        let hints = vec!["smith".to_string()];
        assert_eq!(feat_author_hint(&seq, 0, &hints), "possibleAuthor");
        assert_eq!(feat_author_hint(&seq, 2, &hints), "noAuthor");
    }

    #[test]
    fn test_node_position() {
        let seq = tokenize("<i>Smith</i> A Study", TokenizerMode::Structural).unwrap();
        assert_eq!(feat_node_position(&seq, 0, &[]), "sole");
        assert_eq!(feat_node_position(&seq, 1, &[]), "first");
        assert_eq!(feat_node_position(&seq, 2, &[]), "last");

        let seq = plain("Smith");
        assert_eq!(feat_node_position(&seq, 0, &[]), "plain");
    }

    #[test]
    fn test_spec_closure_completes_dependencies() {
        let spec = FeatureSpec::from_order(["author-hint"]).unwrap();
        // author-hint → lowercase → canonical
        assert!(spec.token_features.contains("lowercase"));
        assert!(spec.token_features.contains("canonical"));
    }

    #[test]
    fn test_spec_rejects_unknown_feature() {
        let err = FeatureSpec::from_order(["no-such-feature"]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownFeature { .. }));
    }

    #[test]
    fn test_spec_rejects_missing_dependency() {
        let spec = FeatureSpec {
            feature_order: vec!["author-hint".to_string()],
            token_features: ["author-hint".to_string()].into_iter().collect(),
        };
        let err = spec.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingDependency { ref dependency, .. } if dependency == "lowercase"
        ));
    }

    #[test]
    fn test_vector_columns_follow_feature_order() {
        let seq = plain("Smith, (2001).");
        // feature_order fora de ordem alfabética de propósito, e com
        // token_features carregando a dependência extra "lowercase"
        let spec = FeatureSpec::from_order(["numeric", "capitalization", "author-hint"]).unwrap();
        let vectors = compute_vectors(&seq, &spec, &[]);
        assert_eq!(vectors.len(), 2);

        let smith = &vectors[0];
        assert_eq!(smith.raw(), "Smith,");
        assert_eq!(smith.columns[1], "noDigit");
        assert_eq!(smith.columns[2], "InitCap");
        assert_eq!(smith.columns[3], "noAuthor");
        // "lowercase" foi avaliada (dependência) mas não emitida
        assert_eq!(smith.columns.len(), 4);

        let year = &vectors[1];
        assert_eq!(year.columns[1], "year");
    }

    #[test]
    fn test_vector_line_format() {
        let seq = plain("Smith,");
        let spec = FeatureSpec::from_order(["canonical", "capitalization"]).unwrap();
        let vectors = compute_vectors(&seq, &spec, &[]);
        assert_eq!(vectors[0].to_line(), "Smith, Smith InitCap");
    }
}
