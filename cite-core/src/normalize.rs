//! # Normalização de texto e de campos
//!
//! Funções puras usadas em várias etapas do pipeline:
//!
//! - **Limpeza da entrada** (modo `Plain`): remove caracteres de controle e
//!   espaços exóticos antes da tokenização. Aplicada exatamente uma vez.
//! - **Remoção de pontuação** das bordas de um token, produzindo a "forma
//!   canônica" usada pelas features e pelo alinhador de POS. Quando nada
//!   sobra, devolvemos o sentinela [`EMPTY_WORD`].
//! - **Normalização dos campos** do registro final (espaços duplicados,
//!   pontuação pendurada no fim de autor/título etc).

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

/// Sentinela devolvido quando a remoção de pontuação esvazia o token.
///
/// O sentinela sobrevive intacto à versão minúscula do token: `"EMPTY"`
/// nunca vira `"empty"`, para que features e alinhadores possam testá-lo
/// por igualdade exata.
pub const EMPTY_WORD: &str = "EMPTY";

fn edge_punct() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\W+|\W+$").expect("regex de pontuação válida"))
}

fn page_range() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\s*[-–—]+\s*\d+$").expect("regex de páginas válida"))
}

/// Remove pontuação das bordas do token.
///
/// A operação é idempotente: aplicar duas vezes dá o mesmo resultado, e o
/// próprio sentinela é um ponto fixo (é composto só de letras).
pub fn strip_punct(raw: &str) -> String {
    let stripped = edge_punct().replace_all(raw, "");
    if stripped.is_empty() {
        EMPTY_WORD.to_string()
    } else {
        stripped.into_owned()
    }
}

/// Versão minúscula da forma canônica, preservando o sentinela como está.
pub fn lower_canonical(canonical: &str) -> String {
    if canonical == EMPTY_WORD {
        EMPTY_WORD.to_string()
    } else {
        canonical.to_lowercase()
    }
}

/// O token inteiro (sem pontuação das bordas) parece um intervalo de páginas?
/// Ex.: "45-67", "112–118".
pub fn looks_like_page_range(raw: &str) -> bool {
    let trimmed = edge_punct().replace_all(raw, "");
    page_range().is_match(trimmed.as_ref())
}

/// Limpeza aplicada à citação crua antes da tokenização em modo `Plain`.
///
/// Troca caracteres de controle e espaços Unicode exóticos por espaço comum.
/// A divisão por espaços em branco não muda de resultado, mas o texto que
/// guardamos em `raw_string` fica livre de lixo invisível.
pub fn clean_input(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_control() || (c.is_whitespace() && c != ' ') {
                ' '
            } else {
                c
            }
        })
        .collect()
}

/// Campos que aceitam perder vírgulas e ponto-e-vírgulas pendurados no fim.
const TRIM_TRAILING: &[&str] = &["author", "title", "journal", "booktitle", "editor", "publisher"];

/// Normalização final dos campos do registro rotulado.
///
/// Colapsa espaços internos e apara pontuação de continuação no fim dos
/// campos textuais. O campo `raw_string` nunca passa por aqui — ele é
/// inserido depois, intocado.
pub fn normalize_fields(fields: &mut BTreeMap<String, String>) {
    for (label, value) in fields.iter_mut() {
        let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
        let cleaned = if TRIM_TRAILING.contains(&label.as_str()) {
            collapsed.trim_end_matches([',', ';']).trim_end().to_string()
        } else {
            collapsed
        };
        *value = cleaned;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_punct_basic() {
        assert_eq!(strip_punct("(2001)."), "2001");
        assert_eq!(strip_punct("Smith,"), "Smith");
        assert_eq!(strip_punct("J."), "J");
    }

    #[test]
    fn test_strip_punct_idempotent() {
        let once = strip_punct("\"Things.\"");
        let twice = strip_punct(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_strip_punct_sentinel() {
        // Só pontuação → sentinela
        assert_eq!(strip_punct("---"), EMPTY_WORD);
        assert_eq!(strip_punct("()."), EMPTY_WORD);
        // Minúscula preserva o sentinela
        assert_eq!(lower_canonical(EMPTY_WORD), EMPTY_WORD);
        assert_eq!(lower_canonical("Smith"), "smith");
    }

    #[test]
    fn test_page_range() {
        assert!(looks_like_page_range("45-67"));
        assert!(looks_like_page_range("112–118,"));
        assert!(!looks_like_page_range("2001"));
        assert!(!looks_like_page_range("12(3)"));
    }

    #[test]
    fn test_clean_input() {
        assert_eq!(clean_input("a\tb\u{00a0}c"), "a b c");
    }

    #[test]
    fn test_normalize_fields_trailing() {
        let mut fields = BTreeMap::new();
        fields.insert("author".to_string(), "Smith, J. ,".to_string());
        fields.insert("pages".to_string(), "45-67.".to_string());
        normalize_fields(&mut fields);
        assert_eq!(fields["author"], "Smith, J.");
        // pages não está na lista de aparo
        assert_eq!(fields["pages"], "45-67.");
    }
}
