//! # Alinhador de classes gramaticais (POS)
//!
//! O tagger de POS externo recebe os textos crus dos tokens unidos por
//! espaço ([`TokenSequence::joined_raw`]) e devolve um blob marcado em que
//! cada elemento tem o nome da classe e o corpo é um trecho literal da
//! entrada, na ordem esquerda→direita.
//!
//! O alinhamento é uma única passada para a frente sobre a lista de spans,
//! compartilhada entre todos os tokens: ao casar, o span usado **e todos os
//! anteriores ainda não consumidos** são descartados; ao não casar, o token
//! fica sem POS e o cursor não anda. Nunca há retrocesso nem reordenação —
//! saída de tagger embaralhada sub-rotula silenciosamente os tokens
//! seguintes. O resultado devolve quantos tokens ficaram sem classe, para
//! que o chamador possa instrumentar esse dessincronismo. O custo é
//! O(tokens + spans).

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::AlignError;
use crate::tokenizer::TokenSequence;

/// Resumo de uma passada de alinhamento de POS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PosAlignment {
    /// Tokens que receberam classe gramatical.
    pub tagged: usize,
    /// Tokens deixados sem classe (dessincronismo ou span ausente).
    pub untagged: usize,
}

/// Extrai do blob marcado a lista ordenada de pares (classe, texto).
pub fn parse_tagged_spans(blob: &str) -> Result<Vec<(String, String)>, AlignError> {
    let mut reader = Reader::from_str(blob);
    reader.config_mut().check_end_names = false;

    let mut spans = Vec::new();
    let mut stack: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                stack.push(String::from_utf8_lossy(e.name().as_ref()).into_owned());
            }
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Text(e)) => {
                let decoded = match e.unescape() {
                    Ok(cow) => cow.into_owned(),
                    Err(_) => String::from_utf8_lossy(&e).into_owned(),
                };
                let trimmed = decoded.trim();
                if trimmed.is_empty() {
                    continue;
                }
                // Texto solto entre elementos não forma span
                if let Some(tag) = stack.last() {
                    spans.push((tag.clone(), trimmed.to_string()));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(AlignError::BadMarkup {
                    reason: err.to_string(),
                    input: blob.to_string(),
                })
            }
        }
    }

    Ok(spans)
}

/// Atribui classe gramatical aos tokens a partir da saída do tagger externo.
pub fn align_pos(sequence: &mut TokenSequence, blob: &str) -> Result<PosAlignment, AlignError> {
    let spans = parse_tagged_spans(blob)?;

    let mut cursor = 0usize;
    let mut tagged = 0usize;
    let mut untagged = 0usize;

    for token in sequence.tokens_mut() {
        let surface = token.taggable_surface().to_string();
        match spans[cursor..].iter().position(|(_, text)| *text == surface) {
            Some(offset) => {
                let (tag, _) = &spans[cursor + offset];
                token.pos = Some(tag.clone());
                // Consome o span casado e os anteriores pulados
                cursor += offset + 1;
                tagged += 1;
            }
            None => {
                untagged += 1;
            }
        }
    }

    Ok(PosAlignment { tagged, untagged })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::{tokenize, TokenizerMode};

    #[test]
    fn test_parse_spans_ordered() {
        let spans = parse_tagged_spans("<nnp>Smith</nnp> <vbz>studies</vbz>").unwrap();
        assert_eq!(
            spans,
            vec![
                ("nnp".to_string(), "Smith".to_string()),
                ("vbz".to_string(), "studies".to_string()),
            ]
        );
    }

    #[test]
    fn test_align_all_in_order() {
        let mut seq = tokenize("Smith, J. studies", TokenizerMode::Plain).unwrap();
        let blob = "<nnp>Smith</nnp> <nnp>J</nnp> <vbz>studies</vbz>";
        let result = align_pos(&mut seq, blob).unwrap();
        assert_eq!(result.tagged, 3);
        assert_eq!(result.untagged, 0);
        let pos: Vec<&str> = seq.iter().map(|t| t.pos.as_deref().unwrap()).collect();
        assert_eq!(pos, ["nnp", "nnp", "vbz"]);
    }

    #[test]
    fn test_missing_interior_span() {
        // O tagger não emitiu span para "J"; só esse token fica sem POS
        let mut seq = tokenize("Smith, J. studies", TokenizerMode::Plain).unwrap();
        let blob = "<nnp>Smith</nnp> <vbz>studies</vbz>";
        let result = align_pos(&mut seq, blob).unwrap();
        assert_eq!(result.tagged, 2);
        assert_eq!(result.untagged, 1);
        assert_eq!(seq.get(0).unwrap().pos.as_deref(), Some("nnp"));
        assert_eq!(seq.get(1).unwrap().pos, None);
        assert_eq!(seq.get(2).unwrap().pos.as_deref(), Some("vbz"));
    }

    #[test]
    fn test_skipped_spans_are_discarded() {
        // O span extra "x" antes de "studies" é consumido junto com o casamento
        // e não volta a ser considerado
        let mut seq = tokenize("Smith studies Smith", TokenizerMode::Plain).unwrap();
        let blob = "<nnp>Smith</nnp> <xx>x</xx> <vbz>studies</vbz> <nnp>Smith</nnp>";
        let result = align_pos(&mut seq, blob).unwrap();
        assert_eq!(result.untagged, 0);
        let pos: Vec<&str> = seq.iter().map(|t| t.pos.as_deref().unwrap()).collect();
        assert_eq!(pos, ["nnp", "vbz", "nnp"]);
    }

    #[test]
    fn test_punctuation_token_uses_raw_surface() {
        // "--" tem canônica EMPTY; o casamento usa o texto cru
        let mut seq = tokenize("Smith -- studies", TokenizerMode::Plain).unwrap();
        let blob = "<nnp>Smith</nnp> <sym>--</sym> <vbz>studies</vbz>";
        let result = align_pos(&mut seq, blob).unwrap();
        assert_eq!(result.untagged, 0);
        assert_eq!(seq.get(1).unwrap().pos.as_deref(), Some("sym"));
    }
}
