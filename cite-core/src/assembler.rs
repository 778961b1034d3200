//! # Montagem do registro rotulado
//!
//! Depois da inferência, cada token carrega um rótulo. A montagem percorre
//! os tokens na ordem original, agrupa os textos crus por rótulo (unidos
//! por espaço simples, preservando a ordem relativa) e aplica a
//! normalização final de campos. Por último entra a chave reservada
//! [`RAW_STRING`] com a citação original intocada.
//!
//! Junto do registro sai a probabilidade agregada de cada rótulo: o
//! produto das confianças de todas as posições que o receberam. A
//! agregação acontece aqui, no núcleo, independente do motor de modelo.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::AdapterError;
use crate::model::ModelAdapter;
use crate::normalize::normalize_fields;
use crate::tokenizer::TokenSequence;

/// Chave reservada do registro: a citação de entrada, sem normalização.
pub const RAW_STRING: &str = "raw_string";

/// Registro final: rótulo → texto do campo.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LabeledRecord {
    pub fields: BTreeMap<String, String>,
}

impl LabeledRecord {
    pub fn get(&self, label: &str) -> Option<&str> {
        self.fields.get(label).map(String::as_str)
    }

    /// A citação original, presente em todo registro montado.
    pub fn raw_string(&self) -> &str {
        self.get(RAW_STRING).unwrap_or("")
    }
}

/// Registro montado mais as probabilidades agregadas por rótulo.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assembly {
    pub record: LabeledRecord,
    pub probabilities: BTreeMap<String, f64>,
}

/// Agrupa os tokens rotulados num registro de campos.
///
/// O adaptador já deve ter passado por `run`; uma posição sem rótulo é
/// defeito do motor e vira [`AdapterError::MissingLabel`].
pub fn assemble(
    raw_input: &str,
    sequence: &TokenSequence,
    adapter: &dyn ModelAdapter,
) -> Result<Assembly, AdapterError> {
    let mut grouped: BTreeMap<String, Vec<&str>> = BTreeMap::new();

    for (i, token) in sequence.iter().enumerate() {
        let label = adapter
            .label_at(i)
            .ok_or(AdapterError::MissingLabel { index: i })?;
        grouped.entry(label.to_string()).or_default().push(&token.raw);
    }

    let mut fields: BTreeMap<String, String> = grouped
        .iter()
        .map(|(label, parts)| (label.clone(), parts.join(" ")))
        .collect();
    normalize_fields(&mut fields);

    let probabilities: BTreeMap<String, f64> = grouped
        .keys()
        .map(|label| (label.clone(), adapter.tag_probability(label)))
        .collect();

    // raw_string entra por último, fora da normalização
    fields.insert(RAW_STRING.to_string(), raw_input.to_string());

    Ok(Assembly {
        record: LabeledRecord { fields },
        probabilities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureVector;
    use crate::model::ScriptedModel;
    use crate::tokenizer::{tokenize, TokenizerMode};

    fn run_scripted(text: &str, script: Vec<&str>, confidence: f64) -> Assembly {
        let sequence = tokenize(text, TokenizerMode::Plain).unwrap();
        let mut model = ScriptedModel::new(script, confidence);
        model.reset();
        for token in sequence.iter() {
            let vector = FeatureVector {
                columns: vec![token.raw.clone()],
            };
            model.add_vector(&vector).unwrap();
        }
        model.run().unwrap();
        assemble(text, &sequence, &model).unwrap()
    }

    #[test]
    fn test_alternating_labels_group_in_order() {
        // Posições pares viram author, ímpares viram title
        let text = "Smith, J. (2001). A Study of Things.";
        let assembly = run_scripted(text, vec!["author", "title"], 0.9);

        assert_eq!(assembly.record.get("author"), Some("Smith, (2001). Study Things."));
        assert_eq!(assembly.record.get("title"), Some("J. A of"));
        assert_eq!(assembly.record.raw_string(), text);
    }

    #[test]
    fn test_probability_is_product_of_positions() {
        let assembly = run_scripted("a b c", vec!["author", "title"], 0.5);
        // author nas posições 0 e 2, title na 1
        assert!((assembly.probabilities["author"] - 0.25).abs() < 1e-12);
        assert!((assembly.probabilities["title"] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_fields_are_normalized_but_raw_string_is_not() {
        let text = "Smith,  J. ,";
        let assembly = run_scripted(text, vec!["author"], 1.0);
        // Espaços colapsados e vírgula pendurada aparada no campo
        assert_eq!(assembly.record.get("author"), Some("Smith, J."));
        // raw_string intocada
        assert_eq!(assembly.record.raw_string(), text);
    }

    #[test]
    fn test_missing_label_is_engine_defect() {
        let sequence = tokenize("a b", TokenizerMode::Plain).unwrap();
        // O modelo nunca recebeu vetores nem rodou: não há rótulos
        let model = ScriptedModel::new(vec!["author"], 1.0);
        let err = assemble("a b", &sequence, &model).unwrap_err();
        assert!(matches!(err, AdapterError::MissingLabel { index: 0 }));
    }
}
