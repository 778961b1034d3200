//! # Tokenizador de citações bibliográficas
//!
//! Divide a string de uma referência em tokens, em dois modos:
//!
//! - **Plain**: texto puro. A entrada passa uma única vez pela limpeza de
//!   [`clean_input`](crate::normalize::clean_input) e é dividida em blocos de
//!   espaço em branco. Nenhum token resultante é vazio.
//! - **Structural**: a entrada é um fragmento de marcação (HTML/XML leve).
//!   Cada trecho de texto não-branco vira um *nó* numa tabela própria da
//!   sequência, e cada token guarda o índice do seu nó de origem, sua posição
//!   dentro do nó e quantos tokens o nó produziu. Isso permite features do
//!   tipo "este é o único token do elemento `<i>`".
//!
//! O token nunca guarda referência emprestada ao documento: o vínculo com a
//! estrutura é um índice para a tabela de nós que a própria [`TokenSequence`]
//! possui, evitando acoplamento de lifetimes com o parser de marcação.
//!
//! ## Exemplo
//!
//! ```rust
//! use cite_core::tokenizer::{tokenize, TokenizerMode};
//!
//! let seq = tokenize("Smith, J. (2001).", TokenizerMode::Plain).unwrap();
//! assert_eq!(seq.len(), 3);
//! assert_eq!(seq.get(0).unwrap().raw, "Smith,");
//! ```

use std::sync::OnceLock;

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use crate::error::AlignError;
use crate::normalize::{clean_input, lower_canonical, strip_punct, EMPTY_WORD};

/// Nome de nó usado para texto fora de qualquer elemento.
pub const TEXT_NODE: &str = "#text";

/// Um token da citação.
///
/// Além do texto cru, o token carrega duas formas derivadas calculadas sob
/// demanda e no máximo uma vez (funções puras de `raw`, cacheadas em
/// `OnceLock`), e dois campos mutáveis preenchidos no máximo uma vez cada:
/// o rótulo (pelo alinhador de treinamento) e a classe gramatical (pelo
/// alinhador de POS).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    /// Texto original do token, como veio da citação.
    pub raw: String,
    /// Índice do nó de origem na tabela da sequência (modo Structural).
    pub node: Option<usize>,
    /// Posição deste token dentro do nó de origem (0-based).
    pub index_in_node: Option<usize>,
    /// Quantos tokens o nó de origem produziu no total.
    pub node_token_count: Option<usize>,
    /// Rótulo bibliográfico atribuído (author, title, date...).
    pub label: Option<String>,
    /// Classe gramatical atribuída pelo alinhador de POS.
    pub pos: Option<String>,
    #[serde(skip)]
    canonical: OnceLock<String>,
    #[serde(skip)]
    lower: OnceLock<String>,
}

impl Token {
    /// Cria um token sem vínculo estrutural (modo Plain).
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            node: None,
            index_in_node: None,
            node_token_count: None,
            label: None,
            pos: None,
            canonical: OnceLock::new(),
            lower: OnceLock::new(),
        }
    }

    /// Cria um token vinculado a um nó da tabela estrutural.
    pub fn with_node(raw: impl Into<String>, node: usize, index: usize, count: usize) -> Self {
        let mut token = Self::new(raw);
        token.node = Some(node);
        token.index_in_node = Some(index);
        token.node_token_count = Some(count);
        token
    }

    /// Forma canônica: `raw` sem pontuação nas bordas, com o sentinela
    /// `"EMPTY"` quando nada sobra. Calculada uma única vez.
    pub fn canonical(&self) -> &str {
        self.canonical.get_or_init(|| strip_punct(&self.raw))
    }

    /// Forma canônica em minúsculas (sentinela preservado).
    pub fn lower(&self) -> &str {
        let canonical = self.canonical();
        self.lower.get_or_init(|| lower_canonical(canonical))
    }

    /// Superfície usada para casar com a saída do tagger de POS: a forma
    /// canônica, ou o texto cru quando a canônica é o sentinela.
    pub fn taggable_surface(&self) -> &str {
        let canonical = self.canonical();
        if canonical == EMPTY_WORD {
            &self.raw
        } else {
            canonical
        }
    }
}

// Igualdade ignora os caches derivados: dois tokens iguais em `raw` são
// iguais mesmo que só um já tenha calculado a forma canônica.
impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
            && self.node == other.node
            && self.index_in_node == other.index_in_node
            && self.node_token_count == other.node_token_count
            && self.label == other.label
            && self.pos == other.pos
    }
}

/// Um nó estrutural de onde tokens se originaram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkupNode {
    /// Nome do elemento envolvente, ou [`TEXT_NODE`] para texto solto.
    pub name: String,
    /// Texto decodificado (entidades resolvidas) do nó.
    pub text: String,
}

/// Sequência ordenada de tokens, dona da tabela de nós estruturais.
///
/// O comprimento é imutável após a tokenização; os campos mutáveis de cada
/// token (rótulo, POS) são preenchidos no máximo uma vez pelos alinhadores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenSequence {
    tokens: Vec<Token>,
    nodes: Vec<MarkupNode>,
}

impl TokenSequence {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.tokens.iter()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Acesso mutável restrito ao crate: só os alinhadores preenchem
    /// rótulos e classes gramaticais.
    pub(crate) fn tokens_mut(&mut self) -> &mut [Token] {
        &mut self.tokens
    }

    pub fn node(&self, index: usize) -> Option<&MarkupNode> {
        self.nodes.get(index)
    }

    pub fn nodes(&self) -> &[MarkupNode] {
        &self.nodes
    }

    /// Textos crus na ordem de leitura, unidos por espaço simples.
    /// É esta string que vai para o tagger de POS externo.
    pub fn joined_raw(&self) -> String {
        self.tokens
            .iter()
            .map(|t| t.raw.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Modos de tokenização disponíveis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerMode {
    /// Texto puro separado por espaços em branco.
    Plain,
    /// Fragmento de marcação; tokens guardam o nó de origem.
    Structural,
}

impl Default for TokenizerMode {
    fn default() -> Self {
        TokenizerMode::Plain
    }
}

/// Tokeniza uma citação no modo pedido.
///
/// Ambos os modos são determinísticos e nunca emitem token vazio. O modo
/// `Plain` não falha; o `Structural` falha com [`AlignError::BadMarkup`]
/// quando o fragmento é impossível de varrer.
pub fn tokenize(text: &str, mode: TokenizerMode) -> Result<TokenSequence, AlignError> {
    match mode {
        TokenizerMode::Plain => Ok(tokenize_plain(text)),
        TokenizerMode::Structural => tokenize_structural(text),
    }
}

fn tokenize_plain(text: &str) -> TokenSequence {
    let cleaned = clean_input(text);
    let tokens = cleaned.split_whitespace().map(Token::new).collect();
    TokenSequence {
        tokens,
        nodes: Vec::new(),
    }
}

fn tokenize_structural(text: &str) -> Result<TokenSequence, AlignError> {
    // Espaço após cada '>' garante que elementos adjacentes nunca se fundam
    // num token só, mesmo em marcação malformada. Os espaços extras somem na
    // divisão por espaço em branco.
    let prepared = text.replace('>', "> ");

    let mut reader = Reader::from_str(&prepared);
    // Tolerante a fechamentos trocados: citações vindas da web raramente
    // são XML bem-formado.
    reader.config_mut().check_end_names = false;

    let mut tokens = Vec::new();
    let mut nodes = Vec::new();
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
                    // Entidade quebrada ("A & B"): segue com o texto cru
                    Err(_) => String::from_utf8_lossy(&e).into_owned(),
                };
                if decoded.trim().is_empty() {
                    continue;
                }
                let name = stack
                    .last()
                    .cloned()
                    .unwrap_or_else(|| TEXT_NODE.to_string());
                let node_index = nodes.len();
                let pieces: Vec<&str> = decoded.split_whitespace().collect();
                let count = pieces.len();
                for (k, piece) in pieces.iter().enumerate() {
                    tokens.push(Token::with_node(*piece, node_index, k, count));
                }
                nodes.push(MarkupNode { name, text: decoded });
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(AlignError::BadMarkup {
                    reason: err.to_string(),
                    input: text.to_string(),
                })
            }
        }
    }

    Ok(TokenSequence { tokens, nodes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_basic() {
        let seq = tokenize("Smith, J. (2001). A Study of Things.", TokenizerMode::Plain).unwrap();
        let raws: Vec<&str> = seq.iter().map(|t| t.raw.as_str()).collect();
        assert_eq!(raws, ["Smith,", "J.", "(2001).", "A", "Study", "of", "Things."]);
        assert!(seq.iter().all(|t| t.node.is_none()));
    }

    #[test]
    fn test_plain_reconstructs_collapsed_input() {
        let input = "  Smith,   J.\t(2001).  ";
        let seq = tokenize(input, TokenizerMode::Plain).unwrap();
        let rejoined = seq.joined_raw();
        let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(rejoined, collapsed);
        assert!(seq.iter().all(|t| !t.raw.trim().is_empty()));
    }

    #[test]
    fn test_plain_blank_input() {
        let seq = tokenize("   \t  ", TokenizerMode::Plain).unwrap();
        assert!(seq.is_empty());
    }

    #[test]
    fn test_canonical_cached_forms() {
        let token = Token::new("(2001).");
        assert_eq!(token.canonical(), "2001");
        assert_eq!(token.lower(), "2001");

        let token = Token::new("Smith,");
        assert_eq!(token.lower(), "smith");

        // Só pontuação → sentinela, e a superfície taggável volta ao cru
        let token = Token::new("--");
        assert_eq!(token.canonical(), EMPTY_WORD);
        assert_eq!(token.taggable_surface(), "--");
    }

    #[test]
    fn test_structural_example() {
        let seq = tokenize("<i>Smith</i> J.", TokenizerMode::Structural).unwrap();
        assert_eq!(seq.len(), 2);

        let smith = seq.get(0).unwrap();
        assert_eq!(smith.raw, "Smith");
        assert_eq!(seq.node(smith.node.unwrap()).unwrap().name, "i");
        assert_eq!(smith.index_in_node, Some(0));
        assert_eq!(smith.node_token_count, Some(1));

        let j = seq.get(1).unwrap();
        assert_eq!(j.raw, "J.");
        assert_eq!(seq.node(j.node.unwrap()).unwrap().name, TEXT_NODE);
        assert_eq!(j.index_in_node, Some(0));
        assert_eq!(j.node_token_count, Some(1));
    }

    #[test]
    fn test_structural_node_invariants() {
        let seq = tokenize(
            "<title>A Study of Things</title><author>Smith</author>",
            TokenizerMode::Structural,
        )
        .unwrap();
        assert!(!seq.is_empty());
        for token in seq.iter() {
            let count = token.node_token_count.unwrap();
            let index = token.index_in_node.unwrap();
            assert!(index < count);
        }
        // Tokens de nós diferentes nunca compartilham o índice de nó
        let title_node = seq.get(0).unwrap().node;
        let author_node = seq.iter().last().unwrap().node;
        assert_ne!(title_node, author_node);
    }

    #[test]
    fn test_structural_adjacent_elements_never_fuse() {
        // Sem o espaço injetado após '>', "Smith" e "J." colariam
        let seq = tokenize("<a>Smith</a><b>J.</b>", TokenizerMode::Structural).unwrap();
        let raws: Vec<&str> = seq.iter().map(|t| t.raw.as_str()).collect();
        assert_eq!(raws, ["Smith", "J."]);
    }

    #[test]
    fn test_structural_decodes_entities() {
        let seq = tokenize("<title>Food &amp; Wine</title>", TokenizerMode::Structural).unwrap();
        let raws: Vec<&str> = seq.iter().map(|t| t.raw.as_str()).collect();
        assert_eq!(raws, ["Food", "&", "Wine"]);
    }

    #[test]
    fn test_structural_nested_elements() {
        let seq =
            tokenize("<title><i>Dune</i> revisited</title>", TokenizerMode::Structural).unwrap();
        let raws: Vec<&str> = seq.iter().map(|t| t.raw.as_str()).collect();
        assert_eq!(raws, ["Dune", "revisited"]);
        assert_eq!(seq.node(seq.get(0).unwrap().node.unwrap()).unwrap().name, "i");
        assert_eq!(
            seq.node(seq.get(1).unwrap().node.unwrap()).unwrap().name,
            "title"
        );
    }
}
