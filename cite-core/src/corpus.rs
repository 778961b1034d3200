//! # Corpus de referências bibliográficas anotadas
//!
//! Referências anotadas manualmente no formato do alinhador de
//! treinamento: uma referência por linha, com os campos envolvidos em
//! marcadores (`<author>...</author>`) e texto solto sem rótulo entre
//! eles. Cobre os estilos de citação mais comuns:
//!
//! - Artigo de periódico (estilo APA)
//! - Livro e capítulo de livro
//! - Artigo em anais de conferência
//! - Relatório técnico
//! - Dissertação/tese
//!
//! O corpus serve para a demonstração web, para os testes de alinhamento
//! e como semente de dados de treinamento de um modelo real.

/// Uma referência anotada do corpus embutido.
pub struct AnnotatedReference {
    /// Estilo bibliográfico da referência.
    pub style: &'static str,
    /// A linha anotada, pronta para o alinhador de treinamento.
    pub annotated: &'static str,
}

/// Corpus embutido de referências anotadas.
pub fn annotated_corpus() -> Vec<AnnotatedReference> {
    vec![
        // ===== PERIÓDICOS (APA) =====
        AnnotatedReference {
            style: "periódico",
            annotated: "<author>Smith, J.</author> <date>(2001).</date> <title>A Study of Things.</title> <journal>Journal of Examples,</journal> <volume>12(3),</volume> <pages>45-67.</pages>",
        },
        AnnotatedReference {
            style: "periódico",
            annotated: "<author>Garcia, M., &amp; Chen, L.</author> <date>(2015).</date> <title>Parsing bibliographic references at scale.</title> <journal>Digital Library Quarterly,</journal> <volume>8(2),</volume> <pages>112-138.</pages>",
        },
        AnnotatedReference {
            style: "periódico",
            annotated: "<author>Oliveira, P. R.</author> <date>(2019).</date> <title>Sequence labeling for metadata extraction.</title> <journal>Information Processing Letters,</journal> <volume>141,</volume> <pages>23-31.</pages>",
        },
        // ===== LIVROS =====
        AnnotatedReference {
            style: "livro",
            annotated: "<author>Johnson, K.</author> <date>(1998).</date> <title>Foundations of Document Analysis.</title> <location>Cambridge:</location> <publisher>University Press.</publisher>",
        },
        AnnotatedReference {
            style: "livro",
            annotated: "<author>Almeida, R., &amp; Costa, T.</author> <date>(2007).</date> <title>Recuperação de Informação na Prática.</title> <location>São Paulo:</location> <publisher>Editora Técnica.</publisher>",
        },
        // ===== CAPÍTULOS =====
        AnnotatedReference {
            style: "capítulo",
            annotated: "<author>Lee, S.</author> <date>(2003).</date> <title>Reference segmentation.</title> In <editor>D. Brown</editor> (Ed.), <booktitle>Handbook of Text Mining</booktitle> <pages>(pp. 201-224).</pages> <publisher>Academic Press.</publisher>",
        },
        // ===== CONFERÊNCIAS =====
        AnnotatedReference {
            style: "conferência",
            annotated: "<author>Nakamura, H., Silva, A., &amp; Patel, D.</author> <date>(2010).</date> <title>Robust citation field labeling.</title> In <booktitle>Proceedings of the 14th Conference on Digital Libraries</booktitle> <pages>(pp. 87-95).</pages> <location>Lisbon, Portugal.</location>",
        },
        AnnotatedReference {
            style: "conferência",
            annotated: "<author>Wright, E.</author> <date>(2022).</date> <title>Neural and feature-based parsers compared.</title> In <booktitle>Proc. of the Workshop on Scholarly Document Processing</booktitle> <pages>(pp. 12-20).</pages>",
        },
        // ===== RELATÓRIOS TÉCNICOS =====
        AnnotatedReference {
            style: "relatório",
            annotated: "<author>Fernandes, B.</author> <date>(2012).</date> <title>Evaluating tokenization strategies for citations</title> <tech>(Technical Report TR-2012-04).</tech> <institution>Instituto de Computação, Universidade Estadual.</institution>",
        },
        // ===== TESES =====
        AnnotatedReference {
            style: "tese",
            annotated: "<author>Moreau, C.</author> <date>(2016).</date> <title>Structured extraction from reference strings</title> <note>(Doctoral dissertation).</note> <institution>Université de Lyon,</institution> <location>Lyon, France.</location>",
        },
    ]
}

/// O corpus como um único bloco de texto (uma referência por linha),
/// pronto para [`align_corpus`](crate::training::align_corpus) ou
/// [`write_training_data`](crate::pipeline::CitationPipeline::write_training_data).
pub fn training_corpus() -> String {
    annotated_corpus()
        .iter()
        .map(|r| r.annotated)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Citações cruas de demonstração para a interface web.
pub fn demo_citations() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "Periódico (APA)",
            "Smith, J. (2001). A Study of Things. Journal of Examples, 12(3), 45-67.",
        ),
        (
            "Livro",
            "Johnson, K. (1998). Foundations of Document Analysis. Cambridge: University Press.",
        ),
        (
            "Conferência",
            "Nakamura, H., Silva, A., & Patel, D. (2010). Robust citation field labeling. In Proceedings of the 14th Conference on Digital Libraries (pp. 87-95). Lisbon, Portugal.",
        ),
        (
            "Capítulo de livro",
            "Lee, S. (2003). Reference segmentation. In D. Brown (Ed.), Handbook of Text Mining (pp. 201-224). Academic Press.",
        ),
        (
            "Relatório técnico",
            "Fernandes, B. (2012). Evaluating tokenization strategies for citations (Technical Report TR-2012-04). Instituto de Computação, Universidade Estadual.",
        ),
        (
            "Com marcação estrutural",
            "<i>Garcia, M., & Chen, L.</i> (2015). Parsing bibliographic references at scale. <b>Digital Library Quarterly</b>, 8(2), 112-138.",
        ),
    ]
}
