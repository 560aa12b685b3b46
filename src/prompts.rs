//! Centralized prompt definitions for the inference service
//!
//! Prompts are kept short: the default model is a sub-billion-parameter model and
//! answers best with a compact context and direct instructions.

/// Tiny prompt used to verify that the configured model produces text.
pub const PROBE_PROMPT: &str = "Diga apenas 'OK'";

/// Instructions appended after the question in every grounded prompt.
pub const ANSWER_INSTRUCTIONS: &str =
    "Instruções: Responda de forma CURTA, DIRETA e PRÁTICA. Use apenas os dados fornecidos.";

/// Question used by the customer analysis.
pub const CUSTOMER_ANALYSIS_QUESTION: &str =
    "Analise este cliente e dê insights úteis de forma curta.";

/// Question used by the order analysis.
pub const ORDER_ANALYSIS_QUESTION: &str = "Analise estes pedidos de forma curta com insights.";

/// Question used by the product suggestion.
pub const PRODUCT_SUGGESTION_QUESTION: &str =
    "Sugira produtos para este cliente de forma prática.";

/// Build the full generation prompt from the rendered context and the question.
pub fn build_answer_prompt(context: &str, question: &str) -> String {
    format!(
        "Dados do sistema:\n{}\n\nPergunta: {}\n\n{}",
        context,
        question.trim(),
        ANSWER_INSTRUCTIONS
    )
}
