// Résumé feedback pipeline.
// Flow: upload → extract → prompts → llm_client, sequenced by handlers.
// All LLM calls go through llm_client — no direct OpenAI calls here.

pub mod extract;
pub mod handlers;
pub mod prompts;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_pdf;
