//! Retrieval-augmented answer synthesis over search hits.

use crate::error::{Result, SearchError};
use crate::llm::Generator;
use crate::models::{AnswerMode, SearchHit};

const AUDIENCE: &str = "This should be tailored to Hoopla users. Hoopla is a movie streaming service.";

/// Generate an answer for `query` grounded in `hits`. Failures propagate.
pub async fn answer(
    generator: &dyn Generator,
    mode: AnswerMode,
    query: &str,
    hits: &[SearchHit],
) -> Result<String> {
    let context = format_context(hits);
    let prompt = match mode {
        AnswerMode::Rag => rag_prompt(query, &context),
        AnswerMode::Summarize => summarize_prompt(query, &context),
        AnswerMode::Citations => citations_prompt(query, &context),
        AnswerMode::Question => question_prompt(query, &context),
    };

    tracing::debug!("Generating {mode:?} answer from {} sources", hits.len());
    let text = generator.complete(&prompt).await?;
    let text = text.trim();
    if text.is_empty() {
        return Err(SearchError::InvalidResponse(
            "generator returned an empty answer".to_string(),
        ));
    }
    Ok(text.to_string())
}

/// One "Title: .. - Description: .." line per hit; citation numbers follow line order.
fn format_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, h)| format!("[{}] Title: {} - Description: {}", i + 1, h.title, h.description))
        .collect::<Vec<_>>()
        .join("\n")
}

fn rag_prompt(query: &str, context: &str) -> String {
    format!(
        "Answer the question or provide information based on the provided documents. {AUDIENCE}\n\n\
         Query: {query}\n\n\
         Documents:\n{context}\n\n\
         Provide a comprehensive answer that addresses the query:"
    )
}

fn summarize_prompt(query: &str, context: &str) -> String {
    format!(
        "Provide information useful to this query by synthesizing information from multiple search results in detail.\n\
         The goal is to provide comprehensive information so that users know what their options are.\n\
         Your response should be information-dense and concise, with several key pieces of \
         information about the genre, plot, etc. of each movie.\n\
         {AUDIENCE}\n\
         Query: {query}\n\
         Search Results:\n{context}\n\
         Provide a comprehensive 3-4 sentence answer that combines information from multiple sources:"
    )
}

fn citations_prompt(query: &str, context: &str) -> String {
    format!(
        "Answer the question or provide information based on the provided documents.\n\n\
         {AUDIENCE}\n\n\
         If not enough information is available to give a good answer, say so but give as good \
         of an answer as you can while citing the sources you have.\n\n\
         Query: {query}\n\n\
         Documents:\n{context}\n\n\
         Instructions:\n\
         - Provide a comprehensive answer that addresses the query\n\
         - Cite sources using [1], [2], etc. format when referencing information\n\
         - If sources disagree, mention the different viewpoints\n\
         - If the answer isn't in the documents, say \"I don't have enough information\"\n\
         - Be direct and informative\n\n\
         Answer:"
    )
}

fn question_prompt(question: &str, context: &str) -> String {
    format!(
        "Answer the user's question based on the provided movies that are available on Hoopla.\n\n\
         {AUDIENCE}\n\n\
         Question: {question}\n\n\
         Documents:\n{context}\n\n\
         Instructions:\n\
         - Answer questions directly and concisely\n\
         - Be casual and conversational\n\
         - Don't be cringe or hype-y\n\
         - Talk like a normal person would in a chat conversation\n\n\
         Answer:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::ScriptedGenerator;

    fn hits() -> Vec<SearchHit> {
        vec![SearchHit {
            id: 2,
            title: "Paddington".to_string(),
            description: "A bear in London.".to_string(),
            bm25_score: 1.0,
            semantic_score: 0.5,
            bm25_rank: Some(1),
            semantic_rank: Some(1),
            hybrid_score: 0.03,
            rerank_score: None,
            llm_relevance: None,
        }]
    }

    #[tokio::test]
    async fn test_answer_includes_sources_in_prompt() {
        let generator = ScriptedGenerator::new([Ok("  Watch Paddington.  ")]);
        let text = answer(&generator, AnswerMode::Citations, "bear films", &hits())
            .await
            .unwrap();
        assert_eq!(text, "Watch Paddington.");
        let prompt = &generator.prompts.lock()[0];
        assert!(prompt.contains("[1] Title: Paddington - Description: A bear in London."));
        assert!(prompt.contains("Cite sources"));
    }

    #[tokio::test]
    async fn test_answer_failure_is_fatal() {
        let generator = ScriptedGenerator::new([Err("offline")]);
        let err = answer(&generator, AnswerMode::Rag, "bear", &hits())
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::GenerationFailure(_)));
    }

    #[tokio::test]
    async fn test_question_mode_prompt() {
        let generator = ScriptedGenerator::new([Ok("Sure.")]);
        answer(&generator, AnswerMode::Question, "any bear films?", &hits())
            .await
            .unwrap();
        assert!(generator.prompts.lock()[0].starts_with("Answer the user's question"));
    }
}
