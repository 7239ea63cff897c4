//! Pre-fusion query enhancement: spelling correction, rewriting, expansion.

use crate::error::{Result, SearchError};
use crate::llm::Generator;
use crate::models::EnhanceMode;

/// Ask the generator for a replacement query. The returned string is the
/// generator's answer with whitespace and surrounding quotes stripped.
pub async fn enhance_query(
    generator: &dyn Generator,
    mode: EnhanceMode,
    query: &str,
) -> Result<String> {
    let prompt = match mode {
        EnhanceMode::Spell => spell_prompt(query),
        EnhanceMode::Rewrite => rewrite_prompt(query),
        EnhanceMode::Expand => expand_prompt(query),
    };

    let response = generator.complete(&prompt).await?;
    let enhanced = clean_response(&response);
    if enhanced.is_empty() {
        return Err(SearchError::InvalidResponse(format!(
            "empty {mode:?} enhancement for '{query}'"
        )));
    }

    if enhanced != query {
        tracing::info!("Enhanced query ({mode:?}): '{query}' -> '{enhanced}'");
    }
    Ok(enhanced.to_string())
}

fn clean_response(response: &str) -> &str {
    response.trim().trim_matches(|c| c == '"' || c == '\'').trim()
}

fn spell_prompt(query: &str) -> String {
    format!(
        "Fix any spelling errors in this movie search query.\n\n\
         Only correct obvious typos. Don't change correctly spelled words.\n\n\
         Query: \"{query}\"\n\n\
         If no errors, return the original query.\n\
         Corrected:"
    )
}

fn rewrite_prompt(query: &str) -> String {
    format!(
        "Rewrite this movie search query to be more specific and searchable.\n\n\
         Original: \"{query}\"\n\n\
         Consider:\n\
         - Common movie knowledge (famous actors, popular films)\n\
         - Genre conventions (horror = scary, animation = cartoon)\n\
         - Keep it concise (under 10 words)\n\
         - It should be a search-engine style query that's very specific\n\
         - Don't use boolean logic\n\n\
         Examples:\n\n\
         - \"that bear movie where leo gets attacked\" -> \"The Revenant Leonardo DiCaprio bear attack\"\n\
         - \"movie about bear in london with marmalade\" -> \"Paddington London marmalade\"\n\
         - \"scary movie with bear from few years ago\" -> \"bear horror movie 2015-2020\"\n\n\
         Rewritten query:"
    )
}

fn expand_prompt(query: &str) -> String {
    format!(
        "Expand this movie search query with related terms.\n\n\
         Add synonyms and related concepts that might appear in movie descriptions.\n\
         Keep expansions relevant and focused.\n\
         This will be appended to the original query.\n\n\
         Examples:\n\n\
         - \"scary bear movie\" -> \"scary horror grizzly bear movie terrifying film\"\n\
         - \"action movie with bear\" -> \"action thriller bear chase fight adventure\"\n\
         - \"comedy with bear\" -> \"comedy funny bear humor lighthearted\"\n\n\
         Query: \"{query}\"\n"
    )
}
