use crate::document::ScoredChunk;

/// Build the question-answering prompt from retrieved context.
///
/// Chunks appear in the order given, separated by blank lines.
pub fn build_prompt(question: &str, context: &[ScoredChunk]) -> String {
    let context = context
        .iter()
        .map(|c| c.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Based on the following context, please answer the question. \
         If the answer isn't in the context, say so.\n\n\
         Context:\n{}\n\n\
         Question: {}\n\n\
         Answer:",
        context, question
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Chunk;

    #[test]
    fn test_prompt_layout() {
        let context = vec![
            ScoredChunk::new(Chunk::new("docs", "ml.txt", 0, "ML has three types."), 0.9),
            ScoredChunk::new(Chunk::new("docs", "aws.md", 1, "Lambda is serverless."), 0.5),
        ];
        let prompt = build_prompt("What is ML?", &context);
        assert_eq!(
            prompt,
            "Based on the following context, please answer the question. If the answer isn't in the context, say so.\n\n\
             Context:\nML has three types.\n\nLambda is serverless.\n\n\
             Question: What is ML?\n\nAnswer:"
        );
    }

    #[test]
    fn test_prompt_without_context() {
        let prompt = build_prompt("Hello?", &[]);
        assert!(prompt.contains("Context:\n\n\nQuestion: Hello?"));
    }
}
