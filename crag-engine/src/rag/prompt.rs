use crag_vector::SearchHit;

pub const ANALYSIS_TEMPLATE: &str = "\
You are an expert analyst helping internal users understand customer complaints about financial services.

Based on the following customer complaint narratives, answer the user's question with clear, actionable insights.

User Question: {question}

Relevant Complaint Narratives:
{context}

Provide a concise, insightful answer that:
1. Directly addresses the user's question
2. Identifies common themes and patterns in the complaints
3. Highlights the main issues customers are facing
4. Uses specific examples from the narratives when relevant
5. Keeps the response under 300 words

Answer:";

pub const COMPARISON_TEMPLATE: &str = "\
You are an expert analyst comparing customer complaints across different financial products.

User Question: {question}

Product-specific Complaint Narratives:
{context}

Provide a comparative analysis that:
1. Highlights key differences in complaint patterns across products
2. Identifies product-specific issues
3. Notes any common themes across products
4. Uses specific examples from the narratives
5. Keeps the response under 300 words

Answer:";

/// Characters of each narrative shown to the model.
pub const CONTEXT_CHARS: usize = 500;

const NO_CONTEXT: &str = "No relevant complaints found.";

/// First `max` characters of `text`.
pub fn preview(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Numbered context block, one entry per retrieved chunk.
pub fn format_context(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return NO_CONTEXT.to_string();
    }
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            let m = &hit.metadata;
            format!(
                "\nComplaint {} (Product: {}, Issue: {}):\n{}...",
                i + 1,
                m.product_category,
                m.issue.as_deref().unwrap_or("Unknown"),
                preview(&m.text, CONTEXT_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Context for a comparison: one titled section per product.
pub fn format_sections(sections: &[(String, Vec<SearchHit>)]) -> String {
    sections
        .iter()
        .map(|(product, hits)| format!("\n=== {} Complaints ===\n{}", product, format_context(hits)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fill `{question}` and `{context}` in one pass over `template`, so text
/// inside either value is never treated as a placeholder.
pub fn render(template: &str, question: &str, context: &str) -> String {
    let mut out = String::with_capacity(template.len() + question.len() + context.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        if let Some(after) = tail.strip_prefix("{question}") {
            out.push_str(question);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{context}") {
            out.push_str(context);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}
