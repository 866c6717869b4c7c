//! Prompt text for the agent loop and the visualization classifier.

/// System prompt binding the agent to the current store's schema and to the
/// `SQL:` / `ANSWER:` reply protocol.
pub(crate) fn agent_system_prompt(schema: &str) -> String {
    format!(
        "You are a data analyst answering questions over a SQLite database.\n\
         \n\
         Database schema:\n\
         {schema}\n\
         \n\
         On every turn reply with exactly one of:\n\
         SQL: <one SELECT statement to run next>\n\
         ANSWER: <the final natural-language answer for the user>\n\
         \n\
         Rules:\n\
         - Only SELECT statements; never modify the data.\n\
         - Run a query before answering whenever the answer depends on the data.\n\
         - Keep the final answer concise and state the concrete values found."
    )
}

/// Observation message carrying a query result back to the model.
pub(crate) fn observation(result: &str) -> String {
    format!("Query result:\n{result}")
}

/// Observation message carrying a query failure back to the model so it can
/// correct itself.
pub(crate) fn query_error(error: &str) -> String {
    format!("The query failed: {error}\nFix the query or answer without it.")
}

/// The fixed chart-extraction prompt. The reply must be either a single JSON
/// object in the chart suggestion shape or the literal `null`.
pub(crate) fn chart_prompt(input_text: &str) -> String {
    format!(
        "Analyze the following text and determine if it contains data suitable for visualization.\n\
         If suitable, extract the data and suggest an appropriate chart type from:\n\
         \"Bar Chart\", \"Line Chart\", \"Pie Chart\", \"Scatter Plot\", \"Histogram\".\n\
         Generate only the JSON object in this structure, do not return any other text\n\
         explaining what was done and how it was done:\n\
         {{\n\
           \"chartType\": \"suggested chart type\",\n\
           \"labels\": [\"label1\", \"label2\", ...],\n\
           \"data\": [value1, value2, ...],\n\
           \"title\": \"suggested title for the chart\"\n\
         }}\n\
         \n\
         If the text is not suitable for visualization, return null.\n\
         \n\
         Text to analyze: {input_text}\n\
         \n\
         JSON Output:"
    )
}

/// Strip a surrounding markdown code fence, if any.
pub(crate) fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```sql")
        .or_else(|| trimmed.strip_prefix("```json"))
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed);
    trimmed.trim()
}
