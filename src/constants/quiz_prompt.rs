pub const QUIZ_GENERATION_PROMPT: &str = "You are a teacher. Your job is to take a document and create a multiple choice test of 4 questions based on the content of the document.

### Requirements:

1. **Question Count:** Produce exactly 4 questions.
2. **Options:** Each question has exactly 4 options of roughly equal length. Do not prefix options with letters.
3. **Answer:** Give the correct option as a single letter: A, B, C or D, matching the position of the option.
4. **Explanation:** Explain in one or two sentences why the correct option is correct, citing the document.
5. **Grounding:** Every correct answer must be directly supported by the document. Incorrect options must be plausible but clearly wrong to a reader of the document.
6. **Coverage:** Spread the questions across different sections of the document rather than one passage.

### Output:

Respond only with JSON of the form {\"questions\": [...]} matching the provided schema. Do not add commentary.";

pub const DOCUMENT_INSTRUCTION: &str = "Create a multiple choice test based on this document.";

/// Extra instruction listing questions already asked in the session.
pub fn exclusion_instruction(previous_questions: &[String]) -> Option<String> {
    if previous_questions.is_empty() {
        return None;
    }

    let listed = previous_questions
        .iter()
        .map(|q| format!("- {}", q))
        .collect::<Vec<_>>()
        .join("\n");

    Some(format!(
        "The following questions have already been asked. Write new questions that do not repeat them:\n{}",
        listed
    ))
}
