//! Prompts for the explain and summary calls.

/// System prompt for a single file's diff, sent as a JSON encoded
/// `FileDiffRecord`.
pub const FILE_INSTRUCTION: &str = "You are a senior software engineer.
You are given the diff of a single file as a patch in unified format. Write an explanation of this diff.
The explanation will later be used as part of a data set to describe changes that span several files, so include the information needed for that.

Write the explanation in 300 characters or fewer, following this format:

\"\"\"FORMAT
This file is for <purpose of the file>. It was changed in order to <purpose of the change>.

- LINE <changed line 1>: <explanation of change 1>
- LINE <changed line 2>: <explanation of change 2>
- <continue for as many changes as need explaining>
\"\"\"

### Conditions
- Only explain the places where the diff has changes.
- You do not need to explain every change.
- Do not include the original code in the explanation.
";

/// System prompt for a size-bounded chunk that may start or end anywhere in
/// the patch.
pub const CHUNK_INSTRUCTION: &str = "I want you to act as a senior software engineer and review the following diff.
A portion of the difference for a Pull Request is given.
You should write a brief summary on the diff to explain the changes.
This summary will be used as part of the data set to later create PR description.
Do not include the diff itself in the summary. Do not write explanations that does not follow the format below.
Do not include empty lines in your responses.
Use the following format for your responses:
{Filename of the diff. If you do not know, print UNKNOWN_FILE}: {Brief summary of changes, maximum of 200 characters}
";

/// Summary request built from per-file explanations.
pub fn file_summary(responses: &[String]) -> String {
  format!(
    "You are a senior software engineer.
Follow the instructions below, based on the explanations of the changes to each file that were generated by the OpenAI API.

### Input

\"\"\"
{}
\"\"\"

### Instructions

Based on these explanations, describe the overview of the changes included in this PR.

Write the description in 300 characters or fewer, following this format:

\"\"\"FORMAT
## Changes

In this PR, to <purpose of the PR>, we made the following change: <overview of the changes in the PR>.
This makes it possible to <benefit of the PR>.
\"\"\"

### Conditions
- Do not output the changes to individual files, only the intent of the PR as a whole.
",
    responses.join("\n")
  )
}

/// Summary request built from per-chunk explanations.
pub fn chunk_summary(responses: &[String]) -> String {
  format!(
    "I want you to act as a senior software engineer.
I want you to summarize the following changes.

### Input

\"\"\"
{}
\"\"\"

### Instructions

Write a Pull Request description for the changes above.
From the changes given, identify what the main goal of this PR is and emphasize that in your description.
The focus should be on summarizing the intent and primary objective, not the detailed changes.
Use the following format for your responses:

\"\"\"FORMAT
## Changes

{{summarize the main goal of this PR in one sentence, emphasizing what you most want to achieve, without listing all the specific changes.}}
\"\"\"
",
    responses.join("\n")
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_chunk_summary_embeds_responses_in_order() {
    let responses = vec!["a.rs: add a".to_string(), "b.rs: drop b".to_string()];
    let prompt = chunk_summary(&responses);

    assert!(prompt.contains("\"\"\"\na.rs: add a\nb.rs: drop b\n\"\"\""));
    assert!(prompt.contains("{summarize the main goal of this PR"));
  }

  #[test]
  fn test_file_summary_embeds_responses() {
    let prompt = file_summary(&["src/lib.rs:\nThis file is for tests.".to_string()]);
    assert!(prompt.contains("src/lib.rs:\nThis file is for tests."));
    assert!(prompt.contains("## Changes"));
  }

  #[test]
  fn test_chunk_instruction_names_fallback_file() {
    assert!(CHUNK_INSTRUCTION.contains("UNKNOWN_FILE"));
  }
}
