pub const SYSTEM_PROMPT: &str = "You are an expert at identifying potential bugs in code changes. Be concise and focus only on likely issues.";

const FOCUS_AREAS: &[&str] = &[
    "Logic errors",
    "Race conditions",
    "Memory leaks",
    "Security vulnerabilities",
    "API contract violations",
    "Edge cases",
    "Performance issues",
];

const CROSS_FILE_FOCUS: &str = "Cross-file interaction effects between the changed files";

/// One changed file ready to be reviewed. `diff` is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub path: String,
    pub diff: String,
}

impl FileDiff {
    pub fn new(path: impl Into<String>, diff: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            diff: diff.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPrompt {
    pub system_prompt: String,
    pub user_prompt: String,
}

#[derive(Debug, Clone, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Composes the review request for a whole batch. Section order follows
    /// the order of `diffs`.
    pub fn build(&self, diffs: &[FileDiff]) -> ComposedPrompt {
        let paths: Vec<&str> = diffs.iter().map(|d| d.path.as_str()).collect();
        let multi_file = diffs.len() > 1;

        let mut prompt = String::new();
        prompt.push_str(&format!(
            "You are an expert code reviewer specializing in finding bugs. Analyze the following changes in the {} {} to identify potential bugs, logic errors, edge cases, and performance issues.\n\n",
            if multi_file { "files" } else { "file" },
            paths.join(", ")
        ));

        for file in diffs {
            prompt.push_str(&format!("=== File: {} ===\n", file.path));
            prompt.push_str(file.diff.trim_end_matches('\n'));
            prompt.push_str("\n\n");
        }

        prompt.push_str("Focus on:\n");
        let mut focus: Vec<&str> = FOCUS_AREAS.to_vec();
        if multi_file {
            focus.push(CROSS_FILE_FOCUS);
        }
        for (i, area) in focus.iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", i + 1, area));
        }

        prompt.push_str("\nProvide a concise analysis listing only potential issues. If there are no issues, state that explicitly.");

        ComposedPrompt {
            system_prompt: SYSTEM_PROMPT.to_string(),
            user_prompt: prompt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker_count(prompt: &str) -> usize {
        prompt.lines().filter(|l| l.starts_with("=== File: ")).count()
    }

    #[test]
    fn single_file_prompt_has_marker_and_no_cross_file_focus() {
        let diff = "--- main:a.txt\n+++ feat:a.txt\n@@ -1 +1 @@\n-foo\n+bar\n";
        let prompt = PromptBuilder::new().build(&[FileDiff::new("a.txt", diff)]);

        assert_eq!(prompt.system_prompt, SYSTEM_PROMPT);
        assert!(prompt.user_prompt.contains("in the file a.txt to identify"));
        assert!(prompt.user_prompt.contains(&format!("=== File: a.txt ===\n{diff}")));
        assert!(prompt.user_prompt.contains("7. Performance issues"));
        assert!(!prompt.user_prompt.contains(CROSS_FILE_FOCUS));
        assert_eq!(marker_count(&prompt.user_prompt), 1);
    }

    #[test]
    fn multi_file_prompt_adds_cross_file_focus() {
        let prompt = PromptBuilder::new().build(&[
            FileDiff::new("a.rs", "-a\n+b\n"),
            FileDiff::new("b.rs", "-c\n+d\n"),
        ]);

        assert!(prompt.user_prompt.contains("in the files a.rs, b.rs to identify"));
        assert!(prompt.user_prompt.contains(&format!("8. {CROSS_FILE_FOCUS}")));
        assert_eq!(marker_count(&prompt.user_prompt), 2);
    }

    #[test]
    fn sections_follow_input_order() {
        let a = FileDiff::new("a.rs", "-a\n+b\n");
        let b = FileDiff::new("b.rs", "-c\n+d\n");
        let c = FileDiff::new("c.rs", "-e\n+f\n");
        let builder = PromptBuilder::new();

        let forward = builder.build(&[a.clone(), b.clone(), c.clone()]).user_prompt;
        let shuffled = builder.build(&[c, a, b]).user_prompt;

        let order = |prompt: &str| -> Vec<String> {
            prompt
                .lines()
                .filter_map(|l| l.strip_prefix("=== File: "))
                .map(|l| l.trim_end_matches(" ===").to_string())
                .collect()
        };
        assert_eq!(order(&forward), vec!["a.rs", "b.rs", "c.rs"]);
        assert_eq!(order(&shuffled), vec!["c.rs", "a.rs", "b.rs"]);
        assert!(shuffled.contains("files c.rs, a.rs, b.rs"));
    }

    #[test]
    fn build_is_deterministic() {
        let diffs = vec![FileDiff::new("x", "-1\n+2\n"), FileDiff::new("y", "-3\n+4\n")];
        let builder = PromptBuilder::new();
        assert_eq!(builder.build(&diffs), builder.build(&diffs));
    }
}
