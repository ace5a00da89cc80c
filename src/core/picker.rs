use anyhow::{Context, Result};
use dialoguer::theme::ColorfulTheme;
use dialoguer::MultiSelect;

use crate::config::ConfigError;

/// Drops candidates matching any exclude pattern, keeping order.
pub fn filter_candidates(files: Vec<String>, exclude: &[glob::Pattern]) -> Vec<String> {
    files
        .into_iter()
        .filter(|file| !exclude.iter().any(|pattern| pattern.matches(file)))
        .collect()
}

/// Shows a multi-select list of `candidates` and returns the chosen paths in
/// list order. Cancelling or confirming an empty selection is an error.
pub fn pick_files(candidates: &[String]) -> Result<Vec<String>> {
    if candidates.is_empty() {
        return Err(ConfigError::NoFilesSelected.into());
    }

    let selection = MultiSelect::with_theme(&ColorfulTheme::default())
        .with_prompt("Select files to analyze (Space to toggle, Enter to confirm)")
        .items(candidates)
        .max_length(20)
        .interact_opt()
        .context("Failed to run file selector")?;

    let chosen = selected_paths(candidates, selection.unwrap_or_default());
    if chosen.is_empty() {
        return Err(ConfigError::NoFilesSelected.into());
    }
    Ok(chosen)
}

fn selected_paths(candidates: &[String], mut indices: Vec<usize>) -> Vec<String> {
    indices.sort_unstable();
    indices.dedup();
    indices
        .into_iter()
        .filter_map(|i| candidates.get(i).cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn excluded_patterns_are_hidden() {
        let patterns = vec![
            glob::Pattern::new("*.lock").unwrap(),
            glob::Pattern::new("vendor/**").unwrap(),
        ];
        let kept = filter_candidates(
            names(&["Cargo.lock", "src/main.rs", "vendor/x/y.rs", "README.md"]),
            &patterns,
        );
        assert_eq!(kept, names(&["src/main.rs", "README.md"]));
    }

    #[test]
    fn selection_maps_indices_in_list_order() {
        let candidates = names(&["a", "b", "c"]);
        assert_eq!(selected_paths(&candidates, vec![2, 0, 2, 9]), names(&["a", "c"]));
    }

    #[test]
    fn nothing_to_pick_is_no_files_selected() {
        let err = pick_files(&[]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::NoFilesSelected)
        ));
    }
}
