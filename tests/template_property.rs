//! Property tests for the template subsystem.

use proptest::prelude::*;
use serde_json::{Map, Value, json};

use pflow::template::{extract_variables, is_unresolved, resolve};

fn ident() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,8}"
}

/// Filler that can never open a template token.
fn filler() -> impl Strategy<Value = String> {
    "[ a-zA-Z0-9.,:;!-]{0,12}".prop_map(|s| s.replace("${", ""))
}

proptest! {
    /// Text without `${` is never templated and passes through untouched.
    #[test]
    fn plain_text_resolves_to_itself(text in filler()) {
        prop_assume!(!text.contains("${"));
        prop_assert!(extract_variables(&text).is_empty());
        let (resolved, complete) = resolve(&json!(text), &Map::new());
        prop_assert_eq!(resolved, json!(text));
        prop_assert!(complete);
    }

    /// Every distinct variable written into a template is extracted.
    #[test]
    fn extraction_finds_every_variable(
        vars in proptest::collection::btree_set(ident(), 1..5),
        gaps in filler(),
    ) {
        let template: String = vars
            .iter()
            .map(|v| format!("{gaps}${{{v}}}"))
            .collect();
        let extracted = extract_variables(&template);
        prop_assert_eq!(extracted.len(), vars.len());
        for var in &vars {
            prop_assert!(extracted.contains(var));
        }
    }

    /// The partial-resolution invariant: with string original and resolved,
    /// unresolved holds exactly when some variable of the original survives
    /// into the resolved form.
    #[test]
    fn unresolved_iff_variables_survive(
        vars in proptest::collection::btree_set(ident(), 1..5),
        resolved_count in 0usize..5,
    ) {
        let vars: Vec<String> = vars.into_iter().collect();
        let template: String = vars
            .iter()
            .map(|v| format!("part ${{{v}}} "))
            .collect();

        // Resolve only a prefix of the variables.
        let mut context = Map::new();
        for var in vars.iter().take(resolved_count) {
            context.insert(var.clone(), json!("plain value"));
        }

        let original = Value::String(template.clone());
        let (resolved, complete) = resolve(&original, &context);

        let survivors: Vec<String> = extract_variables(resolved.as_str().unwrap())
            .into_iter()
            .filter(|v| vars.contains(v))
            .collect();

        prop_assert_eq!(is_unresolved(&original, &resolved), !survivors.is_empty());
        prop_assert_eq!(complete, survivors.is_empty());
        // Fully covered contexts leave nothing behind.
        if resolved_count >= vars.len() {
            prop_assert!(complete);
        }
    }

    /// Simple templates preserve the looked-up value exactly.
    #[test]
    fn simple_templates_are_type_preserving(
        head in ident(),
        number in any::<i64>(),
    ) {
        let mut context = Map::new();
        context.insert(head.clone(), json!({"n": number}));
        let template = json!(format!("${{{head}.n}}"));
        let (resolved, complete) = resolve(&template, &context);
        prop_assert!(complete);
        prop_assert_eq!(resolved, json!(number));
    }

    /// Resolution is idempotent once complete: re-resolving the output
    /// against the same context changes nothing (no re-processing of data).
    #[test]
    fn complete_resolution_is_stable(
        head in ident(),
        text in filler(),
    ) {
        let mut context = Map::new();
        context.insert(head.clone(), json!({"out": text}));
        let template = json!(format!("v: ${{{head}.out}}"));
        let (first, complete) = resolve(&template, &context);
        prop_assume!(complete);
        let (second, again) = resolve(&first, &context);
        prop_assert!(again);
        prop_assert_eq!(first, second);
    }
}
