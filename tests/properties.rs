//! Property tests for duplicate resolution and mini-TOC matching

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use dita_tidy::dedup::resolve;
use dita_tidy::documents::{parse_tree, Document};
use dita_tidy::identifiers::IdentifierIndex;
use dita_tidy::limits::Limits;
use dita_tidy::loaders::{Loader, Source};
use dita_tidy::rewrite::Rewriter;
use dita_tidy::toc::{analyze, BodyAnalysis};
use proptest::prelude::*;

fn id_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("intro".to_string()),
        Just("setup".to_string()),
        Just("a".to_string()),
        Just("ttu_intro_1".to_string()),
        "[a-c]{1,2}",
    ]
}

/// (root id, nested ids) per file
fn corpus_strategy() -> impl Strategy<Value = Vec<(String, Vec<String>)>> {
    proptest::collection::vec(
        (id_strategy(), proptest::collection::vec(id_strategy(), 0..5)),
        1..6,
    )
}

fn render(root: &str, nested: &[String]) -> String {
    let body: String = nested
        .iter()
        .map(|id| format!("<p id=\"{}\">x</p>", id))
        .collect();
    format!("<topic id=\"{}\"><title>T</title><body>{}</body></topic>", root, body)
}

fn documents(files: &[(String, Vec<String>)]) -> Vec<Document> {
    files
        .iter()
        .enumerate()
        .map(|(i, (root, nested))| {
            Document::from_string(format!("/d/f{}.xml", i), &render(root, nested)).unwrap()
        })
        .collect()
}

fn index_of(documents: &[Document]) -> IdentifierIndex {
    let mut index = IdentifierIndex::new();
    for document in documents {
        index.add_document(document);
    }
    index
}

/// Apply the plan of `documents` in memory and re-scan the results
fn deduplicate(documents: &[Document]) -> (usize, Vec<Document>) {
    let plan = resolve(&index_of(documents));
    let loader = Loader::new();
    let rewriter = Rewriter::new(&plan, &loader);
    let rewritten = documents
        .iter()
        .map(|document| {
            let rewrite = rewriter.rewrite_source(&document.path, &document.source).unwrap();
            Document::parse(&document.path, Source::from_bytes(rewrite.output)).unwrap()
        })
        .collect();
    (plan.duplicates_fixed(), rewritten)
}

proptest! {
    #[test]
    fn identifiers_are_unique_after_resolution(files in corpus_strategy()) {
        let (_, rewritten) = deduplicate(&documents(&files));

        let mut top_level = HashSet::new();
        for document in &rewritten {
            let top = document.top_id.clone().unwrap();
            prop_assert!(top_level.insert(top.clone()), "top-level id {} repeated", top);

            let mut nested = HashSet::new();
            for occurrence in document.nested_ids() {
                prop_assert_ne!(&occurrence.id, &top);
                prop_assert!(nested.insert(occurrence.id.clone()));
            }
        }
    }

    #[test]
    fn second_resolution_finds_nothing(files in corpus_strategy()) {
        let (_, rewritten) = deduplicate(&documents(&files));
        let (fixed, _) = deduplicate(&rewritten);
        prop_assert_eq!(fixed, 0);
    }

    #[test]
    fn generated_ids_are_new(files in corpus_strategy()) {
        let documents = documents(&files);
        let index = index_of(&documents);
        let originals = index.all_ids();
        let plan = resolve(&index);

        let mut generated = HashSet::new();
        for rename in plan.renames() {
            prop_assert!(rename.replacement.starts_with("ttu_"));
            prop_assert!(!originals.contains(&rename.replacement));
            prop_assert!(generated.insert(rename.replacement.clone()));
        }
    }

    #[test]
    fn mini_toc_reports_only_absent_children(
        listed in proptest::collection::btree_set("[a-f]{1,6}", 2..6),
        extra in proptest::collection::btree_set("[g-k]{1,6}", 0..4),
    ) {
        let items: String = listed
            .iter()
            .map(|stem| format!("<li><xref href=\"{}.xml\"/></li>", stem))
            .collect();
        let xml = format!(
            "<topic id=\"p\"><title>P</title><body><p>This chapter contains the following topics:</p><ul>{}</ul></body></topic>",
            items
        );
        let tree = parse_tree(&xml).unwrap();
        let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));

        match analyze(&tree, Path::new(&base), &Limits::default()) {
            BodyAnalysis::MiniToc(toc) => {
                for stem in &listed {
                    prop_assert!(toc.covers(stem));
                }
                for stem in &extra {
                    prop_assert!(!toc.covers(stem));
                }
            }
            other => prop_assert!(false, "expected a mini-TOC, got {:?}", other),
        }
    }
}
