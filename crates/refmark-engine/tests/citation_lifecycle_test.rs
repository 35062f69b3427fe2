//! End-to-end behaviour of citation groups in a document: insertion,
//! structural rewrites, reloading from markers and footnote ordering.

use pretty_assertions::assert_eq;
use refmark_config::{Config, PayloadModel};
use refmark_engine::overlap::OverlapKind;
use refmark_engine::sync::resync;
use refmark_engine::transform::{merge_adjacent, separate_all};
use refmark_engine::{
    Action, ActionOutcome, BibEntry, ContainerId, DocumentBackend, Frontend, InMemoryDatabase,
    NumericStyle, Placeholders, RopeDocument, Session, SyncOptions, TextRange, VariantTag,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn body(start: usize, end: usize) -> TextRange {
    TextRange::new(ContainerId::Body, start, end)
}

fn database() -> InMemoryDatabase {
    InMemoryDatabase::new("library")
        .with_entry(
            BibEntry::new("knuth1984")
                .with_field("author", "Knuth, Donald")
                .with_field("year", "1984")
                .with_field("title", "Literate Programming"),
        )
        .with_entry(
            BibEntry::new("lamport1986")
                .with_field("author", "Leslie Lamport")
                .with_field("year", "1986"),
        )
        .with_entry(
            BibEntry::new("wirth1976")
                .with_field("author", "Wirth, Niklaus")
                .with_field("year", "1976"),
        )
}

fn options() -> SyncOptions {
    SyncOptions {
        placeholders: Placeholders::visible(),
        rebuild_bibliography: false,
        ..SyncOptions::default()
    }
}

fn session(doc: &RopeDocument, options: SyncOptions) -> Session<RopeDocument> {
    Session::open(
        doc.clone(),
        options,
        Box::new(NumericStyle),
        vec![Box::new(database())],
    )
    .unwrap()
}

#[test]
fn test_separate_then_merge_restores_the_group() {
    init_logging();

    // Given one group of three citations with page info on two of them
    let doc = RopeDocument::from_text("See [x].");
    doc.create_marker("RM_cite_1_knuth1984,lamport1986,wirth1976", body(4, 7))
        .unwrap();
    doc.set_side_channel(
        "RM_cite_1_knuth1984,lamport1986,wirth1976",
        r#"["p. 3",null,"ch. 2"]"#,
    )
    .unwrap();
    let mut frontend =
        Frontend::load(doc.clone(), PayloadModel::Citation, Placeholders::visible()).unwrap();

    // When separating and merging again
    let separated = separate_all(&mut frontend).unwrap();
    assert_eq!(separated.created.len(), 3);
    assert_eq!(doc.body_text(), "See <> <> <>.");
    let merged = merge_adjacent(&mut frontend).unwrap();

    // Then the same group stands where it was
    assert_eq!(
        merged.created[0].as_str(),
        "RM_cite_1_knuth1984,lamport1986,wirth1976"
    );
    let group = frontend.groups().get(&merged.created[0]).unwrap();
    assert_eq!(
        group.page_infos(),
        vec![Some("p. 3".to_string()), None, Some("ch. 2".to_string())]
    );
    assert_eq!(doc.body_text(), "See <>.");
}

#[test]
fn test_merge_leaves_mixed_variants_alone() {
    let doc = RopeDocument::from_text("As [x] [y] shows");
    doc.create_marker("RM_cite_0_knuth1984", body(3, 6)).unwrap();
    doc.create_marker("RM_cite_1_lamport1986", body(7, 10)).unwrap();
    let mut frontend =
        Frontend::load(doc.clone(), PayloadModel::Citation, Placeholders::visible()).unwrap();

    let summary = merge_adjacent(&mut frontend).unwrap();

    assert_eq!(summary.runs, 0);
    assert_eq!(frontend.groups().len(), 2);
    assert_eq!(doc.body_text(), "As [x] [y] shows");
}

#[test]
fn test_markers_on_the_same_range_give_one_incident() {
    // Given three markers over exactly the same text
    let doc = RopeDocument::from_text("Cite [x] here");
    for name in [
        "RM_cite_1_knuth1984",
        "RM_cite_1_lamport1986",
        "RM_cite_1_wirth1976",
    ] {
        doc.create_marker(name, body(5, 8)).unwrap();
    }
    let frontend =
        Frontend::load(doc.clone(), PayloadModel::Citation, Placeholders::visible()).unwrap();

    // When checking for overlaps
    let report = frontend.check_range_overlaps(false, 0).unwrap();

    // Then they are reported together, once
    assert_eq!(report.len(), 1);
    assert_eq!(report.incidents[0].kind, OverlapKind::EqualRange);
    assert_eq!(report.incidents[0].ranges.len(), 3);
}

#[test]
fn test_inserted_citations_survive_reload() {
    init_logging();

    // Given two citations inserted through a session
    let doc = RopeDocument::from_text("Programs are essays. Time is relative.");
    let mut session = session(&doc, options());

    doc.set_cursor(Some(body(19, 19)));
    let first = session
        .run(Action::Insert {
            keys: vec!["knuth1984".to_string()],
            page_infos: vec![Some("p. 97".to_string())],
            variant: VariantTag::Parenthetical,
        })
        .unwrap();
    assert!(matches!(first, ActionOutcome::Inserted { .. }));

    let end = doc.body_text().len() - 1;
    doc.set_cursor(Some(body(end, end)));
    session
        .run(Action::Insert {
            keys: vec!["lamport1986".to_string(), "knuth1984".to_string()],
            page_infos: vec![],
            variant: VariantTag::Parenthetical,
        })
        .unwrap();
    assert_eq!(
        doc.body_text(),
        "Programs are essays[1, p. 97] . Time is relative[1, 2] ."
    );

    // When a fresh frontend reads the same document
    let reloaded =
        Frontend::load(doc.clone(), PayloadModel::Citation, Placeholders::visible()).unwrap();

    // Then it finds the same groups with the same page infos
    let original = session.frontend().groups();
    assert_eq!(reloaded.groups().len(), original.len());
    for group in original.iter() {
        let found = reloaded.groups().get(group.id()).unwrap();
        assert_eq!(found.keys(), group.keys());
        assert_eq!(found.page_infos(), group.page_infos());
        assert_eq!(found.variant(), group.variant());
    }
}

#[test]
fn test_footnote_citations_number_at_their_mark() {
    // Given a citation in a footnote anchored between two body citations
    let doc = RopeDocument::from_text("A [x] B. C [y].");
    doc.create_marker("RM_cite_1_knuth1984", body(2, 5)).unwrap();
    doc.create_marker("RM_cite_1_wirth1976", body(11, 14)).unwrap();
    let footnote = doc.add_footnote(7, "Note [z]").unwrap();
    doc.create_marker("RM_cite_1_lamport1986", TextRange::new(footnote, 5, 8))
        .unwrap();
    let db = database();

    // When numbering with footnotes mapped to their marks
    let mut frontend =
        Frontend::load(doc.clone(), PayloadModel::Citation, Placeholders::visible()).unwrap();
    resync(&mut frontend, &NumericStyle, &[&db], &options()).unwrap();

    // Then the footnote citation takes the number of its mark's position
    assert_eq!(doc.container_text(footnote).unwrap(), "Note [2]");
    assert!(doc.body_text().ends_with("C [3]."));

    // And without the mapping footnotes come after the body
    let unmapped = SyncOptions {
        map_footnotes_to_marks: false,
        ..options()
    };
    resync(&mut frontend, &NumericStyle, &[&db], &unmapped).unwrap();
    assert_eq!(doc.container_text(footnote).unwrap(), "Note [3]");
    assert!(doc.body_text().ends_with("C [2]."));
}

#[test]
fn test_session_follows_config_file() {
    // Given a config file asking for group-level page info
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "payload_model = \"group\"\nvisible_placeholders = true\nrebuild_bibliography = false\n",
    )
    .unwrap();
    let config = Config::load_from_path(&path).unwrap().unwrap();

    // When inserting a citation with page info on both keys
    let doc = RopeDocument::from_text("Text.");
    doc.set_cursor(Some(body(4, 4)));
    let mut session = session(&doc, SyncOptions::from(&config));
    session
        .run(Action::Insert {
            keys: vec!["knuth1984".to_string(), "wirth1976".to_string()],
            page_infos: vec![Some("p. 1".to_string()), Some("p. 2".to_string())],
            variant: VariantTag::Parenthetical,
        })
        .unwrap();

    // Then the infos are stored once for the group and shown on the last key
    let group = session.frontend().groups().iter().next().unwrap();
    assert_eq!(
        group.page_infos(),
        vec![None, Some("p. 1; p. 2".to_string())]
    );
    assert_eq!(doc.body_text(), "Text[1, 2, p. 1; p. 2] .");
}

#[test]
fn test_closed_document_fails_gracefully() {
    let doc = RopeDocument::from_text("A [x].");
    doc.create_marker("RM_cite_1_knuth1984", body(2, 5)).unwrap();
    let mut session = session(&doc, options());
    doc.close();

    let outcome = session.run(Action::Merge).unwrap();

    assert!(matches!(outcome, ActionOutcome::Failed { .. }));
    doc.reopen();
    assert_eq!(doc.body_text(), "A [x].");
    assert_eq!(session.frontend().groups().len(), 1);
}
