use itemnotes_core::{AssemblyItemId, ItemQualifier, NoteKind, NotePayload, NotesRegistry};
use uuid::Uuid;

fn item(path: &str) -> AssemblyItemId {
    AssemblyItemId::parse(path)
}

#[test]
fn comment_attached_to_item_is_found() {
    let mut registry = NotesRegistry::new();
    let c1 = registry.create_comment("alice", "t1", "hello").id;
    let item_a = item("0:1:1:1");

    let annotated = registry.add_note(c1, &item_a).expect("known note should attach");
    assert_eq!(annotated.reference.item, item_a);
    assert_eq!(annotated.reference.qualifier, ItemQualifier::None);

    assert!(registry.is_annotated_item(&item_a));
    assert_eq!(registry.get_notes(&item_a), vec![c1]);
    assert!(!registry.is_orphan(c1));
}

#[test]
fn qualified_items_are_distinct_and_delete_note_purges_them() {
    let mut registry = NotesRegistry::new();
    let c1 = registry.create_comment("alice", "t1", "hello").id;
    let item_a = item("0:1:1:1");

    registry.add_note(c1, &item_a).expect("known note should attach");
    registry.add_note_to_subshape(c1, &item_a, 3).expect("known note should attach");
    assert_eq!(registry.nb_annotated_items(), 2);
    assert_eq!(registry.get_subshape_notes(&item_a, 3), vec![c1]);
    assert!(registry.get_subshape_notes(&item_a, 4).is_empty());

    assert!(registry.delete_note(c1));
    assert_eq!(registry.nb_annotated_items(), 0);
    assert_eq!(registry.nb_notes(), 0);
    assert!(!registry.is_annotated_item(&item_a));
}

#[test]
fn attribute_qualifier_matches_on_guid() {
    let mut registry = NotesRegistry::new();
    let note = registry.create_comment("alice", "t1", "color").id;
    let item_a = item("0:1:1:1");
    let guid = Uuid::new_v4();

    let annotated = registry
        .add_note_to_attr(note, &item_a, guid)
        .expect("known note should attach");
    assert_eq!(annotated.reference.guid(), Some(guid));

    assert!(registry.find_annotated_item_attr(&item_a, guid).is_some());
    assert!(registry
        .find_annotated_item_attr(&item_a, Uuid::new_v4())
        .is_none());
    assert!(registry.find_annotated_item(&item_a).is_none());
    assert!(!registry.is_annotated_item(&item_a));
    assert_eq!(registry.get_attr_notes(&item_a, guid), vec![note]);
}

#[test]
fn add_note_is_idempotent() {
    let mut registry = NotesRegistry::new();
    let note = registry.create_comment("alice", "t1", "hello").id;
    let item_a = item("0:1:1:1");

    let first = registry.add_note(note, &item_a).expect("known note should attach").id;
    let second = registry.add_note(note, &item_a).expect("known note should attach").id;

    assert_eq!(first, second);
    assert_eq!(registry.nb_annotated_items(), 1);
    assert_eq!(registry.get_notes(&item_a), vec![note]);
    assert_eq!(registry.get_note_items(note), vec![first]);
    assert_eq!(registry.link_records().len(), 1);
}

#[test]
fn add_note_rejects_unknown_note() {
    let mut registry = NotesRegistry::new();
    assert!(registry.add_note(Uuid::new_v4(), &item("0:1")).is_none());
    assert_eq!(registry.nb_annotated_items(), 0);
}

#[test]
fn add_then_remove_restores_unannotated_state_and_keeps_payload() {
    let mut registry = NotesRegistry::new();
    let note = registry.create_comment("alice", "t1", "hello").id;
    let item_a = item("0:1:1:1");

    registry.add_note(note, &item_a).expect("known note should attach");
    assert!(registry.remove_note(note, &item_a, false));

    assert!(!registry.is_annotated_item(&item_a));
    assert_eq!(registry.nb_annotated_items(), 0);
    assert!(registry.is_orphan(note));
    assert_eq!(
        registry.note(note).expect("note should be kept").payload,
        NotePayload::Comment {
            text: "hello".to_string()
        }
    );
}

#[test]
fn remove_note_never_added_fails_without_mutation() {
    let mut registry = NotesRegistry::new();
    let linked = registry.create_comment("alice", "t1", "linked").id;
    let stranger = registry.create_comment("bob", "t2", "elsewhere").id;
    let item_a = item("0:1:1:1");
    let item_b = item("0:1:1:2");
    registry.add_note(linked, &item_a).expect("known note should attach");
    registry.add_note(stranger, &item_b).expect("known note should attach");

    assert!(!registry.remove_note(stranger, &item_a, true));
    assert!(!registry.remove_note(linked, &item("0:9"), true));
    assert!(!registry.remove_note(Uuid::new_v4(), &item_a, true));

    assert_eq!(registry.nb_notes(), 2);
    assert_eq!(registry.nb_annotated_items(), 2);
    assert_eq!(registry.get_notes(&item_a), vec![linked]);
    assert_eq!(registry.get_notes(&item_b), vec![stranger]);
}

#[test]
fn remove_note_keeps_item_while_other_notes_remain() {
    let mut registry = NotesRegistry::new();
    let n1 = registry.create_comment("alice", "t1", "one").id;
    let n2 = registry.create_comment("alice", "t2", "two").id;
    let item_a = item("0:1:1:1");
    registry.add_note(n1, &item_a).expect("known note should attach");
    registry.add_note(n2, &item_a).expect("known note should attach");

    assert!(registry.remove_note(n1, &item_a, true));

    assert!(registry.is_annotated_item(&item_a));
    assert_eq!(registry.get_notes(&item_a), vec![n2]);
    assert!(registry.note(n1).is_none());
}

#[test]
fn remove_subshape_and_attr_notes_target_only_their_qualifier() {
    let mut registry = NotesRegistry::new();
    let note = registry.create_comment("alice", "t1", "hello").id;
    let item_a = item("0:1:1:1");
    let guid = Uuid::new_v4();
    registry.add_note(note, &item_a).expect("known note should attach");
    registry.add_note_to_subshape(note, &item_a, 7).expect("known note should attach");
    registry.add_note_to_attr(note, &item_a, guid).expect("known note should attach");

    assert!(registry.remove_subshape_note(note, &item_a, 7, true));
    assert!(registry.find_annotated_item_subshape(&item_a, 7).is_none());
    assert!(registry.remove_attr_note(note, &item_a, guid, true));
    assert!(registry.find_annotated_item_attr(&item_a, guid).is_none());

    assert!(registry.is_annotated_item(&item_a));
    assert!(registry.is_note(note));
}

#[test]
fn remove_all_notes_cascades_only_to_new_orphans() {
    let mut registry = NotesRegistry::new();
    let n1 = registry.create_comment("alice", "t1", "only here").id;
    let n2 = registry.create_comment("bob", "t2", "also elsewhere").id;
    let item_k = item("0:1:1:1");
    let item_other = item("0:1:1:2");
    registry.add_note(n1, &item_k).expect("known note should attach");
    registry.add_note(n2, &item_k).expect("known note should attach");
    registry.add_note(n2, &item_other).expect("known note should attach");

    assert!(registry.remove_all_notes(&item_k, true));

    assert!(!registry.is_annotated_item(&item_k));
    assert!(!registry.is_note(n1));
    assert!(registry.is_note(n2));
    assert_eq!(registry.get_notes(&item_other), vec![n2]);
    assert_eq!(registry.nb_annotated_items(), 1);
}

#[test]
fn remove_all_notes_without_cascade_leaves_orphans() {
    let mut registry = NotesRegistry::new();
    let n1 = registry.create_comment("alice", "t1", "a").id;
    let n2 = registry.create_comment("alice", "t2", "b").id;
    let item_k = item("0:1:1:1");
    registry.add_note_to_subshape(n1, &item_k, 2).expect("known note should attach");
    registry.add_note_to_subshape(n2, &item_k, 2).expect("known note should attach");

    assert!(!registry.remove_all_subshape_notes(&item_k, 3, false));
    assert!(registry.remove_all_subshape_notes(&item_k, 2, false));

    assert_eq!(registry.nb_annotated_items(), 0);
    assert_eq!(registry.get_orphan_notes(), vec![n1, n2]);
}

#[test]
fn orphan_accounting_matches_reverse_lookup() {
    let mut registry = NotesRegistry::new();
    let n1 = registry.create_comment("alice", "t1", "a").id;
    let n2 = registry
        .create_bin_data("bob", "t2", "drawing", "image/png", vec![1, 2, 3])
        .id;
    let n3 = registry.create_comment("carol", "t3", "c").id;
    registry.add_note(n1, &item("0:1")).expect("known note should attach");
    registry.add_note_to_subshape(n2, &item("0:2"), 1).expect("known note should attach");

    let unreferenced = registry
        .note_ids()
        .into_iter()
        .filter(|id| registry.get_note_items(*id).is_empty())
        .count();
    assert_eq!(registry.nb_orphan_notes(), unreferenced);
    assert_eq!(registry.get_orphan_notes(), vec![n3]);

    assert_eq!(registry.delete_orphan_notes(), 1);
    assert_eq!(registry.nb_orphan_notes(), 0);
    assert_eq!(registry.nb_notes(), 2);
}

#[test]
fn get_notes_keeps_link_order() {
    let mut registry = NotesRegistry::new();
    let item_a = item("0:1:1:1");
    let ids: Vec<_> = (0..4)
        .map(|index| registry.create_comment("alice", format!("t{index}"), "x").id)
        .collect();
    for id in ids.iter().rev() {
        registry.add_note(*id, &item_a).expect("known note should attach");
    }

    let expected: Vec<_> = ids.iter().rev().copied().collect();
    assert_eq!(registry.get_notes(&item_a), expected);
    assert_eq!(registry.note_ids(), ids);
}

#[test]
fn bulk_deletes_report_counts() {
    let mut registry = NotesRegistry::new();
    let n1 = registry.create_comment("alice", "t1", "a").id;
    let n2 = registry.create_comment("alice", "t2", "b").id;
    registry.create_comment("alice", "t3", "c");
    registry.add_note(n1, &item("0:1")).expect("known note should attach");

    assert_eq!(registry.delete_notes(&[n1, Uuid::new_v4(), n2, n1]), 2);
    assert_eq!(registry.nb_annotated_items(), 0);
    assert_eq!(registry.delete_all_notes(), 1);
    assert_eq!(registry.nb_notes(), 0);
    assert!(!registry.delete_note(n1));
}

#[test]
fn bin_data_notes_expose_metadata() {
    let mut registry = NotesRegistry::new();
    let note = registry
        .create_bin_data("bob", "2017-02-10", "datasheet", "application/pdf", vec![0; 16])
        .clone();

    assert_eq!(note.kind(), NoteKind::BinData);
    assert_eq!(note.author, "bob");
    assert_eq!(note.timestamp, "2017-02-10");
    assert_eq!(note.headline(), "datasheet");
    assert_eq!(note.data_size(), 16);
    assert!(registry.is_orphan(note.id));
}
