use docrag_core::types::SourceKind;
use docrag_text::KeywordIndex;
use tempfile::TempDir;

fn seeded(dir: &TempDir) -> KeywordIndex {
    let mut index = KeywordIndex::open(dir.path()).expect("open");
    index.add(1, "doc1", "[From: doc1]\n# Linda\n\n## Skills\nReact, Node.js").unwrap();
    index.add(2, "doc1", "[From: doc1]\n# Linda\n\n## Availability\nOpen for freelance work").unwrap();
    index.add(3, "doc2", "[From: doc2]\n# Recipes\n\nBread rises overnight, bread needs flour").unwrap();
    index.commit().unwrap();
    index
}

#[test]
fn search_returns_negated_bm25() {
    let dir = TempDir::new().unwrap();
    let index = seeded(&dir);
    let hits = index.search("freelance", 10).unwrap();
    assert_eq!(hits.kind(), SourceKind::Text);
    assert_eq!(hits.ids().collect::<Vec<_>>(), vec![2]);
    assert!(hits.get(2).unwrap() < 0.0, "rank form is negative");
}

#[test]
fn better_matches_rank_lower() {
    let dir = TempDir::new().unwrap();
    let mut index = seeded(&dir);
    index.add(4, "doc3", "A short note on bread").unwrap();
    index.commit().unwrap();
    let hits = index.search("bread", 10).unwrap();
    assert_eq!(hits.len(), 2);
    let scores: Vec<f32> = hits.iter().map(|(_, s)| s).collect();
    assert!(scores[0] <= scores[1], "best first: {scores:?}");
}

#[test]
fn terms_are_conjunctive() {
    let dir = TempDir::new().unwrap();
    let index = seeded(&dir);
    assert!(index.search("freelance bread", 10).unwrap().is_empty());
    assert_eq!(index.search("Linda react", 10).unwrap().ids().collect::<Vec<_>>(), vec![1]);
}

#[test]
fn blank_and_malformed_queries_are_empty() {
    let dir = TempDir::new().unwrap();
    let index = seeded(&dir);
    assert!(index.search("   ", 10).unwrap().is_empty());
    assert!(index.parse_query("missing_field:value").is_err());
    assert!(index.search("missing_field:value", 10).unwrap().is_empty());
    assert!(index.search("zebra", 10).unwrap().is_empty());
}

#[test]
fn staged_documents_are_invisible_until_commit() {
    let dir = TempDir::new().unwrap();
    let mut index = seeded(&dir);
    index.add(9, "doc9", "quantum entanglement").unwrap();
    assert!(index.search("quantum", 10).unwrap().is_empty());
    index.rollback().unwrap();
    index.commit().unwrap();
    assert!(index.search("quantum", 10).unwrap().is_empty());
    assert_eq!(index.num_docs(), 3);
}

#[test]
fn deletes_by_id_and_source() {
    let dir = TempDir::new().unwrap();
    let mut index = seeded(&dir);
    index.delete_ids(&[3]);
    index.commit().unwrap();
    assert_eq!(index.all_ids().unwrap().into_iter().collect::<Vec<_>>(), vec![1, 2]);
    index.delete_source("doc1");
    index.commit().unwrap();
    assert!(index.all_ids().unwrap().is_empty());
}

#[test]
fn reopen_keeps_committed_documents() {
    let dir = TempDir::new().unwrap();
    drop(seeded(&dir));
    let index = KeywordIndex::open(dir.path()).unwrap();
    assert_eq!(index.num_docs(), 3);
    assert_eq!(index.search("freelance", 5).unwrap().ids().collect::<Vec<_>>(), vec![2]);
}
