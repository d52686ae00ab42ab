use chrono::Utc;
use docrag_core::types::{Meta, NewChunk, SourceKind};
use docrag_vector::ChunkTable;
use tempfile::TempDir;

fn chunk(source_id: &str, content: &str, embedding: Vec<f32>) -> NewChunk {
    let mut metadata = Meta::new();
    metadata.insert("section_title".into(), content.split_whitespace().next().unwrap_or("").into());
    NewChunk {
        source_type: "document_page".into(),
        source_id: source_id.into(),
        content: content.into(),
        embedding,
        metadata,
    }
}

async fn seeded(dir: &TempDir) -> ChunkTable {
    let table = ChunkTable::open(dir.path(), 3).await.expect("open");
    let chunks = vec![
        chunk("doc1", "Skills React", vec![1.0, 0.0, 0.0]),
        chunk("doc1", "Availability freelance", vec![0.0, 1.0, 0.0]),
        chunk("doc2", "Bread flour", vec![0.0, 0.0, 1.0]),
    ];
    table.insert(&[1, 2, 3], &chunks, Utc::now()).await.expect("insert");
    table
}

#[tokio::test]
async fn empty_table_yields_no_hits() {
    let tmp = TempDir::new().unwrap();
    let table = ChunkTable::open(tmp.path(), 3).await.unwrap();
    assert_eq!(table.count().await.unwrap(), 0);
    assert!(table.search_vec(&[1.0, 0.0, 0.0], 5).await.unwrap().is_empty());
    assert_eq!(table.max_id().await.unwrap(), None);
}

#[tokio::test]
async fn nearest_first_with_cosine_distance() {
    let tmp = TempDir::new().unwrap();
    let table = seeded(&tmp).await;
    let hits = table.search_vec(&[0.1, 0.9, 0.0], 3).await.unwrap();
    assert_eq!(hits.kind(), SourceKind::Vector);
    let ids: Vec<_> = hits.ids().collect();
    assert_eq!(ids[0], 2);
    for (_, d) in hits.iter() {
        assert!((0.0..=2.0).contains(&d), "distance {d}");
    }
    let scores: Vec<f32> = hits.iter().map(|(_, d)| d).collect();
    assert!(scores.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn wrong_dimension_query_is_empty() {
    let tmp = TempDir::new().unwrap();
    let table = seeded(&tmp).await;
    assert!(table.search_vec(&[1.0, 0.0], 3).await.unwrap().is_empty());
}

#[tokio::test]
async fn records_round_trip_metadata() {
    let tmp = TempDir::new().unwrap();
    let table = seeded(&tmp).await;
    let records = table.get_records(&[2, 3, 99]).await.unwrap();
    assert_eq!(records.len(), 2);
    let r = &records[&2];
    assert_eq!(r.source_id, "doc1");
    assert_eq!(r.content, "Availability freelance");
    assert_eq!(r.metadata.get("section_title").map(String::as_str), Some("Availability"));
    assert_eq!(table.max_id().await.unwrap(), Some(3));
}

#[tokio::test]
async fn deletes_by_source_and_id() {
    let tmp = TempDir::new().unwrap();
    let table = seeded(&tmp).await;
    table.delete_source("doc1", Some(2)).await.unwrap();
    assert_eq!(table.ids(Some("doc1")).await.unwrap().into_iter().collect::<Vec<_>>(), vec![2]);
    table.delete_ids(&[3]).await.unwrap();
    table.delete_source("doc1", None).await.unwrap();
    assert_eq!(table.count().await.unwrap(), 0);
}

#[tokio::test]
async fn quotes_in_source_ids_are_escaped() {
    let tmp = TempDir::new().unwrap();
    let table = ChunkTable::open(tmp.path(), 3).await.unwrap();
    table.insert(&[1], &[chunk("it's.md", "quoted", vec![1.0, 1.0, 0.0])], Utc::now()).await.unwrap();
    assert_eq!(table.ids(Some("it's.md")).await.unwrap().len(), 1);
}

#[tokio::test]
async fn reopening_with_other_dimension_fails() {
    let tmp = TempDir::new().unwrap();
    drop(seeded(&tmp).await);
    assert!(ChunkTable::open(tmp.path(), 4).await.is_err());
    assert_eq!(ChunkTable::open(tmp.path(), 3).await.unwrap().count().await.unwrap(), 3);
}

#[tokio::test]
async fn restore_undoes_later_writes() {
    let tmp = TempDir::new().unwrap();
    let table = seeded(&tmp).await;
    let before = table.version().await.unwrap();
    table.insert(&[4], &[chunk("doc4", "Extra row", vec![1.0, 1.0, 1.0])], Utc::now()).await.unwrap();
    table.delete_ids(&[1]).await.unwrap();
    assert_eq!(table.count().await.unwrap(), 3);
    table.restore_to(before).await.unwrap();
    assert_eq!(table.ids(None).await.unwrap().into_iter().collect::<Vec<_>>(), vec![1, 2, 3]);
}
