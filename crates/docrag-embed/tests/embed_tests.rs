use docrag_core::config::EmbeddingSettings;
use docrag_core::traits::Embedder;
use docrag_embed::{get_default_embedder, FakeEmbedder};

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[test]
fn fake_embedder_shapes_and_determinism() {
    // Force fake embedder to avoid loading the model
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");

    let embedder = get_default_embedder(&EmbeddingSettings::default()).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 384, "embedding dim is 384");
    assert_eq!(embedder.dim(), 384);

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn single_embed_matches_batch() {
    let embedder = FakeEmbedder::new(64);
    let one = embedder.embed("Linda is available for freelance work").unwrap();
    let batch = embedder.embed_batch(&["Linda is available for freelance work".to_string()]).unwrap();
    assert_eq!(one, batch[0]);
}

#[test]
fn shared_words_are_closer_than_unrelated_text() {
    let embedder = FakeEmbedder::new(384);
    let query = embedder.embed("freelance availability").unwrap();
    let related = embedder.embed("She is open to Freelance projects.").unwrap();
    let unrelated = embedder.embed("Bread rises overnight in a warm kitchen").unwrap();
    assert!(cosine(&query, &related) > cosine(&query, &unrelated));
}

#[test]
fn empty_text_is_a_zero_vector() {
    let embedder = FakeEmbedder::new(16);
    let v = embedder.embed("  ... ").unwrap();
    assert_eq!(v.len(), 16);
    assert!(v.iter().all(|x| *x == 0.0));
}
