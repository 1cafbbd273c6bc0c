use std::{env, sync::Once};

use rustyrag::{
    config,
    embedding::build_embedding_client,
    processing::{Document, RagPipeline},
};

static INIT: Once = Once::new();

fn set_default_env(key: &str, value: &str) {
    let needs_value = env::var(key).map(|v| v.trim().is_empty()).unwrap_or(true);
    if needs_value {
        // SAFETY: Tests run serially via Once and we intentionally mutate process env.
        unsafe {
            env::set_var(key, value);
        }
    }
}

fn init_config_once() -> &'static config::Config {
    INIT.call_once(|| {
        set_default_env("QDRANT_URL", "http://127.0.0.1:6333");
        set_default_env("QDRANT_COLLECTION_NAME", "rusty-rag-live");
        set_default_env("EMBEDDING_PROVIDER", "ollama");
        set_default_env("EMBEDDING_MODEL", "bge-m3");
        set_default_env("EMBEDDING_DIMENSION", "1024");
    });
    config::init_config().expect("live configuration")
}

#[tokio::test]
#[ignore = "Requires live Qdrant and Ollama"]
async fn live_ingest_then_retrieve() {
    let config = init_config_once();
    let pipeline = RagPipeline::from_config(config).expect("pipeline");
    pipeline.ensure_ready().await.expect("collection ready");

    pipeline
        .ingest(&Document::new(
            "live.md",
            "Contrastive vision-language models align image and text embeddings.",
        ))
        .await
        .expect("ingest");
    assert!(pipeline.count().await.expect("count") > 0);

    let bundle = pipeline
        .retrieve("What do contrastive VLMs align?", Some(3))
        .await
        .expect("retrieve");
    assert!(!bundle.is_empty(), "expected at least one passage");
}

#[tokio::test]
#[ignore = "Requires live Ollama embeddings"]
async fn live_ollama_embedding_roundtrip() {
    let config = init_config_once();
    let client = build_embedding_client(config).expect("embedding client");
    let vectors = client
        .generate_embeddings(vec!["rusty-rag live embedding".to_string()])
        .await
        .expect("failed to request embeddings from provider");
    assert_eq!(vectors.len(), 1, "expected embedding per input chunk");
    assert_eq!(
        vectors[0].len(),
        config.embedding_dimension,
        "embedding dimension mismatch"
    );
}
