//! Runs against a throwaway Qdrant container; needs a Docker daemon.
//! `cargo test -- --ignored` to include them.

use anyhow::Result;
use pdf_rag::domain::{ParagraphRecord, PointToUpsert};
use pdf_rag::qdrant_client::qdrant::{CreateCollectionBuilder, Distance, VectorParamsBuilder};
use pdf_rag::qdrant_client::Qdrant;
use pdf_rag::infrastructure::vector_db::DOCID_FIELD;
use pdf_rag::{RagError, VectorDb, VectorRepository};
use std::time::Duration;
use testcontainers::core::{ContainerAsync, ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::GenericImage;
use uuid::Uuid;

async fn start_qdrant() -> Result<(String, ContainerAsync<GenericImage>)> {
    let image = GenericImage::new("qdrant/qdrant", "latest")
        .with_exposed_port(ContainerPort::Tcp(6334))
        .with_wait_for(WaitFor::message_on_stdout("Qdrant gRPC listening on 6334"));

    let container = image.start().await?;
    let grpc_port = container.get_host_port_ipv4(6334).await?;
    Ok((format!("http://localhost:{}", grpc_port), container))
}

// Function to set up Qdrant container and return a ready collection
async fn setup_qdrant() -> Result<(VectorDb, String, ContainerAsync<GenericImage>)> {
    let (url, container) = start_qdrant().await?;
    let collection_name = format!("test_coll_{}", Uuid::new_v4().as_simple());
    let vector_db = VectorDb::from_url(&url, collection_name, 3)?;
    vector_db.ensure_collection().await?;
    Ok((vector_db, url, container))
}

fn point(docid: &str, text: &str, page: u32, vector: Vec<f32>) -> PointToUpsert {
    let record = ParagraphRecord {
        text: text.to_string(),
        page,
        line: 1,
    };
    PointToUpsert::new(&record, docid, vector)
}

#[tokio::test]
#[ignore]
async fn test_ensure_collection_is_idempotent() -> Result<()> {
    let (vector_db, _url, _container) = setup_qdrant().await?;
    vector_db
        .upsert_points(&[point("loan", "Loan amount is $10,000", 1, vec![0.9, 0.1, 0.0])])
        .await?;

    vector_db.ensure_collection().await?;
    assert_eq!(vector_db.count_points("loan").await?, 1);
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_ensure_collection_indexes_docid_on_existing_collection() -> Result<()> {
    let (url, _container) = start_qdrant().await?;
    let collection_name = format!("test_coll_{}", Uuid::new_v4().as_simple());
    let client = Qdrant::from_url(&url).build()?;
    client
        .create_collection(
            CreateCollectionBuilder::new(collection_name.clone())
                .vectors_config(VectorParamsBuilder::new(3, Distance::Cosine)),
        )
        .await?;
    let schema_before = client.collection_info(collection_name.clone()).await?.result.unwrap().payload_schema;
    assert!(!schema_before.contains_key(DOCID_FIELD));

    let vector_db = VectorDb::from_url(&url, collection_name.clone(), 3)?;
    vector_db.ensure_collection().await?;
    vector_db.ensure_collection().await?;

    let schema_after = client.collection_info(collection_name).await?.result.unwrap().payload_schema;
    assert!(schema_after.contains_key(DOCID_FIELD));
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_existing_collection_with_other_size_is_rejected() -> Result<()> {
    let (vector_db, url, _container) = setup_qdrant().await?;
    let mismatched = VectorDb::from_url(&url, vector_db.collection_name().to_string(), 384)?;

    let err = mismatched.ensure_collection().await.unwrap_err();
    assert!(
        matches!(err, RagError::CollectionMismatch { expected: 384, actual: 3, .. }),
        "unexpected error: {}",
        err
    );
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_upsert_and_filtered_search() -> Result<()> {
    let (vector_db, _url, _container) = setup_qdrant().await?;
    vector_db
        .upsert_points(&[
            point("loan", "Loan amount is $10,000", 1, vec![0.9, 0.1, 0.0]),
            point("loan", "Interest rate is 5%", 2, vec![0.1, 0.9, 0.0]),
            point("lease", "Interest on late rent is 2%", 1, vec![0.1, 0.9, 0.0]),
        ])
        .await?;
    tokio::time::sleep(Duration::from_millis(500)).await;

    let hits = vector_db.search(vec![0.0, 1.0, 0.0], "loan", 1).await?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].text, "Interest rate is 5%");
    assert_eq!(hits[0].page_number, 2);
    assert_eq!(hits[0].line_number, 1);

    let hits = vector_db.search(vec![0.0, 1.0, 0.0], "loan", 10).await?;
    assert_eq!(hits.len(), 2);
    assert!(hits[0].score >= hits[1].score);
    assert!(hits.iter().all(|h| !h.text.contains("rent")));

    // Exact match only: a prefix of a docid selects nothing.
    assert!(vector_db.search(vec![0.0, 1.0, 0.0], "lo", 10).await?.is_empty());
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_upsert_is_additive() -> Result<()> {
    let (vector_db, _url, _container) = setup_qdrant().await?;
    let points = [point("loan", "Interest rate is 5%", 2, vec![0.1, 0.9, 0.0])];
    vector_db.upsert_points(&points).await?;
    vector_db.upsert_points(&points).await?;

    assert_eq!(vector_db.count_points("loan").await?, 2);
    assert_eq!(vector_db.count_points("lease").await?, 0);
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_search_wrong_dimension() -> Result<()> {
    let (vector_db, _url, _container) = setup_qdrant().await?;
    let result = vector_db.search(vec![0.1, 0.2], "loan", 5).await;
    assert!(result.is_err());
    Ok(())
}

#[tokio::test]
async fn test_vector_db_new_invalid_params() -> Result<()> {
    let client1 = Qdrant::from_url("http://dummy-url1").build()?;
    assert!(VectorDb::new(Box::new(client1), "".to_string(), 3).is_err());
    let client2 = Qdrant::from_url("http://dummy-url2").build()?;
    assert!(VectorDb::new(Box::new(client2), "test".to_string(), 0).is_err());
    Ok(())
}
