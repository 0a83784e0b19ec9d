use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

pub use qdrant_client; // Re-export for binaries and tests
use self::qdrant_client::qdrant::value::Kind as QdrantValueKind;
use self::qdrant_client::qdrant::{
    vectors_config, Condition, CountPointsBuilder, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
    Distance, FieldType, Filter, PointStruct, SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue,
    VectorParamsBuilder,
};
use self::qdrant_client::{Payload, Qdrant};

use crate::domain::{ParagraphPayload, PointToUpsert, SearchHit, VectorRepository};
use crate::error::{RagError, RagResult};

/// Payload key every point is filtered on.
pub const DOCID_FIELD: &str = "docid";

pub struct VectorDb {
    client: Box<Qdrant>,
    collection_name: String,
    vector_size: u64,
}

impl VectorDb {
    /// Creates a new VectorDb instance.
    ///
    /// # Arguments
    ///
    /// * `client` - An initialized Qdrant client.
    /// * `collection_name` - The name of the collection to use.
    /// * `vector_size` - The dimension of the vectors.
    pub fn new(client: Box<Qdrant>, collection_name: String, vector_size: u64) -> RagResult<Self> {
        if collection_name.is_empty() {
            return Err(RagError::Config("Collection name cannot be empty".to_string()));
        }
        if vector_size == 0 {
            return Err(RagError::Config("Vector size must be greater than zero".to_string()));
        }
        Ok(Self { client, collection_name, vector_size })
    }

    pub fn from_url(url: &str, collection_name: String, vector_size: u64) -> RagResult<Self> {
        let client = Qdrant::from_url(url).build()?;
        Self::new(Box::new(client), collection_name, vector_size)
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// Vector size of the existing collection and whether `docid` is already indexed.
    async fn existing_layout(&self) -> RagResult<(Option<u64>, bool)> {
        let info = self.client.collection_info(self.collection_name.clone()).await?;
        let Some(result) = info.result else {
            return Ok((None, false));
        };
        let has_docid_index = result.payload_schema.contains_key(DOCID_FIELD);
        let size = result
            .config
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config)
            .and_then(|c| match c {
                vectors_config::Config::Params(params) => Some(params.size),
                vectors_config::Config::ParamsMap(_) => None,
            });
        Ok((size, has_docid_index))
    }

    async fn create_collection_internal(&self) -> RagResult<()> {
        log::info!(
            "Creating collection '{}' with size {} and distance Cosine...",
            self.collection_name,
            self.vector_size
        );
        let create_builder = CreateCollectionBuilder::new(self.collection_name.clone())
            .vectors_config(VectorParamsBuilder::new(self.vector_size, Distance::Cosine));

        self.client.create_collection(create_builder).await.map_err(|e| {
            log::error!("Failed to create collection '{}': {}", self.collection_name, e);
            RagError::VectorStore(format!("Failed to create collection: {}", e))
        })?;

        self.create_docid_index().await?;
        log::info!("Successfully created collection '{}'.", self.collection_name);
        Ok(())
    }

    // Filtered search on docid runs on every query.
    async fn create_docid_index(&self) -> RagResult<()> {
        log::info!("Creating keyword index on '{}' in '{}'.", DOCID_FIELD, self.collection_name);
        self.client
            .create_field_index(
                CreateFieldIndexCollectionBuilder::new(self.collection_name.clone(), DOCID_FIELD, FieldType::Keyword)
                    .wait(true),
            )
            .await?;
        Ok(())
    }

    fn docid_filter(docid: &str) -> Filter {
        Filter::must([Condition::matches(DOCID_FIELD, docid.to_string())])
    }

    fn to_point(point: &PointToUpsert) -> RagResult<PointStruct> {
        let payload_value = serde_json::to_value(&point.payload)
            .map_err(|e| RagError::VectorStore(format!("Failed to serialize payload: {}", e)))?;
        let payload = Payload::try_from(payload_value)
            .map_err(|e| RagError::VectorStore(format!("Failed to convert payload: {}", e)))?;
        Ok(PointStruct::new(Uuid::new_v4().to_string(), point.vector.clone(), payload))
    }

    // Qdrant hands payloads back as its own value tree.
    fn payload_to_json(payload_map: HashMap<String, QdrantValue>) -> serde_json::Value {
        serde_json::Value::Object(
            payload_map
                .into_iter()
                .map(|(key, value)| (key, Self::value_to_json(value)))
                .collect(),
        )
    }

    fn value_to_json(value: QdrantValue) -> serde_json::Value {
        match value.kind {
            Some(QdrantValueKind::NullValue(_)) | None => serde_json::Value::Null,
            Some(QdrantValueKind::BoolValue(b)) => serde_json::Value::Bool(b),
            Some(QdrantValueKind::DoubleValue(d)) => serde_json::Number::from_f64(d)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Some(QdrantValueKind::IntegerValue(i)) => serde_json::Value::Number(i.into()),
            Some(QdrantValueKind::StringValue(s)) => serde_json::Value::String(s),
            Some(QdrantValueKind::ListValue(list)) => {
                serde_json::Value::Array(list.values.into_iter().map(Self::value_to_json).collect())
            }
            Some(QdrantValueKind::StructValue(s)) => Self::payload_to_json(s.fields),
        }
    }
}

#[async_trait]
impl VectorRepository for VectorDb {
    async fn ensure_collection(&self) -> RagResult<()> {
        log::info!("Checking if collection '{}' exists...", self.collection_name);
        if !self.client.collection_exists(self.collection_name.clone()).await? {
            return self.create_collection_internal().await;
        }

        let (size, has_docid_index) = self.existing_layout().await?;
        if let Some(actual) = size.filter(|actual| *actual != self.vector_size) {
            return Err(RagError::CollectionMismatch {
                collection: self.collection_name.clone(),
                expected: self.vector_size,
                actual,
            });
        }
        log::info!("Collection '{}' already exists.", self.collection_name);
        if !has_docid_index {
            self.create_docid_index().await?;
        }
        Ok(())
    }

    async fn upsert_points(&self, points: &[PointToUpsert]) -> RagResult<()> {
        if points.is_empty() {
            log::debug!("No points provided for upsert.");
            return Ok(());
        }
        if let Some(bad) = points.iter().find(|p| p.vector.len() as u64 != self.vector_size) {
            return Err(RagError::VectorStore(format!(
                "Point vector dimension ({}) does not match collection dimension ({})",
                bad.vector.len(),
                self.vector_size
            )));
        }

        let qdrant_points = points.iter().map(Self::to_point).collect::<RagResult<Vec<_>>>()?;
        let points_count = qdrant_points.len();
        log::debug!("Upserting {} points into collection '{}'...", points_count, self.collection_name);

        let upsert_builder = UpsertPointsBuilder::new(self.collection_name.clone(), qdrant_points).wait(true);
        match self.client.upsert_points(upsert_builder).await {
            Ok(response) => {
                if let Some(result) = response.result {
                    log::debug!("Upsert operation completed with status: {:?}", result.status());
                }
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to upsert points into collection '{}': {}", self.collection_name, e);
                Err(RagError::VectorStore(format!("Qdrant upsert failed: {}", e)))
            }
        }
    }

    async fn search(&self, query_vector: Vec<f32>, docid: &str, limit: usize) -> RagResult<Vec<SearchHit>> {
        if query_vector.len() as u64 != self.vector_size {
            return Err(RagError::VectorStore(format!(
                "Query vector dimension ({}) does not match collection dimension ({})",
                query_vector.len(),
                self.vector_size
            )));
        }

        log::debug!(
            "Searching collection '{}' for docid '{}' with limit {}...",
            self.collection_name,
            docid,
            limit
        );
        let request = SearchPointsBuilder::new(self.collection_name.clone(), query_vector, limit as u64)
            .filter(Self::docid_filter(docid))
            .with_payload(true);

        let response = self.client.search_points(request).await.map_err(|e| {
            log::error!("Qdrant search failed in collection '{}': {}", self.collection_name, e);
            RagError::VectorStore(format!("Qdrant search failed: {}", e))
        })?;

        let hits = response
            .result
            .into_iter()
            .filter_map(|scored_point| {
                let json_value = Self::payload_to_json(scored_point.payload);
                match serde_json::from_value::<ParagraphPayload>(json_value) {
                    Ok(payload) if payload.docid == docid => Some(SearchHit {
                        text: payload.text,
                        page_number: payload.page_number,
                        line_number: payload.line_number,
                        score: scored_point.score,
                    }),
                    Ok(payload) => {
                        log::error!(
                            "Filtered search for '{}' returned a point of '{}', dropping it.",
                            docid,
                            payload.docid
                        );
                        None
                    }
                    Err(e) => {
                        log::warn!("Skipping point {:?} with unreadable payload: {}", scored_point.id, e);
                        None
                    }
                }
            })
            .collect::<Vec<_>>();

        log::debug!("Search returned {} hits.", hits.len());
        Ok(hits)
    }

    async fn count_points(&self, docid: &str) -> RagResult<u64> {
        let response = self
            .client
            .count(
                CountPointsBuilder::new(self.collection_name.clone())
                    .filter(Self::docid_filter(docid))
                    .exact(true),
            )
            .await?;
        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }
}
