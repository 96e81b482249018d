use std::sync::Arc;

use domain_inference::{ControlInput, GenerationRequest, ImageEncoder, ImageGenerator};
use image::DynamicImage;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::conditioning;
use crate::error::{ImagesError, ImagesResult};
use crate::models::{
    DeleteImagesRequest, DeleteReport, DeleteStatus, GenerateImageRequest, NewImageMetadata,
    PointPayload, SearchImagesQuery, SimpleMetadata,
};
use crate::repository::{EmbeddingIndex, ImageStore, MetadataRepository, NewEmbeddedPoint};

/// Result count used when a search does not specify `topk`.
pub const DEFAULT_TOPK: u64 = 3;
const MAX_TOPK: u64 = 100;

/// Service layer tying generation, embedding and the three stores together.
///
/// Inference backends are blocking and run on blocking threads; the stores
/// are async. The service owns the ordering of the persistence fan-out and
/// the best-effort semantics of deletion.
pub struct ImageService<M: MetadataRepository, V: EmbeddingIndex> {
    metadata: Arc<M>,
    index: Arc<V>,
    store: Arc<dyn ImageStore>,
    generator: Arc<dyn ImageGenerator>,
    encoder: Arc<dyn ImageEncoder>,
}

impl<M: MetadataRepository, V: EmbeddingIndex> ImageService<M, V> {
    pub fn new(
        metadata: M,
        index: V,
        store: Arc<dyn ImageStore>,
        generator: Arc<dyn ImageGenerator>,
        encoder: Arc<dyn ImageEncoder>,
    ) -> Self {
        Self {
            metadata: Arc::new(metadata),
            index: Arc::new(index),
            store,
            generator,
            encoder,
        }
    }

    /// Shared handle to the embedding index, used by readiness probes.
    pub fn index(&self) -> &Arc<V> {
        &self.index
    }

    /// Generate an image from the request, embed it together with its
    /// prompt, and persist artifact, point and metadata.
    #[instrument(skip(self, request), fields(steps = request.num_inference_steps))]
    pub async fn generate_and_store(
        &self,
        request: GenerateImageRequest,
    ) -> ImagesResult<SimpleMetadata> {
        request
            .validate()
            .map_err(|e| ImagesError::Validation(e.to_string()))?;
        if request.width % 8 != 0 || request.height % 8 != 0 {
            return Err(ImagesError::Validation(
                "width and height must be multiples of 8".to_string(),
            ));
        }

        let control = self.resolve_conditioning(&request)?;

        let image_filename = format!("{}.png", Uuid::new_v4().simple());

        let generation = GenerationRequest {
            prompt: request.prompt.clone(),
            width: request.width,
            height: request.height,
            control,
            num_inference_steps: request.num_inference_steps as usize,
            guidance_scale: request.guidance_scale,
            seed: request.seed,
        };

        let generator = Arc::clone(&self.generator);
        let encoder = Arc::clone(&self.encoder);
        let store = Arc::clone(&self.store);
        let filename = image_filename.clone();
        let prompt = request.prompt.clone();

        let (image_embedding, text_embedding) = tokio::task::spawn_blocking(move || {
            let image = generator.generate(&generation)?;
            let image_embedding = encoder.encode_image(&DynamicImage::ImageRgb8(image.clone()))?;
            let text_embedding = encoder.encode_text(&prompt)?;
            store.save_image(&image, &filename)?;
            Ok::<_, ImagesError>((image_embedding, text_embedding))
        })
        .await
        .map_err(|e| ImagesError::Internal(format!("generation task failed: {e}")))??;

        self.index
            .upsert(NewEmbeddedPoint {
                image_embedding,
                text_embedding,
                image_filename: image_filename.clone(),
                prompt: request.prompt.clone(),
            })
            .await?;

        self.metadata
            .insert(NewImageMetadata::from_request(&request, &image_filename))
            .await?;

        tracing::info!(image_filename = %image_filename, "Generated and stored image");

        Ok(SimpleMetadata {
            image_filename,
            prompt: request.prompt,
        })
    }

    /// Marshal the two conditioning slots into the generator's input list.
    fn resolve_conditioning(
        &self,
        request: &GenerateImageRequest,
    ) -> ImagesResult<Vec<ControlInput>> {
        let mut images = Vec::new();
        for filename in [
            request.control_image_filename_1.as_deref(),
            request.control_image_filename_2.as_deref(),
        ]
        .into_iter()
        .flatten()
        {
            images.push(self.store.load_control_image(filename)?);
        }

        let scales: Vec<f64> = [
            request.controlnet_conditioning_scale_1,
            request.controlnet_conditioning_scale_2,
        ]
        .into_iter()
        .flatten()
        .collect();

        let guidance_ends: Vec<f64> = [
            request.control_guidance_end_1,
            request.control_guidance_end_2,
        ]
        .into_iter()
        .flatten()
        .collect();

        conditioning::resolve_control_stack(
            images,
            scales,
            guidance_ends,
            request.width,
            request.height,
        )
    }

    /// Compact metadata of every stored image, newest first.
    pub async fn list_simple_metadata(&self) -> ImagesResult<Vec<SimpleMetadata>> {
        let records = self.metadata.list().await?;
        Ok(records
            .into_iter()
            .map(|record| SimpleMetadata {
                image_filename: record.image_filename,
                prompt: record.prompt,
            })
            .collect())
    }

    /// Filenames of the available conditioning images.
    pub async fn list_control_images(&self) -> ImagesResult<Vec<String>> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.list_control_filenames())
            .await
            .map_err(|e| ImagesError::Internal(format!("listing task failed: {e}")))?
    }

    /// Similarity search by text or by example image.
    ///
    /// The query embedding is searched against the image vector space; text
    /// and image queries land in the same space, so either works. Text wins
    /// when both are supplied.
    #[instrument(skip(self, query))]
    pub async fn search_similar(
        &self,
        query: SearchImagesQuery,
    ) -> ImagesResult<Vec<SimpleMetadata>> {
        let topk = query.topk.unwrap_or(DEFAULT_TOPK);
        if topk == 0 || topk > MAX_TOPK {
            return Err(ImagesError::Validation(format!(
                "topk must be between 1 and {MAX_TOPK}"
            )));
        }

        let encoder = Arc::clone(&self.encoder);
        let embedding = match (query.text, query.image) {
            (Some(text), _) if !text.is_empty() => {
                tokio::task::spawn_blocking(move || encoder.encode_text(&text))
                    .await
                    .map_err(|e| ImagesError::Internal(format!("embedding task failed: {e}")))??
            }
            (_, Some(bytes)) => {
                let image = image::load_from_memory(&bytes).map_err(|e| {
                    ImagesError::Validation(format!("could not decode query image: {e}"))
                })?;
                tokio::task::spawn_blocking(move || encoder.encode_image(&image))
                    .await
                    .map_err(|e| ImagesError::Internal(format!("embedding task failed: {e}")))??
            }
            _ => {
                return Err(ImagesError::Validation(
                    "either text or image is required".to_string(),
                ));
            }
        };

        let hits = self.index.search(embedding, topk).await?;

        // Reconcile index hits with their stored payloads; a damaged point
        // must not hide the healthy results.
        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let Some(payload) = hit.payload else {
                tracing::warn!(score = hit.score, "Search hit without payload, skipping");
                continue;
            };
            match serde_json::from_value::<PointPayload>(payload) {
                Ok(payload) => results.push(SimpleMetadata {
                    image_filename: payload.image_filename,
                    prompt: payload.prompt,
                }),
                Err(e) => {
                    tracing::warn!(score = hit.score, "Undecodable search payload, skipping: {e}");
                }
            }
        }

        Ok(results)
    }

    /// Best-effort delete across index, metadata store and filesystem.
    ///
    /// Failures are collected per filename instead of aborting the batch.
    #[instrument(skip(self, request), fields(count = request.image_filenames.len()))]
    pub async fn delete_images(&self, request: DeleteImagesRequest) -> ImagesResult<DeleteReport> {
        request
            .validate()
            .map_err(|e| ImagesError::Validation(e.to_string()))?;

        let mut deleted_filenames = Vec::new();
        let mut failed_filenames = Vec::new();

        for image_filename in request.image_filenames {
            match self.delete_one(&image_filename).await {
                Ok(()) => deleted_filenames.push(image_filename),
                Err(e) => {
                    tracing::warn!(image_filename = %image_filename, "Delete failed: {e}");
                    failed_filenames.push(image_filename);
                }
            }
        }

        let status = if failed_filenames.is_empty() {
            DeleteStatus::Success
        } else {
            DeleteStatus::Partial
        };

        Ok(DeleteReport {
            status,
            deleted_filenames,
            failed_filenames,
        })
    }

    /// Remove one image from all three stores. Absent entries are not
    /// failures, so the operation is idempotent.
    async fn delete_one(&self, image_filename: &str) -> ImagesResult<()> {
        self.index.delete_by_filename(image_filename).await?;
        self.metadata.delete(image_filename).await?;

        let store = Arc::clone(&self.store);
        let filename = image_filename.to_string();
        tokio::task::spawn_blocking(move || store.delete_image(&filename))
            .await
            .map_err(|e| ImagesError::Internal(format!("delete task failed: {e}")))??;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImageMetadata;
    use crate::repository::{
        MockEmbeddingIndex, MockImageStore, MockMetadataRepository, ScoredPayload,
    };
    use domain_inference::InferenceResult;
    use image::{Rgb, RgbImage};
    use std::path::PathBuf;

    mockall::mock! {
        Generator {}

        impl ImageGenerator for Generator {
            fn generate(&self, request: &GenerationRequest) -> InferenceResult<RgbImage>;
        }
    }

    mockall::mock! {
        Encoder {}

        impl ImageEncoder for Encoder {
            fn encode_image(&self, image: &DynamicImage) -> InferenceResult<Vec<f32>>;
            fn encode_text(&self, text: &str) -> InferenceResult<Vec<f32>>;
            fn dimension(&self) -> usize;
        }
    }

    fn base_request() -> GenerateImageRequest {
        GenerateImageRequest {
            prompt: "a rusty robot on a beach".to_string(),
            width: 512,
            height: 512,
            control_image_filename_1: None,
            control_image_filename_2: None,
            controlnet_conditioning_scale_1: None,
            controlnet_conditioning_scale_2: None,
            control_guidance_end_1: None,
            control_guidance_end_2: None,
            num_inference_steps: 20,
            guidance_scale: 7.5,
            seed: 42,
        }
    }

    fn record_for(input: NewImageMetadata) -> ImageMetadata {
        ImageMetadata {
            image_filename: input.image_filename,
            prompt: input.prompt,
            width: input.width,
            height: input.height,
            control_image_filename_1: input.control_image_filename_1,
            control_image_filename_2: input.control_image_filename_2,
            controlnet_conditioning_scale_1: input.controlnet_conditioning_scale_1,
            controlnet_conditioning_scale_2: input.controlnet_conditioning_scale_2,
            control_guidance_end_1: input.control_guidance_end_1,
            control_guidance_end_2: input.control_guidance_end_2,
            num_inference_steps: input.num_inference_steps,
            guidance_scale: input.guidance_scale,
            seed: input.seed,
            created_at: chrono::Utc::now(),
        }
    }

    #[allow(clippy::type_complexity)]
    fn service(
        metadata: MockMetadataRepository,
        index: MockEmbeddingIndex,
        store: MockImageStore,
        generator: MockGenerator,
        encoder: MockEncoder,
    ) -> ImageService<MockMetadataRepository, MockEmbeddingIndex> {
        ImageService::new(
            metadata,
            index,
            Arc::new(store),
            Arc::new(generator),
            Arc::new(encoder),
        )
    }

    #[tokio::test]
    async fn generate_without_conditioning_uses_blank_fallback() {
        let mut generator = MockGenerator::new();
        generator
            .expect_generate()
            .withf(|request| {
                request.control.len() == 1
                    && request.control[0].conditioning_scale
                        == conditioning::FALLBACK_CONDITIONING_SCALE
                    && request.control[0].guidance_end == conditioning::FALLBACK_GUIDANCE_END
            })
            .returning(|request| Ok(RgbImage::new(request.width, request.height)));

        let mut encoder = MockEncoder::new();
        encoder.expect_encode_image().returning(|_| Ok(vec![0.1; 4]));
        encoder.expect_encode_text().returning(|_| Ok(vec![0.2; 4]));

        let mut store = MockImageStore::new();
        store
            .expect_save_image()
            .times(1)
            .returning(|_, name| Ok(PathBuf::from(name)));

        let mut index = MockEmbeddingIndex::new();
        index.expect_upsert().times(1).returning(|_| Ok(()));

        let mut metadata = MockMetadataRepository::new();
        metadata
            .expect_insert()
            .times(1)
            .returning(|input| Ok(record_for(input)));

        let service = service(metadata, index, store, generator, encoder);
        let result = service.generate_and_store(base_request()).await.unwrap();

        assert!(result.image_filename.ends_with(".png"));
        assert_eq!(result.prompt, "a rusty robot on a beach");
    }

    #[tokio::test]
    async fn generate_loads_named_control_images() {
        let mut store = MockImageStore::new();
        store
            .expect_load_control_image()
            .withf(|name| name == "pose.png")
            .times(1)
            .returning(|_| {
                Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
                    8,
                    8,
                    Rgb([0, 0, 0]),
                )))
            });
        store
            .expect_save_image()
            .returning(|_, name| Ok(PathBuf::from(name)));

        let mut generator = MockGenerator::new();
        generator
            .expect_generate()
            .withf(|request| {
                request.control.len() == 1
                    && request.control[0].conditioning_scale == 0.7
                    && request.control[0].guidance_end == 0.9
            })
            .returning(|request| Ok(RgbImage::new(request.width, request.height)));

        let mut encoder = MockEncoder::new();
        encoder.expect_encode_image().returning(|_| Ok(vec![0.1; 4]));
        encoder.expect_encode_text().returning(|_| Ok(vec![0.2; 4]));

        let mut index = MockEmbeddingIndex::new();
        index.expect_upsert().returning(|_| Ok(()));

        let mut metadata = MockMetadataRepository::new();
        metadata.expect_insert().returning(|input| Ok(record_for(input)));

        let request = GenerateImageRequest {
            control_image_filename_1: Some("pose.png".to_string()),
            controlnet_conditioning_scale_1: Some(0.7),
            control_guidance_end_1: Some(0.9),
            ..base_request()
        };

        let service = service(metadata, index, store, generator, encoder);
        service.generate_and_store(request).await.unwrap();
    }

    #[tokio::test]
    async fn generate_rejects_scale_without_control_image() {
        let service = service(
            MockMetadataRepository::new(),
            MockEmbeddingIndex::new(),
            MockImageStore::new(),
            MockGenerator::new(),
            MockEncoder::new(),
        );

        let request = GenerateImageRequest {
            controlnet_conditioning_scale_1: Some(0.5),
            ..base_request()
        };

        let err = service.generate_and_store(request).await.unwrap_err();
        assert!(err.to_string().contains("conditioning scales"));
    }

    #[tokio::test]
    async fn generate_rejects_unaligned_dimensions() {
        let service = service(
            MockMetadataRepository::new(),
            MockEmbeddingIndex::new(),
            MockImageStore::new(),
            MockGenerator::new(),
            MockEncoder::new(),
        );

        let request = GenerateImageRequest {
            width: 500,
            ..base_request()
        };

        let err = service.generate_and_store(request).await.unwrap_err();
        assert!(err.to_string().contains("multiples of 8"));
    }

    #[tokio::test]
    async fn search_requires_text_or_image() {
        let service = service(
            MockMetadataRepository::new(),
            MockEmbeddingIndex::new(),
            MockImageStore::new(),
            MockGenerator::new(),
            MockEncoder::new(),
        );

        let err = service
            .search_similar(SearchImagesQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ImagesError::Validation(_)));
    }

    #[tokio::test]
    async fn search_prefers_text_when_both_are_given() {
        let mut encoder = MockEncoder::new();
        encoder
            .expect_encode_text()
            .times(1)
            .returning(|_| Ok(vec![0.5; 4]));
        encoder.expect_encode_image().times(0);

        let mut index = MockEmbeddingIndex::new();
        index.expect_search().times(1).returning(|_, _| {
            Ok(vec![ScoredPayload {
                score: 0.9,
                payload: Some(serde_json::json!({
                    "image_filename": "hit.png",
                    "prompt": "a hit",
                })),
            }])
        });

        let query = SearchImagesQuery {
            text: Some("red bicycle".to_string()),
            image: Some(vec![1, 2, 3]),
            topk: None,
        };

        let service = service(
            MockMetadataRepository::new(),
            index,
            MockImageStore::new(),
            MockGenerator::new(),
            encoder,
        );
        let results = service.search_similar(query).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].image_filename, "hit.png");
    }

    #[tokio::test]
    async fn search_skips_hits_without_payload() {
        let mut encoder = MockEncoder::new();
        encoder.expect_encode_text().returning(|_| Ok(vec![0.5; 4]));

        let mut index = MockEmbeddingIndex::new();
        index.expect_search().returning(|_, _| {
            Ok(vec![
                ScoredPayload {
                    score: 0.9,
                    payload: None,
                },
                ScoredPayload {
                    score: 0.8,
                    payload: Some(serde_json::json!({
                        "image_filename": "kept.png",
                        "prompt": "kept",
                    })),
                },
            ])
        });

        let query = SearchImagesQuery {
            text: Some("anything".to_string()),
            ..Default::default()
        };

        let service = service(
            MockMetadataRepository::new(),
            index,
            MockImageStore::new(),
            MockGenerator::new(),
            encoder,
        );
        let results = service.search_similar(query).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].image_filename, "kept.png");
    }

    #[tokio::test]
    async fn delete_continues_past_failures_and_reports_partial() {
        let mut index = MockEmbeddingIndex::new();
        index.expect_delete_by_filename().returning(|filename| {
            if filename == "b.png" {
                Err(ImagesError::Index("index unavailable".to_string()))
            } else {
                Ok(true)
            }
        });

        let mut metadata = MockMetadataRepository::new();
        metadata.expect_delete().times(1).returning(|_| Ok(true));

        let mut store = MockImageStore::new();
        store.expect_delete_image().times(1).returning(|_| Ok(true));

        let service = service(
            metadata,
            index,
            store,
            MockGenerator::new(),
            MockEncoder::new(),
        );

        let report = service
            .delete_images(DeleteImagesRequest {
                image_filenames: vec!["a.png".to_string(), "b.png".to_string()],
            })
            .await
            .unwrap();

        assert_eq!(report.status, DeleteStatus::Partial);
        assert_eq!(report.deleted_filenames, vec!["a.png"]);
        assert_eq!(report.failed_filenames, vec!["b.png"]);
    }

    #[tokio::test]
    async fn delete_reports_success_when_everything_is_removed() {
        let mut index = MockEmbeddingIndex::new();
        index.expect_delete_by_filename().returning(|_| Ok(true));

        let mut metadata = MockMetadataRepository::new();
        metadata.expect_delete().returning(|_| Ok(true));

        let mut store = MockImageStore::new();
        store.expect_delete_image().returning(|_| Ok(false));

        let service = service(
            metadata,
            index,
            store,
            MockGenerator::new(),
            MockEncoder::new(),
        );

        let report = service
            .delete_images(DeleteImagesRequest {
                image_filenames: vec!["a.png".to_string(), "b.png".to_string()],
            })
            .await
            .unwrap();

        assert_eq!(report.status, DeleteStatus::Success);
        assert_eq!(report.deleted_filenames.len(), 2);
        assert!(report.failed_filenames.is_empty());
    }

    #[tokio::test]
    async fn delete_rejects_empty_request() {
        let service = service(
            MockMetadataRepository::new(),
            MockEmbeddingIndex::new(),
            MockImageStore::new(),
            MockGenerator::new(),
            MockEncoder::new(),
        );

        let err = service
            .delete_images(DeleteImagesRequest {
                image_filenames: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ImagesError::Validation(_)));
    }
}
