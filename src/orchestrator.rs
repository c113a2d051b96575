use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use rand::Rng;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{ApiKey, ClientConfig};
use crate::error::{AttemptError, Result, StudioError};
use crate::media::{GeneratedImage, SourceImage};
use crate::prompts::build_prompt;
use crate::providers::{BatchPayload, GenerationRequest, ImageTransport};
use crate::settings::StudioSettings;

const SEED_RANGE: u32 = 10_000_000;

/// Lifecycle of one batch. Terminal states are `Succeeded` and `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
    Idle,
    Dispatched,
    AwaitingAll,
    Succeeded,
    Failed,
}

/// Settled result of one attempt.
#[derive(Debug)]
pub struct AttemptOutcome {
    pub index: usize,
    pub seed: u32,
    pub result: std::result::Result<GeneratedImage, AttemptError>,
}

/// Successful images in dispatch order, plus how many attempts were asked for.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub images: Vec<GeneratedImage>,
    pub requested: usize,
}

impl BatchReport {
    /// Attempts that produced nothing.
    pub fn dropped(&self) -> usize {
        self.requested - self.images.len()
    }
}

/// Turns one image + settings into `count` concurrent, best-effort generation
/// attempts. Holds only read-only configuration; safe to share and to call
/// concurrently.
#[derive(Clone)]
pub struct VariationOrchestrator {
    transport: Arc<dyn ImageTransport>,
    config: ClientConfig,
}

impl VariationOrchestrator {
    pub fn new(transport: Arc<dyn ImageTransport>, config: ClientConfig) -> Self {
        Self { transport, config }
    }

    pub fn provider_name(&self) -> &'static str {
        self.transport.name()
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Non-empty list of images ordered by attempt index, or an aggregate
    /// failure when every attempt came back empty.
    pub async fn generate_variations(
        &self,
        image: &SourceImage,
        settings: &StudioSettings,
        count: usize,
    ) -> Result<Vec<GeneratedImage>> {
        self.generate_batch(image, settings, count).await.map(|r| r.images)
    }

    /// Like [`generate_variations`](Self::generate_variations) but keeps the
    /// attempt accounting.
    pub async fn generate_batch(
        &self,
        image: &SourceImage,
        settings: &StudioSettings,
        count: usize,
    ) -> Result<BatchReport> {
        if count == 0 {
            return Err(StudioError::InvalidCount(count));
        }
        let key: ApiKey = self.config.require_key()?.clone();
        if image.bytes().is_empty() {
            return Err(StudioError::InvalidImage("image payload is empty".into()));
        }

        let batch_id = Uuid::new_v4();
        debug!(%batch_id, phase = ?BatchPhase::Idle, count, "batch requested");
        let payload = Arc::new(BatchPayload {
            model: self.config.model.clone(),
            prompt: build_prompt(settings),
            mime_type: image.mime_type().to_string(),
            image_base64: image.to_base64(),
        });
        let seeds = derive_seeds(count, &mut rand::rng());
        debug!(%batch_id, prompt = %payload.prompt, "prompt built");

        let mut joinset = JoinSet::new();
        for (index, &seed) in seeds.iter().enumerate() {
            let request = GenerationRequest {
                attempt: index,
                seed,
                aspect_ratio: settings.aspect_ratio,
                payload: payload.clone(),
            };
            let transport = self.transport.clone();
            let key = key.clone();
            joinset.spawn(async move {
                let result = run_attempt(transport.as_ref(), &key, &request).await;
                (index, result)
            });
        }
        info!(
            %batch_id,
            provider = self.transport.name(),
            preset = %settings.preset(),
            aspect_ratio = %settings.aspect_ratio,
            count,
            phase = ?BatchPhase::Dispatched,
            "batch dispatched"
        );

        debug!(%batch_id, phase = ?BatchPhase::AwaitingAll, "waiting for attempts");
        let mut slots: Vec<Option<std::result::Result<GeneratedImage, AttemptError>>> =
            (0..count).map(|_| None).collect();
        // A task that panicked leaves its slot empty; the reducer logs it once.
        while let Some(joined) = joinset.join_next().await {
            if let Ok((index, result)) = joined {
                slots[index] = Some(result);
            }
        }

        let outcomes = slots
            .into_iter()
            .zip(seeds)
            .enumerate()
            .map(|(index, (slot, seed))| AttemptOutcome {
                index,
                seed,
                result: slot.unwrap_or_else(|| Err(AttemptError::Aborted("task panicked or was cancelled".into()))),
            })
            .collect();

        reduce_attempts(batch_id, count, outcomes)
    }
}

/// Seed for attempt `i` is `r_i * count + i` with `r_i` drawn independently,
/// so seeds in one batch never collide.
pub fn derive_seeds<R: Rng>(count: usize, rng: &mut R) -> Vec<u32> {
    let n = count.max(1) as u32;
    let range = SEED_RANGE.min(i32::MAX as u32 / n).max(1);
    (0..n).map(|i| rng.random_range(0..range) * n + i).collect()
}

async fn run_attempt(
    transport: &dyn ImageTransport,
    key: &ApiKey,
    request: &GenerationRequest,
) -> std::result::Result<GeneratedImage, AttemptError> {
    let resp = transport.generate(key, request).await?;
    let Some((mime_type, data)) = resp.first_image() else {
        return Err(AttemptError::NoImage { text: resp.joined_text() });
    };
    let bytes = STANDARD.decode(data.trim()).map_err(|e| AttemptError::BadPayload(e.to_string()))?;
    if bytes.is_empty() {
        return Err(AttemptError::BadPayload("image part is empty".into()));
    }
    let mime_type = if mime_type.is_empty() { "image/png" } else { mime_type };
    Ok(GeneratedImage {
        id: format!("gen-{}-{}", Utc::now().timestamp_millis(), request.attempt),
        bytes,
        mime_type: mime_type.to_string(),
        seed: request.seed,
    })
}

/// Keep successful attempts in dispatch order. Failures are logged and
/// dropped; only an all-failed batch is an error.
pub fn reduce_attempts(batch_id: Uuid, requested: usize, mut outcomes: Vec<AttemptOutcome>) -> Result<BatchReport> {
    outcomes.sort_by_key(|o| o.index);

    let mut images = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        match outcome.result {
            Ok(img) => images.push(img),
            Err(AttemptError::NoImage { text }) => warn!(
                %batch_id,
                attempt = outcome.index,
                seed = outcome.seed,
                text = text.as_deref().unwrap_or(""),
                "attempt returned text instead of image"
            ),
            Err(e) => error!(%batch_id, attempt = outcome.index, seed = outcome.seed, "generation failed for variation: {e}"),
        }
    }

    if images.is_empty() {
        error!(%batch_id, requested, phase = ?BatchPhase::Failed, "no attempt produced an image");
        return Err(StudioError::AllAttemptsFailed { attempts: requested });
    }

    info!(%batch_id, produced = images.len(), requested, phase = ?BatchPhase::Succeeded, "batch settled");
    Ok(BatchReport { batch_id, images, requested })
}
