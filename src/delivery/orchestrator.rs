use super::artifact::ProcessedMedia;
use super::planner::CompressionPlanner;
use super::resolver::{ChatResolver, ResolverSettings};
use super::size_gate::{classify, file_size_mb, SizeClass};
use super::transcoder::Transcoder;
use super::{DeliveryError, DeliveryOutcome, MediaJob};
use crate::config::{DeliveryPolicy, SessionConfig};
use crate::session::{ChatHandle, MediaPayload, MessagingSession, SendOptions};
use mediarelay_av::TranscodingEngine;
use mediarelay_common::{AttachmentMode, JobId};
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};

/// Runs one delivery job end to end: prepare, resolve, upload, clean up.
pub struct DeliveryOrchestrator {
    session: Arc<dyn MessagingSession>,
    planner: CompressionPlanner,
    resolver: ChatResolver,
    policy: DeliveryPolicy,
}

impl DeliveryOrchestrator {
    pub fn new(
        session: Arc<dyn MessagingSession>,
        engine: Arc<dyn TranscodingEngine>,
        policy: DeliveryPolicy,
        session_config: &SessionConfig,
    ) -> Self {
        let transcoder = Transcoder::new(engine, policy.video_preset.clone());
        let resolver = ChatResolver::new(ResolverSettings::new(session_config, &policy));
        Self {
            session,
            planner: CompressionPlanner::new(transcoder, policy.clone()),
            resolver,
            policy,
        }
    }

    /// Deliver `job`. Never fails past this boundary; errors become a
    /// failed outcome.
    pub async fn deliver(&self, job: &MediaJob) -> DeliveryOutcome {
        let job_id = JobId::new();
        let span = info_span!("delivery", %job_id);

        async {
            info!(
                file = %job.source_path.display(),
                chat = %job.recipient,
                "Received delivery job"
            );

            match self.run(job).await {
                Ok(()) => {
                    info!("File sent successfully");
                    DeliveryOutcome::delivered()
                }
                Err(e) => {
                    error!(error = %e, error_kind = e.error_kind(), "Delivery failed");
                    DeliveryOutcome::failed(&e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, job: &MediaJob) -> Result<(), DeliveryError> {
        if !self.session.is_ready() {
            return Err(DeliveryError::SessionNotReady);
        }

        let mut current = self.prepare(job).await?;
        let result = self.resolve_and_upload(job, &mut current).await;
        current.discard();
        result
    }

    /// Size gate and, when needed, the first compression pass.
    async fn prepare(&self, job: &MediaJob) -> Result<ProcessedMedia, DeliveryError> {
        let source = job.source_path.as_path();
        let (class, size_mb) = classify(source, &self.policy).await?;
        info!(size_mb, ?class, "Original file size");

        let media = match class {
            SizeClass::TooLarge => {
                return Err(DeliveryError::FileTooLarge {
                    size_mb,
                    limit_mb: self.policy.max_input_size_mb,
                })
            }
            SizeClass::Passthrough => ProcessedMedia::original(source),
            SizeClass::NeedsCompression => self
                .planner
                .compress(source, size_mb)
                .await?
                .unwrap_or_else(|| ProcessedMedia::original(source)),
        };

        if media.is_temporary() {
            let processed_mb = file_size_mb(media.path()).await?;
            info!(size_mb = processed_mb, "Processed file size");
        }
        Ok(media)
    }

    async fn resolve_and_upload(
        &self,
        job: &MediaJob,
        current: &mut ProcessedMedia,
    ) -> Result<(), DeliveryError> {
        let chat = match self
            .resolver
            .resolve(self.session.as_ref(), &job.recipient)
            .await
        {
            Ok(chat) => chat,
            Err(DeliveryError::SessionCrashed(e)) => {
                self.session.mark_crashed(&e.to_string());
                return Err(DeliveryError::SessionCrashed(e));
            }
            Err(e) => return Err(e),
        };

        self.upload(&chat, current, &job.caption).await
    }

    async fn upload(
        &self,
        chat: &ChatHandle,
        current: &mut ProcessedMedia,
        caption: &str,
    ) -> Result<(), DeliveryError> {
        let attempts = self.policy.upload_attempts.max(1);
        let mut attempt = 1;

        loop {
            if !self.session.is_ready() {
                return Err(DeliveryError::SessionNotReady);
            }

            match self.upload_attempt(chat, current, caption, attempt).await {
                Ok(()) => return Ok(()),
                Err(DeliveryError::SessionCrashed(e)) => {
                    warn!(
                        attempt,
                        error = %e,
                        signature = e.signature(),
                        "Browser crashed, skipping retry"
                    );
                    self.session.mark_crashed(&e.to_string());
                    return Err(DeliveryError::SessionCrashed(e));
                }
                Err(DeliveryError::SessionNotReady) => return Err(DeliveryError::SessionNotReady),
                Err(e @ DeliveryError::Io { .. }) => {
                    error!(attempt, error = %e, "Media file unreadable, not retrying");
                    return Err(e);
                }
                Err(e) if attempt >= attempts => {
                    error!(attempts, error = %e, "All upload attempts failed");
                    return Err(e);
                }
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "Upload attempt failed");
                    tokio::time::sleep(self.policy.upload_retry_delay()).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn upload_attempt(
        &self,
        chat: &ChatHandle,
        current: &mut ProcessedMedia,
        caption: &str,
        attempt: u32,
    ) -> Result<(), DeliveryError> {
        let size_mb = file_size_mb(current.path()).await?;

        if attempt > 1 && size_mb > self.policy.no_compression_limit_mb {
            info!(size_mb, attempt, "File still too large after failed upload, compressing more");
            if let Some(next) = self.planner.compress(current.path(), size_mb).await? {
                let previous = std::mem::replace(current, next);
                previous.discard();
            }
        }

        let media = MediaPayload::from_path(current.path());
        let mode = AttachmentMode::for_mime(&media.mimetype);
        let options = SendOptions {
            caption: caption.to_string(),
            send_as_document: mode.is_document(),
        };

        info!(
            chat_id = chat.id(),
            attempt,
            file = %media.filename,
            mimetype = %media.mimetype,
            %mode,
            "Uploading"
        );

        self.session
            .send_message(chat, &media, &options)
            .await
            .map_err(DeliveryError::from)
    }
}
