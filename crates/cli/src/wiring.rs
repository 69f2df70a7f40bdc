//! Builds the pipeline components from settings and secrets

use std::sync::Arc;

use services::services::{
    config::{Secrets, Settings},
    content::{ContentGenerator, GenerationParams, HuggingFaceBackend},
    editron::{CardRenderer, FFmpegClient, ReelStyle, VideoAssembler},
    idea::IdeaDigest,
    notify::{Notifier, TelegramChannel},
    pipeline::{DailyRun, PostingPolicy, RunComponents, RunOptions},
    social::{InstagramConnector, Publisher},
    speech::{EdgeTtsEngine, SpeechSynthesizer},
    storage::{AssetUploader, CloudinaryStore},
};

fn notifier(secrets: &Secrets, client: &reqwest::Client) -> Notifier {
    Notifier::new(Arc::new(TelegramChannel::new(
        client.clone(),
        secrets.telegram_bot_token.clone(),
        secrets.telegram_chat_id.clone(),
    )))
}

fn text_backend(settings: &Settings, secrets: &Secrets, client: &reqwest::Client) -> Arc<HuggingFaceBackend> {
    Arc::new(HuggingFaceBackend::new(
        client.clone(),
        settings.generation.endpoint.clone(),
        secrets.hf_model_id.clone(),
        secrets.huggingface_token.clone(),
    ))
}

pub fn daily_run(settings: &Settings, secrets: &Secrets, client: reqwest::Client) -> DailyRun {
    let notifier = notifier(secrets, &client);
    let media = &settings.media;

    let encoder = Arc::new(FFmpegClient::new(
        &media.ffmpeg_path,
        &media.ffprobe_path,
        settings.timeouts.subprocess(),
    ));

    let parts = RunComponents {
        generator: ContentGenerator::new(
            text_backend(settings, secrets, &client),
            GenerationParams::from(&settings.generation),
            settings.generation.min_chars,
        ),
        speech: SpeechSynthesizer::new(
            Arc::new(EdgeTtsEngine::new(
                settings.speech.command.clone(),
                settings.timeouts.subprocess(),
            )),
            settings.speech.voice.clone(),
            notifier.clone(),
        ),
        assembler: VideoAssembler::new(
            encoder.clone(),
            ReelStyle::vertical(media.font_path.clone()),
            notifier.clone(),
        ),
        cards: CardRenderer::new(
            encoder,
            media.font_path.clone(),
            media.card_overflow,
            notifier.clone(),
        ),
        uploader: AssetUploader::new(
            Arc::new(CloudinaryStore::new(
                client.clone(),
                secrets.cloudinary_cloud_name.clone(),
                secrets.cloudinary_api_key.clone(),
                secrets.cloudinary_api_secret.clone(),
            )),
            notifier.clone(),
            settings.keep_local_media,
        ),
        publisher: Publisher::new(
            Arc::new(InstagramConnector::new(
                client,
                settings.platform.graph_api_base.clone(),
                secrets.instagram_business_id.clone(),
                secrets.instagram_access_token.clone(),
            )),
            notifier.clone(),
        ),
        notifier,
    };

    DailyRun::new(
        parts,
        RunOptions {
            schedule_path: settings.schedule_path.clone(),
            work_dir: settings.work_dir.clone(),
            keep_local_media: settings.keep_local_media,
            posting: PostingPolicy {
                min_interval: settings.posting.min_interval(),
            },
        },
    )
}

pub fn idea_digest(settings: &Settings, secrets: &Secrets, client: reqwest::Client) -> IdeaDigest {
    IdeaDigest::new(
        text_backend(settings, secrets, &client),
        GenerationParams::from(&settings.generation),
        notifier(secrets, &client),
    )
}
