//! Public send operations.
//!
//! Every operation runs as one item on a category queue: videos on the
//! video queue, images on the image queue, everything else (voice and files
//! included) on the text queue. Media is fetched and converted inside the
//! queued item, so its failures reach the caller like gateway failures do.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use {
    base64::{Engine, engine::general_purpose::STANDARD},
    courier_config::CourierConfig,
    courier_media::{
        AudioProcessor, MediaFetcher, MediaKind, MediaSource, UploadBudget, VideoExtractor,
        VideoProcessor, image_ops,
    },
    courier_queue::Dispatcher,
    serde::Serialize,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use courier_metrics::{counter, histogram, labels, send as send_metrics};

use crate::{
    appmsg::{self, MusicCard, RichLink},
    error::{Error, Result},
    gateway::{Endpoint, GatewayClient, GatewayResponse},
    http::HttpGateway,
    payload::{
        APP_MESSAGE_TYPE, SendApp, SendCdnFile, SendText, SendVideo, SendVoice, ShareCard,
        UploadFile, UploadImage, UploadedFile,
    },
};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

struct Inner {
    gateway: Arc<dyn GatewayClient>,
    fetcher: MediaFetcher,
    video: Arc<dyn VideoExtractor>,
    audio: AudioProcessor,
    upload_budget: UploadBudget,
    voice_pause: Duration,
}

impl Inner {
    /// `size 1.50 MB, expected upload time 6 s`
    fn video_budget(&self, len: usize) -> String {
        format!(
            "size {:.2} MB, expected upload time {} s",
            len as f64 / BYTES_PER_MB,
            self.upload_budget.expected_secs(len)
        )
    }

    async fn call<P: Serialize>(
        &self,
        endpoint: Endpoint,
        payload: &P,
        timeout: Option<Duration>,
    ) -> Result<GatewayResponse> {
        let payload = serde_json::to_value(payload)?;
        #[cfg(feature = "metrics")]
        let started = std::time::Instant::now();
        let result = self.gateway.call(endpoint, payload, timeout).await;
        #[cfg(feature = "metrics")]
        {
            let success = matches!(&result, Ok(resp) if resp.success);
            counter!(send_metrics::REQUESTS_TOTAL, labels::ENDPOINT => endpoint.as_str())
                .increment(1);
            if !success {
                counter!(send_metrics::ERRORS_TOTAL, labels::ENDPOINT => endpoint.as_str())
                    .increment(1);
            }
            histogram!(
                send_metrics::DURATION_SECONDS,
                labels::ENDPOINT => endpoint.as_str(),
                labels::SUCCESS => if success { "true" } else { "false" }
            )
            .record(started.elapsed().as_secs_f64());
        }
        let resp = result?;
        if resp.success {
            debug!(%endpoint, "gateway accepted request");
        } else {
            warn!(%endpoint, message = ?resp.message, code = %resp.code, "gateway rejected request");
        }
        Ok(resp)
    }

    async fn upload_file(&self, path: &Path, from: &str) -> Result<UploadedFile> {
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(courier_media::Error::not_found(path).into());
            },
            Err(e) => return Err(courier_media::Error::from(e).into()),
        };
        debug!(path = %path.display(), bytes = data.len(), "uploading file");

        let payload = UploadFile {
            base64: STANDARD.encode(&data),
            wxid: from,
        };
        let resp = self
            .call(Endpoint::UploadFile, &payload, None)
            .await
            .map_err(|e| Error::upload(e.to_string()))?;
        let uploaded = UploadedFile::from_response(&resp)?;
        info!(
            path = %path.display(),
            media_id = %uploaded.media_id,
            total_len = uploaded.total_len,
            "file uploaded"
        );
        Ok(uploaded)
    }
}

/// Sends messages through the gateway, one category queue per media kind.
///
/// Each service owns its queues; [`MessageService::close`] drains them.
#[derive(Clone)]
pub struct MessageService {
    inner: Arc<Inner>,
    dispatcher: Arc<Dispatcher>,
}

impl MessageService {
    /// Build a service over an HTTP gateway at `config.gateway.base_url`.
    pub fn http(config: &CourierConfig) -> Result<Self> {
        Self::new(Arc::new(HttpGateway::new(&config.gateway)?), config)
    }

    pub fn new(gateway: Arc<dyn GatewayClient>, config: &CourierConfig) -> Result<Self> {
        Self::with_audio(gateway, config, AudioProcessor::new(&config.media))
    }

    /// Like [`MessageService::new`] with a custom voice pipeline.
    pub fn with_audio(
        gateway: Arc<dyn GatewayClient>,
        config: &CourierConfig,
        audio: AudioProcessor,
    ) -> Result<Self> {
        let video = Arc::new(VideoProcessor::new(&config.media));
        Self::with_media(gateway, config, audio, video)
    }

    /// Like [`MessageService::new`] with custom voice and video pipelines.
    pub fn with_media(
        gateway: Arc<dyn GatewayClient>,
        config: &CourierConfig,
        audio: AudioProcessor,
        video: Arc<dyn VideoExtractor>,
    ) -> Result<Self> {
        let media = &config.media;
        Ok(Self {
            inner: Arc::new(Inner {
                gateway,
                fetcher: MediaFetcher::new(media)?,
                video,
                audio,
                upload_budget: UploadBudget::from_config(media),
                voice_pause: Duration::from_millis(media.voice_segment_pause_ms),
            }),
            dispatcher: Arc::new(Dispatcher::new(&config.queues)),
        })
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Send a text message. `msg_type` is passed through as `Type`.
    pub async fn send_text(
        &self,
        content: &str,
        to: &str,
        from: &str,
        msg_type: i32,
    ) -> Result<GatewayResponse> {
        let inner = Arc::clone(&self.inner);
        let (content, to, from) = (content.to_owned(), to.to_owned(), from.to_owned());
        self.dispatcher
            .text()
            .submit(move || async move {
                let payload = SendText {
                    at: "",
                    content: &content,
                    to_wxid: &to,
                    msg_type,
                    wxid: &from,
                };
                let resp = inner.call(Endpoint::SendText, &payload, None).await?;
                info!(to = %to, chars = content.chars().count(), "text sent");
                Ok(resp)
            })
            .await
    }

    /// Send an image, converting it to JPEG unless it already is JPEG or PNG.
    pub async fn send_image(
        &self,
        source: impl Into<MediaSource>,
        to: &str,
        from: &str,
    ) -> Result<GatewayResponse> {
        let inner = Arc::clone(&self.inner);
        let source = source.into();
        let (to, from) = (to.to_owned(), from.to_owned());
        self.dispatcher
            .image()
            .submit(move || async move {
                let fetched = inner.fetcher.resolve(&source, MediaKind::Image).await?;
                let hint = image_ops::hint_for(&fetched, &source);
                let bytes = fetched.bytes;
                let image = tokio::task::spawn_blocking(move || {
                    image_ops::normalize(bytes, hint.as_deref())
                })
                .await
                .map_err(|e| courier_media::Error::external("image conversion task failed", e))??;

                let payload = UploadImage {
                    wxid: &from,
                    to_wxid: &to,
                    base64: STANDARD.encode(&image),
                };
                let resp = inner.call(Endpoint::UploadImage, &payload, None).await?;
                info!(to = %to, source = %source.describe(), bytes = image.len(), "image sent");
                Ok(resp)
            })
            .await
    }

    /// Send a video with its first-frame thumbnail and duration.
    ///
    /// The upload timeout grows with the file size.
    pub async fn send_video(
        &self,
        source: impl Into<MediaSource>,
        to: &str,
        from: &str,
    ) -> Result<GatewayResponse> {
        let inner = Arc::clone(&self.inner);
        let source = source.into();
        let (to, from) = (to.to_owned(), from.to_owned());
        self.dispatcher
            .video()
            .submit(move || async move {
                let local = inner
                    .fetcher
                    .materialize(&source, MediaKind::Video)
                    .await
                    .map_err(|e| {
                        Error::validation(format!(
                            "could not fetch video {}: {e}",
                            source.describe()
                        ))
                    })?;
                let len = local.bytes().len();
                let info = inner.video.extract(local.path(), local.bytes().clone()).await;
                let Some(data) = info.data else {
                    return Err(Error::validation(format!(
                        "could not read video {} ({})",
                        source.describe(),
                        inner.video_budget(len)
                    )));
                };

                let timeout = inner.upload_budget.timeout(len);
                info!(
                    to = %to,
                    size_mb = %format!("{:.2}", len as f64 / BYTES_PER_MB),
                    expected_secs = inner.upload_budget.expected_secs(len),
                    timeout_secs = timeout.as_secs(),
                    "sending video"
                );

                let payload = SendVideo {
                    wxid: &from,
                    to_wxid: &to,
                    base64: STANDARD.encode(&data),
                    image_base64: info.thumbnail.unwrap_or_default(),
                    play_length: info.duration_secs.unwrap_or(0),
                };
                inner
                    .call(Endpoint::SendVideo, &payload, Some(timeout))
                    .await
                    .map_err(|e| {
                        Error::gateway(
                            Endpoint::SendVideo.as_str(),
                            format!("{e} ({})", inner.video_budget(len)),
                        )
                    })
            })
            .await
    }

    /// Send a voice note, split into several messages when it is long.
    ///
    /// Returns one response per segment, in order; check each of them.
    pub async fn send_voice(
        &self,
        source: impl Into<MediaSource>,
        to: &str,
        from: &str,
    ) -> Result<Vec<GatewayResponse>> {
        let inner = Arc::clone(&self.inner);
        let source = source.into();
        let (to, from) = (to.to_owned(), from.to_owned());
        self.dispatcher
            .text()
            .submit(move || async move {
                let segments = inner.audio.process(&inner.fetcher, &source).await?;
                let total = segments.len();
                let mut responses = Vec::with_capacity(total);

                for (i, segment) in segments.iter().enumerate() {
                    if total > 1 {
                        debug!(segment = i + 1, total, "sending voice segment");
                    }
                    let payload = SendVoice {
                        wxid: &from,
                        to_wxid: &to,
                        base64: &segment.payload,
                        voice_time: segment.duration_ms,
                        codec: segment.codec.code(),
                    };
                    let resp = inner.call(Endpoint::SendVoice, &payload, None).await?;
                    if resp.success {
                        info!(to = %to, duration_ms = segment.duration_ms, "voice sent");
                    }
                    responses.push(resp);

                    if i + 1 < total {
                        tokio::time::sleep(inner.voice_pause).await;
                    }
                }
                Ok(responses)
            })
            .await
    }

    /// Upload a local file to the gateway's CDN.
    pub async fn upload_file(&self, path: impl AsRef<Path>, from: &str) -> Result<UploadedFile> {
        self.inner.upload_file(path.as_ref(), from).await
    }

    /// Upload a local file and send it as an attachment.
    pub async fn send_file(
        &self,
        path: impl Into<PathBuf>,
        to: &str,
        from: &str,
    ) -> Result<GatewayResponse> {
        let inner = Arc::clone(&self.inner);
        let path = path.into();
        let (to, from) = (to.to_owned(), from.to_owned());
        self.dispatcher
            .text()
            .submit(move || async move {
                let uploaded = inner.upload_file(&path, &from).await?;
                let (name, ext) = appmsg::file_name_parts(&path);
                let payload = SendCdnFile {
                    wxid: &from,
                    to_wxid: &to,
                    content: appmsg::file_xml(&name, &ext, &uploaded),
                };
                let resp = inner.call(Endpoint::SendCdnFile, &payload, None).await?;
                info!(to = %to, file = %name, "file sent");
                Ok(resp)
            })
            .await
    }

    pub async fn send_music(&self, card: MusicCard, to: &str, from: &str) -> Result<GatewayResponse> {
        let xml = appmsg::music_xml(&card, from);
        self.send_xml(&xml, APP_MESSAGE_TYPE, to, from).await
    }

    pub async fn send_rich(&self, link: RichLink, to: &str, from: &str) -> Result<GatewayResponse> {
        let xml = appmsg::rich_xml(&link);
        self.send_xml(&xml, APP_MESSAGE_TYPE, to, from).await
    }

    /// Send a raw app-message body. The XML is passed through untouched.
    pub async fn send_xml(
        &self,
        xml: &str,
        msg_type: i32,
        to: &str,
        from: &str,
    ) -> Result<GatewayResponse> {
        let inner = Arc::clone(&self.inner);
        let (xml, to, from) = (xml.to_owned(), to.to_owned(), from.to_owned());
        self.dispatcher
            .text()
            .submit(move || async move {
                let payload = SendApp {
                    wxid: &from,
                    to_wxid: &to,
                    xml,
                    msg_type,
                };
                inner.call(Endpoint::SendApp, &payload, None).await
            })
            .await
    }

    /// Share the contact `card_wxid` with `to`.
    pub async fn send_card(
        &self,
        card_wxid: &str,
        nickname: &str,
        to: &str,
        from: &str,
    ) -> Result<GatewayResponse> {
        let inner = Arc::clone(&self.inner);
        let (card_wxid, nickname, to, from) = (
            card_wxid.to_owned(),
            nickname.to_owned(),
            to.to_owned(),
            from.to_owned(),
        );
        self.dispatcher
            .text()
            .submit(move || async move {
                let payload = ShareCard {
                    wxid: &from,
                    to_wxid: &to,
                    card_wxid: &card_wxid,
                    card_nickname: &nickname,
                    card_alias: "",
                };
                inner.call(Endpoint::ShareCard, &payload, None).await
            })
            .await
    }

    /// Wait for every queued send to finish, then stop the workers.
    ///
    /// The service stays usable; later sends start fresh workers.
    pub async fn close(&self) {
        self.dispatcher.drain_and_stop().await;
    }
}
