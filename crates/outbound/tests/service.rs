#![allow(clippy::unwrap_used, clippy::expect_used)]
//! `MessageService` against a recording in-memory gateway.

use std::{
    io::Cursor,
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    async_trait::async_trait,
    base64::{Engine, engine::general_purpose::STANDARD},
    bytes::Bytes,
    courier_config::CourierConfig,
    courier_media::{AudioProcessor, MediaSource, VideoExtractor, VideoInfo, VoiceEncoder},
    courier_outbound::{
        Endpoint, Error, GatewayClient, GatewayResponse, MessageService, MusicCard, RichLink,
    },
    serde_json::{Value, json},
    tokio::time::Instant,
};

type Responder = dyn Fn(Endpoint, &Value) -> courier_outbound::Result<GatewayResponse> + Send + Sync;

#[derive(Debug, Clone)]
struct Call {
    endpoint: Endpoint,
    payload: Value,
    timeout: Option<Duration>,
    at: Instant,
}

struct FakeGateway {
    calls: Mutex<Vec<Call>>,
    respond: Box<Responder>,
}

impl FakeGateway {
    fn ok() -> Arc<Self> {
        Self::with(|_, _| Ok(GatewayResponse::ok(Value::Null)))
    }

    fn with(
        respond: impl Fn(Endpoint, &Value) -> courier_outbound::Result<GatewayResponse>
        + Send
        + Sync
        + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        })
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GatewayClient for FakeGateway {
    async fn call(
        &self,
        endpoint: Endpoint,
        payload: Value,
        timeout: Option<Duration>,
    ) -> courier_outbound::Result<GatewayResponse> {
        let result = (self.respond)(endpoint, &payload);
        self.calls.lock().unwrap().push(Call {
            endpoint,
            payload,
            timeout,
            at: Instant::now(),
        });
        result
    }
}

/// Passes PCM through so tests can measure what would have been encoded.
struct PassthroughEncoder;

impl VoiceEncoder for PassthroughEncoder {
    fn encode(&self, pcm: &[u8], _sample_rate: u32) -> courier_media::Result<Vec<u8>> {
        Ok(pcm.to_vec())
    }
}

/// Reports a fixed thumbnail and duration, or nothing when `duration_secs`
/// is `None`.
struct FixedVideo {
    duration_secs: Option<u64>,
}

#[async_trait]
impl VideoExtractor for FixedVideo {
    async fn extract(&self, _path: &Path, data: Bytes) -> VideoInfo {
        match self.duration_secs {
            Some(secs) => VideoInfo {
                thumbnail: Some("data:image/jpeg;base64,/9j/".into()),
                data: Some(data),
                duration_secs: Some(secs),
            },
            None => VideoInfo::empty(),
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Near-zero queue delays for tests that don't measure pacing.
fn fast_config() -> CourierConfig {
    let mut config = CourierConfig::default();
    config.queues.text_delay_ms = 1;
    config.queues.video_delay_ms = 1;
    config.queues.image_delay_min_ms = 1;
    config.queues.image_delay_max_ms = 2;
    config.media.voice_segment_pause_ms = 200;
    config
}

fn service(gateway: &Arc<FakeGateway>, config: &CourierConfig) -> MessageService {
    init_tracing();
    let audio = AudioProcessor::new(&config.media).with_encoder(Arc::new(PassthroughEncoder));
    MessageService::with_audio(Arc::clone(gateway) as Arc<dyn GatewayClient>, config, audio)
        .unwrap()
}

fn video_service(
    gateway: &Arc<FakeGateway>,
    config: &CourierConfig,
    duration_secs: Option<u64>,
) -> MessageService {
    init_tracing();
    let audio = AudioProcessor::new(&config.media).with_encoder(Arc::new(PassthroughEncoder));
    MessageService::with_media(
        Arc::clone(gateway) as Arc<dyn GatewayClient>,
        config,
        audio,
        Arc::new(FixedVideo { duration_secs }),
    )
    .unwrap()
}

fn wav(ms: u64, rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut out = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut out, spec).unwrap();
    for i in 0..u64::from(rate) * ms / 1000 {
        writer.write_sample(((i % 100) as i16 - 50) * 100).unwrap();
    }
    writer.finalize().unwrap();
    out.into_inner()
}

fn encoded_image(format: image::ImageFormat) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        6,
        4,
        image::Rgb([200, 20, 90]),
    ));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).unwrap();
    out.into_inner()
}

#[tokio::test(start_paused = true)]
async fn texts_are_sent_in_order_one_second_apart() {
    let gateway = FakeGateway::ok();
    let svc = service(&gateway, &CourierConfig::default());

    let (a, b, c) = tokio::join!(
        svc.send_text("first", "friend", "bot", 0),
        svc.send_text("second", "friend", "bot", 0),
        svc.send_text("third", "friend", "bot", 1),
    );
    assert!(a.unwrap().success && b.unwrap().success && c.unwrap().success);

    let calls = gateway.calls();
    let contents: Vec<_> = calls.iter().map(|c| c.payload["Content"].clone()).collect();
    assert_eq!(contents, vec![json!("first"), json!("second"), json!("third")]);
    for pair in calls.windows(2) {
        assert!(pair[1].at - pair[0].at >= Duration::from_secs(1));
    }
    assert_eq!(
        calls[2].payload,
        json!({"At": "", "Content": "third", "ToWxid": "friend", "Type": 1, "Wxid": "bot"})
    );
    assert_eq!(calls[0].endpoint, Endpoint::SendText);
    assert_eq!(calls[0].timeout, None);
}

#[tokio::test(start_paused = true)]
async fn card_and_app_messages_share_the_text_queue() {
    let gateway = FakeGateway::ok();
    let svc = service(&gateway, &CourierConfig::default());

    let (card, xml) = tokio::join!(
        svc.send_card("alice", "Alice", "friend", "bot"),
        svc.send_xml("<appmsg/>", 33, "friend", "bot"),
    );
    card.unwrap();
    xml.unwrap();

    let calls = gateway.calls();
    assert_eq!(calls[0].endpoint, Endpoint::ShareCard);
    assert_eq!(
        calls[0].payload,
        json!({"Wxid": "bot", "ToWxid": "friend", "CardWxId": "alice", "CardNickName": "Alice", "CardAlias": ""})
    );
    assert_eq!(calls[1].endpoint, Endpoint::SendApp);
    assert_eq!(
        calls[1].payload,
        json!({"Wxid": "bot", "ToWxid": "friend", "Xml": "<appmsg/>", "Type": 33})
    );
    assert!(calls[1].at - calls[0].at >= Duration::from_secs(1));
}

#[tokio::test]
async fn music_and_rich_cards_are_type_five_app_messages() {
    let gateway = FakeGateway::ok();
    let svc = service(&gateway, &fast_config());

    svc.send_music(
        MusicCard {
            title: "Song".into(),
            singer: "Band".into(),
            url: "https://music.example.com/1".into(),
            music_url: "https://cdn.example.com/1.mp3".into(),
            cover_url: "https://cdn.example.com/1.jpg".into(),
            lyric: String::new(),
        },
        "friend",
        "bot",
    )
    .await
    .unwrap();
    svc.send_rich(
        RichLink {
            title: "Q&A".into(),
            description: "desc".into(),
            url: "https://example.com".into(),
            thumb_url: String::new(),
        },
        "friend",
        "bot",
    )
    .await
    .unwrap();

    let calls = gateway.calls();
    assert!(calls.iter().all(|c| c.endpoint == Endpoint::SendApp));
    assert!(calls.iter().all(|c| c.payload["Type"] == 5));
    let music = calls[0].payload["Xml"].as_str().unwrap();
    assert!(music.contains("<type>3</type>"));
    assert!(music.contains("<fromusername>bot</fromusername>"));
    let rich = calls[1].payload["Xml"].as_str().unwrap();
    assert!(rich.contains("<title>Q&amp;A</title>"));
}

#[tokio::test]
async fn failed_item_does_not_stop_the_queue() {
    let gateway = FakeGateway::with(|_, payload| {
        if payload["Content"] == "boom" {
            Err(Error::gateway(Endpoint::SendText.as_str(), "connection reset"))
        } else {
            Ok(GatewayResponse::ok(Value::Null))
        }
    });
    let svc = service(&gateway, &fast_config());

    let (a, b) = tokio::join!(
        svc.send_text("boom", "friend", "bot", 0),
        svc.send_text("fine", "friend", "bot", 0),
    );
    assert!(matches!(a.unwrap_err(), Error::Gateway { .. }));
    assert!(b.unwrap().success);
    assert_eq!(gateway.calls().len(), 2);
}

#[tokio::test]
async fn gif_images_are_uploaded_as_jpeg() {
    let gateway = FakeGateway::ok();
    let svc = service(&gateway, &fast_config());

    svc.send_image(encoded_image(image::ImageFormat::Gif), "friend", "bot")
        .await
        .unwrap();

    let calls = gateway.calls();
    assert_eq!(calls[0].endpoint, Endpoint::UploadImage);
    assert_eq!(calls[0].payload["Wxid"], "bot");
    assert_eq!(calls[0].payload["ToWxid"], "friend");
    let sent = STANDARD
        .decode(calls[0].payload["base64"].as_str().unwrap())
        .unwrap();
    assert_eq!(image::guess_format(&sent).unwrap(), image::ImageFormat::Jpeg);
}

#[tokio::test]
async fn png_files_are_uploaded_unchanged() {
    let gateway = FakeGateway::ok();
    let svc = service(&gateway, &fast_config());

    let png = encoded_image(image::ImageFormat::Png);
    let file = tempfile::NamedTempFile::with_suffix(".png").unwrap();
    std::fs::write(file.path(), &png).unwrap();

    svc.send_image(file.path(), "friend", "bot").await.unwrap();

    let sent = gateway.calls()[0].payload["base64"].as_str().unwrap().to_string();
    assert_eq!(STANDARD.decode(sent).unwrap(), png);
}

#[tokio::test]
async fn missing_image_fails_without_calling_gateway() {
    let gateway = FakeGateway::ok();
    let svc = service(&gateway, &fast_config());

    let err = svc
        .send_image("/no/such/picture.jpg", "friend", "bot")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Media(courier_media::Error::NotFound { .. })
    ));
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn unreadable_video_is_rejected_with_size_estimate() {
    let gateway = FakeGateway::ok();
    let svc = video_service(&gateway, &fast_config(), None);

    let err = svc
        .send_video(MediaSource::from(vec![0u8; 2 * 1024 * 1024]), "friend", "bot")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
    let msg = err.to_string();
    assert!(msg.contains("2.00 MB"), "{msg}");
    assert!(msg.contains("expected upload time 7 s"), "{msg}");
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn garbage_video_is_rejected_by_the_default_extractor() {
    let gateway = FakeGateway::ok();
    let svc = service(&gateway, &fast_config());

    let err = svc
        .send_video(MediaSource::from(b"not a video".to_vec()), "friend", "bot")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn video_is_sent_with_thumbnail_duration_and_scaled_timeout() {
    let gateway = FakeGateway::ok();
    let svc = video_service(&gateway, &fast_config(), Some(12));

    let clip = vec![7u8; 600 * 1024];
    svc.send_video(MediaSource::from(clip.clone()), "friend", "bot")
        .await
        .unwrap();

    let calls = gateway.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].endpoint, Endpoint::SendVideo);
    assert_eq!(calls[0].timeout, Some(Duration::from_secs(2 + 90)));
    assert_eq!(
        calls[0].payload,
        json!({
            "Wxid": "bot",
            "ToWxid": "friend",
            "base64": STANDARD.encode(&clip),
            "ImageBase64": "data:image/jpeg;base64,/9j/",
            "PlayLength": 12,
        })
    );
}

#[tokio::test]
async fn failed_video_call_reports_size_and_estimate() {
    let gateway = FakeGateway::with(|_, _| {
        Err(Error::gateway(Endpoint::SendVideo.as_str(), "timed out"))
    });
    let svc = video_service(&gateway, &fast_config(), Some(3));

    let err = svc
        .send_video(MediaSource::from(vec![1u8; 3 * 1024 * 1024]), "friend", "bot")
        .await
        .unwrap_err();
    let Error::Gateway { endpoint, message } = err else {
        panic!("expected a gateway error, got {err:?}");
    };
    assert_eq!(endpoint, "Msg/SendVideo");
    assert!(message.contains("timed out"), "{message}");
    assert!(message.contains("size 3.00 MB"), "{message}");
    assert!(message.contains("expected upload time 11 s"), "{message}");
}

#[tokio::test]
async fn long_voice_is_sent_as_paused_segments() {
    let gateway = FakeGateway::ok();
    let svc = service(&gateway, &fast_config());

    let responses = svc
        .send_voice(MediaSource::from(wav(90_000, 16000)), "friend", "bot")
        .await
        .unwrap();
    assert_eq!(responses.len(), 2);

    let calls = gateway.calls();
    assert!(calls.iter().all(|c| c.endpoint == Endpoint::SendVoice));
    assert_eq!(calls[0].payload["VoiceTime"], 60_000);
    assert_eq!(calls[1].payload["VoiceTime"], 30_000);
    assert!(calls.iter().all(|c| c.payload["Type"] == 4));
    assert!(calls[1].at - calls[0].at >= Duration::from_millis(200));

    let pcm_bytes: usize = calls
        .iter()
        .map(|c| STANDARD.decode(c.payload["Base64"].as_str().unwrap()).unwrap().len())
        .sum();
    assert_eq!(pcm_bytes, 90 * 24_000 * 2);
}

#[tokio::test]
async fn amr_voice_is_forwarded_verbatim() {
    let gateway = FakeGateway::ok();
    let svc = service(&gateway, &fast_config());

    let mut amr = b"#!AMR\n".to_vec();
    for _ in 0..25 {
        amr.push(0x3C);
        amr.extend([0xAB; 31]);
    }
    let file = tempfile::NamedTempFile::with_suffix(".amr").unwrap();
    std::fs::write(file.path(), &amr).unwrap();

    let responses = svc.send_voice(file.path(), "friend", "bot").await.unwrap();
    assert_eq!(responses.len(), 1);

    let call = &gateway.calls()[0];
    assert_eq!(call.payload["Type"], 0);
    assert_eq!(call.payload["VoiceTime"], 500);
    assert_eq!(
        STANDARD.decode(call.payload["Base64"].as_str().unwrap()).unwrap(),
        amr
    );
}

#[tokio::test]
async fn files_are_uploaded_then_sent_by_reference() {
    let gateway = FakeGateway::with(|endpoint, _| {
        Ok(match endpoint {
            Endpoint::UploadFile => {
                GatewayResponse::ok(json!({"mediaId": "@cdn_42", "totalLen": 11}))
            },
            _ => GatewayResponse::ok(Value::Null),
        })
    });
    let svc = service(&gateway, &fast_config());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, b"hello world").unwrap();

    svc.send_file(&path, "friend", "bot").await.unwrap();

    let calls = gateway.calls();
    assert_eq!(calls[0].endpoint, Endpoint::UploadFile);
    assert_eq!(
        calls[0].payload,
        json!({"Base64": STANDARD.encode(b"hello world"), "Wxid": "bot"})
    );
    assert_eq!(calls[1].endpoint, Endpoint::SendCdnFile);
    let xml = calls[1].payload["Content"].as_str().unwrap();
    assert!(xml.contains("<title>notes.txt</title>"));
    assert!(xml.contains("<attachid>@cdn_42</attachid>"));
    assert!(xml.contains("<totallen>11</totallen>"));
    assert!(xml.contains("<fileext>txt</fileext>"));
}

#[tokio::test]
async fn rejected_upload_aborts_file_send() {
    let gateway = FakeGateway::with(|_, _| Ok(GatewayResponse::failed("no space")));
    let svc = service(&gateway, &fast_config());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.bin");
    std::fs::write(&path, [1u8, 2, 3]).unwrap();

    let err = svc.send_file(&path, "friend", "bot").await.unwrap_err();
    assert!(matches!(err, Error::Upload { .. }));
    assert_eq!(gateway.calls().len(), 1);

    let err = svc
        .upload_file(dir.path().join("missing.bin"), "bot")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Media(courier_media::Error::NotFound { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn close_waits_for_queued_sends() {
    let gateway = FakeGateway::ok();
    let svc = service(&gateway, &CourierConfig::default());

    let mut handles = Vec::new();
    for i in 0..3 {
        let svc = svc.clone();
        handles.push(tokio::spawn(async move {
            svc.send_text(&format!("msg {i}"), "friend", "bot", 0).await
        }));
    }
    // Let every spawned send reach the queue.
    tokio::time::sleep(Duration::from_millis(10)).await;

    svc.close().await;
    assert_eq!(gateway.calls().len(), 3);
    assert!(svc.dispatcher().text().is_idle());
    for handle in handles {
        assert!(handle.await.unwrap().unwrap().success);
    }

    // Closing twice is harmless and the service keeps working.
    svc.close().await;
    svc.send_text("after close", "friend", "bot", 0).await.unwrap();
    assert_eq!(gateway.calls().len(), 4);
}
