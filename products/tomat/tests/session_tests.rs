mod support;

use {
    candle_core::{DType, Device},
    candle_nn::{VarBuilder, VarMap},
    com::{ComError, local_channel},
    image::{JPEG_DATA_URL_PREFIX, decode_frame, encode_frame},
    inference::{
        ObjectDetector,
        detector::{Multiples, YoloV8},
    },
    std::{sync::Arc, time::Duration},
    support::{FixedDetector, PersonaOracle, detection, gray_frame},
    tokio::time::timeout,
    tomat::{
        ChatStage, CommandDispatcher, DETECTOR_UNAVAILABLE, IntentResolver, ResourceCache,
        RobotCommand, SessionEnd, VideoStage, run_session,
    },
};

fn video_stage(detector: FixedDetector, pause: Duration) -> VideoStage<FixedDetector> {
    VideoStage::new(Arc::new(ResourceCache::ready("detector", detector)), 0.85, 80, pause)
}

fn chat_stage(
    delay: Duration,
) -> (
    ChatStage<PersonaOracle>,
    tokio::sync::mpsc::UnboundedReceiver<tomat::DispatchEvent>,
) {
    let oracle = PersonaOracle {
        delay,
        ..Default::default()
    };
    let oracle = Arc::new(ResourceCache::ready("oracle", oracle));
    let (dispatcher, rx) = CommandDispatcher::channel();
    (ChatStage::new(IntentResolver::new(oracle, dispatcher)), rx)
}

#[tokio::test]
async fn test_corrupt_frame_does_not_end_session() {
    let stage = video_stage(FixedDetector::empty(), Duration::ZERO);
    let (channel, mut peer) = local_channel();

    let valid = encode_frame(&gray_frame(48, 32), 80).unwrap();
    peer.send("data:image/jpeg;base64,!!!not-base64!!!").unwrap();
    peer.send("no separator at all").unwrap();
    peer.send(valid).unwrap();
    peer.close();

    let end = timeout(Duration::from_secs(5), run_session(channel, &stage))
        .await
        .unwrap();
    assert_eq!(end, SessionEnd::ClientClosed);

    assert!(peer.recv().await.unwrap().starts_with("Error: "));
    assert!(peer.recv().await.unwrap().starts_with("Error: "));
    let annotated = peer.recv().await.unwrap();
    assert!(annotated.starts_with(JPEG_DATA_URL_PREFIX));
    let frame = decode_frame(&annotated).unwrap();
    assert_eq!((frame.width(), frame.height()), (48, 32));
    assert!(peer.recv().await.is_none());
}

#[tokio::test]
async fn test_replies_follow_request_order() {
    let stage = video_stage(
        FixedDetector::new(vec![detection(4.0, 12.0, 16.0, 0, 0.95)]),
        Duration::ZERO,
    );
    let (channel, mut peer) = local_channel();
    let sizes = [(32, 32), (64, 48), (40, 24)];
    for (width, height) in sizes {
        peer.send(encode_frame(&gray_frame(width, height), 80).unwrap())
            .unwrap();
    }
    peer.close();

    run_session(channel, &stage).await;
    for (width, height) in sizes {
        let frame = decode_frame(&peer.recv().await.unwrap()).unwrap();
        assert_eq!((frame.width(), frame.height()), (width, height));
    }
}

#[tokio::test]
async fn test_unavailable_detector_rejects_connection() {
    let stage: VideoStage<FixedDetector> = VideoStage::new(
        Arc::new(ResourceCache::new("detector", || Err("no weights".to_string()))),
        0.85,
        80,
        Duration::ZERO,
    );
    let (channel, mut peer) = local_channel();
    peer.send(encode_frame(&gray_frame(8, 8), 80).unwrap()).unwrap();

    assert_eq!(run_session(channel, &stage).await, SessionEnd::Rejected);
    assert_eq!(peer.recv().await.as_deref(), Some(DETECTOR_UNAVAILABLE));
    assert!(peer.recv().await.is_none());
}

#[tokio::test]
async fn test_transport_error_ends_session() {
    let stage = video_stage(FixedDetector::empty(), Duration::ZERO);
    let (channel, mut peer) = local_channel();
    peer.inject_error(ComError::ConnectionClosed).unwrap();

    assert_eq!(run_session(channel, &stage).await, SessionEnd::TransportError);
    assert!(peer.recv().await.is_none());
}

#[tokio::test]
async fn test_chat_session_replies_and_dispatches() {
    let (stage, mut commands) = chat_stage(Duration::ZERO);
    let (channel, mut peer) = local_channel();
    peer.send("hello there").unwrap();
    peer.send("pick the ripe one").unwrap();

    let client = async {
        let first = peer.recv().await;
        let second = peer.recv().await;
        peer.close();
        (first, second)
    };
    let (end, (first, second)) = timeout(
        Duration::from_secs(5),
        async { tokio::join!(run_session(channel, &stage), client) },
    )
    .await
    .unwrap();

    assert_eq!(end, SessionEnd::ClientClosed);
    assert_eq!(first.as_deref(), Some("Hello! Ask me to pick a tomato."));
    assert_eq!(second.as_deref(), Some("You got it! Going for the red one."));
    assert_eq!(commands.try_recv().unwrap().command, RobotCommand::PickRipe);
    assert!(commands.try_recv().is_err());
}

#[tokio::test]
async fn test_chat_client_leaving_mid_request_dispatches_nothing() {
    let (stage, mut commands) = chat_stage(Duration::from_millis(300));
    let (channel, mut peer) = local_channel();
    peer.send("pick the ripe one").unwrap();

    let client = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        peer.close();
    };
    let (end, ()) = timeout(
        Duration::from_secs(5),
        async { tokio::join!(run_session(channel, &stage), client) },
    )
    .await
    .unwrap();

    assert_eq!(end, SessionEnd::ClientClosed);
    assert!(peer.recv().await.is_none());
    // the oracle call would have finished by now
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(commands.try_recv().is_err());
}

#[tokio::test]
async fn test_video_client_leaving_mid_frame_still_gets_it() {
    let stage = video_stage(FixedDetector::empty(), Duration::ZERO);
    let (channel, mut peer) = local_channel();
    peer.send(encode_frame(&gray_frame(16, 16), 80).unwrap()).unwrap();
    peer.close();

    assert_eq!(run_session(channel, &stage).await, SessionEnd::ClientClosed);
    assert!(peer.recv().await.unwrap().starts_with(JPEG_DATA_URL_PREFIX));
    assert!(peer.recv().await.is_none());
}

#[tokio::test]
async fn test_chat_answers_while_video_is_busy() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let video = Arc::new(video_stage(FixedDetector::empty(), Duration::from_millis(10)));
            let (chat, _commands) = chat_stage(Duration::ZERO);
            let chat = Arc::new(chat);

            let (video_channel, mut video_peer) = local_channel();
            let frame = encode_frame(&gray_frame(32, 32), 80).unwrap();
            for _ in 0..200 {
                video_peer.send(frame.clone()).unwrap();
            }
            let (chat_channel, mut chat_peer) = local_channel();

            let video_task = {
                let video = Arc::clone(&video);
                tokio::task::spawn_local(async move { run_session(video_channel, video.as_ref()).await })
            };
            let chat_task = {
                let chat = Arc::clone(&chat);
                tokio::task::spawn_local(async move { run_session(chat_channel, chat.as_ref()).await })
            };

            // let the video session get going first
            tokio::time::sleep(Duration::from_millis(30)).await;
            chat_peer.send("hello there").unwrap();
            let reply = timeout(Duration::from_secs(1), chat_peer.recv())
                .await
                .expect("chat starved by video")
                .unwrap();
            assert_eq!(reply, "Hello! Ask me to pick a tomato.");

            let mut video_replies = 0;
            while video_peer.try_recv().is_some() {
                video_replies += 1;
            }
            assert!(video_replies < 50, "{video_replies} frames before chat reply");

            chat_peer.close();
            video_peer.close();
            assert_eq!(chat_task.await.unwrap(), SessionEnd::ClientClosed);
            video_task.abort();
        })
        .await;
}

#[tokio::test]
async fn test_video_session_with_yolo_detector() {
    let device = Device::Cpu;
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    let model = YoloV8::load(vb, Multiples::n(), 2).unwrap();
    let detector = ObjectDetector::from_model(model, vec!["ripe".into(), "unripe".into()], device);

    let stage = VideoStage::new(
        Arc::new(ResourceCache::ready("detector", detector)),
        0.85,
        80,
        Duration::ZERO,
    );
    let (channel, mut peer) = local_channel();
    peer.send(encode_frame(&gray_frame(64, 48), 80).unwrap()).unwrap();
    peer.close();

    let end = timeout(Duration::from_secs(30), run_session(channel, &stage))
        .await
        .unwrap();
    assert_eq!(end, SessionEnd::ClientClosed);
    let frame = decode_frame(&peer.recv().await.unwrap()).unwrap();
    assert_eq!((frame.width(), frame.height()), (64, 48));
}
