use {
    base::log,
    com::WsServer,
    inference::{Inference, OllamaClient},
    std::{error::Error, sync::Arc},
    tomat::{
        Backends, CommandDispatcher, Config, ResourceCache, log_actuator, serve, server_options,
    },
};

fn main() -> Result<(), Box<dyn Error>> {
    let config = Config::from_env()?;
    match &config.log_dir {
        Some(dir) => base::init_file_logger(dir)?,
        None => base::init_stdout_logger(),
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let local = tokio::task::LocalSet::new();
    local.block_on(&runtime, run(config))
}

#[cfg(feature = "cuda")]
fn open_inference() -> Result<Inference, inference::InferError> {
    Inference::cuda(0)
}

#[cfg(not(feature = "cuda"))]
fn open_inference() -> Result<Inference, inference::InferError> {
    Inference::cpu()
}

async fn run(config: Config) -> Result<(), Box<dyn Error>> {
    let model_path = config.detector_model.clone();
    let labels = config.detector_labels.clone();
    let nms_threshold = config.nms_threshold;
    let detector = Arc::new(ResourceCache::new("object detector", move || {
        let inference = open_inference().map_err(|e| e.to_string())?;
        let detector = inference
            .use_object_detector(&model_path, labels.clone())
            .map_err(|e| e.to_string())?;
        Ok(detector.with_thresholds(0.25, nms_threshold))
    }));

    let llm = config.llm.clone();
    let oracle = Arc::new(ResourceCache::new("language backend", move || {
        OllamaClient::new(llm.clone()).map_err(|e| e.to_string())
    }));

    let backends = Backends { detector, oracle };

    let (dispatcher, commands) = CommandDispatcher::channel();
    tokio::task::spawn_local(log_actuator(commands));

    let (video, chat) = backends.into_stages(&config, dispatcher);

    let server = WsServer::bind(config.bind, server_options(&config)).await?;
    log::info!(
        "tomat up: detector {}, language model {} at {}",
        config.detector_model.display(),
        config.llm.model,
        config.llm.host
    );
    serve(server, video, chat).await?;
    Ok(())
}
