use std::env;

use url::Url;

use ssadagu_matcher::embedders::images::HttpImageSource;
use ssadagu_matcher::embedders::local::{LocalImageEmbedder, LocalTextEmbedder};
use ssadagu_matcher::models::config::ServerConfig;
use ssadagu_matcher::processing::benchmark::process_benchmark_message;
use ssadagu_matcher::processing::matching::Matcher;
use ssadagu_matcher::processing::relevance::RelevanceScorer;
use ssadagu_matcher::processing::{ZMQMessage, ZMQReply};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config_path = env::var("MATCHER_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let config = match ServerConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let embedders = &config.embedders;
    let text_embedder = match LocalTextEmbedder::first_available(
        &embedders.text_models,
        embedders.cache_dir.clone(),
        embedders.batch_size,
    ) {
        Ok(embedder) => embedder,
        Err(e) => {
            log::error!("Failed to initialize text embedder: {e}");
            std::process::exit(1);
        }
    };

    let image_embedder = if config.matcher.images_enabled() {
        match LocalImageEmbedder::first_available(
            &embedders.image_models,
            embedders.cache_dir.clone(),
            embedders.batch_size,
        ) {
            Ok(embedder) => Some(embedder),
            Err(e) => {
                log::warn!("Image gate enabled but no image model loaded: {e}");
                None
            }
        }
    } else {
        None
    };

    let image_source = match HttpImageSource::new(&config.images) {
        Ok(source) => source,
        Err(e) => {
            log::error!("Failed to build image client: {e}");
            std::process::exit(1);
        }
    };
    let image_base = match Url::parse(&config.images.base_url) {
        Ok(url) => url,
        Err(e) => {
            log::error!("Invalid image base URL: {e}");
            std::process::exit(1);
        }
    };

    let mut matcher = Matcher::new(
        RelevanceScorer::new(config.matcher),
        text_embedder,
        image_embedder,
        image_source,
        image_base,
        config.images.max_images,
    );

    let context = zmq::Context::new();
    let responder = match context.socket(zmq::REP) {
        Ok(socket) => socket,
        Err(e) => {
            log::error!("Cannot create zmq socket: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = responder.bind(&config.zmq_address) {
        log::error!("Cannot bind to zmq address {}: {e}", config.zmq_address);
        std::process::exit(1);
    }
    log::info!("Listening for match requests on {}", config.zmq_address);

    loop {
        let msg = match responder.recv_bytes(0) {
            Ok(msg) => msg,
            Err(e) => {
                log::error!("Failed to receive message: {e}");
                continue;
            }
        };

        let reply = match serde_json::from_slice::<ZMQMessage>(&msg) {
            Ok(ZMQMessage::Match(request)) => {
                ZMQReply::Match(matcher.process_match_request(request).await)
            }
            Ok(ZMQMessage::Similarity((first, second))) => {
                ZMQReply::Similarity(matcher.similarity(&first, &second))
            }
            Ok(ZMQMessage::Benchmark(benchmark)) => {
                match process_benchmark_message(benchmark, matcher.text_embedder_mut()) {
                    Ok(reports) => ZMQReply::Benchmark(reports),
                    Err(e) => {
                        log::error!("Benchmark failed: {e}");
                        ZMQReply::Error(e.to_string())
                    }
                }
            }
            Err(e) => {
                log::error!("Failed to parse JSON: {e}");
                ZMQReply::Error(format!("invalid message: {e}"))
            }
        };

        let payload = match serde_json::to_vec(&reply) {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("Failed to serialize reply: {e}");
                br#"{"Error":"failed to serialize reply"}"#.to_vec()
            }
        };
        if let Err(e) = responder.send(payload, 0) {
            log::error!("Failed to send reply: {e}");
        }
    }
}
