//! Watches a system monitor subscription. One view per delivery; type a view name and press
//! enter to switch.

mod config;

use crate::config::AppConfig;
use lookout::{
    Client, Delivery, Presentation, RequestOptions, RequestTemplate, RouteError, Router,
    ViewController
};
use std::{env, future, io, process, time::Duration};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

const ROUTES: [(&str, Delivery); 4] = [
    ("query", Delivery::Fetch),
    ("stream", Delivery::StreamingFetch),
    ("subscribe", Delivery::EventSource),
    ("socket", Delivery::WebSocket)
];

#[derive(Debug, Error)]
enum DemoError {
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error("failed to read input: {0}")]
    Io(#[from] io::Error)
}

fn build_view(
    client: &Client,
    config: &AppConfig,
    name: &'static str,
    delivery: Delivery
) -> ViewController<Client> {
    let mut options = RequestOptions::new(delivery);
    if let Some(ref origin) = config.origin {
        options = options.with_origin(origin.clone());
    }
    let template = RequestTemplate::new(config.endpoint(delivery), config.query_for(delivery))
        .with_options(options);

    ViewController::new(client.clone(), template)
        .on_refresh(move |state| println!("[{}]\n{}\n", name, Presentation::from(state)))
}

async fn run(config: AppConfig) -> Result<(), DemoError> {
    let client = Client::builder().build();
    let mut router = ROUTES
        .iter()
        .fold(Router::new(), |router, &(name, delivery)| {
            router.route(name, build_view(&client, &config, name, delivery))
        });

    router.navigate(&config.route)?;
    info!(route = %config.route, "watching");

    let deadline = async {
        match config.duration_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => future::pending().await
        }
    };
    tokio::pin!(deadline);
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut reading = true;

    loop {
        tokio::select! {
            _ = &mut deadline => {
                info!("duration elapsed");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            line = input.next_line(), if reading => match line? {
                Some(line) => {
                    let route = line.trim();
                    if route.is_empty() {
                        continue;
                    }
                    match router.navigate(route) {
                        Ok(()) => info!(route, "switched view"),
                        Err(e) => {
                            let mut routes: Vec<&str> = router.routes().collect();
                            routes.sort_unstable();
                            error!(routes = %routes.join(", "), "{}", e)
                        }
                    }
                }
                None => reading = false
            }
        }
    }

    router.shutdown();
    info!(feeds = client.active_feeds(), "stopped");
    Ok(())
}

#[tokio::main]
async fn main() {
    let path = env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config = match AppConfig::load_from_file(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.level())
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install logger: {}", e);
        process::exit(1);
    }
    info!(%path, "loaded config");

    if let Err(e) = run(config).await {
        error!("{}", e);
        process::exit(1);
    }
}
