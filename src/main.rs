use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;
use vecload::{deprecator, generator, store, Config, Pipeline};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1).peekable();
    if args.peek().map(String::as_str) == Some("deprecate") {
        args.next();
        let config_path = args.next().unwrap_or_else(|| "config.yaml".to_string());
        let ids = deprecator::parse_ids(args)?;
        let config = load_config(&config_path)?;
        let store = store::connect(&config.store).await?;
        let marked = deprecator::deprecate(store.as_ref(), &config.collection.name, &ids).await?;
        println!("Marked {} point(s) deprecated in {}", marked.len(), config.collection.name);
        return Ok(());
    }

    let config_path = args.next().unwrap_or_else(|| "config.yaml".to_string());
    let config = load_config(&config_path)?;

    info!("Starting data loading process...");
    let store = store::connect(&config.store).await?;
    let mut generator = generator::from_config(&config.source)?;

    let summary = Pipeline::new(store.as_ref(), config.collection.clone(), config.batch_size)
        .run(generator.as_mut())
        .await?;

    println!("\nCollection info:");
    println!("Points count: {}", summary.info.points_count);
    println!("Vectors size: {}", summary.info.vector_size);
    println!("Data loading completed!");
    Ok(())
}

fn load_config(path: &str) -> Result<Config> {
    Config::load_from_yaml(path).with_context(|| format!("Failed to load {path}"))
}
