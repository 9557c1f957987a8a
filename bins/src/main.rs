use std::{env, sync::Arc};

use agenda::notify::LogNotifier;
use dotenv::dotenv;
use eyre::Context;
use log::info;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    if let Err(err) = dotenv() {
        info!("Failed to load .env file: {}", err);
    }
    pretty_env_logger::init();
    color_eyre::install()?;

    info!("connecting to mongo");
    let mongo_url = env::var("MONGO_URL").context("Failed to get MONGO_URL from env")?;
    let storage = storage::Storage::new(&mongo_url)
        .await
        .context("Failed to create storage")?;
    info!("collections and indexes are ready");

    let _agenda = agenda::Agenda::new(storage, Arc::new(LogNotifier));
    info!("agenda is ready");

    Ok(())
}
