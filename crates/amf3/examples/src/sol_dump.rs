use std::fs::File;

use scuffle_amf3::SolReader;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .unwrap();

    let Some(path) = std::env::args().nth(1) else {
        tracing::error!("usage: scuffle-amf3-sol-dump <file.sol>");
        std::process::exit(2);
    };

    let file = File::open(&path).unwrap();
    let mut reader = SolReader::new(file);

    let header = reader.header().unwrap();
    tracing::info!("{path}: name: {}, version: {}", header.name, header.version);

    for entry in reader {
        match entry {
            Ok(entry) => tracing::info!("{}: {:?}", entry.key, entry.value),
            Err(err) => {
                tracing::error!("failed to read entry: {err}");
                std::process::exit(1);
            }
        }
    }
}
