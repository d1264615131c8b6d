use pktview::runtime::{boot, replay};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    boot::init_logging();
    let protocol = std::env::args().nth(1).unwrap_or_else(|| "text".to_string());
    let viewer = boot::boot()?;
    replay::replay(viewer, &protocol).await
}
