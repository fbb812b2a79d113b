use std::path::PathBuf;

use rootserve::config::Config;

fn main() -> anyhow::Result<()> {
    let cfg = Config::load(std::env::args_os().nth(1).map(PathBuf::from))?.validate()?;

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(cfg.log_level)
        .init();

    rootserve::server::serve(&cfg)
}
