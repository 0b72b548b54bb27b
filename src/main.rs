mod cli;
mod config;
mod dispatch;
mod events;
mod ipc;
mod landmarks;
mod logging;
mod normalizer;
mod pipeline;
mod provider;
mod scene;
mod tracker;
mod voice;

fn main() -> anyhow::Result<()> {
    logging::init();
    cli::run()
}
