mod app;
mod audio;
mod config;
mod library;
mod mpris;
mod runtime;
mod session;
mod store;
mod ui;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    runtime::run()
}
