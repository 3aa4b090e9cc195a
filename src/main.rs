mod app;
mod core;

#[cfg(test)]
mod test_support;

use crate::app::lifecycle::context::StartupContext;
use crate::app::shutdown::build_shutdown_pipeline;
use crate::app::startup::build_start_pipeline;
use actix_web::rt::signal;
use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[actix_web::main]
async fn main() {
    let startup_pipeline = build_start_pipeline("arx.yaml".into());
    let startup_ctx = StartupContext::default();

    match startup_pipeline.run(&startup_ctx).await {
        Ok(_) => println!("Startup successful"),
        Err(e) => {
            eprintln!("Startup failed: {:?}", e);
            std::process::exit(1);
        }
    }

    let shutdown_pipeline = build_shutdown_pipeline();

    signal::ctrl_c().await.expect("Failed to listen for sigint");

    match shutdown_pipeline.run(&startup_ctx).await {
        Ok(_) => println!("Shutdown successful"),
        Err(e) => {
            eprintln!("Clean shutdown failed {:?}", e);
            std::process::exit(1);
        }
    }
}
