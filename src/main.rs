use std::rc::Rc;

use ember::config::Config;
use ember::http::connection::RequestHandler;
use ember::server;
use ember::server::routes::DefaultRoutes;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load();
    let factory: server::listener::HandlerFactory = Rc::new(|| -> Box<dyn RequestHandler> { Box::new(DefaultRoutes) });

    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            tokio::select! {
                res = server::listener::run(&cfg, factory) => {
                    res?;
                }

                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutdown signal received");
                }
            }

            Ok::<(), anyhow::Error>(())
        })
        .await
}
