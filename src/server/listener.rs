use std::rc::Rc;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::Config;
use crate::http::connection::RequestHandler;
use crate::server::session::Session;

/// Builds the request handler for each accepted connection.
pub type HandlerFactory = Rc<dyn Fn() -> Box<dyn RequestHandler>>;

pub async fn run(cfg: &Config, factory: HandlerFactory) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&cfg.listen_addr).await?;
    info!("Listening on {}", cfg.listen_addr);

    serve(listener, cfg.clone(), factory).await
}

/// Accepts connections on `listener` forever.
///
/// Connections run as local tasks, so this must be driven from inside a
/// [`tokio::task::LocalSet`].
pub async fn serve(listener: TcpListener, cfg: Config, factory: HandlerFactory) -> anyhow::Result<()> {
    let cfg = Rc::new(cfg);

    loop {
        let (socket, peer) = listener.accept().await?;
        info!("Accepted connection from {}", peer);

        let cfg = Rc::clone(&cfg);
        let handler = factory();
        tokio::task::spawn_local(async move {
            let mut session = Session::new(socket, &cfg, handler);
            if let Err(e) = session.run().await {
                tracing::error!("Connection error from {}: {}", peer, e);
            }
        });
    }
}
