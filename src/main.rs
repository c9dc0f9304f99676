use tokio_util::sync::CancellationToken;

mod api;
mod args;
mod codes;
mod constants;
mod games;
mod notify;
mod poller;
mod state;
mod store;
mod util;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = args::parse_cli_args();
    util::tracing::build_subscriber();

    let state = state::AppState::from_cli(&cli).await?;
    let cancel = CancellationToken::new();

    poller::spawn(state.clone(), cancel.child_token());

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("shutdown requested");
                shutdown.cancel();
            }
            Err(e) => tracing::error!(error = %e, "failed to listen for ctrl-c"),
        }
    });

    let served = api::server::start_server(state.clone(), cli.port, cancel.clone()).await;
    cancel.cancel();
    state.stop_poller().await;

    served?;
    Ok(())
}
