use std::{net::SocketAddr, sync::Arc};

use arena_sdk::{Error, ErrorKind, SettleOptions};
use poem::{
    get, handler,
    http::StatusCode,
    listener::TcpListener,
    middleware::Tracing,
    post,
    web::{Data, Json, Path},
    Endpoint, EndpointExt, IntoResponse, Response, Route, Server,
};
use serde_json::json;

use super::{parse_pubkey, AppSettler};

/// Serve the HTTP control surface.
#[derive(Debug, clap::Args)]
pub struct Serve {
    /// Address to listen on, overrides the configured one.
    #[arg(long)]
    bind: Option<SocketAddr>,
}

impl super::Command for Serve {
    async fn execute(&self, ctx: super::Context<'_>) -> eyre::Result<()> {
        let settler = Arc::new(ctx.settler()?);
        let bind = self.bind.unwrap_or(ctx.config().server.bind);
        tracing::info!(%bind, "listening");
        Server::new(TcpListener::bind(bind))
            .run_with_graceful_shutdown(
                routes(settler),
                async {
                    if let Err(err) = tokio::signal::ctrl_c().await {
                        tracing::error!(%err, "failed to listen for shutdown signal");
                    }
                },
                None,
            )
            .await?;
        Ok(())
    }
}

fn routes(settler: Arc<AppSettler>) -> impl Endpoint {
    Route::new()
        .at("/health", get(health))
        .at("/tournaments/:id/finalize", post(finalize))
        .at("/tournaments/:id/leaderboard", get(leaderboard))
        .data(settler)
        .with(Tracing)
}

fn status_of(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::AlreadyFinalized | ErrorKind::TournamentNotEnded => StatusCode::CONFLICT,
        ErrorKind::NoParticipants | ErrorKind::InvalidAllocation => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ErrorKind::TournamentNotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidPriceData
        | ErrorKind::NoDataAtTimestamp
        | ErrorKind::SettlementRejected => StatusCode::BAD_GATEWAY,
        ErrorKind::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(status: StatusCode, kind: &str, message: String, tournament: &str) -> Response {
    Json(json!({
        "error": kind,
        "message": message,
        "tournament": tournament,
    }))
    .with_status(status)
    .into_response()
}

fn settle_error(tournament: &str, err: Error) -> Response {
    let kind = err.kind();
    let status = status_of(kind);
    if status.is_server_error() {
        tracing::error!(%tournament, %err, "request failed");
    } else {
        tracing::warn!(%tournament, %err, "request failed");
    }
    error_response(status, kind.as_str(), err.to_string(), tournament)
}

fn invalid_id(tournament: &str, err: eyre::Report) -> Response {
    error_response(
        StatusCode::BAD_REQUEST,
        "INVALID_TOURNAMENT_ID",
        err.to_string(),
        tournament,
    )
}

#[handler]
fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "OK" }))
}

#[handler]
async fn finalize(Path(id): Path<String>, Data(settler): Data<&Arc<AppSettler>>) -> Response {
    let tournament = match parse_pubkey(&id) {
        Ok(tournament) => tournament,
        Err(err) => return invalid_id(&id, err),
    };
    match settler.settle(&tournament, SettleOptions::default()).await {
        Ok(report) => Json(report).into_response(),
        Err(err) => settle_error(&id, err),
    }
}

#[handler]
async fn leaderboard(Path(id): Path<String>, Data(settler): Data<&Arc<AppSettler>>) -> Response {
    let tournament = match parse_pubkey(&id) {
        Ok(tournament) => tournament,
        Err(err) => return invalid_id(&id, err),
    };
    match settler.leaderboard(&tournament, None).await {
        Ok(report) => Json(report).into_response(),
        Err(err) => settle_error(&id, err),
    }
}
