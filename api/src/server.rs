// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! The HTTP front of the admin API.
//!
//! Runs on its own OS thread with a single-threaded tokio runtime, so the
//! rest of the daemon stays plain threaded code.

use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread::JoinHandle;

use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use tracing::{error, info};

use crate::auth::AuthStore;
use crate::handlers::{dispatch, ApiState};
use crate::rpc::RpcRequest;

struct Shared {
    state: ApiState,
    auth: AuthStore,
}

pub struct ApiServer {
    #[allow(unused)]
    handle: JoinHandle<()>,
}

impl ApiServer {
    /// Bind the listening socket, then spawn the server thread. A failed
    /// bind comes back to the caller and is fatal to daemon startup.
    pub fn start(addr: SocketAddr, state: ApiState, auth: AuthStore) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let shared = Arc::new(Shared { state, auth });
        let handle = std::thread::Builder::new()
            .name("api-server".to_string())
            .spawn(move || {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_io()
                    .enable_time()
                    .build()
                    .expect("runtime creation failed for api server");
                rt.block_on(run(addr, listener, shared));
            })?;
        Ok(ApiServer { handle })
    }
}

async fn run(addr: SocketAddr, listener: TcpListener, shared: Arc<Shared>) {
    let app = Router::new()
        .route("/tenant", post(rpc_handler))
        .route("/admin", post(rpc_handler))
        .route("/ui", post(rpc_handler))
        .with_state(shared);

    info!("admin api listening on {addr}");

    if let Err(e) = axum_server::from_tcp(listener)
        .serve(app.into_make_service())
        .await
    {
        error!("admin api server error: {e}");
    }
}

async fn rpc_handler(
    State(shared): State<Arc<Shared>>,
    uri: Uri,
    headers: axum::http::HeaderMap,
    Json(req): Json<RpcRequest>,
) -> Response {
    let supplied = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if !shared.auth.authorize(supplied, uri.path()) {
        return (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Basic realm=\"openvirtex\"")],
        )
            .into_response();
    }
    Json(dispatch(&shared.state, &req)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    use elements::{ControlChannel, OvxMap, PhysicalNetwork, RecordingChannel};

    use crate::handlers::ChannelFactory;

    struct RecordingFactory;

    impl ChannelFactory for RecordingFactory {
        fn controller_channel(
            &self,
            _protocol: &str,
            host: &str,
            port: u16,
        ) -> Arc<dyn ControlChannel> {
            Arc::new(RecordingChannel::new(&format!("{host}:{port}")))
        }
    }

    fn state() -> ApiState {
        ApiState {
            map: Arc::new(OvxMap::new()),
            physical: Arc::new(PhysicalNetwork::new()),
            channels: Arc::new(RecordingFactory),
        }
    }

    #[test]
    fn occupied_port_fails_startup() {
        let holder = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = holder.local_addr().unwrap();
        assert!(ApiServer::start(addr, state(), AuthStore::new(Vec::new())).is_err());
    }

    #[test]
    fn ephemeral_port_binds() {
        let addr = "127.0.0.1:0".parse().unwrap();
        assert!(ApiServer::start(addr, state(), AuthStore::new(Vec::new())).is_ok());
    }
}
