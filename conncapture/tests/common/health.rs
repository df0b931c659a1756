//! Health service that checks and records the peer of every call.

use std::pin::Pin;
use std::sync::{Arc, Mutex};

use conncapture::grpc::Peer;
use conncapture::CONN_ADDR_NETWORK;
use tokio_stream::Stream;
use tonic::{Request, Response, Status};
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_server::Health;
use tonic_health::pb::{HealthCheckRequest, HealthCheckResponse};

use super::fd_is_open;

/// What the server saw for one call.
#[derive(Debug, Clone)]
pub struct Observed {
    pub peer: Peer,
    pub fd_open: bool,
    pub auth_type: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TestHealthServer {
    observed: Arc<Mutex<Vec<Observed>>>,
}

impl TestHealthServer {
    pub fn observed(&self) -> Vec<Observed> {
        self.observed.lock().unwrap().clone()
    }

    fn observe<T>(&self, request: &Request<T>) -> Result<(), Status> {
        let peer = Peer::from_request(request)
            .cloned()
            .ok_or_else(|| Status::internal("no peer on request"))?;
        let conn = peer
            .conn()
            .ok_or_else(|| Status::internal(format!("peer address {:?} is not a connection", peer.addr)))?;

        if peer.addr.network() != CONN_ADDR_NETWORK {
            return Err(Status::internal(format!(
                "unexpected network {:?}",
                peer.addr.network()
            )));
        }
        if !peer.addr.to_string().is_empty() {
            return Err(Status::internal(format!("unexpected address {}", peer.addr)));
        }

        let fd_open = conn.raw_fd().map(fd_is_open).unwrap_or(false);
        let auth_type = peer
            .auth_info
            .as_ref()
            .map(|info| info.auth_type().to_string());

        self.observed.lock().unwrap().push(Observed {
            peer,
            fd_open,
            auth_type,
        });
        Ok(())
    }
}

#[tonic::async_trait]
impl Health for TestHealthServer {
    async fn check(
        &self,
        request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        self.observe(&request)?;
        Ok(Response::new(HealthCheckResponse {
            status: ServingStatus::Serving as i32,
        }))
    }

    type WatchStream = Pin<Box<dyn Stream<Item = Result<HealthCheckResponse, Status>> + Send>>;

    async fn watch(
        &self,
        request: Request<HealthCheckRequest>,
    ) -> Result<Response<Self::WatchStream>, Status> {
        self.observe(&request)?;
        let stream = async_stream::stream! {
            yield Ok::<_, Status>(HealthCheckResponse {
                status: ServingStatus::Serving as i32,
            });
        };
        Ok(Response::new(Box::pin(stream)))
    }
}
