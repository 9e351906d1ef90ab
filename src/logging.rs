use std::borrow::Cow;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use log::{error, info, warn};
use rocket::{
    fairing::{Fairing, Info, Kind},
    http::{Status, StatusClass},
    request::{FromRequest, Outcome},
    Data, Orbit, Request, Response, Rocket,
};

/// Sequence number of a request, shared by every log line about it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct RequestId(pub usize);

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "req{}", self.0)
    }
}

impl RequestId {
    /// Wraps around to zero on overflow.
    pub fn next() -> RequestId {
        static NEXT_REQUEST: AtomicUsize = AtomicUsize::new(0);
        RequestId(NEXT_REQUEST.fetch_add(1, Ordering::Relaxed))
    }
}

/// Handlers take this to tag their own log lines.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for &'r RequestId {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(req.local_cache(RequestId::next))
    }
}

/// When the fairing first saw a request.
struct Received(Instant);

/// The matched route, by handler name where it has one.
fn route_label<'a>(req: &'a Request<'_>) -> Cow<'a, str> {
    match req.route() {
        Some(route) => match &route.name {
            Some(name) => Cow::Owned(format!("{name} ({})", route.uri)),
            None => Cow::Owned(route.uri.to_string()),
        },
        None => Cow::Borrowed("no matching route"),
    }
}

/// One summary line per response, at a level matching its status.
fn log_response(id: RequestId, status: Status, route: &str, elapsed: Duration) {
    let line = format!("{id} <- {status} {route} in {}ms", elapsed.as_millis());
    match status.class() {
        StatusClass::ServerError => error!("{line}"),
        StatusClass::ClientError => warn!("{line}"),
        _ => info!("{line}"),
    }
}

/// Logs launch, shutdown, and each request with its outcome and latency.
#[derive(Debug, Copy, Clone)]
pub struct LoggerFairing;

#[rocket::async_trait]
impl Fairing for LoggerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Request logger",
            kind: Kind::Liftoff | Kind::Request | Kind::Response | Kind::Shutdown,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let config = rocket.config();
        let scheme = if config.tls_enabled() { "https" } else { "http" };
        info!(
            "Election server listening on {scheme}://{}:{}",
            config.address, config.port
        );
    }

    async fn on_request(&self, req: &mut Request<'_>, _data: &mut Data<'_>) {
        req.local_cache(|| Received(Instant::now()));
        let id = req.local_cache(RequestId::next);
        info!("{id} -> {} {}", req.method(), req.uri());
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let id = *req.local_cache(RequestId::next);
        let received = req.local_cache(|| Received(Instant::now()));
        log_response(id, res.status(), &route_label(req), received.0.elapsed());
    }

    async fn on_shutdown(&self, _rocket: &Rocket<Orbit>) {
        warn!("Shutting down, finishing in-flight requests");
    }
}
