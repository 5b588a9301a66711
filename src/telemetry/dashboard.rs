use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

use crate::error::{CrowdError, Result};
use crate::telemetry::store::{series, ExperimentStore, ExperimentWriter, ScalarPoint};
use crate::telemetry::{Telemetry, TELEMETRY_DIR};
use crate::train::train_config::TrainConfig;

type SharedRuns = Arc<Mutex<BTreeMap<String, Vec<ScalarPoint>>>>;

/// Persists scalars to the experiment store and serves them read-only:
///
/// - `GET /experiments` lists experiment names;
/// - `GET /experiments/{name}` returns `{scalar: [[step, value], ...]}`.
///
/// The server runs on its own thread and stops when this value is dropped.
pub struct DashboardTelemetry {
    name: String,
    writer: ExperimentWriter,
    runs: SharedRuns,
    server: Arc<Server>,
    handle: Option<JoinHandle<()>>,
}

impl DashboardTelemetry {
    /// Opens or creates the experiment named by `config` and binds the
    /// server to `config.telemetry.addr`.
    pub fn start(config: &TrainConfig) -> Result<DashboardTelemetry> {
        let tc = &config.telemetry;
        let store = ExperimentStore::new(&config.output_dir.join(TELEMETRY_DIR))?;
        if tc.remove_all_log {
            store.remove_all()?;
        }
        let (name, writer) = match &tc.exp_name {
            Some(name) => (name.clone(), store.open(name)?),
            None => {
                let name = config.experiment_name();
                let writer = store.create(&name)?;
                (name, writer)
            }
        };

        let runs: SharedRuns = Arc::new(Mutex::new(store.load_all()?));
        let server = Server::http(tc.addr.as_str())
            .map_err(|e| CrowdError::Telemetry(format!("cannot bind {}: {}", tc.addr, e)))?;
        let server = Arc::new(server);

        let handle = {
            let server = Arc::clone(&server);
            let runs = Arc::clone(&runs);
            std::thread::spawn(move || {
                for request in server.incoming_requests() {
                    dispatch(request, &runs);
                }
            })
        };
        tracing::info!(addr = %tc.addr, experiment = %name, "telemetry dashboard listening");

        Ok(DashboardTelemetry { name, writer, runs, server, handle: Some(handle) })
    }

    pub fn experiment(&self) -> &str {
        &self.name
    }

    pub fn server_addr(&self) -> Option<std::net::SocketAddr> {
        self.server.server_addr().to_ip()
    }
}

impl Telemetry for DashboardTelemetry {
    fn add_scalar(&mut self, name: &str, value: f64, step: usize) {
        let point = ScalarPoint { name: name.to_string(), step, value };
        if let Err(e) = self.writer.append(&point) {
            tracing::warn!(error = %e, scalar = name, "failed to persist telemetry point");
        }
        if let Ok(mut runs) = self.runs.lock() {
            runs.entry(self.name.clone()).or_default().push(point);
        }
    }
}

impl Drop for DashboardTelemetry {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn dispatch(request: Request, runs: &SharedRuns) {
    let response = match (request.method(), request.url()) {
        (Method::Get, "/experiments") => match runs.lock() {
            Ok(runs) => json_response(&runs.keys().collect::<Vec<_>>()),
            Err(_) => status(500, "store unavailable"),
        },
        (Method::Get, url) => match url.strip_prefix("/experiments/") {
            Some(name) => match runs.lock() {
                Ok(runs) => match runs.get(name) {
                    Some(points) => json_response(&series(points)),
                    None => status(404, "unknown experiment"),
                },
                Err(_) => status(500, "store unavailable"),
            },
            None => status(404, "not found"),
        },
        _ => status(405, "method not allowed"),
    };
    let _ = request.respond(response);
}

fn json_response<T: serde::Serialize>(value: &T) -> Response<Cursor<Vec<u8>>> {
    match serde_json::to_vec(value) {
        Ok(body) => with_content_type(Response::from_data(body), "application/json"),
        Err(_) => status(500, "serialization failed"),
    }
}

fn status(code: u16, message: &str) -> Response<Cursor<Vec<u8>>> {
    with_content_type(Response::from_string(message), "text/plain").with_status_code(StatusCode(code))
}

fn with_content_type(response: Response<Cursor<Vec<u8>>>, mime: &str) -> Response<Cursor<Vec<u8>>> {
    match Header::from_bytes(&b"Content-Type"[..], mime.as_bytes()) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}
