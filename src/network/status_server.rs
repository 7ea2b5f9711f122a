//! HTTP status page with the current sensor readings.
//!
//! Started once the device is on the network. Serves:
//!
//! - `GET /` - HTML table of readings
//! - `GET /readings` - the same readings as JSON
//!
//! # Example Response
//!
//! ```json
//! {
//!   "readings": [
//!     { "name": "PM2.5", "value": 7.0, "unit": "ug/m3", "description": "PM2.5 Mass Concentration" },
//!     { "name": "T-comp", "value": 23.1, "unit": "C", "description": "Compensated Temperature" }
//!   ]
//! }
//! ```

use crate::sensor::{Reading, SensorSource};
use log::{error, info, warn};
use serde::Serialize;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Method, Request, Response, Server};

#[derive(Serialize)]
struct ReadingsBody<'a> {
    readings: &'a [Reading],
}

fn readings_json(readings: &[Reading]) -> Result<String, serde_json::Error> {
    serde_json::to_string(&ReadingsBody { readings })
}

fn readings_html(readings: &[Reading]) -> String {
    let rows: String = readings
        .iter()
        .map(|r| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                r.name, r.value, r.unit, r.description
            )
        })
        .collect();

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <meta http-equiv=\"refresh\" content=\"10\">\n<title>Air Quality</title>\n</head>\n<body>\n\
         <h1>Air Quality</h1>\n<table>\n\
         <tr><th>Channel</th><th>Value</th><th>Unit</th><th>Description</th></tr>\n\
         {}</table>\n</body>\n</html>\n",
        rows
    )
}

/// Status server running on a background thread. Drop it to stop.
pub struct StatusServer {
    handle: Option<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    local_addr: SocketAddr,
}

impl StatusServer {
    /// Start serving readings from `source` on `ip:port`.
    pub fn start<S>(ip: IpAddr, port: u16, source: S) -> Result<Self, io::Error>
    where
        S: SensorSource + Send + 'static,
    {
        let requested = SocketAddr::new(ip, port);
        let server = Server::http(requested)
            .map_err(|e| io::Error::new(io::ErrorKind::AddrInUse, e.to_string()))?;
        let local_addr = server.server_addr().to_ip().unwrap_or(requested);

        info!("Status page at http://{}/", local_addr);

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let handle = thread::spawn(move || {
            Self::run_server(server, source, shutdown_clone);
        });

        Ok(Self {
            handle: Some(handle),
            shutdown,
            local_addr,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn run_server<S: SensorSource>(server: Server, mut source: S, shutdown: Arc<AtomicBool>) {
        loop {
            if shutdown.load(Ordering::Acquire) {
                info!("Status server shutting down");
                break;
            }

            match server.recv_timeout(Duration::from_millis(100)) {
                Ok(Some(request)) => Self::handle(request, &mut source),
                Ok(None) => {}
                Err(e) => {
                    error!("Status server error: {}", e);
                    break;
                }
            }
        }
    }

    fn handle<S: SensorSource>(request: Request, source: &mut S) {
        if request.method() != &Method::Get {
            let mut response = Response::from_string("Method Not Allowed").with_status_code(405);
            if let Ok(allow) = Header::from_bytes(&b"Allow"[..], &b"GET"[..]) {
                response.add_header(allow);
            }
            let _ = request.respond(response);
            return;
        }

        let path = request.url().split('?').next().unwrap_or("/").to_string();
        let json = match path.as_str() {
            "/" => false,
            "/readings" | "/readings/" => true,
            _ => {
                let _ = request.respond(Response::from_string("Not Found").with_status_code(404));
                return;
            }
        };

        let readings = match source.read_all() {
            Ok(readings) => readings,
            Err(e) => {
                warn!("Sensor read failed: {}", e);
                let response =
                    Response::from_string(format!("Sensor unavailable: {}", e)).with_status_code(503);
                let _ = request.respond(response);
                return;
            }
        };

        let (body, content_type) = if json {
            match readings_json(&readings) {
                Ok(body) => (body, "application/json"),
                Err(e) => {
                    error!("Failed to encode readings: {}", e);
                    let _ = request
                        .respond(Response::from_string("Internal Error").with_status_code(500));
                    return;
                }
            }
        } else {
            (readings_html(&readings), "text/html; charset=utf-8")
        };

        let mut response = Response::from_string(body).with_status_code(200);
        if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes()) {
            response.add_header(header);
        }
        if let Err(e) = request.respond(response) {
            warn!("Failed to send response: {}", e);
        }
    }

    /// Stop the server. May take up to 100ms due to the polling interval.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for StatusServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provisioning::test_http;
    use crate::sensor::{FixedReadings, SensorError};
    use std::net::Ipv4Addr;

    struct BrokenSensor;

    impl SensorSource for BrokenSensor {
        fn read_all(&mut self) -> Result<Vec<Reading>, SensorError> {
            Err(SensorError::Bus("no ACK".into()))
        }
    }

    fn loopback() -> IpAddr {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    }

    #[test]
    fn test_readings_json() {
        let server = StatusServer::start(loopback(), 0, FixedReadings::indoor()).unwrap();
        let (status, body) = test_http(server.local_addr(), "GET", "/readings", "");

        assert_eq!(status, 200);
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        let readings = value["readings"].as_array().unwrap();
        assert_eq!(readings.len(), 10);
        assert_eq!(readings[1]["name"], "PM2.5");
        assert_eq!(readings[5]["value"], 23.1);
    }

    #[test]
    fn test_html_page() {
        let server = StatusServer::start(loopback(), 0, FixedReadings::indoor()).unwrap();
        let (status, body) = test_http(server.local_addr(), "GET", "/", "");

        assert_eq!(status, 200);
        assert!(body.contains("<td>PM10</td>"));
        assert!(body.contains("Compensated Relative Humidity"));
    }

    #[test]
    fn test_unknown_path_and_method() {
        let server = StatusServer::start(loopback(), 0, FixedReadings::indoor()).unwrap();
        assert_eq!(test_http(server.local_addr(), "GET", "/stats", "").0, 404);
        assert_eq!(test_http(server.local_addr(), "POST", "/", "").0, 405);
    }

    #[test]
    fn test_sensor_failure_is_503() {
        let server = StatusServer::start(loopback(), 0, BrokenSensor).unwrap();
        let (status, body) = test_http(server.local_addr(), "GET", "/readings", "");
        assert_eq!(status, 503);
        assert!(body.contains("no ACK"));
    }

    #[test]
    fn test_stop_joins_thread() {
        let mut server = StatusServer::start(loopback(), 0, FixedReadings::indoor()).unwrap();
        server.stop();
        assert!(server.handle.is_none());
    }
}
