//! Fixtures shared by the unit tests: synthetic GRIB2 messages, an in-memory
//! grid provider and a local HTTP server standing in for a NOAA mirror.

use crate::grid::field::GridField;
use crate::provider::error::ProviderError;
use crate::provider::GridProvider;
use crate::types::model::Model;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Builds a single-field GRIB2 message with 8-bit simple packing.
///
/// Values must be whole numbers spanning less than 256 so they survive packing exactly.
pub struct Grib2Builder {
    nx: u32,
    ny: u32,
    grid_template: u16,
    lambert: bool,
    category: u8,
    number: u8,
    level_type: u8,
    level_value: u32,
    values: Vec<f32>,
}

impl Grib2Builder {
    /// Regular grid starting at 10N 20E, 1 degree spacing, rows scanning northward.
    pub fn latlon(nx: u32, ny: u32) -> Self {
        Self {
            nx,
            ny,
            grid_template: 0,
            lambert: false,
            category: 2,
            number: 2,
            level_type: 103,
            level_value: 10,
            values: vec![0.0; (nx * ny) as usize],
        }
    }

    /// Lambert conformal grid with the URMA CONUS parameters, truncated to `nx` x `ny`.
    pub fn urma_like(nx: u32, ny: u32) -> Self {
        Self {
            grid_template: 30,
            lambert: true,
            ..Self::latlon(nx, ny)
        }
    }

    pub fn with_parameter(mut self, category: u8, number: u8) -> Self {
        self.category = category;
        self.number = number;
        self
    }

    pub fn with_level(mut self, level_type: u8, level_value: u32) -> Self {
        self.level_type = level_type;
        self.level_value = level_value;
        self
    }

    pub fn with_values(mut self, values: Vec<f32>) -> Self {
        self.values = values;
        self
    }

    /// Overrides the template number written to section 3 without changing its payload.
    pub fn with_grid_template(mut self, template: u16) -> Self {
        self.grid_template = template;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let sections = [
            self.section1(),
            self.section3(),
            self.section4(),
            self.section5(),
            section(6, &[255]),
            self.section7(),
        ];
        let length = 16 + sections.iter().map(Vec::len).sum::<usize>() + 4;

        let mut message = Vec::with_capacity(length);
        message.extend_from_slice(b"GRIB");
        message.extend_from_slice(&[0, 0]);
        message.push(0); // Discipline: meteorological
        message.push(2); // Edition
        message.extend_from_slice(&(length as u64).to_be_bytes());
        for s in &sections {
            message.extend_from_slice(s);
        }
        message.extend_from_slice(b"7777");
        message
    }

    fn section1(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&7u16.to_be_bytes()); // NCEP
        body.extend_from_slice(&4u16.to_be_bytes());
        body.push(2);
        body.push(1);
        body.push(0); // Significance of reference time: analysis
        body.extend_from_slice(&2024u16.to_be_bytes());
        body.extend_from_slice(&[12, 28, 12, 0, 0]);
        body.push(0);
        body.push(0); // Analysis products
        section(1, &body)
    }

    fn section3(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.push(0);
        body.extend_from_slice(&(self.nx * self.ny).to_be_bytes());
        body.push(0);
        body.push(0);
        body.extend_from_slice(&self.grid_template.to_be_bytes());
        // Shape of earth 6 with unused radius/axis fields.
        body.push(6);
        body.extend_from_slice(&[0; 15]);
        body.extend_from_slice(&self.nx.to_be_bytes());
        body.extend_from_slice(&self.ny.to_be_bytes());
        if self.lambert {
            body.extend_from_slice(&19_228_976u32.to_be_bytes()); // La1
            body.extend_from_slice(&233_723_448u32.to_be_bytes()); // Lo1
            body.push(8);
            body.extend_from_slice(&25_000_000u32.to_be_bytes()); // LaD
            body.extend_from_slice(&265_000_000u32.to_be_bytes()); // LoV
            body.extend_from_slice(&2_539_703u32.to_be_bytes()); // Dx, mm
            body.extend_from_slice(&2_539_703u32.to_be_bytes()); // Dy, mm
            body.push(0);
            body.push(0b0100_0000);
            body.extend_from_slice(&25_000_000u32.to_be_bytes()); // Latin1
            body.extend_from_slice(&25_000_000u32.to_be_bytes()); // Latin2
            body.extend_from_slice(&0x8000_0000u32.to_be_bytes());
            body.extend_from_slice(&0u32.to_be_bytes());
        } else {
            body.extend_from_slice(&0u32.to_be_bytes()); // Basic angle
            body.extend_from_slice(&u32::MAX.to_be_bytes()); // Subdivisions
            body.extend_from_slice(&10_000_000u32.to_be_bytes()); // La1
            body.extend_from_slice(&20_000_000u32.to_be_bytes()); // Lo1
            body.push(48);
            let la2 = 10_000_000 + (self.ny - 1) * 1_000_000;
            let lo2 = 20_000_000 + (self.nx - 1) * 1_000_000;
            body.extend_from_slice(&la2.to_be_bytes());
            body.extend_from_slice(&lo2.to_be_bytes());
            body.extend_from_slice(&1_000_000u32.to_be_bytes()); // Di
            body.extend_from_slice(&1_000_000u32.to_be_bytes()); // Dj
            body.push(0b0100_0000);
        }
        section(3, &body)
    }

    fn section4(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&0u16.to_be_bytes());
        body.extend_from_slice(&0u16.to_be_bytes()); // Template 4.0
        body.push(self.category);
        body.push(self.number);
        body.push(0); // Analysis
        body.push(0);
        body.push(0);
        body.extend_from_slice(&0u16.to_be_bytes());
        body.push(0);
        body.push(1);
        body.extend_from_slice(&0u32.to_be_bytes());
        body.push(self.level_type);
        body.push(0);
        body.extend_from_slice(&self.level_value.to_be_bytes());
        body.push(255);
        body.push(0);
        body.extend_from_slice(&0u32.to_be_bytes());
        section(4, &body)
    }

    fn reference(&self) -> f32 {
        self.values.iter().copied().fold(f32::INFINITY, f32::min)
    }

    fn section5(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&(self.values.len() as u32).to_be_bytes());
        body.extend_from_slice(&0u16.to_be_bytes()); // Template 5.0
        body.extend_from_slice(&self.reference().to_be_bytes());
        body.extend_from_slice(&0u16.to_be_bytes()); // Binary scale factor
        body.extend_from_slice(&0u16.to_be_bytes()); // Decimal scale factor
        body.push(8);
        body.push(0);
        section(5, &body)
    }

    fn section7(&self) -> Vec<u8> {
        let reference = self.reference();
        let packed: Vec<u8> = self
            .values
            .iter()
            .map(|value| (value - reference).round() as u8)
            .collect();
        section(7, &packed)
    }
}

fn section(number: u8, body: &[u8]) -> Vec<u8> {
    let mut s = Vec::with_capacity(body.len() + 5);
    s.extend_from_slice(&((body.len() + 5) as u32).to_be_bytes());
    s.push(number);
    s.extend_from_slice(body);
    s
}

pub const FIXTURE_U: [f32; 6] = [3.0, 1.0, 0.0, -6.0, 2.0, 5.0];
pub const FIXTURE_V: [f32; 6] = [4.0, 0.0, -2.0, 8.0, 0.0, 12.0];

/// A 3x2 U message followed by a 3x2 V message on the regular fixture grid.
pub fn wind_subset() -> Vec<u8> {
    let mut bytes = Grib2Builder::latlon(3, 2)
        .with_parameter(2, 2)
        .with_values(FIXTURE_U.to_vec())
        .build();
    bytes.extend(
        Grib2Builder::latlon(3, 2)
            .with_parameter(2, 3)
            .with_values(FIXTURE_V.to_vec())
            .build(),
    );
    bytes
}

/// What a [`FixtureProvider`] answers with.
pub enum FixtureResponse {
    Grid(GridField),
    Failure(fn() -> ProviderError),
}

/// In-memory provider that records the requests it receives.
pub struct FixtureProvider {
    response: FixtureResponse,
    calls: AtomicUsize,
    last_request: Mutex<Option<(Model, NaiveDateTime)>>,
}

impl FixtureProvider {
    pub fn grid(field: GridField) -> Self {
        Self::new(FixtureResponse::Grid(field))
    }

    pub fn failing(error: fn() -> ProviderError) -> Self {
        Self::new(FixtureResponse::Failure(error))
    }

    fn new(response: FixtureResponse) -> Self {
        Self {
            response,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<(Model, NaiveDateTime)> {
        *self.last_request.lock().unwrap()
    }
}

impl GridProvider for FixtureProvider {
    async fn fetch_grid(
        &self,
        model: Model,
        valid_time: NaiveDateTime,
    ) -> Result<GridField, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some((model, valid_time));
        match &self.response {
            FixtureResponse::Grid(field) => Ok(field.clone().with_valid_time(valid_time)),
            FixtureResponse::Failure(error) => Err(error()),
        }
    }
}

/// How a [`StubServer`] answers requests for one path.
#[derive(Debug, Clone)]
pub struct StubRoute {
    status: u16,
    body: Vec<u8>,
    honor_range: bool,
}

impl StubRoute {
    /// 200 with `body`, or 206 with the requested slice when a `Range` header is sent.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            honor_range: true,
        }
    }

    /// Always 200 with the full body, like a server without range support.
    pub fn ignoring_range(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            honor_range: false,
        }
    }

    /// An empty response with `status`.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
            honor_range: false,
        }
    }
}

/// Minimal HTTP/1.1 server on 127.0.0.1. Unknown paths get a 404.
///
/// Every request is logged as `(path, range header)`. The accept loop stops when
/// the server is dropped.
pub struct StubServer {
    base_url: String,
    requests: Arc<Mutex<Vec<(String, Option<String>)>>>,
    task: JoinHandle<()>,
}

impl StubServer {
    pub async fn start(routes: Vec<(String, StubRoute)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let routes: Arc<HashMap<String, StubRoute>> = Arc::new(routes.into_iter().collect());
        let requests = Arc::new(Mutex::new(Vec::new()));

        let log = requests.clone();
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let routes = routes.clone();
                let log = log.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, &routes, &log).await;
                });
            }
        });

        Self {
            base_url,
            requests,
            task,
        }
    }

    /// `http://127.0.0.1:<port>` followed by `path`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn requests(&self) -> Vec<(String, Option<String>)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requested_paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|(path, _)| path).collect()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(
    mut stream: TcpStream,
    routes: &HashMap<String, StubRoute>,
    log: &Mutex<Vec<(String, Option<String>)>>,
) -> std::io::Result<()> {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        head.extend_from_slice(&buf[..n]);
    }

    let head = String::from_utf8_lossy(&head);
    let mut lines = head.lines();
    let path = lines
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    let range = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("range"))
        .map(|(_, value)| value.trim().to_string());
    log.lock().unwrap().push((path.clone(), range.clone()));

    let (status, body) = match routes.get(&path) {
        None => (404, Vec::new()),
        Some(route) if route.status != 200 => (route.status, route.body.clone()),
        Some(route) => match range.as_deref().filter(|_| route.honor_range) {
            Some(value) => match parse_range(value, route.body.len()) {
                Some((start, end)) => (206, route.body[start..=end].to_vec()),
                None => (416, Vec::new()),
            },
            None => (200, route.body.clone()),
        },
    };

    let response_head = format!(
        "HTTP/1.1 {} Stub\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        body.len()
    );
    stream.write_all(response_head.as_bytes()).await?;
    stream.write_all(&body).await?;
    stream.shutdown().await
}

/// Parses `bytes=start-end` or `bytes=start-` into inclusive bounds within `len`.
fn parse_range(value: &str, len: usize) -> Option<(usize, usize)> {
    let (start, end) = value.strip_prefix("bytes=")?.split_once('-')?;
    let start: usize = start.parse().ok()?;
    let end = match end {
        "" => len.checked_sub(1)?,
        end => end.parse::<usize>().ok()?.min(len.checked_sub(1)?),
    };
    (start <= end).then_some((start, end))
}
