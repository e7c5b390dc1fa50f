use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[path = "../composition.rs"]
mod composition;
#[path = "../error.rs"]
mod error;
#[path = "../host.rs"]
mod host;
#[path = "../sampling.rs"]
mod sampling;

use composition::Composition;
use host::{ChannelSink, Driver, StopHandle};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sampling::{CategorySnapshot, SamplingEngine};

/// Lines buffered ahead of the page; the engine waits once this fills up
const PENDING_LINES: usize = 2_000;

/// Publish counters to /info every this many molecules
const SNAPSHOT_EVERY: u64 = 256;

#[derive(Deserialize)]
struct MoleculesQuery {
    count: Option<usize>,
}

#[derive(Serialize)]
struct MoleculesResponse {
    lines: Vec<String>,
    finished: bool,
}

#[derive(Serialize, Clone)]
struct ConstituentInfo {
    gas: composition::Gas,
    name: &'static str,
    fraction: f64,
    share: String,
    moles: String,
    population: String,
}

#[derive(Serialize)]
struct InfoResponse {
    total_moles: String,
    total_molecules: String,
    constituents: Vec<ConstituentInfo>,
    counters: Vec<CategorySnapshot>,
}

#[derive(Clone)]
struct AppState {
    lines: Arc<Mutex<mpsc::Receiver<String>>>,
    counters: watch::Receiver<Vec<CategorySnapshot>>,
    total_moles: String,
    total_molecules: String,
    constituents: Arc<Vec<ConstituentInfo>>,
}

const INDEX_HTML: &str = r##"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Every Molecule of Air</title>
    <style>
      html, body { margin: 0; padding: 0; background: #0b0c10; color: #e6e6e6; font-family: "Segoe UI", sans-serif; }
      #header { position: sticky; top: 0; padding: 10px 14px; background: rgba(10,12,16,0.95); border-bottom: 1px solid #2a2f36; font-size: 14px; }
      #header a { color: #9aa3ad; font-size: 12px; margin-left: 12px; }
      #output { padding: 8px 14px; font-size: 13px; line-height: 1.5; font-variant-numeric: tabular-nums; }
    </style>
  </head>
  <body>
    <div id="header">Counting every molecule in Earth's atmosphere <a href="/info">Info</a></div>
    <div id="output"></div>
    <script>
      const maxLines = 5000;
      let outputDiv = document.getElementById("output");

      async function displayMolecules() {
        if (outputDiv === null) {
          outputDiv = document.getElementById("output");
          setTimeout(displayMolecules, 0);
          return;
        }
        let finished = false;
        let idle = true;
        try {
          const res = await fetch("/molecules?count=50");
          const data = await res.json();
          for (const line of data.lines) {
            const textDiv = document.createElement("DIV");
            textDiv.textContent = line;
            outputDiv.appendChild(textDiv);
          }
          while (outputDiv.childElementCount > maxLines) {
            outputDiv.removeChild(outputDiv.firstChild);
          }
          window.scrollTo(0, document.body.scrollHeight);
          finished = data.finished && data.lines.length === 0;
          idle = data.lines.length === 0;
        } catch (err) {
          console.error(err);
        }
        if (!finished) {
          setTimeout(displayMolecules, idle ? 50 : 0);
        }
      }
      displayMolecules();
    </script>
  </body>
</html>
"##;

async fn index() -> impl IntoResponse {
    Html(INDEX_HTML)
}

async fn molecules(State(state): State<AppState>, Query(q): Query<MoleculesQuery>) -> impl IntoResponse {
    let count = q.count.unwrap_or(50).clamp(1, 500);
    let mut rx = state.lines.lock().await;
    let mut lines = Vec::with_capacity(count);
    let mut finished = false;
    while lines.len() < count {
        match rx.try_recv() {
            Ok(line) => lines.push(line),
            Err(mpsc::error::TryRecvError::Empty) => break,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                finished = true;
                break;
            }
        }
    }
    Json(MoleculesResponse { lines, finished })
}

async fn info(State(state): State<AppState>) -> impl IntoResponse {
    Json(InfoResponse {
        total_moles: state.total_moles.clone(),
        total_molecules: state.total_molecules.clone(),
        constituents: state.constituents.as_ref().clone(),
        counters: state.counters.borrow().clone(),
    })
}

fn describe(composition: &Composition) -> Vec<ConstituentInfo> {
    composition
        .constituents()
        .iter()
        .map(|c| ConstituentInfo {
            gas: c.gas,
            name: c.display_name(),
            fraction: c.fraction(),
            share: format!("{}/{}", c.share, composition::FRACTION_DENOMINATOR),
            moles: c.moles.to_string(),
            population: c.population.to_string(),
        })
        .collect()
}

#[tokio::main]
async fn main() -> error::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let composition = Composition::earth()?;
    let engine = SamplingEngine::new(&composition, StdRng::from_entropy())?;
    let (counters_tx, counters_rx) = watch::channel(engine.snapshot());
    let (sink, lines_rx) = ChannelSink::new(PENDING_LINES);
    let mut driver = Driver::new(engine, sink);

    let stop = StopHandle::new();
    let driver_stop = stop.clone();
    tokio::spawn(async move {
        let result = host::run_observed(&mut driver, &driver_stop, |d| {
            if d.presented() % SNAPSHOT_EVERY == 0 {
                counters_tx.send_replace(d.engine().snapshot());
            }
        })
        .await;
        counters_tx.send_replace(driver.engine().snapshot());
        match result {
            Ok(()) => info!(presented = driver.presented(), state = ?driver.state(), "sampling finished"),
            Err(err) => error!("sampling failed: {err}"),
        }
    });

    let state = AppState {
        lines: Arc::new(Mutex::new(lines_rx)),
        counters: counters_rx,
        total_moles: composition.total_moles().to_string(),
        total_molecules: composition.total_population().to_string(),
        constituents: Arc::new(describe(&composition)),
    };
    let app = Router::new()
        .route("/", get(index))
        .route("/molecules", get(molecules))
        .route("/info", get(info))
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    info!("Serving on http://127.0.0.1:3000");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(listener, app).await;
    stop.stop();
    if let Err(err) = &served {
        error!("server error: {err}");
    }
    served?;
    Ok(())
}
