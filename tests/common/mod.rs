//! Mock package index shared by the integration tests.

#![allow(dead_code)]

use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};
use tar::Builder;
use zip::write::SimpleFileOptions;

/// Routes served by the mock index, keyed by request path.
#[derive(Default)]
pub struct MockIndex {
    routes: HashMap<String, (StatusCode, Vec<u8>)>,
    hits: Mutex<HashMap<String, usize>>,
}

impl MockIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `body` with status 200 at `path`.
    pub fn file(mut self, path: &str, body: Vec<u8>) -> Self {
        self.routes.insert(path.to_string(), (StatusCode::OK, body));
        self
    }

    /// Serves an empty body with `status` at `path`.
    pub fn status(mut self, path: &str, status: StatusCode) -> Self {
        self.routes.insert(path.to_string(), (status, Vec::new()));
        self
    }

    /// Listing page for `name` linking to `files` (served under `/files/`).
    pub fn page(self, name: &str, files: &[&str]) -> Self {
        let anchors: String = files
            .iter()
            .map(|f| format!("    <a href=\"/files/{f}#sha256=0123abcd\">{f}</a><br/>\n"))
            .collect();
        let html = format!(
            "<!DOCTYPE html>\n<html><body>\n<h1>Links for {name}</h1>\n{anchors}</body></html>\n"
        );
        self.file(&format!("/simple/{name}/"), html.into_bytes())
    }

    /// How often `path` was requested.
    pub fn hits(&self, path: &str) -> usize {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }
}

async fn serve(State(index): State<Arc<MockIndex>>, uri: Uri) -> Response {
    *index
        .hits
        .lock()
        .unwrap()
        .entry(uri.path().to_string())
        .or_default() += 1;

    match index.routes.get(uri.path()) {
        Some((status, body)) => (*status, body.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Starts the mock index on an ephemeral port, returning its base URL.
pub async fn start(index: MockIndex) -> (String, Arc<MockIndex>) {
    let index = Arc::new(index);
    let app = Router::new().fallback(serve).with_state(index.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), index)
}

/// A wheel holding `<name>-<version>.dist-info/METADATA` with `requires`.
pub fn wheel(name: &str, version: &str, requires: &[&str]) -> Vec<u8> {
    let mut metadata = format!("Metadata-Version: 2.1\nName: {name}\nVersion: {version}\n");
    for req in requires {
        metadata.push_str(&format!("Requires-Dist: {req}\n"));
    }
    metadata.push_str("\nLong description.\n");

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file(format!("{name}/__init__.py"), SimpleFileOptions::default())
        .unwrap();
    zip.start_file(
        format!("{name}-{version}.dist-info/METADATA"),
        SimpleFileOptions::default(),
    )
    .unwrap();
    zip.write_all(metadata.as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

/// A gzip sdist holding `<name>.egg-info/requires.txt` with `requires`.
pub fn sdist(name: &str, version: &str, requires: &str) -> Vec<u8> {
    let mut tar_bytes = Vec::new();
    {
        let mut builder = Builder::new(&mut tar_bytes);
        let entries = [
            (format!("{name}-{version}/setup.py"), "from setuptools import setup\n"),
            (format!("{name}-{version}/{name}.egg-info/requires.txt"), requires),
        ];
        for (path, contents) in &entries {
            let mut header = tar::Header::new_gnu();
            header.set_path(path).unwrap();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append(&header, contents.as_bytes()).unwrap();
        }
        builder.finish().unwrap();
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar_bytes).unwrap();
    encoder.finish().unwrap()
}
