//! RAG server binary.
//! Run with: cargo run --bin halldyll-rag-server

use std::process::ExitCode;

use halldyll_rag::start_rag_server;

fn main() -> ExitCode {
    start_rag_server::run()
}
