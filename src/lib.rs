//! Hybrid retrieval and reranking engine with an HTTP front end.

// Interdiction des pratiques dangereuses
#![deny(unsafe_code)] // Le code unsafe est interdit
#![forbid(unsafe_op_in_unsafe_fn)]
// Interdit l'utilisation d'unsafe même dans une fonction unsafe

// Hygiène du code, remontée en avertissement
#![warn(missing_docs)] // Toute API publique doit être documentée
#![warn(dead_code)] // Signale le code inutilisé
#![warn(unused_imports)] // Signale les imports inutilisés
#![warn(unused_variables)] // Signale les variables inutilisées
#![deny(unused_must_use)] // Oblige à gérer explicitement les Result et Option
#![deny(nonstandard_style)] // Empêche tout style de code non standard

// Clippy pour stricte discipline
#![deny(clippy::all)] // Active toutes les lints Clippy standard
#![deny(clippy::pedantic)] // Active les lints très strictes de Clippy
#![deny(clippy::unwrap_used)] // Interdit unwrap()
#![deny(clippy::expect_used)] // Interdit expect()
#![deny(clippy::panic)] // Interdit panic!()
#![deny(clippy::print_stdout)] // Interdit println!() en production
#![deny(clippy::todo)] // Interdit les TODO dans le code
#![deny(clippy::unimplemented)] // Interdit les fonctions non implémentées
#![deny(clippy::unwrap_in_result)] // Interdit unwrap() sur Result
#![deny(clippy::redundant_clone)] // Interdit les clones inutiles
#![deny(clippy::cognitive_complexity)] // Limite la complexité cognitive des fonctions
#![allow(clippy::module_name_repetitions)] // Les noms `RagConfig`, `RagError` restent explicites

// Lints pour sécurité et robustesse
#![deny(overflowing_literals)] // Interdit les littéraux qui débordent

/// Retrieval pipeline: corpus, scoring, fusion, reranking, summarization.
pub mod rag;
/// HTTP server and API routes.
#[allow(clippy::missing_errors_doc, clippy::unused_async)]
pub mod server;
/// Entry helpers to start the RAG server.
pub mod start_rag_server;
