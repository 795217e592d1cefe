//! # Shastrarthi Server
//!
//! The AI synthesis backend of the Shastrarthi Sanskrit study platform.
//!
//! A signed-in reader picks a handful of texts and asks a question about them.
//! The server checks the request, charges it against a per-caller fixed-window
//! rate limit, asks the text-completion provider for a synthesis once, and
//! plays the answer back to the browser as server-sent events.
//!
//! ## Quick Start
//!
//! ```bash
//! # Show all available options
//! shastrarthi --help
//!
//! # Serve on port 8080 with credentials from the environment
//! export GEMINI_API_KEY=...
//! export SUPABASE_URL=https://project.supabase.co
//! export SUPABASE_ANON_KEY=...
//! shastrarthi --http-port 8080
//!
//! # Tighter limits for a shared demo instance
//! shastrarthi --ai-rate-max-requests 5 --ai-rate-window-ms 300000
//!
//! # List all available environment variables
//! shastrarthi --list-env-vars
//! ```
//!
//! ## Calling the API
//!
//! ```bash
//! curl -N -X POST http://localhost:8080/api/synthesize \
//!   -H "Authorization: Bearer $ACCESS_TOKEN" \
//!   -H "Content-Type: application/json" \
//!   -d '{"query": "How is karma treated?", "texts": [{"title_en": "Bhagavad Gita", "description": "Dialogue on duty"}]}'
//! ```
//!
//! ```text
//! data: {"content":"K"}
//!
//! data: {"content":"a"}
//!
//! ...
//!
//! data: [DONE]
//! ```
//!
//! ## Architecture
//!
//! ```text
//!               ┌──────────────────┐
//!   request ───►│  HTTP transport  │──── identity ────► Supabase Auth
//!               └────────┬─────────┘
//!                        │ check
//!                  ┌─────▼─────┐
//!                  │   Actor   │  owns the fixed-window limiter
//!                  └─────┬─────┘
//!                        │ allowed
//!               ┌────────▼─────────┐
//!   events ◄────│ synthesis stream │──── provider ────► Gemini
//!               └──────────────────┘
//! ```
//!
//! The limiter lives in one actor task, so concurrent checks for the same key
//! are applied one after another and never undercount.

pub mod actor;
pub mod config;
pub mod identity;
pub mod metrics;
pub mod provider;
pub mod ratelimit;
pub mod store;
pub mod synthesis;
pub mod transport;
pub mod types;

#[cfg(test)]
mod actor_tests;
