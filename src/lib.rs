// Library root
// -----------
// The binary (`main.rs`) reads a folder name and hands it to `runner`.
//
// Module responsibilities:
// - `auth`: client secrets, cached tokens, and the browser consent flow
//   that yields an authorized `Session`.
// - `drive` / `photos`: HTTP clients for the two services, implementing
//   the `backend` traits.
// - `transfer`: staging layout and the per-file download/upload loop.
// - `runner`: wiring and the top-to-bottom run.
// - `ui`: prompt, progress bar, and status lines.
pub mod auth;
pub mod backend;
pub mod config;
pub mod drive;
pub mod error;
pub mod logging;
pub mod photos;
pub mod runner;
pub mod transfer;
pub mod ui;

pub use error::Error;
