//! RiccScanner: photograph a handwritten math problem, get the answer.
//!
//! The pipeline is `ocr` (image to text), `math` (text to expression to
//! solution) and `services::ScanService` tying them together; `api` exposes
//! it over HTTP.

pub mod api;
pub mod config;
pub mod error;
pub mod math;
pub mod ocr;
pub mod services;
