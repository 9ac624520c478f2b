//! Infrastructure layer: owns the scarce page resource, exposes capabilities.

pub mod js_executor;

pub use js_executor::JsExecutor;
