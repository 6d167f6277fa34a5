// Library exports for the binary, benchmarks and integration tests

// ===== Inputs =====
pub mod config;
pub mod request;
pub mod stub;

// ===== Rendering =====
pub mod error;
pub mod files;
pub mod proxy;
pub mod renderer;
pub mod response;
pub mod template;
pub mod transform;

// ===== Serving =====
pub mod metrics;
pub mod registry;
pub mod server;
pub mod transport;

pub use error::{HelperError, RenderError, TemplateError};
pub use renderer::ResponseRenderer;
pub use request::Request;
pub use response::{DelayPolicy, Response};
pub use stub::{ResponseDefinition, StubMapping};
