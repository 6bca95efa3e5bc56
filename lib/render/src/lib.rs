pub mod error;
pub mod plain;
pub mod traits;

pub use error::RenderError;
pub use plain::{FailingRenderer, PlainRenderer};
pub use traits::{CertificateSpec, Renderer, SheetItem, SheetSpec};
