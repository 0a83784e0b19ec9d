pub mod handler;

pub use handler::PdfRagHandler;
