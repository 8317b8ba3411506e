pub mod analysis_client;
pub mod openai_backend;
pub mod report_writer;
pub mod response_parser;

pub use analysis_client::{AnalysisBackend, AnalysisClient, AnalysisRequest, RetryPolicy};
pub use openai_backend::OpenAiBackend;
pub use report_writer::{render_text, ReportFormat, ReportWriter};
pub use response_parser::{ParsedResponse, ResponseParser};
