pub mod http_helpers;
pub mod model_service;
pub mod session_service;
pub mod stream_parser;
