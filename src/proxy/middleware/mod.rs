//! Proxy middleware: response finishing headers

mod cors;

pub use cors::{
    finish_responses, ALLOW_HEADERS_VALUE, ALLOW_METHODS_VALUE, ALLOW_ORIGIN_VALUE,
    CACHE_CONTROL_VALUE,
};
