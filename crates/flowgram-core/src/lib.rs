pub mod consts;
pub mod error;
pub mod flow;
pub mod frame;
pub mod histogram;
pub mod io;
pub mod pipeline;
pub mod pooling;
pub mod postprocess;
pub mod render;
pub mod session;
pub mod source;
