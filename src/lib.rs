// Module naming follows project convention (Pipe, Core, Buffer are capitalized)
#[allow(non_snake_case)]
pub mod Pipe;

#[allow(non_snake_case)]
pub mod Core;

#[allow(non_snake_case)]
mod Debug {
    pub mod StructDebug;
}

pub mod error;

pub use error::{PipeError, Result};
pub use Pipe::{
    create_pipe, BoundedChannel, LocalChannel, LogSummary, MeterRecord, PipeBuilder, PipeConfig,
    Reader, SharedChannel, Writer,
};
