use clap::{Args, Subcommand};

use crate::exit::CliResult;

pub mod send;
pub mod serve;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a framed echo server.
    Serve(ServeArgs),
    /// Send one framed message and print the echoed reply.
    Send(SendArgs),
}

pub fn run(command: Command) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args),
        Command::Send(args) => send::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port to listen on (0 picks a free port).
    pub port: u16,
    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,
    /// Maximum accepted frame size in bytes.
    #[arg(long, default_value = "65535")]
    pub max_frame_length: usize,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Message text to frame and send.
    #[arg(long, short = 'm', default_value = "hello seine")]
    pub message: String,
    /// Seconds to wait for the echoed reply.
    #[arg(long, default_value = "5")]
    pub timeout: u64,
}
