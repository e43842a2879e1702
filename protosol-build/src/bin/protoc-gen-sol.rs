//! protoc plugin entry point.
//!
//! Reads a `CodeGeneratorRequest` from stdin and writes a
//! `CodeGeneratorResponse` to stdout. Schema errors travel back to protoc in
//! the response; only I/O failures end the process with an error.

use std::io::{Read, Write};

use anyhow::Context;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use protosol_build::descriptor::{
    decode_code_generator_request, encode_code_generator_response, CodeGeneratorResponse,
    ResponseFile, FEATURE_PROTO3_OPTIONAL,
};
use protosol_build::{generate, Config, Error};

fn main() -> anyhow::Result<()> {
    // stdout carries the response, so logs go to stderr.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let mut input = Vec::new();
    std::io::stdin()
        .read_to_end(&mut input)
        .context("failed to read CodeGeneratorRequest from stdin")?;

    let response = match run(&input) {
        Ok(file) => CodeGeneratorResponse {
            error: None,
            supported_features: Some(FEATURE_PROTO3_OPTIONAL),
            file,
        },
        Err(err) => {
            error!(%err, "generation failed");
            CodeGeneratorResponse {
                error: Some(err.to_string()),
                supported_features: Some(FEATURE_PROTO3_OPTIONAL),
                file: Vec::new(),
            }
        }
    };

    let output = encode_code_generator_response(&response);
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&output)
        .and_then(|()| stdout.flush())
        .context("failed to write CodeGeneratorResponse to stdout")?;
    Ok(())
}

fn run(input: &[u8]) -> Result<Vec<ResponseFile>, Error> {
    let request = decode_code_generator_request(input)?;
    let config = Config::from_parameter(request.parameter.as_deref().unwrap_or(""))?;
    let files = generate(&config, &request)?;
    Ok(files
        .into_iter()
        .map(|file| ResponseFile {
            name: Some(file.name),
            content: Some(file.content),
        })
        .collect())
}
