//!
//! Command-line IPP utility to query a printer, list its jobs or print a document
//!

#![allow(clippy::result_large_err)]

use std::{
    fs,
    io::{self, BufReader, Read},
    path::PathBuf,
    time::Duration,
};

use clap::Parser;
use log::debug;

use ipp_wire::{prelude::*, transport::IPP_PORT};

#[derive(Debug, thiserror::Error)]
enum UtilError {
    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error(transparent)]
    InvalidUri(#[from] http::uri::InvalidUri),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("Printer is not ready")]
    PrinterNotReady,

    #[error("Empty IPP response, HTTP status: {0}")]
    EmptyResponse(HttpStatus),

    #[error("IPP status error: {0}")]
    Status(StatusCode),
}

fn new_transport(params: &UtilParams) -> HttpTransport {
    let mut builder = HttpTransport::builder().port(params.port);

    #[cfg(any(feature = "tls", feature = "native-tls"))]
    {
        builder = builder.ignore_tls_errors(params.ignore_tls_errors);
    }

    if let Some(timeout) = params.timeout {
        let timeout = Duration::from_secs(timeout);
        builder = builder.connect_timeout(timeout).response_timeout(timeout);
    }

    if let Some((user, password)) = params.auth.as_deref().and_then(|a| a.split_once(':')) {
        builder = builder.basic_auth(user, password);
    }

    for param in &params.headers {
        if let Some((k, v)) = param.split_once('=') {
            builder = builder.http_header(k, v);
        }
    }

    builder.build()
}

fn new_params(user_name: Option<&str>) -> IppParams {
    match user_name {
        Some(user_name) => IppParams::new().user_name(user_name),
        None => IppParams::new(),
    }
}

fn check_status(result: &IppResult) -> Result<(), UtilError> {
    match result.status_code() {
        Some(status) if status.is_success() => Ok(()),
        Some(status) => Err(UtilError::Status(status)),
        None => Err(UtilError::EmptyResponse(result.http_status().clone())),
    }
}

fn is_printer_ready(result: &IppResult) -> bool {
    let state = result
        .attributes()
        .get(DelimiterTag::PrinterAttributes, IppAttribute::PRINTER_STATE)
        .and_then(|attr| attr.value().as_enum())
        .and_then(|v| PrinterState::from_i32(*v));

    debug!("Printer state: {state:?}");

    !matches!(state, Some(PrinterState::Stopped))
}

fn print_group(result: &IppResult, tag: DelimiterTag) {
    for group in result.attributes().groups_of(tag) {
        let mut values = group.attributes().values().collect::<Vec<_>>();
        values.sort_by_key(|&a| a.name());

        for v in values {
            println!("{}: {}", v.name(), v.value());
        }
        println!();
    }
}

fn do_print(params: &UtilParams, cmd: PrintCmd) -> Result<(), UtilError> {
    let uri: Uri = cmd.uri.parse()?;
    let transport = new_transport(params);
    let ipp_params = new_params(params.user_name.as_deref());

    if !cmd.no_check_state {
        let operation = IppOperation::with_transport(Operation::GetPrinterAttributes, &transport);
        let state_params = ipp_params.clone().requested_attributes([IppAttribute::PRINTER_STATE]);
        let result = operation.execute(&uri, Some(&state_params), None)?;
        check_status(&result)?;
        if !is_printer_ready(&result) {
            return Err(UtilError::PrinterNotReady);
        }
    }

    let mut document: Box<dyn Read> = match cmd.file {
        Some(ref filename) => Box::new(BufReader::new(fs::File::open(filename)?)),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let operation = IppOperation::with_transport(Operation::PrintJob, &transport);
    let result = operation.execute(&uri, Some(&ipp_params), Some(&mut document))?;
    check_status(&result)?;

    print_group(&result, DelimiterTag::JobAttributes);

    Ok(())
}

fn do_status(params: &UtilParams, cmd: StatusCmd) -> Result<(), UtilError> {
    let uri: Uri = cmd.uri.parse()?;
    let operation = IppOperation::with_transport(Operation::GetPrinterAttributes, new_transport(params));

    let ipp_params = new_params(params.user_name.as_deref()).requested_attributes(&cmd.attributes);
    let result = operation.execute(&uri, Some(&ipp_params), None)?;
    check_status(&result)?;

    print_group(&result, DelimiterTag::PrinterAttributes);

    Ok(())
}

fn do_jobs(params: &UtilParams, cmd: JobsCmd) -> Result<(), UtilError> {
    let uri: Uri = cmd.uri.parse()?;
    let operation = IppOperation::with_transport(Operation::GetJobs, new_transport(params));

    let mut ipp_params = new_params(params.user_name.as_deref()).requested_attributes(&cmd.attributes);
    if let Some(limit) = cmd.limit {
        ipp_params = ipp_params.limit(limit);
    }

    let result = operation.execute(&uri, Some(&ipp_params), None)?;
    check_status(&result)?;

    print_group(&result, DelimiterTag::JobAttributes);

    Ok(())
}

#[derive(Parser)]
#[clap(about = "IPP utility", name = "ippwire", rename_all = "kebab-case")]
struct UtilParams {
    #[clap(
        long = "port",
        short = 'p',
        global = true,
        default_value_t = IPP_PORT,
        help = "Printer port, the port in the printer URI is ignored"
    )]
    port: u16,

    #[clap(
        long = "ignore-tls-errors",
        short = 'i',
        global = true,
        help = "Ignore TLS handshake errors"
    )]
    ignore_tls_errors: bool,

    #[clap(
        long = "timeout",
        short = 't',
        global = true,
        help = "Connect and response timeout in seconds [default: 10]"
    )]
    timeout: Option<u64>,

    #[clap(
        long = "user-name",
        short = 'u',
        global = true,
        help = "User name to send as requesting-user-name attribute"
    )]
    user_name: Option<String>,

    #[clap(long = "auth", global = true, help = "HTTP basic auth credentials in user:password format")]
    auth: Option<String>,

    #[clap(long = "header", short = 'H', global = true, help = "Extra HTTP headers in key=value format")]
    headers: Vec<String>,

    #[clap(subcommand)]
    command: UtilCommand,
}

#[derive(Parser)]
enum UtilCommand {
    #[clap(name = "print", about = "Print file to an IPP printer")]
    Print(PrintCmd),
    #[clap(name = "status", about = "Get status of an IPP printer")]
    Status(StatusCmd),
    #[clap(name = "jobs", about = "List jobs of an IPP printer")]
    Jobs(JobsCmd),
}

#[derive(Parser, Clone)]
#[clap(rename_all = "kebab-case")]
struct PrintCmd {
    #[clap(help = "Printer URI")]
    uri: String,

    #[clap(
        long = "no-check-state",
        short = 'n',
        help = "Do not check printer state before printing"
    )]
    no_check_state: bool,

    #[clap(
        long = "file",
        short = 'f',
        help = "Input file name to print [default: standard input]"
    )]
    file: Option<PathBuf>,
}

#[derive(Parser, Clone)]
#[clap(rename_all = "kebab-case")]
struct StatusCmd {
    #[clap(help = "Printer URI")]
    uri: String,

    #[clap(long = "attribute", short = 'a', help = "Attributes to query, default is to get all")]
    attributes: Vec<String>,
}

#[derive(Parser, Clone)]
#[clap(rename_all = "kebab-case")]
struct JobsCmd {
    #[clap(help = "Printer URI")]
    uri: String,

    #[clap(long = "limit", short = 'l', help = "Maximum number of jobs to return")]
    limit: Option<u32>,

    #[clap(long = "attribute", short = 'a', help = "Job attributes to query")]
    attributes: Vec<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let params = UtilParams::parse();

    match params.command {
        UtilCommand::Status(ref cmd) => do_status(&params, cmd.clone())?,
        UtilCommand::Print(ref cmd) => do_print(&params, cmd.clone())?,
        UtilCommand::Jobs(ref cmd) => do_jobs(&params, cmd.clone())?,
    }
    Ok(())
}
