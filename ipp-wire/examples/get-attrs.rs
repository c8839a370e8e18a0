use std::{env, error::Error, process::exit};

use ipp_wire::prelude::*;

pub fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let args: Vec<_> = env::args().collect();

    if args.len() < 2 {
        println!("Usage: {} uri [attrs]", args[0]);
        exit(1);
    }

    let uri: Uri = args[1].parse()?;
    let params = IppParams::new().requested_attributes(&args[2..]);

    let result = IppOperation::get_printer_attributes().execute(&uri, Some(&params), None)?;
    println!("HTTP {}, IPP {:?}", result.http_status(), result.status_code());

    for group in result.attributes().groups_of(DelimiterTag::PrinterAttributes) {
        for v in group.attributes().values() {
            println!("{}: {}", v.name(), v.value());
        }
    }

    Ok(())
}
