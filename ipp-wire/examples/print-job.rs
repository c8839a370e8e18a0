use std::{env, error::Error, fs::File, process::exit};

use ipp_wire::prelude::*;

pub fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let args: Vec<_> = env::args().collect();

    if args.len() < 3 {
        println!("Usage: {} uri filename", args[0]);
        exit(1);
    }

    let uri: Uri = args[1].parse()?;
    let mut document = File::open(&args[2])?;
    let params = IppParams::new().user_name(env::var("USER").unwrap_or_default());

    let result = IppOperation::print_job().execute(&uri, Some(&params), Some(&mut document))?;
    println!("HTTP {}, IPP {:?}", result.http_status(), result.status_code());

    for group in result.attributes().groups_of(DelimiterTag::JobAttributes) {
        for v in group.attributes().values() {
            println!("{}: {}", v.name(), v.value());
        }
    }

    Ok(())
}
