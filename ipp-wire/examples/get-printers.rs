use std::{env, error::Error, process::exit};

use ipp_wire::prelude::*;

pub fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let args: Vec<_> = env::args().collect();

    if args.len() < 2 {
        println!("Usage: {} uri [limit]", args[0]);
        exit(1);
    }

    let uri: Uri = args[1].parse()?;
    let mut params = IppParams::new().requested_attributes([
        IppAttribute::PRINTER_NAME,
        IppAttribute::DEVICE_URI,
        IppAttribute::PRINTER_STATE,
    ]);
    if let Some(limit) = args.get(2) {
        params = params.set(IppAttribute::LIMIT, limit);
    }

    let result = IppOperation::cups_get_printers().execute(&uri, Some(&params), None)?;

    for group in result.attributes().groups_of(DelimiterTag::PrinterAttributes) {
        let attrs = group.attributes();
        let name = attrs.get(IppAttribute::PRINTER_NAME).map(|a| a.value().to_string()).unwrap_or_default();
        let device = attrs.get(IppAttribute::DEVICE_URI).map(|a| a.value().to_string()).unwrap_or_default();
        let state = attrs
            .get(IppAttribute::PRINTER_STATE)
            .and_then(|a| a.value().as_enum())
            .and_then(|v| PrinterState::from_i32(*v));

        println!("{name}: {device} {state:?}");
    }

    Ok(())
}
