use realmlink_codec::{Decoder, Dictionary, ErrorValue, Function, FunctionImporter, Key, Value};

use crate::cmd::{read_input, DecodeArgs};
use crate::exit::{codec_error, CliResult, SUCCESS};
use crate::output::{describe, print_entries, print_json, OutputFormat};

/// Functions decoded offline: they keep their arity and reject when called.
struct Detached;

impl FunctionImporter for Detached {
    fn import(&mut self, key: &Key, arity: usize) -> Function {
        let message = format!("function {key} is not connected to a realm");
        Function::new_async(arity, move |_| {
            let message = message.clone();
            async move { Err(Value::from(ErrorValue::new(message))) }
        })
    }
}

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let json = read_input(args.dictionary.as_deref(), args.file.as_ref())?;
    let dictionary =
        Dictionary::from_json(&json).map_err(|err| codec_error("decode failed", err))?;

    let mut importer = Detached;
    let mut decoder = Decoder::new(&dictionary, Some(&mut importer));
    let root = decoder
        .decode_code(Dictionary::ROOT)
        .map_err(|err| codec_error("decode failed", err))?;

    match format {
        OutputFormat::Json => print_json(&describe(&root), false),
        OutputFormat::Pretty => print_json(&describe(&root), true),
        OutputFormat::Table => print_entries(&dictionary, "VALUE", |code| {
            match decoder.decode_code(code) {
                Ok(value) => value.inspect(),
                Err(err) => format!("<{err}>"),
            }
        }),
    }
    Ok(SUCCESS)
}
