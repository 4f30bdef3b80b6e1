use realmlink_codec::{encode_without_functions, Value};

use crate::cmd::{read_input, EncodeArgs};
use crate::exit::{codec_error, CliResult, SUCCESS};
use crate::output::{print_entries, print_json, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let json = read_input(args.json.as_deref(), args.file.as_ref())?;
    let value = Value::from_json(&json);
    let dictionary =
        encode_without_functions(&value).map_err(|err| codec_error("encode failed", err))?;

    match format {
        OutputFormat::Json | OutputFormat::Pretty => {
            let out = dictionary
                .to_json()
                .map_err(|err| codec_error("encode failed", err))?;
            print_json(&out, matches!(format, OutputFormat::Pretty));
        }
        OutputFormat::Table => print_entries(&dictionary, "ENCODING", |code| {
            dictionary
                .get(code)
                .map(|entry| entry.encoding().to_string())
                .unwrap_or_default()
        }),
    }
    Ok(SUCCESS)
}
